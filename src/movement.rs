//! Greedy one-cell movement toward the nearest agent of a given type.

use rand::prelude::*;
use rcc_common::{torus_manhattan, AgentType, Position};

use crate::world::World;

/// Finds the closest `target` agent within `search_radius` of `pos` (center cell
/// excluded) and returns the empty neighbor cell that brings the mover closest to it.
///
/// Returns `None` when there is no target, when the closest target is already at
/// distance 1, or when every neighbor cell is occupied. Ties go to the first
/// candidate in grid order, so the result depends only on world state.
pub fn seek_and_step_toward(
    world: &World,
    pos: Position,
    target: AgentType,
    search_radius: u32,
    moore: bool,
) -> Option<Position> {
    let (w, h) = (world.grid.width(), world.grid.height());

    let closest = world
        .grid
        .neighbors(pos, search_radius, moore, false)
        .into_iter()
        .filter_map(|id| world.agent(id))
        .filter(|agent| agent.agent_type() == target)
        .min_by_key(|agent| torus_manhattan(pos, agent.pos, w, h))?;

    if torus_manhattan(pos, closest.pos, w, h) == 1 {
        return None; // already adjacent
    }

    best_move_towards(world, pos, closest.pos, moore)
}

/// Empty neighbor cell minimizing the distance to `target_pos`.
fn best_move_towards(world: &World, pos: Position, target_pos: Position, moore: bool) -> Option<Position> {
    let (w, h) = (world.grid.width(), world.grid.height());
    world
        .grid
        .neighborhood_cells(pos, moore)
        .into_iter()
        .filter(|&cell| world.grid.is_empty(cell))
        .min_by_key(|&cell| torus_manhattan(cell, target_pos, w, h))
}

/// Uniformly random empty neighbor cell, `None` if all are occupied.
pub fn random_empty_neighbor(world: &mut World, pos: Position, moore: bool) -> Option<Position> {
    let empty: Vec<Position> = world
        .grid
        .neighborhood_cells(pos, moore)
        .into_iter()
        .filter(|&cell| world.grid.is_empty(cell))
        .collect();
    empty.choose(&mut world.rng).copied()
}
