//! Per-step behavior of each agent variant.

use rand::prelude::*;
use rcc_common::{AgentState, AgentType, Position};

use crate::agent::{AgentId, AgentKind, AttackSource, TumorCell};
use crate::movement::{random_empty_neighbor, seek_and_step_toward};
use crate::world::World;

/// Runs one step of agent `id`. Agents removed earlier in the same step are skipped.
pub fn step_agent(world: &mut World, id: AgentId) {
    let Some(agent) = world.agent(id) else {
        return;
    };
    let pos = agent.pos;
    match agent.agent_type() {
        AgentType::TumorCell => step_tumor_cell(world, id, pos),
        AgentType::TCell => step_t_cell(world, id, pos),
        AgentType::TReg => step_t_reg(world, id, pos),
        AgentType::Androgen => step_androgen(world, id, pos),
        AgentType::Ici => step_ici(world, id, pos),
    }
}

/// Seek `target`, falling back to a random empty neighbor. Returns the new position.
fn seek_or_wander(world: &mut World, id: AgentId, pos: Position, target: AgentType) -> Position {
    let radius = world.params.search_radius;
    let next = match seek_and_step_toward(world, pos, target, radius, true) {
        Some(next) => Some(next),
        None => random_empty_neighbor(world, pos, true),
    };
    match next {
        Some(next) => {
            world.move_agent(id, next);
            next
        }
        None => pos,
    }
}

/// Proliferation into a random empty neighbor cell. The parent never moves.
fn step_tumor_cell(world: &mut World, id: AgentId, pos: Position) {
    let active = matches!(
        world.agent(id).map(|a| &a.kind),
        Some(AgentKind::TumorCell(cell)) if cell.state == AgentState::Active
    );
    if !active {
        return;
    }

    let empty: Vec<Position> = world
        .grid
        .neighborhood_cells(pos, true)
        .into_iter()
        .filter(|&cell| world.grid.is_empty(cell))
        .collect();
    if empty.is_empty() {
        return;
    }
    if world.rng.random::<f64>() < world.params.p_tumor_cell_add {
        if let Some(&target) = empty.choose(&mut world.rng) {
            let child = world.spawn(AgentKind::TumorCell(TumorCell::new()), target);
            log::trace!("Tumor cell {} proliferated into {} at {:?}.", id, child, target);
        }
    }
}

/// Active T cells hunt and kill one tumor cell per step; exhausted ones are frozen.
fn step_t_cell(world: &mut World, id: AgentId, pos: Position) {
    let active = world.agent(id).and_then(|a| a.as_t_cell()).is_some_and(|c| c.is_active());
    if !active {
        return;
    }

    let pos = seek_or_wander(world, id, pos, AgentType::TumorCell);

    let tumors = world.neighbors_of_type(pos, 1, true, AgentType::TumorCell);
    if let Some(&target) = tumors.choose(&mut world.rng) {
        if world.kill_tumor_cell(target) {
            if let Some(cell) = world.t_cell_mut(id) {
                cell.record_tumor_kill();
            }
        }
    }
}

/// Regulatory T cells only move when a T cell is in range and not yet adjacent,
/// then suppress one neighbouring T cell at no cost to themselves.
fn step_t_reg(world: &mut World, id: AgentId, pos: Position) {
    let radius = world.params.search_radius;
    let pos = match seek_and_step_toward(world, pos, AgentType::TCell, radius, true) {
        Some(next) => {
            world.move_agent(id, next);
            next
        }
        None => pos,
    };

    let t_cells = world.neighbors_of_type(pos, 1, true, AgentType::TCell);
    if let Some(&target) = t_cells.choose(&mut world.rng) {
        if let Some(cell) = world.t_cell_mut(target) {
            cell.receive_attack(AttackSource::TReg);
        }
    }
}

/// Androgens drift to any neighbor cell and suppress every T cell around them.
/// Their own exhaustion is tracked but nothing in a step raises it.
fn step_androgen(world: &mut World, id: AgentId, pos: Position) {
    let cells = world.grid.neighborhood_cells(pos, true);
    let pos = match cells.choose(&mut world.rng) {
        Some(&next) => {
            world.move_agent(id, next);
            next
        }
        None => pos,
    };

    for target in world.neighbors_of_type(pos, 1, true, AgentType::TCell) {
        if let Some(cell) = world.t_cell_mut(target) {
            cell.receive_attack(AttackSource::Androgen);
        }
    }
}

/// ICI agents soften exhausted T cells around them, then follow T cells.
fn step_ici(world: &mut World, id: AgentId, pos: Position) {
    let relief = world.params.ici_relief;
    for target in world.neighbors_of_type(pos, 1, true, AgentType::TCell) {
        if let Some(cell) = world.t_cell_mut(target) {
            cell.relieve(relief);
        }
    }

    seek_or_wander(world, id, pos, AgentType::TCell);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::empty_world;

    #[test]
    fn t_cell_kills_one_adjacent_tumor_and_pays_exhaustion() {
        let mut world = empty_world(10, 10);
        let center = Position::new(4, 4);
        let t = world.spawn_t_cell(center);
        // boxed in: an adjacent target means no seek, and no empty cell means no wander
        for cell in world.grid.neighborhood_cells(center, true) {
            world.spawn(AgentKind::TumorCell(TumorCell::new()), cell);
        }

        step_agent(&mut world, t);

        assert_eq!(world.agent(t).unwrap().pos, center);
        assert_eq!(world.count(AgentType::TumorCell), 7);
        let cell = world.agent(t).unwrap().as_t_cell().unwrap();
        assert_eq!(cell.exhaustion, world.params.exhaustion.from_tumor);
        assert!(world.verify_invariants().is_ok());
    }

    #[test]
    fn t_cell_closes_in_on_distant_tumor() {
        let mut world = empty_world(10, 10);
        let t = world.spawn_t_cell(Position::new(1, 4));
        world.spawn(AgentKind::TumorCell(TumorCell::new()), Position::new(4, 4));

        step_agent(&mut world, t);

        assert_eq!(world.agent(t).unwrap().pos, Position::new(2, 4));
        assert_eq!(world.count(AgentType::TumorCell), 1);
    }

    #[test]
    fn exhausted_t_cell_is_frozen() {
        let mut world = empty_world(10, 10);
        let t = world.spawn_t_cell(Position::new(4, 4));
        let tumor = world.spawn(AgentKind::TumorCell(TumorCell::new()), Position::new(5, 4));
        {
            let cell = world.t_cell_mut(t).unwrap();
            cell.exhaustion = 1.0;
            cell.state = AgentState::Exhausted;
        }

        step_agent(&mut world, t);

        assert!(world.contains(tumor));
        assert_eq!(world.agent(t).unwrap().pos, Position::new(4, 4));
    }

    #[test]
    fn t_reg_suppresses_neighbouring_t_cell_without_moving_when_adjacent() {
        let mut world = empty_world(10, 10);
        let treg = world.spawn(AgentKind::TReg, Position::new(4, 4));
        let t = world.spawn_t_cell(Position::new(5, 4));

        step_agent(&mut world, treg);

        assert_eq!(world.agent(treg).unwrap().pos, Position::new(4, 4));
        let cell = world.agent(t).unwrap().as_t_cell().unwrap();
        assert_eq!(cell.exhaustion, world.params.exhaustion.from_treg);
    }

    #[test]
    fn lone_t_reg_does_not_wander() {
        let mut world = empty_world(10, 10);
        let treg = world.spawn(AgentKind::TReg, Position::new(4, 4));
        for _ in 0..10 {
            step_agent(&mut world, treg);
        }
        assert_eq!(world.agent(treg).unwrap().pos, Position::new(4, 4));
    }

    #[test]
    fn androgen_moves_and_hits_every_t_cell_in_reach() {
        let mut world = empty_world(3, 3);
        let androgen = world.spawn(AgentKind::Androgen(crate::agent::Androgen::new()), Position::new(1, 1));
        // on a 3x3 torus every cell is in the Moore neighborhood of every other
        let a = world.spawn_t_cell(Position::new(0, 0));
        let b = world.spawn_t_cell(Position::new(2, 2));
        let c = world.spawn_t_cell(Position::new(2, 2));

        step_agent(&mut world, androgen);

        assert_ne!(world.agent(androgen).unwrap().pos, Position::new(1, 1));
        let hit = world.params.exhaustion.from_androgen;
        for id in [a, b, c] {
            assert_eq!(world.agent(id).unwrap().as_t_cell().unwrap().exhaustion, hit);
        }
        assert_eq!(world.agent(androgen).unwrap().exhaustion(), Some(0.0));
        assert_eq!(world.agent(androgen).unwrap().state(), AgentState::Active);
    }

    #[test]
    fn ici_relieves_only_exhausted_t_cells() {
        let mut world = empty_world(10, 10);
        let ici = world.spawn(AgentKind::Ici, Position::new(4, 4));
        let tired = world.spawn_t_cell(Position::new(4, 5));
        let fresh = world.spawn_t_cell(Position::new(3, 4));
        {
            let cell = world.t_cell_mut(tired).unwrap();
            cell.exhaustion = 1.0;
            cell.state = AgentState::Exhausted;
        }
        world.t_cell_mut(fresh).unwrap().exhaustion = 0.5;

        step_agent(&mut world, ici);

        let tired = world.agent(tired).unwrap().as_t_cell().unwrap();
        assert!((tired.exhaustion - 0.9).abs() < 1e-12);
        assert_eq!(tired.state, AgentState::Exhausted);
        assert_eq!(world.agent(fresh).unwrap().as_t_cell().unwrap().exhaustion, 0.5);
    }

    #[test]
    fn ici_closes_in_on_distant_t_cell() {
        let mut world = empty_world(10, 10);
        let ici = world.spawn(AgentKind::Ici, Position::new(1, 4));
        world.spawn_t_cell(Position::new(4, 4));

        step_agent(&mut world, ici);

        assert_eq!(world.agent(ici).unwrap().pos, Position::new(2, 4));
    }

    #[test]
    fn ici_wanders_to_an_empty_neighbor_without_t_cells_in_range() {
        let mut world = empty_world(10, 10);
        let start = Position::new(4, 4);
        let ici = world.spawn(AgentKind::Ici, start);
        // tumor cells only block cells; ICI does not seek them
        let blocked = [Position::new(5, 4), Position::new(3, 3), Position::new(4, 5)];
        for cell in blocked {
            world.spawn(AgentKind::TumorCell(TumorCell::new()), cell);
        }

        for _ in 0..20 {
            let before = world.agent(ici).unwrap().pos;
            step_agent(&mut world, ici);
            let after = world.agent(ici).unwrap().pos;
            assert_ne!(after, before);
            assert!(world.grid.neighborhood_cells(before, true).contains(&after));
            assert!(!blocked.contains(&after));
            assert_eq!(world.grid.agents_at(after), &[ici]);
        }
    }

    #[test]
    fn tumor_cell_never_proliferates_into_occupied_cells() {
        let mut world = empty_world(3, 3);
        world.params.p_tumor_cell_add = 1.0;
        let tumor = world.spawn(AgentKind::TumorCell(TumorCell::new()), Position::new(1, 1));

        step_agent(&mut world, tumor);
        assert_eq!(world.count(AgentType::TumorCell), 2);
        assert_eq!(world.agent(tumor).unwrap().pos, Position::new(1, 1));

        for _ in 0..20 {
            for id in world.agent_ids() {
                step_agent(&mut world, id);
            }
        }
        // one tumor cell per cell at most once the lattice is full
        assert_eq!(world.count(AgentType::TumorCell), 9);
        assert!(world.verify_invariants().is_ok());
    }

    #[test]
    fn removed_agents_are_skipped() {
        let mut world = empty_world(10, 10);
        let t = world.spawn_t_cell(Position::new(4, 4));
        world.remove_agent(t);
        step_agent(&mut world, t);
        assert_eq!(world.num_agents(), 0);
    }
}
