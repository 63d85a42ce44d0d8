use rcc_common::{wrap, Position};

use crate::agent::AgentId;

/// Toroidal multi-occupancy lattice. Each cell keeps the ids of the agents
/// standing on it, in insertion order.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Vec<AgentId>>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        let num_cells = width as usize * height as usize;
        Self {
            width,
            height,
            cells: vec![Vec::new(); num_cells],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Normalizes any coordinate pair onto the torus.
    #[inline(always)]
    pub fn wrap(&self, x: i64, y: i64) -> Position {
        wrap(x, y, self.width, self.height)
    }

    // Calculates the 1D cell index for a (normalized) position
    #[inline(always)]
    fn cell_idx(&self, pos: Position) -> usize {
        let pos = self.wrap(pos.x as i64, pos.y as i64);
        pos.y as usize * self.width as usize + pos.x as usize
    }

    pub fn place(&mut self, id: AgentId, pos: Position) {
        let idx = self.cell_idx(pos);
        self.cells[idx].push(id);
    }

    /// Removes `id` from the cell at `pos`. Returns false if it was not there.
    pub fn remove(&mut self, id: AgentId, pos: Position) -> bool {
        let idx = self.cell_idx(pos);
        let cell = &mut self.cells[idx];
        match cell.iter().position(|&other| other == id) {
            Some(slot) => {
                cell.remove(slot); // keep insertion order of the remaining agents
                true
            }
            None => false,
        }
    }

    pub fn move_agent(&mut self, id: AgentId, from: Position, to: Position) {
        if self.remove(id, from) {
            self.place(id, to);
        } else {
            log::warn!("Agent {} not found at {:?} while moving; placing at {:?}.", id, from, to);
            self.place(id, to);
        }
    }

    pub fn agents_at(&self, pos: Position) -> &[AgentId] {
        &self.cells[self.cell_idx(pos)]
    }

    pub fn is_empty(&self, pos: Position) -> bool {
        self.agents_at(pos).is_empty()
    }

    /// Cells within `radius` of `pos` (Chebyshev for Moore, Manhattan for Von Neumann).
    /// On small grids several offsets wrap onto the same cell; each cell is listed once,
    /// and the center is only listed when `include_center` is set.
    pub fn neighborhood(&self, pos: Position, radius: u32, moore: bool, include_center: bool) -> Vec<Position> {
        let r = radius as i64;
        let mut cells = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for dx in -r..=r {
            for dy in -r..=r {
                if !moore && dx.abs() + dy.abs() > r {
                    continue;
                }
                let cell = self.wrap(pos.x as i64 + dx, pos.y as i64 + dy);
                if cell == pos {
                    continue;
                }
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
        }
        if include_center {
            cells.push(pos);
        }
        cells
    }

    /// Radius-1 neighborhood without the center: candidate cells for a single step.
    pub fn neighborhood_cells(&self, pos: Position, moore: bool) -> Vec<Position> {
        self.neighborhood(pos, 1, moore, false)
    }

    /// Ids of all agents standing in the neighborhood of `pos`.
    pub fn neighbors(&self, pos: Position, radius: u32, moore: bool, include_center: bool) -> Vec<AgentId> {
        self.neighborhood(pos, radius, moore, include_center)
            .into_iter()
            .flat_map(|cell| self.agents_at(cell).iter().copied())
            .collect()
    }

    /// Total number of (agent, cell) entries stored.
    pub fn occupancy(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }
}
