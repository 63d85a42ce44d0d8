use std::collections::BTreeMap;

use anyhow::Result;
use rand::prelude::*;
use rcc_common::{AgentState, AgentType, Position, SimParams};

use crate::agent::{Agent, AgentId, AgentKind, TCell};
use crate::grid::Grid;

/// Everything one simulation run mutates: the lattice, the live agent registry
/// and the single random stream. Passed explicitly to every behavior; nothing
/// here is global, so independent worlds never interfere.
#[derive(Debug)]
pub struct World {
    pub params: SimParams,
    pub grid: Grid,
    /// Shared stream for every draw of the run.
    pub rng: StdRng,
    // BTreeMap keeps iteration in id order, which keeps draws reproducible.
    agents: BTreeMap<AgentId, Agent>,
    next_id: AgentId,
}

impl World {
    pub fn new(params: SimParams, rng: StdRng) -> Self {
        let grid = Grid::new(params.width, params.height);
        Self {
            params,
            grid,
            rng,
            agents: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Registers a new agent and places it on the grid.
    pub fn spawn(&mut self, kind: AgentKind, pos: Position) -> AgentId {
        let pos = self.grid.wrap(pos.x as i64, pos.y as i64);
        let id = self.next_id;
        self.next_id += 1;
        self.grid.place(id, pos);
        self.agents.insert(id, Agent { id, pos, kind });
        id
    }

    pub fn spawn_t_cell(&mut self, pos: Position) -> AgentId {
        let rates = self.params.exhaustion;
        self.spawn(AgentKind::TCell(TCell::new(rates)), pos)
    }

    /// Deregisters an agent from both the registry and the grid.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.remove(&id)?;
        if !self.grid.remove(id, agent.pos) {
            log::error!("Agent {} was registered at {:?} but missing from the grid.", id, agent.pos);
        }
        Some(agent)
    }

    pub fn move_agent(&mut self, id: AgentId, to: Position) {
        let to = self.grid.wrap(to.x as i64, to.y as i64);
        if let Some(agent) = self.agents.get_mut(&id) {
            self.grid.move_agent(id, agent.pos, to);
            agent.pos = to;
        }
    }

    /// Kills a tumor cell: marks it dead and removes it immediately, so no later
    /// query of this step can see it. Returns false if `id` is not a live tumor cell.
    pub fn kill_tumor_cell(&mut self, id: AgentId) -> bool {
        let Some(agent) = self.agents.get_mut(&id) else {
            return false;
        };
        let AgentKind::TumorCell(cell) = &mut agent.kind else {
            return false;
        };
        cell.receive_attack();
        self.remove_agent(id);
        log::trace!("Tumor cell {} killed.", id);
        true
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn t_cell_mut(&mut self, id: AgentId) -> Option<&mut TCell> {
        self.agents.get_mut(&id).and_then(Agent::as_t_cell_mut)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Live agents in id order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn agents_of_type(&self, agent_type: AgentType) -> impl Iterator<Item = &Agent> {
        self.agents.values().filter(move |a| a.agent_type() == agent_type)
    }

    pub fn count(&self, agent_type: AgentType) -> usize {
        self.agents_of_type(agent_type).count()
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn active_t_cells(&self) -> usize {
        self.agents
            .values()
            .filter_map(Agent::as_t_cell)
            .filter(|cell| cell.is_active())
            .count()
    }

    /// Mean exhaustion over all T cells, 0 when there are none.
    pub fn mean_t_cell_exhaustion(&self) -> f64 {
        let (sum, n) = self
            .agents
            .values()
            .filter_map(Agent::as_t_cell)
            .fold((0.0, 0usize), |(sum, n), cell| (sum + cell.exhaustion, n + 1));
        if n > 0 { sum / n as f64 } else { 0.0 }
    }

    /// Tumor cells per grid cell; proxy for tumor vascularisation.
    pub fn blood_vessel_density(&self) -> f64 {
        self.count(AgentType::TumorCell) as f64 / self.grid.num_cells() as f64
    }

    pub fn tumor_coverage_percent(&self) -> f64 {
        self.blood_vessel_density() * 100.0
    }

    /// Ids of agents of `agent_type` within `radius` of `pos`, in grid order.
    pub fn neighbors_of_type(
        &self,
        pos: Position,
        radius: u32,
        include_center: bool,
        agent_type: AgentType,
    ) -> Vec<AgentId> {
        self.grid
            .neighbors(pos, radius, true, include_center)
            .into_iter()
            .filter(|id| self.agents.get(id).is_some_and(|a| a.agent_type() == agent_type))
            .collect()
    }

    pub fn random_position(&mut self) -> Position {
        let x = self.rng.random_range(0..self.params.width);
        let y = self.rng.random_range(0..self.params.height);
        Position::new(x, y)
    }

    /// Checks the structural invariants of the world. A failure means the engine
    /// itself is broken; callers treat it as fatal.
    pub fn verify_invariants(&self) -> Result<()> {
        if self.grid.occupancy() != self.agents.len() {
            anyhow::bail!(
                "Grid holds {} entries but {} agents are registered.",
                self.grid.occupancy(),
                self.agents.len()
            );
        }
        for agent in self.agents.values() {
            if agent.pos.x >= self.params.width || agent.pos.y >= self.params.height {
                anyhow::bail!("Agent {} at {:?} lies outside the grid.", agent.id, agent.pos);
            }
            let here = self.grid.agents_at(agent.pos).iter().filter(|&&id| id == agent.id).count();
            if here != 1 {
                anyhow::bail!("Agent {} indexed {} times at {:?}.", agent.id, here, agent.pos);
            }
            match &agent.kind {
                AgentKind::TumorCell(cell) if cell.state == AgentState::Dead => {
                    anyhow::bail!("Dead tumor cell {} is still registered.", agent.id);
                }
                AgentKind::TCell(cell) => {
                    if !(0.0..=1.0).contains(&cell.exhaustion) {
                        anyhow::bail!("T cell {} has exhaustion {} outside [0, 1].", agent.id, cell.exhaustion);
                    }
                    if cell.exhaustion >= 1.0 && cell.is_active() {
                        anyhow::bail!("T cell {} is fully exhausted but still active.", agent.id);
                    }
                }
                AgentKind::Androgen(androgen) if !(0.0..=1.0).contains(&androgen.exhaustion) => {
                    anyhow::bail!("Androgen {} has exhaustion {} outside [0, 1].", agent.id, androgen.exhaustion);
                }
                _ => {}
            }
        }
        Ok(())
    }
}
