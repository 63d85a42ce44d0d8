use rcc_common::{AgentRecord, AgentState, AgentType, ExhaustionRates, Position};

/// Stable identity of an agent for the whole run. Never reused.
pub type AgentId = u64;

/// Who is suppressing a T cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackSource {
    TReg,
    Androgen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TumorCell {
    pub state: AgentState,
}

impl TumorCell {
    pub fn new() -> Self {
        Self { state: AgentState::Active }
    }

    /// Marks the cell dead. The world deregisters it in the same call
    /// (see `World::kill_tumor_cell`).
    pub fn receive_attack(&mut self) {
        self.state = AgentState::Dead;
    }
}

impl Default for TumorCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Cytotoxic T cell. `exhaustion` is kept in [0, 1]; reaching 1.0 freezes the cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TCell {
    pub state: AgentState,
    pub exhaustion: f64,
    pub rates: ExhaustionRates,
}

impl TCell {
    pub fn new(rates: ExhaustionRates) -> Self {
        Self {
            state: AgentState::Active,
            exhaustion: 0.0,
            rates,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == AgentState::Active
    }

    fn add_exhaustion(&mut self, amount: f64) {
        self.exhaustion = (self.exhaustion + amount).clamp(0.0, 1.0);
        self.state = if self.exhaustion >= 1.0 {
            AgentState::Exhausted
        } else {
            AgentState::Active
        };
    }

    /// Cost of a successful attack on a tumor cell.
    pub fn record_tumor_kill(&mut self) {
        self.add_exhaustion(self.rates.from_tumor);
    }

    /// Suppression by a regulatory T cell or an androgen. Applies in any state.
    pub fn receive_attack(&mut self, source: AttackSource) {
        let amount = match source {
            AttackSource::TReg => self.rates.from_treg,
            AttackSource::Androgen => self.rates.from_androgen,
        };
        self.add_exhaustion(amount);
    }

    /// Checkpoint-inhibitor reactivation: lowers exhaustion by the configured
    /// amount and returns the cell to active whenever it ends below 1.0.
    pub fn activate_by_ici(&mut self) {
        self.exhaustion = (self.exhaustion - self.rates.ici_activation).max(0.0);
        if self.exhaustion < 1.0 {
            self.state = AgentState::Active;
        }
    }

    /// Direct relief from a neighbouring ICI agent. Only exhausted cells are
    /// affected, and the state is left untouched: the cell stays frozen until
    /// something re-evaluates it.
    pub fn relieve(&mut self, amount: f64) {
        if self.state == AgentState::Exhausted {
            self.exhaustion = (self.exhaustion - amount).max(0.0);
        }
    }
}

/// Placeholder exhaustion increment of an androgen.
pub const ANDROGEN_EXHAUSTION_STEP: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct Androgen {
    pub state: AgentState,
    pub exhaustion: f64,
}

impl Androgen {
    pub fn new() -> Self {
        Self {
            state: AgentState::Active,
            exhaustion: 0.0,
        }
    }

    // Tracked only; an exhausted androgen behaves exactly like an active one.
    pub fn increase_exhaustion(&mut self) {
        self.exhaustion = (self.exhaustion + ANDROGEN_EXHAUSTION_STEP).min(1.0);
        if self.exhaustion >= 1.0 {
            self.state = AgentState::Exhausted;
        }
    }
}

impl Default for Androgen {
    fn default() -> Self {
        Self::new()
    }
}

/// Variant data of an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentKind {
    TumorCell(TumorCell),
    TCell(TCell),
    TReg,
    Androgen(Androgen),
    Ici,
}

impl AgentKind {
    pub fn agent_type(&self) -> AgentType {
        match self {
            AgentKind::TumorCell(_) => AgentType::TumorCell,
            AgentKind::TCell(_) => AgentType::TCell,
            AgentKind::TReg => AgentType::TReg,
            AgentKind::Androgen(_) => AgentType::Androgen,
            AgentKind::Ici => AgentType::Ici,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub pos: Position,
    pub kind: AgentKind,
}

impl Agent {
    pub fn agent_type(&self) -> AgentType {
        self.kind.agent_type()
    }

    pub fn state(&self) -> AgentState {
        match &self.kind {
            AgentKind::TumorCell(cell) => cell.state,
            AgentKind::TCell(cell) => cell.state,
            AgentKind::Androgen(androgen) => androgen.state,
            AgentKind::TReg | AgentKind::Ici => AgentState::Active,
        }
    }

    pub fn exhaustion(&self) -> Option<f64> {
        match &self.kind {
            AgentKind::TCell(cell) => Some(cell.exhaustion),
            AgentKind::Androgen(androgen) => Some(androgen.exhaustion),
            _ => None,
        }
    }

    pub fn as_t_cell(&self) -> Option<&TCell> {
        match &self.kind {
            AgentKind::TCell(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn as_t_cell_mut(&mut self) -> Option<&mut TCell> {
        match &mut self.kind {
            AgentKind::TCell(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn record(&self) -> AgentRecord {
        AgentRecord {
            id: self.id,
            agent_type: self.agent_type(),
            state: self.state(),
            exhaustion: self.exhaustion(),
            x: self.pos.x,
            y: self.pos.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> ExhaustionRates {
        ExhaustionRates {
            from_tumor: 0.1,
            from_treg: 0.2,
            from_androgen: 0.4,
            ici_activation: 0.2,
        }
    }

    #[test]
    fn attacks_accumulate_and_clamp() {
        let mut cell = TCell::new(rates());
        cell.receive_attack(AttackSource::Androgen);
        cell.receive_attack(AttackSource::TReg);
        assert!((cell.exhaustion - 0.6).abs() < 1e-12);
        assert!(cell.is_active());

        cell.receive_attack(AttackSource::Androgen);
        cell.receive_attack(AttackSource::Androgen);
        assert_eq!(cell.exhaustion, 1.0);
        assert_eq!(cell.state, AgentState::Exhausted);
    }

    #[test]
    fn tumor_kills_exhaust_after_enough_contacts() {
        let mut cell = TCell::new(ExhaustionRates { from_tumor: 0.25, ..rates() });
        for _ in 0..3 {
            cell.record_tumor_kill();
            assert!(cell.is_active());
        }
        cell.record_tumor_kill();
        assert_eq!(cell.state, AgentState::Exhausted);
        cell.record_tumor_kill();
        assert_eq!(cell.exhaustion, 1.0);
    }

    #[test]
    fn activation_by_ici_reactivates() {
        let mut cell = TCell::new(rates());
        cell.exhaustion = 1.0;
        cell.state = AgentState::Exhausted;
        cell.activate_by_ici();
        assert!((cell.exhaustion - 0.8).abs() < 1e-12);
        assert_eq!(cell.state, AgentState::Active);

        cell.exhaustion = 0.1;
        cell.activate_by_ici();
        assert_eq!(cell.exhaustion, 0.0);
    }

    #[test]
    fn relief_softens_without_reactivating() {
        let mut cell = TCell::new(rates());
        cell.exhaustion = 1.0;
        cell.state = AgentState::Exhausted;
        cell.relieve(0.1);
        assert!((cell.exhaustion - 0.9).abs() < 1e-12);
        assert_eq!(cell.state, AgentState::Exhausted);

        // a later attack re-evaluates the state
        cell.relieve(0.1);
        cell.relieve(0.1);
        cell.receive_attack(AttackSource::TReg);
        assert!(cell.exhaustion < 1.0);
        assert_eq!(cell.state, AgentState::Active);
    }

    #[test]
    fn relief_ignores_active_cells() {
        let mut cell = TCell::new(rates());
        cell.receive_attack(AttackSource::TReg);
        cell.relieve(0.1);
        assert!((cell.exhaustion - 0.2).abs() < 1e-12);
    }

    #[test]
    fn androgen_exhaustion_saturates() {
        let mut androgen = Androgen::new();
        for _ in 0..12 {
            androgen.increase_exhaustion();
        }
        assert_eq!(androgen.exhaustion, 1.0);
        assert_eq!(androgen.state, AgentState::Exhausted);
    }

    #[test]
    fn records_expose_exhaustion_for_t_cells_only_among_immune_cells() {
        let agent = Agent {
            id: 7,
            pos: Position::new(1, 2),
            kind: AgentKind::TCell(TCell::new(rates())),
        };
        let record = agent.record();
        assert_eq!(record.agent_type, AgentType::TCell);
        assert_eq!(record.exhaustion, Some(0.0));

        let treg = Agent { id: 8, pos: Position::new(0, 0), kind: AgentKind::TReg };
        assert_eq!(treg.record().exhaustion, None);
        assert_eq!(treg.state(), AgentState::Active);
    }
}
