//! Worker lifecycle shared by processor and sender

/// `Running → DrainingFinal → Stopped`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Phase {
    #[default]
    Running,
    /// Stop condition observed; taking the last drain
    DrainingFinal,
    Stopped,
}

impl Phase {
    /// Move forward to `next`. Backward moves are ignored.
    pub fn advance(&mut self, next: Phase) {
        if next > *self {
            log::debug!("{self} -> {next}");
            *self = next;
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::DrainingFinal => write!(f, "DRAINING_FINAL"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}
