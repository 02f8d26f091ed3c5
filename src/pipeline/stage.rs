use serde::Serialize;

/// Where a conversion run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Idle,
    Parsing,
    Normalizing,
    Filtering,
    Aggregating,
    Summarizing,
    Validating,
    Done,
    Failed,
}

/// Working stages, in execution order.
pub const WORKING_STAGES: [Stage; 6] = [
    Stage::Parsing,
    Stage::Normalizing,
    Stage::Filtering,
    Stage::Aggregating,
    Stage::Summarizing,
    Stage::Validating,
];

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "Idle",
            Stage::Parsing => "Parsing",
            Stage::Normalizing => "Normalizing",
            Stage::Filtering => "Filtering",
            Stage::Aggregating => "Aggregating",
            Stage::Summarizing => "Summarizing",
            Stage::Validating => "Validating",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Some(Stage::Idle),
            "parsing" => Some(Stage::Parsing),
            "normalizing" => Some(Stage::Normalizing),
            "filtering" => Some(Stage::Filtering),
            "aggregating" => Some(Stage::Aggregating),
            "summarizing" => Some(Stage::Summarizing),
            "validating" => Some(Stage::Validating),
            "done" => Some(Stage::Done),
            "failed" => Some(Stage::Failed),
            _ => None,
        }
    }

    /// 1-based step number for working stages.
    pub fn step(&self) -> Option<usize> {
        WORKING_STAGES
            .iter()
            .position(|s| s == self)
            .map(|i| i + 1)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Legal successor: the next working stage, `Done` after validation,
    /// or `Failed` from any non-terminal stage.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Stage::Failed {
            return true;
        }
        match (self.step(), next.step()) {
            (None, Some(1)) => *self == Stage::Idle,
            (Some(a), Some(b)) => b == a + 1,
            (Some(6), None) => next == Stage::Done,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for stage in WORKING_STAGES
            .iter()
            .chain([Stage::Idle, Stage::Done, Stage::Failed].iter())
        {
            assert_eq!(Stage::from_str(stage.as_str()), Some(*stage));
        }
        assert_eq!(Stage::from_str(" PARSING "), Some(Stage::Parsing));
        assert_eq!(Stage::from_str("sleeping"), None);
    }

    #[test]
    fn steps_are_one_through_six() {
        assert_eq!(Stage::Parsing.step(), Some(1));
        assert_eq!(Stage::Validating.step(), Some(6));
        assert_eq!(Stage::Idle.step(), None);
        assert_eq!(Stage::Done.step(), None);
    }

    #[test]
    fn transitions_are_strictly_sequential() {
        assert!(Stage::Idle.can_advance_to(Stage::Parsing));
        assert!(Stage::Parsing.can_advance_to(Stage::Normalizing));
        assert!(!Stage::Parsing.can_advance_to(Stage::Filtering));
        assert!(Stage::Validating.can_advance_to(Stage::Done));
        assert!(!Stage::Summarizing.can_advance_to(Stage::Done));
        assert!(Stage::Aggregating.can_advance_to(Stage::Failed));
        assert!(Stage::Idle.can_advance_to(Stage::Failed));
        assert!(!Stage::Done.can_advance_to(Stage::Failed));
        assert!(!Stage::Failed.can_advance_to(Stage::Parsing));
    }
}
