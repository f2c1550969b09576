//! Wizard stages derived from phase and collected data.

use std::fmt;

pub use saga_api::Phase;

/// Character-creation subphase.
///
/// Never stored; always derived from which parts of the in-progress
/// character have been filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterStep {
    Concept,
    Traits,
    Wildcard,
    Complete,
}

impl CharacterStep {
    pub fn title(&self) -> &'static str {
        match self {
            CharacterStep::Concept => "Concept",
            CharacterStep::Traits => "Traits",
            CharacterStep::Wildcard => "Wildcard",
            CharacterStep::Complete => "Complete",
        }
    }
}

/// Where the wizard currently is, including character subphases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Setting,
    Character(CharacterStep),
    Seed,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Setting => f.write_str("setting"),
            Stage::Character(step) => write!(f, "character.{}", step.title().to_lowercase()),
            Stage::Seed => f.write_str("seed"),
            Stage::Done => f.write_str("done"),
        }
    }
}

/// Progress display state of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseStatus {
    /// Later than the current phase with nothing collected yet.
    Locked,
    Active,
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Setting.to_string(), "setting");
        assert_eq!(
            Stage::Character(CharacterStep::Traits).to_string(),
            "character.traits"
        );
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
