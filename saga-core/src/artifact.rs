//! Typed artifacts collected by the wizard.
//!
//! Backend payloads are loosely structured, so every record keeps the
//! fields it knows about as typed values and carries anything else in an
//! `extra` map. All known fields are optional or defaulted; deserialization
//! only fails when a known field has the wrong JSON type.

use saga_api::{ArtifactKind, Phase};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::unwrap_character_state;
use crate::phase::CharacterStep;

/// A phase or subphase result as emitted by the backend.
///
/// Held as the single pending artifact while it awaits confirmation, and
/// attached to transcript messages as a read-only reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub data: Value,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, data: Value) -> Self {
        Self { kind, data }
    }
}

/// The confirmed world document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingData {
    #[serde(default)]
    pub world_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of the concept subphase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterConcept {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<String>,
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Trait ids or names the backend recommends.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_traits: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of the trait-selection subphase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitSelectionRecord {
    #[serde(default, alias = "traits")]
    pub selected_traits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of the wildcard subphase: a user-authored freeform trait.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WildcardRecord {
    #[serde(default, alias = "wildcard_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        alias = "wildcard_description",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The character phase's subphase results before finalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterInProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<CharacterConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trait_selection: Option<TraitSelectionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard: Option<WildcardRecord>,
}

impl CharacterInProgress {
    pub fn is_empty(&self) -> bool {
        self.concept.is_none() && self.trait_selection.is_none() && self.wildcard.is_none()
    }

    /// The subphase implied by which results are present.
    pub fn step(&self) -> CharacterStep {
        if self.concept.is_none() {
            CharacterStep::Concept
        } else if self.trait_selection.is_none() {
            CharacterStep::Traits
        } else if self.wildcard.is_none() {
            CharacterStep::Wildcard
        } else {
            CharacterStep::Complete
        }
    }

    /// Merge a canonical subphase record into the matching slot.
    ///
    /// Returns `Ok(false)` for artifact kinds that are not character subphases.
    pub fn merge(&mut self, kind: &ArtifactKind, record: Value) -> Result<bool, serde_json::Error> {
        match kind {
            ArtifactKind::CharacterConcept => {
                self.concept = Some(serde_json::from_value(record)?);
            }
            ArtifactKind::TraitSelection => {
                self.trait_selection = Some(serde_json::from_value(record)?);
            }
            ArtifactKind::Wildcard => {
                self.wildcard = Some(serde_json::from_value(record)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// The finalized flat character sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterComplete {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archetype: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The confirmed starting scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default, alias = "scenario_title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        alias = "opening_situation",
        skip_serializing_if = "Option::is_none"
    )]
    pub situation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Confirmed artifacts accumulated across phases.
///
/// Sent as the `context_data` of every chat turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WizardData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<SettingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<CharacterComplete>,
    #[serde(default, skip_serializing_if = "CharacterInProgress::is_empty")]
    pub character_state: CharacterInProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<SeedData>,
}

impl WizardData {
    /// Whether the artifact for `phase` has been committed.
    pub fn has_phase(&self, phase: Phase) -> bool {
        match phase {
            Phase::Setting => self.setting.is_some(),
            Phase::Character => self.character.is_some(),
            Phase::Seed => self.seed.is_some(),
        }
    }

    /// Commit a confirmed phase artifact.
    ///
    /// Nothing is changed when the payload does not fit the phase's record.
    pub fn commit(&mut self, phase: Phase, data: &Value) -> Result<(), serde_json::Error> {
        match phase {
            Phase::Setting => {
                self.setting = Some(serde_json::from_value(data.clone())?);
            }
            Phase::Character => {
                let sheet = unwrap_character_state(data).clone();
                self.character = Some(serde_json::from_value(sheet)?);
            }
            Phase::Seed => {
                self.seed = Some(serde_json::from_value(data.clone())?);
            }
        }
        Ok(())
    }

    /// The committed artifact for `phase`, rebuilt in wire form.
    pub fn artifact_for(&self, phase: Phase) -> Option<Artifact> {
        let data = match phase {
            Phase::Setting => serde_json::to_value(self.setting.as_ref()?),
            Phase::Character => serde_json::to_value(self.character.as_ref()?),
            Phase::Seed => serde_json::to_value(self.seed.as_ref()?),
        }
        .ok()?;
        Some(Artifact::new(phase.expected_artifact(), data))
    }

    /// Build from a resume payload, tolerating missing or odd fields.
    pub fn from_resume(value: Option<Value>) -> Self {
        match value {
            Some(value) if value.is_object() => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding unreadable wizard data from resume");
                Self::default()
            }),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setting_keeps_unknown_fields() {
        let mut data = WizardData::default();
        data.commit(
            Phase::Setting,
            &json!({"world_name": "Veridia", "magic_system": "tidal"}),
        )
        .unwrap();

        let setting = data.setting.as_ref().unwrap();
        assert_eq!(setting.world_name, "Veridia");
        assert_eq!(setting.extra["magic_system"], "tidal");
        assert!(data.has_phase(Phase::Setting));
        assert!(!data.has_phase(Phase::Character));
    }

    #[test]
    fn test_commit_rejects_wrong_shape_without_change() {
        let mut data = WizardData::default();
        assert!(data.commit(Phase::Seed, &json!("just a string")).is_err());
        assert!(data.seed.is_none());
    }

    #[test]
    fn test_character_commit_unwraps_wrapper() {
        let mut data = WizardData::default();
        data.commit(
            Phase::Character,
            &json!({"character_state": {"name": "Ila", "archetype": "Smuggler", "summary": "Knows every tide."}}),
        )
        .unwrap();
        assert_eq!(data.character.unwrap().name, "Ila");
    }

    #[test]
    fn test_in_progress_steps() {
        let mut state = CharacterInProgress::default();
        assert_eq!(state.step(), CharacterStep::Concept);

        state
            .merge(&ArtifactKind::CharacterConcept, json!({"name": "Ila"}))
            .unwrap();
        assert_eq!(state.step(), CharacterStep::Traits);

        state
            .merge(
                &ArtifactKind::TraitSelection,
                json!({"traits": ["allies", "patron", "enemies"]}),
            )
            .unwrap();
        assert_eq!(state.step(), CharacterStep::Wildcard);
        assert_eq!(
            state.trait_selection.as_ref().unwrap().selected_traits.len(),
            3
        );

        state
            .merge(&ArtifactKind::Wildcard, json!({"wildcard_name": "Tide-touched"}))
            .unwrap();
        assert_eq!(state.step(), CharacterStep::Complete);
        assert_eq!(
            state.wildcard.as_ref().unwrap().name.as_deref(),
            Some("Tide-touched")
        );
    }

    #[test]
    fn test_merge_ignores_phase_artifacts() {
        let mut state = CharacterInProgress::default();
        let merged = state
            .merge(&ArtifactKind::WorldDocument, json!({}))
            .unwrap();
        assert!(!merged);
        assert!(state.is_empty());
    }

    #[test]
    fn test_context_serialization_skips_empty_parts() {
        let data = WizardData::default();
        assert_eq!(serde_json::to_value(&data).unwrap(), json!({}));
    }

    #[test]
    fn test_artifact_for_round_trips_seed() {
        let mut data = WizardData::default();
        data.commit(Phase::Seed, &json!({"scenario_title": "The Flood"}))
            .unwrap();

        let artifact = data.artifact_for(Phase::Seed).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::StartingScenario);
        assert_eq!(artifact.data["title"], "The Flood");
        assert!(data.artifact_for(Phase::Setting).is_none());
    }

    #[test]
    fn test_from_resume_tolerates_garbage() {
        assert_eq!(WizardData::from_resume(None), WizardData::default());
        assert_eq!(
            WizardData::from_resume(Some(json!({"setting": 5}))),
            WizardData::default()
        );
        let data = WizardData::from_resume(Some(json!({"setting": {"world_name": "Ashfall"}})));
        assert_eq!(data.setting.unwrap().world_name, "Ashfall");
    }
}
