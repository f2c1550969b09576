//! Normalization of character payloads.
//!
//! The backend emits character data either wrapped as
//! `{"character_state": {...}}` or as the inner object directly. Everything
//! here accepts both and produces the same result.

use saga_api::ArtifactKind;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::artifact::{
    CharacterComplete, CharacterConcept, TraitSelectionRecord, WildcardRecord, WizardData,
};

const WRAPPER_KEY: &str = "character_state";

/// A character as the display layer sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum CharacterView {
    InProgress {
        concept: Option<CharacterConcept>,
        traits: Option<TraitSelectionRecord>,
        wildcard: Option<WildcardRecord>,
    },
    Complete(CharacterComplete),
}

impl CharacterView {
    pub fn is_complete(&self) -> bool {
        matches!(self, CharacterView::Complete(_))
    }

    /// The character's name, if one is known yet.
    pub fn name(&self) -> Option<&str> {
        match self {
            CharacterView::Complete(sheet) if !sheet.name.is_empty() => Some(&sheet.name),
            CharacterView::Complete(_) => None,
            CharacterView::InProgress { concept, .. } => {
                concept.as_ref().and_then(|c| c.name.as_deref())
            }
        }
    }
}

/// Strip the `character_state` wrapper if present.
pub fn unwrap_character_state(raw: &Value) -> &Value {
    match raw.get(WRAPPER_KEY) {
        Some(inner) if inner.is_object() => inner,
        _ => raw,
    }
}

/// Extract the canonical record for a character subphase artifact.
///
/// Looks for `character_state.<field>` first and falls back to the raw
/// payload. Non-subphase kinds are returned unchanged.
pub fn extract_subphase_record(kind: &ArtifactKind, raw: &Value) -> Value {
    let field = match kind {
        ArtifactKind::CharacterConcept => "concept",
        ArtifactKind::TraitSelection => "trait_selection",
        ArtifactKind::Wildcard => "wildcard",
        _ => return raw.clone(),
    };

    raw.get(WRAPPER_KEY)
        .and_then(|state| state.get(field))
        .filter(|record| record.is_object())
        .cloned()
        .unwrap_or_else(|| raw.clone())
}

/// Normalize a raw character payload.
///
/// A non-empty `summary` marks the character as complete.
pub fn normalize_character(raw: &Value) -> CharacterView {
    let inner = unwrap_character_state(raw);

    let has_summary = inner
        .get("summary")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());

    if has_summary {
        let sheet = serde_json::from_value(inner.clone()).unwrap_or_else(|_| salvage_sheet(inner));
        return CharacterView::Complete(sheet);
    }

    CharacterView::InProgress {
        concept: lenient(inner.get("concept")),
        traits: lenient(inner.get("trait_selection")),
        wildcard: lenient(inner.get("wildcard")),
    }
}

impl WizardData {
    /// The held character data as a view.
    pub fn character_view(&self) -> CharacterView {
        match &self.character {
            Some(sheet) => CharacterView::Complete(sheet.clone()),
            None => CharacterView::InProgress {
                concept: self.character_state.concept.clone(),
                traits: self.character_state.trait_selection.clone(),
                wildcard: self.character_state.wildcard.clone(),
            },
        }
    }
}

fn lenient<T: DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    let value = value.filter(|v| v.is_object())?;
    match serde_json::from_value(value.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed character record");
            None
        }
    }
}

// Field-by-field fallback for sheets whose optional fields have odd types.
fn salvage_sheet(inner: &Value) -> CharacterComplete {
    let text = |key: &str| {
        inner
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    CharacterComplete {
        name: text("name").unwrap_or_default(),
        archetype: text("archetype").unwrap_or_default(),
        summary: text("summary").unwrap_or_default(),
        traits: trait_names(inner.get("traits")),
        wildcard_name: text("wildcard_name"),
        wildcard_description: text("wildcard_description"),
        extra: Default::default(),
    }
}

/// Trait names from a list of strings or `{id|name}` objects.
fn trait_names(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj
                .get("id")
                .or_else(|| obj.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_and_nested_normalize_identically() {
        let flat = json!({
            "name": "Ila Marr",
            "archetype": "Smuggler",
            "summary": "Runs contraband through the flood channels.",
            "traits": ["allies", "contacts", "enemies"]
        });
        let nested = json!({ "character_state": flat.clone() });

        let a = normalize_character(&flat);
        let b = normalize_character(&nested);
        assert_eq!(a, b);
        assert!(a.is_complete());
        assert_eq!(a.name(), Some("Ila Marr"));
    }

    #[test]
    fn test_blank_summary_is_in_progress() {
        let view = normalize_character(&json!({
            "summary": "   ",
            "concept": {"name": "Ila", "archetype": "Smuggler"}
        }));

        match view {
            CharacterView::InProgress {
                concept,
                traits,
                wildcard,
            } => {
                assert_eq!(concept.unwrap().archetype.as_deref(), Some("Smuggler"));
                assert!(traits.is_none());
                assert!(wildcard.is_none());
            }
            other => panic!("expected in-progress view, got {other:?}"),
        }
    }

    #[test]
    fn test_salvages_sheet_with_object_traits() {
        let view = normalize_character(&json!({
            "name": "Ila",
            "summary": "A smuggler.",
            "traits": [{"id": "allies"}, {"name": "patron"}, 7]
        }));

        let CharacterView::Complete(sheet) = view else {
            panic!("expected complete view");
        };
        assert_eq!(sheet.traits, vec!["allies", "patron"]);
        assert_eq!(sheet.archetype, "");
    }

    #[test]
    fn test_extract_subphase_prefers_wrapper() {
        let nested = json!({"character_state": {"concept": {"name": "Ila"}}});
        let record = extract_subphase_record(&ArtifactKind::CharacterConcept, &nested);
        assert_eq!(record, json!({"name": "Ila"}));

        let flat = json!({"name": "Ila"});
        let record = extract_subphase_record(&ArtifactKind::CharacterConcept, &flat);
        assert_eq!(record, flat);
    }

    #[test]
    fn test_extract_subphase_falls_back_when_field_missing() {
        let raw = json!({"character_state": {"concept": {"name": "Ila"}}, "traits": ["allies"]});
        let record = extract_subphase_record(&ArtifactKind::TraitSelection, &raw);
        assert_eq!(record, raw);
    }

    #[test]
    fn test_wizard_data_view() {
        let mut data = WizardData::default();
        assert_eq!(
            data.character_view(),
            CharacterView::InProgress {
                concept: None,
                traits: None,
                wildcard: None
            }
        );

        data.commit(
            saga_api::Phase::Character,
            &json!({"name": "Ila", "summary": "A smuggler."}),
        )
        .unwrap();
        assert!(data.character_view().is_complete());
    }
}
