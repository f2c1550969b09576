//! Plain-text sections for artifact display.
//!
//! Front ends render these as they like; the wizard only decides what is
//! shown and in which order.

use saga_api::ArtifactKind;
use serde_json::{Map, Value};

use crate::artifact::{Artifact, SeedData, SettingData};
use crate::normalize::{extract_subphase_record, normalize_character, CharacterView};
use crate::traits::TraitId;

/// A titled block of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

impl Section {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

pub fn setting_sections(setting: &SettingData) -> Vec<Section> {
    let mut sections = Vec::new();
    if !setting.world_name.is_empty() {
        sections.push(Section::new("World", &setting.world_name));
    }
    push_opt(&mut sections, "Genre", setting.genre.as_deref());
    push_opt(&mut sections, "Tone", setting.tone.as_deref());
    push_opt(&mut sections, "Summary", setting.summary.as_deref());
    sections.extend(extra_sections(&setting.extra));
    sections
}

pub fn character_sections(view: &CharacterView) -> Vec<Section> {
    let mut sections = Vec::new();
    match view {
        CharacterView::Complete(sheet) => {
            if !sheet.name.is_empty() {
                sections.push(Section::new("Name", &sheet.name));
            }
            if !sheet.archetype.is_empty() {
                sections.push(Section::new("Archetype", &sheet.archetype));
            }
            sections.push(Section::new("Summary", &sheet.summary));
            if !sheet.traits.is_empty() {
                sections.push(Section::new("Traits", trait_list(&sheet.traits)));
            }
            if let Some(name) = &sheet.wildcard_name {
                let body = match &sheet.wildcard_description {
                    Some(desc) => format!("{name}: {desc}"),
                    None => name.clone(),
                };
                sections.push(Section::new("Wildcard", body));
            }
            sections.extend(extra_sections(&sheet.extra));
        }
        CharacterView::InProgress {
            concept,
            traits,
            wildcard,
        } => {
            if let Some(concept) = concept {
                let headline = [concept.name.as_deref(), concept.archetype.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", ");
                let body = match (&concept.summary, headline.is_empty()) {
                    (Some(summary), false) => format!("{headline}\n{summary}"),
                    (Some(summary), true) => summary.clone(),
                    (None, _) => headline,
                };
                sections.push(Section::new("Concept", body));
            }
            if let Some(traits) = traits {
                let mut body = trait_list(&traits.selected_traits);
                if let Some(rationale) = &traits.rationale {
                    body.push('\n');
                    body.push_str(rationale);
                }
                sections.push(Section::new("Traits", body));
            }
            if let Some(wildcard) = wildcard {
                let body = [wildcard.name.as_deref(), wildcard.description.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(": ");
                sections.push(Section::new("Wildcard", body));
            }
            if sections.is_empty() {
                sections.push(Section::new("Character", "Not started yet."));
            }
        }
    }
    sections
}

pub fn seed_sections(seed: &SeedData) -> Vec<Section> {
    let mut sections = Vec::new();
    push_opt(&mut sections, "Title", seed.title.as_deref());
    push_opt(&mut sections, "Location", seed.location.as_deref());
    push_opt(&mut sections, "Situation", seed.situation.as_deref());
    push_opt(&mut sections, "Hook", seed.hook.as_deref());
    sections.extend(extra_sections(&seed.extra));
    sections
}

/// Sections for any artifact, pending or referenced.
pub fn artifact_sections(artifact: &Artifact) -> Vec<Section> {
    let data = &artifact.data;
    let typed = match &artifact.kind {
        ArtifactKind::WorldDocument => serde_json::from_value::<SettingData>(data.clone())
            .ok()
            .map(|s| setting_sections(&s)),
        ArtifactKind::CharacterSheet => Some(character_sections(&normalize_character(data))),
        ArtifactKind::StartingScenario => serde_json::from_value::<SeedData>(data.clone())
            .ok()
            .map(|s| seed_sections(&s)),
        kind @ (ArtifactKind::CharacterConcept
        | ArtifactKind::TraitSelection
        | ArtifactKind::Wildcard) => {
            Some(generic_sections(&extract_subphase_record(kind, data)))
        }
        ArtifactKind::Other(_) => None,
    };

    match typed {
        Some(sections) if !sections.is_empty() => sections,
        _ => generic_sections(data),
    }
}

/// One section per top-level field of an arbitrary payload.
pub fn generic_sections(value: &Value) -> Vec<Section> {
    match value {
        Value::Object(map) => extra_sections(map),
        Value::Null => Vec::new(),
        other => vec![Section::new("Details", render_value(other))],
    }
}

/// `"magic_system"` → `"Magic System"`.
pub fn humanize(key: &str) -> String {
    key.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_opt(sections: &mut Vec<Section>, title: &str, body: Option<&str>) {
    if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
        sections.push(Section::new(title, body));
    }
}

fn extra_sections(map: &Map<String, Value>) -> Vec<Section> {
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| Section::new(humanize(k), render_value(v)))
        .collect()
}

fn trait_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| match name.parse::<TraitId>() {
            Ok(id) => id.title().to_string(),
            Err(_) => name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", render_value(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", humanize(k), render_value(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("magic_system"), "Magic System");
        assert_eq!(humanize("tone"), "Tone");
    }

    #[test]
    fn test_setting_sections_include_extras() {
        let artifact = Artifact::new(
            ArtifactKind::WorldDocument,
            json!({"world_name": "Veridia", "tone": "grim", "factions": ["Tide Guild", "Salt Court"]}),
        );
        let sections = artifact_sections(&artifact);
        assert_eq!(sections[0], Section::new("World", "Veridia"));
        assert_eq!(sections[1], Section::new("Tone", "grim"));
        assert_eq!(
            sections[2],
            Section::new("Factions", "- Tide Guild\n- Salt Court")
        );
    }

    #[test]
    fn test_character_sheet_uses_trait_titles() {
        let artifact = Artifact::new(
            ArtifactKind::CharacterSheet,
            json!({"character_state": {"name": "Ila", "summary": "A smuggler.", "traits": ["allies", "domain"]}}),
        );
        let sections = artifact_sections(&artifact);
        assert!(sections.contains(&Section::new("Traits", "Allies, Domain")));
    }

    #[test]
    fn test_in_progress_character() {
        let view = normalize_character(&json!({}));
        assert_eq!(
            character_sections(&view),
            vec![Section::new("Character", "Not started yet.")]
        );
    }

    #[test]
    fn test_unknown_artifact_falls_back_to_fields() {
        let artifact = Artifact::new(ArtifactKind::from("mystery"), json!({"power_level": 9}));
        assert_eq!(
            artifact_sections(&artifact),
            vec![Section::new("Power Level", "9")]
        );
    }
}
