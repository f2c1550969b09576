//! Trait taxonomy and the exactly-three trait selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::artifact::CharacterConcept;

/// Number of traits a valid selection holds.
pub const REQUIRED_TRAITS: usize = 3;

/// One of the fixed background traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitId {
    Allies,
    Contacts,
    Patron,
    Status,
    Influence,
    Retainers,
    Resources,
    Domain,
    Enemies,
    Obligations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraitCategory {
    SocialNetwork,
    PowerAndPosition,
    AssetsAndTerritory,
    Liabilities,
}

impl TraitCategory {
    pub fn all() -> [TraitCategory; 4] {
        [
            TraitCategory::SocialNetwork,
            TraitCategory::PowerAndPosition,
            TraitCategory::AssetsAndTerritory,
            TraitCategory::Liabilities,
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            TraitCategory::SocialNetwork => "Social Network",
            TraitCategory::PowerAndPosition => "Power & Position",
            TraitCategory::AssetsAndTerritory => "Assets & Territory",
            TraitCategory::Liabilities => "Liabilities",
        }
    }

    /// Traits in this category, in display order.
    pub fn traits(&self) -> impl Iterator<Item = TraitId> + '_ {
        TraitId::ALL
            .iter()
            .copied()
            .filter(move |t| t.category() == *self)
    }
}

impl TraitId {
    /// Every trait in display order.
    pub const ALL: [TraitId; 10] = [
        TraitId::Allies,
        TraitId::Contacts,
        TraitId::Patron,
        TraitId::Status,
        TraitId::Influence,
        TraitId::Retainers,
        TraitId::Resources,
        TraitId::Domain,
        TraitId::Enemies,
        TraitId::Obligations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TraitId::Allies => "allies",
            TraitId::Contacts => "contacts",
            TraitId::Patron => "patron",
            TraitId::Status => "status",
            TraitId::Influence => "influence",
            TraitId::Retainers => "retainers",
            TraitId::Resources => "resources",
            TraitId::Domain => "domain",
            TraitId::Enemies => "enemies",
            TraitId::Obligations => "obligations",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TraitId::Allies => "Allies",
            TraitId::Contacts => "Contacts",
            TraitId::Patron => "Patron",
            TraitId::Status => "Status",
            TraitId::Influence => "Influence",
            TraitId::Retainers => "Retainers",
            TraitId::Resources => "Resources",
            TraitId::Domain => "Domain",
            TraitId::Enemies => "Enemies",
            TraitId::Obligations => "Obligations",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TraitId::Allies => "Friends who will take real risks on your behalf",
            TraitId::Contacts => "People who trade in information and favors",
            TraitId::Patron => "A powerful sponsor with their own agenda",
            TraitId::Status => "Standing that opens doors and draws eyes",
            TraitId::Influence => "Sway over institutions, crowds or factions",
            TraitId::Retainers => "Loyal followers who serve you directly",
            TraitId::Resources => "Wealth, equipment and material means",
            TraitId::Domain => "A place that is yours to hold and defend",
            TraitId::Enemies => "Someone who wants you diminished or dead",
            TraitId::Obligations => "Debts, oaths and duties you cannot ignore",
        }
    }

    pub fn category(&self) -> TraitCategory {
        match self {
            TraitId::Allies | TraitId::Contacts | TraitId::Patron => TraitCategory::SocialNetwork,
            TraitId::Status | TraitId::Influence | TraitId::Retainers => {
                TraitCategory::PowerAndPosition
            }
            TraitId::Resources | TraitId::Domain => TraitCategory::AssetsAndTerritory,
            TraitId::Enemies | TraitId::Obligations => TraitCategory::Liabilities,
        }
    }

    // Singular form used when scanning prose.
    fn singular(&self) -> &'static str {
        match self {
            TraitId::Allies => "ally",
            TraitId::Contacts => "contact",
            TraitId::Patron => "patron",
            TraitId::Status => "status",
            TraitId::Influence => "influence",
            TraitId::Retainers => "retainer",
            TraitId::Resources => "resource",
            TraitId::Domain => "domain",
            TraitId::Enemies => "enemy",
            TraitId::Obligations => "obligation",
        }
    }
}

impl fmt::Display for TraitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraitId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        TraitId::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == needle || t.singular() == needle)
            .ok_or_else(|| format!("unknown trait: {s}"))
    }
}

/// Outcome of confirming a trait selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitConfirm {
    Valid([TraitId; REQUIRED_TRAITS]),
    /// Wrong number of traits; handled conversationally by the caller.
    Invalid { selected: Vec<TraitId>, count: usize },
}

/// Local selection state for the trait picker.
///
/// Toggling is unconstrained so the user can over- or under-select while
/// discussing options; only [`TraitSelector::confirm`] enforces the count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitSelector {
    selected: Vec<TraitId>,
    suggested: Vec<TraitId>,
}

impl TraitSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A selector with `suggested` pre-checked.
    pub fn with_suggestions(suggested: Vec<TraitId>) -> Self {
        let mut unique = Vec::with_capacity(suggested.len());
        for id in suggested {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self {
            selected: unique.clone(),
            suggested: unique,
        }
    }

    pub fn toggle(&mut self, id: TraitId) {
        if let Some(pos) = self.selected.iter().position(|t| *t == id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(id);
        }
    }

    pub fn is_selected(&self, id: TraitId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_suggested(&self, id: TraitId) -> bool {
        self.suggested.contains(&id)
    }

    /// Selected traits in the order they were picked.
    pub fn selected(&self) -> &[TraitId] {
        &self.selected
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn confirm(&self) -> TraitConfirm {
        match <[TraitId; REQUIRED_TRAITS]>::try_from(self.selected.as_slice()) {
            Ok(traits) => TraitConfirm::Valid(traits),
            Err(_) => TraitConfirm::Invalid {
                selected: self.selected.clone(),
                count: self.selected.len(),
            },
        }
    }
}

/// Suggested traits from structured concept data.
pub fn suggest_from_concept(concept: &CharacterConcept) -> Vec<TraitId> {
    concept
        .suggested_traits
        .iter()
        .filter_map(|name| name.parse().ok())
        .collect()
}

/// Trait names mentioned in free text, in taxonomy order.
pub fn suggest_from_text(text: &str) -> Vec<TraitId> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    TraitId::ALL
        .iter()
        .copied()
        .filter(|t| words.iter().any(|w| w == t.as_str() || w == t.singular()))
        .collect()
}

/// Legacy keyword check: does the assistant appear to be asking for traits?
pub fn mentions_trait_selection(text: &str) -> bool {
    let lower = text.to_lowercase();
    let asks = ["choose", "select", "pick"].iter().any(|k| lower.contains(k));
    let about_traits = lower.contains("trait") || lower.contains("background");
    asks && about_traits && suggest_from_text(text).len() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_shape() {
        assert_eq!(TraitId::ALL.len(), 10);
        let counts: Vec<usize> = TraitCategory::all()
            .iter()
            .map(|c| c.traits().count())
            .collect();
        assert_eq!(counts, vec![3, 3, 2, 2]);
    }

    #[test]
    fn test_wire_ids() {
        assert_eq!(
            serde_json::to_string(&TraitId::Obligations).unwrap(),
            "\"obligations\""
        );
        assert_eq!("Enemy".parse::<TraitId>().unwrap(), TraitId::Enemies);
        assert!("charisma".parse::<TraitId>().is_err());
    }

    #[test]
    fn test_toggle_is_unconstrained() {
        let mut selector = TraitSelector::new();
        for id in &TraitId::ALL[..5] {
            selector.toggle(*id);
        }
        assert_eq!(selector.count(), 5);

        selector.toggle(TraitId::Allies);
        assert!(!selector.is_selected(TraitId::Allies));
        assert_eq!(selector.count(), 4);
    }

    #[test]
    fn test_confirm_exactly_three() {
        let mut selector = TraitSelector::new();
        selector.toggle(TraitId::Domain);
        selector.toggle(TraitId::Enemies);
        selector.toggle(TraitId::Patron);

        assert_eq!(
            selector.confirm(),
            TraitConfirm::Valid([TraitId::Domain, TraitId::Enemies, TraitId::Patron])
        );
    }

    #[test]
    fn test_confirm_invalid_reports_selection() {
        let mut selector = TraitSelector::new();
        selector.toggle(TraitId::Allies);
        selector.toggle(TraitId::Contacts);

        assert_eq!(
            selector.confirm(),
            TraitConfirm::Invalid {
                selected: vec![TraitId::Allies, TraitId::Contacts],
                count: 2
            }
        );
    }

    #[test]
    fn test_suggestions_are_prechecked_and_deduplicated() {
        let mut selector =
            TraitSelector::with_suggestions(vec![TraitId::Status, TraitId::Status, TraitId::Domain]);
        assert_eq!(selector.selected(), &[TraitId::Status, TraitId::Domain]);
        assert!(selector.is_suggested(TraitId::Domain));

        selector.toggle(TraitId::Domain);
        assert!(!selector.is_selected(TraitId::Domain));
        assert!(selector.is_suggested(TraitId::Domain));
    }

    #[test]
    fn test_suggest_from_concept() {
        let concept = CharacterConcept {
            suggested_traits: vec!["allies".into(), "Retainers".into(), "luck".into()],
            ..Default::default()
        };
        assert_eq!(
            suggest_from_concept(&concept),
            vec![TraitId::Allies, TraitId::Retainers]
        );
    }

    #[test]
    fn test_suggest_from_text() {
        let found = suggest_from_text("An old enemy, a wealthy patron, and a domain of her own.");
        assert_eq!(found, vec![TraitId::Patron, TraitId::Domain, TraitId::Enemies]);
        assert!(suggest_from_text("Nothing relevant here").is_empty());
    }

    #[test]
    fn test_legacy_heuristic() {
        assert!(mentions_trait_selection(
            "Now choose three background traits: Allies, Contacts, Patron or Status."
        ));
        assert!(!mentions_trait_selection("Tell me about your allies."));
    }
}
