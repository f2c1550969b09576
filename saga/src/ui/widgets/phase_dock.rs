//! Phase progress dock

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use saga_core::{CharacterStep, Phase, PhaseStatus, Stage, WizardState};

use crate::ui::theme::SagaTheme;

/// Shows each phase as locked, active or completed, plus the character subphase.
pub struct PhaseDockWidget<'a> {
    state: &'a WizardState,
    theme: &'a SagaTheme,
}

impl<'a> PhaseDockWidget<'a> {
    pub fn new(state: &'a WizardState, theme: &'a SagaTheme) -> Self {
        Self { state, theme }
    }
}

fn marker(status: PhaseStatus) -> &'static str {
    match status {
        PhaseStatus::Locked => "○",
        PhaseStatus::Active => "◉",
        PhaseStatus::Completed => "✓",
    }
}

impl Widget for PhaseDockWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Progress ")
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(false));

        let mut lines = Vec::new();
        for phase in Phase::all() {
            let status = self.state.phase_status(phase);
            lines.push(Line::from(Span::styled(
                format!(" {} {}", marker(status), phase.title()),
                self.theme.phase_style(status),
            )));

            if let (Phase::Character, Stage::Character(current)) = (phase, self.state.stage()) {
                for step in [
                    CharacterStep::Concept,
                    CharacterStep::Traits,
                    CharacterStep::Wildcard,
                ] {
                    let status = match (step as u8).cmp(&(current as u8)) {
                        std::cmp::Ordering::Less => PhaseStatus::Completed,
                        std::cmp::Ordering::Equal => PhaseStatus::Active,
                        std::cmp::Ordering::Greater => PhaseStatus::Locked,
                    };
                    lines.push(Line::from(Span::styled(
                        format!("     {} {}", marker(status), step.title()),
                        self.theme.phase_style(status),
                    )));
                }
            }
        }

        if let Some(name) = self.state.data.character_view().name() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!(" Hero: {name}"),
                self.theme.hint_style(),
            )));
        }
        if let Some(world) = self
            .state
            .data
            .setting
            .as_ref()
            .map(|s| s.world_name.as_str())
            .filter(|name| !name.is_empty())
        {
            lines.push(Line::from(Span::styled(
                format!(" World: {world}"),
                self.theme.hint_style(),
            )));
        }

        Paragraph::new(lines).block(block).render(area, buf);
    }
}
