//! Trait picker widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use saga_core::traits::{TraitCategory, REQUIRED_TRAITS};
use saga_core::{PhaseStatus, TraitId, TraitSelector};

use crate::ui::theme::SagaTheme;

/// The ten traits grouped by category, with selection marks.
///
/// `cursor` indexes [`TraitId::ALL`].
pub struct TraitSelectorWidget<'a> {
    selector: &'a TraitSelector,
    cursor: usize,
    theme: &'a SagaTheme,
}

impl<'a> TraitSelectorWidget<'a> {
    pub fn new(selector: &'a TraitSelector, theme: &'a SagaTheme) -> Self {
        Self {
            selector,
            cursor: 0,
            theme,
        }
    }

    pub fn cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }
}

impl Widget for TraitSelectorWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let count = self.selector.count();
        let count_style = if count == REQUIRED_TRAITS {
            self.theme.phase_style(PhaseStatus::Completed)
        } else {
            self.theme.heading_style()
        };

        let block = Block::default()
            .title(Line::from(vec![
                Span::raw(" Traits "),
                Span::styled(format!("{count}/{REQUIRED_TRAITS} "), count_style),
            ]))
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true));

        let highlighted = TraitId::ALL.get(self.cursor).copied();
        let mut lines = Vec::new();

        for category in TraitCategory::all() {
            lines.push(Line::from(Span::styled(
                category.title(),
                self.theme.heading_style(),
            )));
            for id in category.traits() {
                let mark = if self.selector.is_selected(id) { "[x]" } else { "[ ]" };
                let style = if highlighted == Some(id) {
                    self.theme.cursor_style()
                } else if self.selector.is_selected(id) {
                    Style::default().fg(self.theme.selected)
                } else {
                    Style::default()
                };

                let mut spans = vec![Span::styled(format!(" {mark} {}", id.title()), style)];
                if self.selector.is_suggested(id) {
                    spans.push(Span::styled(
                        " ★",
                        Style::default().fg(self.theme.suggested),
                    ));
                }
                lines.push(Line::from(spans));
                if highlighted == Some(id) {
                    lines.push(Line::from(Span::styled(
                        format!("     {}", id.description()),
                        self.theme.hint_style(),
                    )));
                }
            }
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Space toggle · Enter confirm",
            self.theme.hint_style(),
        )));

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}
