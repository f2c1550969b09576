//! Artifact section rendering, shared by the confirmation modal and viewer

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use saga_core::display::Section;

use crate::ui::theme::SagaTheme;

/// Titled text sections inside a bordered box with an optional key hint.
pub struct ArtifactWidget<'a> {
    title: &'a str,
    sections: &'a [Section],
    hint: Option<&'a str>,
    theme: &'a SagaTheme,
}

impl<'a> ArtifactWidget<'a> {
    pub fn new(title: &'a str, sections: &'a [Section], theme: &'a SagaTheme) -> Self {
        Self {
            title,
            sections,
            hint: None,
            theme,
        }
    }

    pub fn hint(mut self, hint: &'a str) -> Self {
        self.hint = Some(hint);
        self
    }
}

impl Widget for ArtifactWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true));

        let mut lines = Vec::new();
        if self.sections.is_empty() {
            lines.push(Line::from(Span::styled(
                "(no details)",
                self.theme.hint_style(),
            )));
        }
        for section in self.sections {
            lines.push(Line::from(Span::styled(
                section.title.as_str(),
                self.theme.heading_style(),
            )));
            for line in section.body.lines() {
                lines.push(Line::from(format!("  {line}")));
            }
            lines.push(Line::from(""));
        }
        if let Some(hint) = self.hint {
            lines.push(Line::from(Span::styled(hint, self.theme.hint_style())));
        }

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}
