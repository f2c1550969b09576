//! Suggested replies

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use saga_core::Choice;

use crate::ui::theme::SagaTheme;

pub struct ChoiceListWidget<'a> {
    choices: &'a [Choice],
    enabled: bool,
    theme: &'a SagaTheme,
}

impl<'a> ChoiceListWidget<'a> {
    pub fn new(choices: &'a [Choice], theme: &'a SagaTheme) -> Self {
        Self {
            choices,
            enabled: true,
            theme,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Widget for ChoiceListWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Suggestions [1-9] · f let fate decide ")
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(false));

        let number_style = if self.enabled {
            self.theme.heading_style()
        } else {
            self.theme.hint_style()
        };

        let lines: Vec<Line> = self
            .choices
            .iter()
            .take(9)
            .enumerate()
            .map(|(i, choice)| {
                let mut spans = vec![
                    Span::styled(format!("{}) ", i + 1), number_style),
                    Span::raw(choice.label.as_str()),
                ];
                if let Some(description) = &choice.description {
                    spans.push(Span::styled(
                        format!(" - {description}"),
                        self.theme.hint_style(),
                    ));
                }
                Line::from(spans)
            })
            .collect();

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }
}
