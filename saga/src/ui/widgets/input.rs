//! Message composer

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::ui::theme::SagaTheme;

/// One-line composer for messages to the guide.
///
/// While `locked`, the draft is kept but shown dimmed and the hint explains
/// why nothing can be sent.
pub struct InputWidget<'a> {
    draft: &'a str,
    cursor: usize,
    theme: &'a SagaTheme,
    hint: &'a str,
    title: Option<&'a str>,
    editing: bool,
    locked: bool,
}

impl<'a> InputWidget<'a> {
    pub fn new(draft: &'a str, theme: &'a SagaTheme) -> Self {
        Self {
            draft,
            cursor: draft.chars().count(),
            theme,
            hint: "Press i to write to the guide...",
            title: None,
            editing: false,
            locked: false,
        }
    }

    pub fn cursor_position(mut self, pos: usize) -> Self {
        self.cursor = pos;
        self
    }

    pub fn placeholder(mut self, hint: &'a str) -> Self {
        self.hint = hint;
        self
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }

    pub fn active(mut self, editing: bool) -> Self {
        self.editing = editing;
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    fn draft_line(&self, prompt: Style) -> Line<'a> {
        let chars: Vec<char> = self.draft.chars().collect();
        let cursor = self.cursor.min(chars.len());
        let before: String = chars[..cursor].iter().collect();
        let under = chars.get(cursor).map_or_else(|| " ".to_string(), char::to_string);
        let after: String = chars.get(cursor + 1..).unwrap_or_default().iter().collect();

        let under_style = if self.editing {
            prompt.add_modifier(Modifier::UNDERLINED | Modifier::BOLD)
        } else {
            self.theme.text_style()
        };

        Line::from(vec![
            Span::styled("> ", prompt),
            Span::styled(before, self.theme.text_style()),
            Span::styled(under, under_style),
            Span::styled(after, self.theme.text_style()),
        ])
    }
}

impl Widget for InputWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(self.editing && !self.locked));
        if let Some(title) = self.title {
            block = block.title(format!(" {title} "));
        }

        let inner = block.inner(area);
        block.render(area, buf);

        let prompt = Style::default().fg(self.theme.user_text);

        let line = if self.locked {
            let mut spans = vec![Span::styled("> ", self.theme.hint_style())];
            if !self.draft.is_empty() {
                spans.push(Span::styled(
                    format!("{} ", self.draft),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            }
            spans.push(Span::styled(
                format!("({})", self.hint),
                self.theme.hint_style(),
            ));
            Line::from(spans)
        } else if self.draft.is_empty() && !self.editing {
            Line::from(vec![
                Span::styled("> ", prompt),
                Span::styled(self.hint, self.theme.hint_style()),
            ])
        } else {
            self.draft_line(prompt)
        };

        Paragraph::new(line).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(widget: InputWidget<'_>) -> String {
        let area = Rect::new(0, 0, 60, 3);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        (0..area.width)
            .map(|x| buf[(x, 1)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_locked_input_keeps_draft_and_explains() {
        let theme = SagaTheme::default();
        let line = rendered(
            InputWidget::new("a misty harbor", &theme)
                .locked(true)
                .placeholder("Waiting for the guide..."),
        );
        assert!(line.contains("a misty harbor"));
        assert!(line.contains("(Waiting for the guide...)"));
    }

    #[test]
    fn test_cursor_inside_multibyte_draft() {
        let theme = SagaTheme::default();
        let line = rendered(
            InputWidget::new("café noir", &theme)
                .active(true)
                .cursor_position(3),
        );
        assert!(line.contains("> café noir"));
    }
}
