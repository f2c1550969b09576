//! Transcript display widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::scrollbar,
    text::{Line, Span},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
        StatefulWidget, Widget, Wrap,
    },
};
use saga_core::{Message, Role};

use crate::ui::theme::SagaTheme;

/// Widget for the wizard conversation
pub struct TranscriptWidget<'a> {
    messages: &'a [Message],
    scroll: usize,
    theme: &'a SagaTheme,
    thinking: Option<u8>,
    selected_reference: Option<usize>,
}

impl<'a> TranscriptWidget<'a> {
    pub fn new(messages: &'a [Message], theme: &'a SagaTheme) -> Self {
        Self {
            messages,
            scroll: 0,
            theme,
            thinking: None,
            selected_reference: None,
        }
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// Highlight the `index`-th artifact reference, counting from the oldest.
    pub fn selected_reference(mut self, index: Option<usize>) -> Self {
        self.selected_reference = index;
        self
    }

    /// Show a waiting indicator animated by `frame`.
    pub fn thinking(mut self, frame: Option<u8>) -> Self {
        self.thinking = frame;
        self
    }
}

impl Widget for TranscriptWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Conversation [j/k scroll] ")
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true));

        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines: Vec<Line> = Vec::new();
        let mut reference = 0;

        for message in self.messages {
            let style = self.theme.role_style(message.role);
            let label = match message.role {
                Role::System => String::new(),
                role => format!("{role}: "),
            };

            for (i, line) in message.content.lines().enumerate() {
                let prefix = if i == 0 { label.as_str() } else { "" };
                lines.push(Line::from(vec![
                    Span::styled(prefix.to_string(), style.add_modifier(Modifier::BOLD)),
                    Span::styled(line.to_string(), style),
                ]));
            }
            if let Some(artifact) = &message.artifact {
                let line = if self.selected_reference == Some(reference) {
                    Span::styled(
                        format!("> [{}] press o to view", artifact.kind.label()),
                        self.theme.heading_style(),
                    )
                } else {
                    Span::styled(
                        format!("  [{}]", artifact.kind.label()),
                        self.theme.hint_style(),
                    )
                };
                lines.push(Line::from(line));
                reference += 1;
            }

            // Blank line between entries
            lines.push(Line::from(""));
        }

        if let Some(frame) = self.thinking {
            let dots = ".".repeat(usize::from(frame / 3 % 4));
            lines.push(Line::from(Span::styled(
                format!("The guide is thinking{dots}"),
                self.theme.role_style(Role::System),
            )));
        }

        // Approximate wrapped height so scrolling reaches the end
        let width = usize::from(inner.width.max(1));
        let total_lines: usize = lines
            .iter()
            .map(|line| line.width().div_ceil(width).max(1))
            .sum();
        let visible_height = usize::from(inner.height);
        let max_scroll = total_lines.saturating_sub(visible_height);
        let scroll = self.scroll.min(max_scroll);

        Paragraph::new(lines)
            .scroll((scroll as u16, 0))
            .wrap(Wrap { trim: false })
            .render(inner, buf);

        if total_lines > visible_height {
            let scrollbar_area = Rect {
                x: inner.x + inner.width.saturating_sub(1),
                y: inner.y,
                width: 1,
                height: inner.height,
            };

            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .symbols(scrollbar::VERTICAL)
                .thumb_style(Style::default().fg(Color::DarkGray))
                .track_style(Style::default().fg(Color::Black))
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"));

            let mut scrollbar_state = ScrollbarState::new(max_scroll).position(scroll);
            scrollbar.render(scrollbar_area, buf, &mut scrollbar_state);
        }
    }
}
