//! Save slot selector

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use saga_api::SlotSummary;

use crate::ui::theme::SagaTheme;

pub struct SlotListWidget<'a> {
    slots: &'a [SlotSummary],
    cursor: usize,
    theme: &'a SagaTheme,
}

impl<'a> SlotListWidget<'a> {
    pub fn new(slots: &'a [SlotSummary], theme: &'a SagaTheme) -> Self {
        Self {
            slots,
            cursor: 0,
            theme,
        }
    }

    pub fn cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }
}

fn describe(slot: &SlotSummary) -> String {
    if !slot.is_resumable() {
        return "empty".to_string();
    }
    let mut parts = Vec::new();
    if let Some(world) = &slot.world_name {
        parts.push(world.clone());
    }
    if let Some(phase) = slot.current_phase {
        parts.push(format!("{} phase", phase.title()));
    }
    if let Some(activity) = &slot.last_activity {
        parts.push(format!("last played {activity}"));
    }
    if parts.is_empty() {
        "in progress".to_string()
    } else {
        parts.join(" · ")
    }
}

impl Widget for SlotListWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Save Slots ")
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true));

        let mut lines: Vec<Line> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let text = format!(" Slot {:<3} {}", slot.slot, describe(slot));
                if i == self.cursor {
                    Line::from(Span::styled(text, self.theme.cursor_style()))
                } else if slot.is_resumable() {
                    Line::from(text)
                } else {
                    Line::from(Span::styled(text, self.theme.hint_style()))
                }
            })
            .collect();

        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                " No slots loaded. Press r to refresh.",
                self.theme.hint_style(),
            )));
        }

        Paragraph::new(lines).block(block).render(area, buf);
    }
}
