//! Finalize wait screen

use std::time::Duration;

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};
use saga_core::FinalizeStatus;

use crate::ui::theme::SagaTheme;

const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

/// Progress while the story is being prepared, or the failure with its options.
pub struct WaitScreenWidget<'a> {
    status: &'a FinalizeStatus,
    progress: f64,
    elapsed: Option<Duration>,
    frame: u8,
    theme: &'a SagaTheme,
}

impl<'a> WaitScreenWidget<'a> {
    pub fn new(status: &'a FinalizeStatus, theme: &'a SagaTheme) -> Self {
        Self {
            status,
            progress: 0.0,
            elapsed: None,
            frame: 0,
            theme,
        }
    }

    /// Fraction of the expected duration, already capped below 1.
    pub fn progress(mut self, progress: Option<f64>) -> Self {
        self.progress = progress.unwrap_or(0.0);
        self
    }

    pub fn elapsed(mut self, elapsed: Option<Duration>) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn frame(mut self, frame: u8) -> Self {
        self.frame = frame;
        self
    }
}

impl Widget for WaitScreenWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Starting your story ")
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(true));
        let inner = block.inner(area);
        block.render(area, buf);

        let [text_area, gauge_area, _] = Layout::vertical([
            Constraint::Min(4),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(inner);

        let lines = match self.status {
            FinalizeStatus::Failed { error, .. } => vec![
                Line::from(Span::styled(
                    "Something went wrong while starting the story.",
                    self.theme.error_style(),
                )),
                Line::from(""),
                Line::from(error.as_str()),
                Line::from(""),
                Line::from(Span::styled(
                    "r retry · c back to the story seed · q quit",
                    self.theme.hint_style(),
                )),
            ],
            _ => {
                let spinner = SPINNER[usize::from(self.frame / 2) % SPINNER.len()];
                let elapsed = self
                    .elapsed
                    .map(|d| format!("{}:{:02}", d.as_secs() / 60, d.as_secs() % 60))
                    .unwrap_or_default();
                vec![
                    Line::from(Span::styled(
                        format!("{spinner} Weaving the world, the hero and the first scene together..."),
                        self.theme.heading_style(),
                    )),
                    Line::from(""),
                    Line::from(format!("Elapsed {elapsed}. This can take several minutes.")),
                    Line::from(""),
                    Line::from(Span::styled(
                        "c cancel and return to the story seed",
                        self.theme.hint_style(),
                    )),
                ]
            }
        };

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(text_area, buf);

        if !matches!(self.status, FinalizeStatus::Failed { .. }) {
            Gauge::default()
                .block(Block::default().borders(Borders::ALL))
                .gauge_style(Style::default().fg(self.theme.accent))
                .ratio(self.progress.clamp(0.0, 1.0))
                .label(format!("{:.0}%", self.progress * 100.0))
                .render(gauge_area, buf);
        }
    }
}
