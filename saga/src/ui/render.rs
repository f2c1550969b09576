//! Render orchestration for the wizard TUI

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use saga_core::display::artifact_sections;
use saga_core::Artifact;

use crate::app::{App, InputMode, Screen};
use crate::ui::widgets::{
    ArtifactWidget, ChoiceListWidget, InputWidget, PhaseDockWidget, SlotListWidget,
    TraitSelectorWidget, TranscriptWidget, WaitScreenWidget,
};

/// Overlay types
#[derive(Debug, Clone)]
pub enum Overlay {
    Help,
    /// Committed artifacts, one per completed phase.
    Drawer,
    /// Read-only view of an artifact; never changes wizard state.
    Viewer(Artifact),
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    match app.screen {
        Screen::SlotSelect => render_slot_screen(frame, app, area),
        Screen::Wizard => render_wizard(frame, app, area),
    }

    if let Some(overlay) = app.overlay() {
        render_overlay(frame, app, overlay, area);
    }
}

/// Centered rectangle of a fixed size, clamped to `area`
fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    let [rect] = Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .areas(row);
    rect
}

fn render_slot_screen(frame: &mut Frame, app: &App, area: Rect) {
    let [title_area, list_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(5),
        Constraint::Length(1),
    ])
    .areas(area);

    let title = Line::from(Span::styled(
        " Saga - choose a save slot ",
        Style::default().add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(Paragraph::new(title), title_area);

    let list = SlotListWidget::new(&app.slots, &app.theme).cursor(app.slot_cursor);
    frame.render_widget(list, list_area);

    let hint = app
        .status_message()
        .unwrap_or("Enter resume/start · n new story · d reset · r refresh · ? help · q quit");
    frame.render_widget(
        Paragraph::new(Span::styled(hint, app.theme.hint_style())),
        status_area,
    );
}

fn render_wizard(frame: &mut Frame, app: &App, area: Rect) {
    let [title_area, body_area, status_area, input_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(8),
        Constraint::Length(1),
        Constraint::Length(3),
    ])
    .areas(area);

    render_title_bar(frame, app, title_area);

    if app.is_waiting() {
        let state = &app.state;
        let now = Utc::now();
        let wait = WaitScreenWidget::new(&state.finalize, &app.theme)
            .progress(state.finalize_progress(now, app.config.finalize_expectation))
            .elapsed(state.finalize_elapsed(now))
            .frame(app.animation_frame);
        frame.render_widget(wait, body_area);
        render_status_bar(frame, app, status_area);
        return;
    }

    let [main_area, sidebar_area] =
        Layout::horizontal([Constraint::Percentage(68), Constraint::Percentage(32)])
            .areas(body_area);

    // Conversation with suggestions underneath
    let choice_rows = app.state.choices.len().min(9) as u16;
    let [transcript_area, choices_area] = Layout::vertical([
        Constraint::Min(5),
        Constraint::Length(if choice_rows == 0 { 0 } else { choice_rows + 2 }),
    ])
    .areas(main_area);

    let thinking = app.state.is_processing().then_some(app.animation_frame);
    let transcript = TranscriptWidget::new(&app.state.messages, &app.theme)
        .selected_reference(app.selected_reference())
        .scroll(app.transcript_scroll)
        .thinking(thinking);
    frame.render_widget(transcript, transcript_area);

    if choice_rows > 0 {
        let choices =
            ChoiceListWidget::new(&app.state.choices, &app.theme).enabled(app.state.input_enabled());
        frame.render_widget(choices, choices_area);
    }

    // Sidebar: progress, then the trait picker while it is open
    match &app.state.trait_selector {
        Some(selector) => {
            let [dock_area, traits_area] =
                Layout::vertical([Constraint::Length(9), Constraint::Min(6)]).areas(sidebar_area);
            frame.render_widget(PhaseDockWidget::new(&app.state, &app.theme), dock_area);
            frame.render_widget(
                TraitSelectorWidget::new(selector, &app.theme).cursor(app.trait_cursor),
                traits_area,
            );
        }
        None => frame.render_widget(PhaseDockWidget::new(&app.state, &app.theme), sidebar_area),
    }

    render_status_bar(frame, app, status_area);
    render_input(frame, app, input_area);

    // The confirmation modal sits above everything but overlays
    if let Some(artifact) = &app.state.pending {
        render_pending_modal(frame, app, artifact, body_area);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.state;
    let title = format!(
        " Saga | Slot {} | {} | {} ",
        state.slot,
        state.current_phase.title(),
        state.stage()
    );
    let line = Line::from(Span::styled(
        title,
        Style::default().add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode = match app.input_mode {
        InputMode::Normal => Span::styled(" NORMAL ", app.theme.cursor_style()),
        InputMode::Insert => Span::styled(" INSERT ", app.theme.heading_style()),
    };

    let message = match (&app.state.notification, app.status_message()) {
        (Some(notification), _) => Span::styled(
            format!(" {notification} (x to dismiss)"),
            app.theme.error_style(),
        ),
        (None, Some(status)) => Span::raw(format!(" {status}")),
        (None, None) if app.state.is_processing() => {
            Span::styled(" Waiting for the guide...", app.theme.hint_style())
        }
        (None, None) => Span::styled(
            " i write · 1-9 choose · f fate · [ ] o references · A artifacts · ? help",
            app.theme.hint_style(),
        ),
    };

    frame.render_widget(Paragraph::new(Line::from(vec![mode, message])), area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let placeholder = if app.state.is_processing() {
        "Waiting for the guide..."
    } else if app.state.pending.is_some() {
        "Confirm or revise the artifact first"
    } else if app.state.thread_id.is_none() {
        "No session yet"
    } else {
        "Press i to write to the guide..."
    };

    let input = InputWidget::new(app.input_buffer(), &app.theme)
        .cursor_position(app.cursor_position())
        .active(app.input_mode == InputMode::Insert)
        .locked(!app.state.input_enabled())
        .title(app.state.current_phase.title())
        .placeholder(placeholder);
    frame.render_widget(input, area);
}

fn render_pending_modal(frame: &mut Frame, app: &App, artifact: &Artifact, area: Rect) {
    let popup_area = centered_rect_fixed(70, 22, area);
    frame.render_widget(Clear, popup_area);

    let sections = artifact_sections(artifact);
    let title = format!("New {}", artifact.kind.label());
    let widget = ArtifactWidget::new(&title, &sections, &app.theme)
        .hint("y confirm · e revise · v view full screen");
    frame.render_widget(widget, popup_area);
}

fn render_overlay(frame: &mut Frame, app: &App, overlay: &Overlay, area: Rect) {
    match overlay {
        Overlay::Help => render_help_overlay(frame, app, area),
        Overlay::Drawer => render_drawer(frame, app, area),
        Overlay::Viewer(artifact) => {
            let popup_area = centered_rect_fixed(
                area.width.saturating_sub(8),
                area.height.saturating_sub(4),
                area,
            );
            frame.render_widget(Clear, popup_area);
            let sections = artifact_sections(artifact);
            let widget = ArtifactWidget::new(artifact.kind.label(), &sections, &app.theme)
                .hint("Esc close");
            frame.render_widget(widget, popup_area);
        }
    }
}

fn render_drawer(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = centered_rect_fixed(40, 9, area);
    frame.render_widget(Clear, popup_area);

    let artifacts = app.committed_artifacts();
    let mut lines: Vec<Line> = artifacts
        .iter()
        .enumerate()
        .map(|(i, artifact)| {
            let text = format!(" {} ", artifact.kind.label());
            if i == app.drawer_cursor {
                Line::from(Span::styled(text, app.theme.cursor_style()))
            } else {
                Line::from(text)
            }
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            " Nothing committed yet",
            app.theme.hint_style(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " Enter open · Esc close",
        app.theme.hint_style(),
    )));

    let block = Block::default()
        .title(" Artifacts ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), popup_area);
}

fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let popup_area = centered_rect_fixed(56, 30, area);
    frame.render_widget(Clear, popup_area);

    let heading = |text: &'static str| {
        Line::from(Span::styled(
            text,
            Style::default().add_modifier(Modifier::UNDERLINED),
        ))
    };

    let help_text = vec![
        Line::from(Span::styled(
            " Saga - Help ",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        heading("Slot selector:"),
        Line::from("  Enter   Resume slot (or start if empty)"),
        Line::from("  n       Reset slot and start a new story"),
        Line::from("  d       Reset slot"),
        Line::from(""),
        heading("Wizard (NORMAL mode):"),
        Line::from("  i       Write to the guide (Esc to leave)"),
        Line::from("  1-9     Pick a suggested reply"),
        Line::from("  f       Let fate decide"),
        Line::from("  j/k     Scroll, or move in the trait picker"),
        Line::from("  Space   Toggle trait · Enter confirm traits"),
        Line::from("  A       Committed artifacts"),
        Line::from("  [ ]     Step through artifacts in the transcript"),
        Line::from("  o       Open the highlighted artifact"),
        Line::from("  x       Dismiss error"),
        Line::from(""),
        heading("Pending artifact:"),
        Line::from("  y       Confirm · e revise · v view"),
        Line::from(""),
        heading("Starting the story:"),
        Line::from("  c       Cancel · r retry after a failure"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc or q to close",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(app.theme.border_style(true));

    frame.render_widget(
        Paragraph::new(help_text)
            .block(block)
            .wrap(Wrap { trim: false }),
        popup_area,
    );
}
