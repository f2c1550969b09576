//! Event handling for the wizard TUI

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};
use saga_core::{FinalizeStatus, WizardEvent};

use crate::app::{App, InputMode, Screen, SlotAction};
use crate::ui::Overlay;

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
    NeedsRedraw,
}

/// Handle a terminal event
pub fn handle_event(app: &mut App, event: Event) -> EventResult {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key_event(app, key),
        Event::Mouse(mouse) => handle_mouse_event(app, mouse),
        Event::Resize(_, _) => EventResult::NeedsRedraw,
        _ => EventResult::Continue,
    }
}

fn handle_mouse_event(app: &mut App, mouse: MouseEvent) -> EventResult {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            app.scroll_up(3);
            EventResult::NeedsRedraw
        }
        MouseEventKind::ScrollDown => {
            app.scroll_down(3);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

fn handle_key_event(app: &mut App, key: KeyEvent) -> EventResult {
    // Global shortcuts (always work)
    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
        return EventResult::Quit;
    }

    if app.has_overlay() {
        return handle_overlay_key(app, key);
    }

    match app.screen {
        Screen::SlotSelect => handle_slot_select(app, key),
        Screen::Wizard if app.is_waiting() => handle_wait_screen(app, key),
        Screen::Wizard if app.input_mode == InputMode::Insert => handle_insert_mode(app, key),
        Screen::Wizard if app.state.pending.is_some() => handle_pending_artifact(app, key),
        Screen::Wizard => handle_normal_mode(app, key),
    }
}

/// Slot selector: pick, start over or wipe a slot
fn handle_slot_select(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            app.slot_down();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.slot_up();
            EventResult::NeedsRedraw
        }
        KeyCode::Enter => {
            app.open_selected_slot();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('n') => {
            if let Some(slot) = app.selected_slot().map(|s| s.slot) {
                app.queue_slot_action(SlotAction::Reset {
                    slot,
                    start_after: true,
                });
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Char('d') => {
            if let Some(slot) = app.selected_slot().map(|s| s.slot) {
                app.queue_slot_action(SlotAction::Reset {
                    slot,
                    start_after: false,
                });
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Char('r') => {
            app.queue_slot_action(SlotAction::Refresh);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('?') | KeyCode::F(1) => {
            app.toggle_help();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('q') | KeyCode::Esc => EventResult::Quit,
        _ => EventResult::Continue,
    }
}

/// Keys in NORMAL mode (vim-style navigation and hotkeys)
fn handle_normal_mode(app: &mut App, key: KeyEvent) -> EventResult {
    if app.state.trait_selector.is_some() {
        if let Some(result) = handle_trait_selector(app, key) {
            return result;
        }
    }

    match key.code {
        // Mode switching
        KeyCode::Char('i') | KeyCode::Char('a') => {
            if app.state.input_enabled() {
                app.input_mode = InputMode::Insert;
                app.cursor_end();
            } else {
                app.set_status("Waiting for the guide...");
            }
            EventResult::NeedsRedraw
        }

        // Suggested replies
        KeyCode::Char(c @ '1'..='9') => {
            let number = c.to_digit(10).map_or(0, |d| d as usize);
            app.choose(number);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('f') => {
            app.dispatch(WizardEvent::AcceptFate);
            EventResult::NeedsRedraw
        }

        // Artifacts
        KeyCode::Char('A') => {
            app.toggle_drawer();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('[') => {
            app.reference_prev();
            EventResult::NeedsRedraw
        }
        KeyCode::Char(']') => {
            app.reference_next();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('o') => {
            app.open_reference();
            EventResult::NeedsRedraw
        }

        KeyCode::Char('x') => {
            app.dispatch(WizardEvent::DismissNotification);
            app.clear_status();
            EventResult::NeedsRedraw
        }

        // Help
        KeyCode::Char('?') | KeyCode::F(1) => {
            app.toggle_help();
            EventResult::NeedsRedraw
        }

        KeyCode::Char('q') => EventResult::Quit,

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => {
            app.scroll_down(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.scroll_up(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('G') => {
            app.scroll_to_bottom();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('g') => {
            app.scroll_to_top();
            EventResult::NeedsRedraw
        }
        KeyCode::PageUp => {
            app.scroll_up(10);
            EventResult::NeedsRedraw
        }
        KeyCode::PageDown => {
            app.scroll_down(10);
            EventResult::NeedsRedraw
        }

        _ => EventResult::Continue,
    }
}

/// Trait picker keys; `None` falls through to normal mode.
fn handle_trait_selector(app: &mut App, key: KeyEvent) -> Option<EventResult> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.trait_down(),
        KeyCode::Char('k') | KeyCode::Up => app.trait_up(),
        KeyCode::Char(' ') => app.toggle_trait_at_cursor(),
        KeyCode::Enter => app.dispatch(WizardEvent::ConfirmTraits),
        _ => return None,
    }
    Some(EventResult::NeedsRedraw)
}

/// A pending artifact blocks input until it is confirmed or revised
fn handle_pending_artifact(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            app.dispatch(WizardEvent::ConfirmArtifact);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('e') | KeyCode::Char('r') => {
            app.dispatch(WizardEvent::ReviseArtifact);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('v') => {
            app.view_pending();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('?') => {
            app.toggle_help();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('q') => EventResult::Quit,
        _ => EventResult::Continue,
    }
}

/// Finalize in progress or failed
fn handle_wait_screen(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Char('c') | KeyCode::Esc => {
            app.dispatch(WizardEvent::CancelFinalize);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('r') if matches!(app.state.finalize, FinalizeStatus::Failed { .. }) => {
            app.dispatch(WizardEvent::RetryFinalize);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('q') => EventResult::Quit,
        _ => EventResult::Continue,
    }
}

/// Keys in INSERT mode (free text input)
fn handle_insert_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            EventResult::NeedsRedraw
        }

        KeyCode::Enter => {
            if app.submit_input() {
                app.input_mode = InputMode::Normal;
            }
            EventResult::NeedsRedraw
        }

        // Input editing
        KeyCode::Left => {
            app.cursor_left();
            EventResult::NeedsRedraw
        }
        KeyCode::Right => {
            app.cursor_right();
            EventResult::NeedsRedraw
        }
        KeyCode::Home => {
            app.cursor_home();
            EventResult::NeedsRedraw
        }
        KeyCode::End => {
            app.cursor_end();
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            app.backspace();
            EventResult::NeedsRedraw
        }
        KeyCode::Delete => {
            app.delete();
            EventResult::NeedsRedraw
        }

        KeyCode::Char(c) => {
            app.type_char(c);
            EventResult::NeedsRedraw
        }

        _ => EventResult::Continue,
    }
}

/// Handle key when overlay is open
fn handle_overlay_key(app: &mut App, key: KeyEvent) -> EventResult {
    if matches!(app.overlay(), Some(Overlay::Drawer)) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                app.drawer_down();
                return EventResult::NeedsRedraw;
            }
            KeyCode::Char('k') | KeyCode::Up => {
                app.drawer_up();
                return EventResult::NeedsRedraw;
            }
            KeyCode::Enter => {
                app.open_drawer_selection();
                return EventResult::NeedsRedraw;
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.close_overlay();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('?') if matches!(app.overlay(), Some(Overlay::Help)) => {
            app.close_overlay();
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{fixture, started_fixture};
    use saga_core::testing::{phase_reply, subphase_reply};
    use saga_core::{ArtifactKind, Phase, TraitId, WizardEffect};
    use serde_json::json;

    fn press(app: &mut App, code: KeyCode) -> EventResult {
        handle_event(app, Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_ctrl_c_quits_anywhere() {
        let mut fx = fixture();
        let result = handle_event(
            &mut fx.app,
            Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert_eq!(result, EventResult::Quit);
    }

    #[test]
    fn test_bracket_keys_reach_older_references() {
        let mut fx = started_fixture();
        fx.app.state.current_phase = Phase::Character;
        fx.app.dispatch(WizardEvent::ChatReplied(subphase_reply(
            ArtifactKind::CharacterConcept,
            json!({"name": "Ila"}),
        )));
        fx.app.dispatch(WizardEvent::ChatReplied(subphase_reply(
            ArtifactKind::TraitSelection,
            json!({"selected_traits": ["allies", "status", "domain"]}),
        )));

        press(&mut fx.app, KeyCode::Char('['));
        press(&mut fx.app, KeyCode::Char('o'));
        assert!(matches!(
            fx.app.overlay(),
            Some(crate::ui::Overlay::Viewer(artifact)) if artifact.kind == ArtifactKind::CharacterConcept
        ));
    }

    #[test]
    fn test_insert_and_send() {
        let mut fx = started_fixture();
        press(&mut fx.app, KeyCode::Char('i'));
        assert_eq!(fx.app.input_mode, InputMode::Insert);

        // 'q' is text in insert mode
        type_str(&mut fx.app, "quiet moors");
        press(&mut fx.app, KeyCode::Enter);

        assert_eq!(fx.app.input_mode, InputMode::Normal);
        let effects = fx.drain_effects();
        assert!(matches!(&effects[..], [WizardEffect::Chat(r)] if r.message == "quiet moors"));
    }

    #[test]
    fn test_slot_keys_queue_actions() {
        let mut fx = fixture();
        fx.app.set_slots(vec![saga_api::SlotSummary {
            slot: 2,
            has_session: true,
            current_phase: Some(Phase::Character),
            last_activity: None,
            world_name: Some("Rime".into()),
        }]);

        press(&mut fx.app, KeyCode::Char('n'));
        assert_eq!(
            fx.app.take_slot_action(),
            Some(SlotAction::Reset {
                slot: 2,
                start_after: true
            })
        );

        press(&mut fx.app, KeyCode::Char('d'));
        assert_eq!(
            fx.app.take_slot_action(),
            Some(SlotAction::Reset {
                slot: 2,
                start_after: false
            })
        );

        assert_eq!(press(&mut fx.app, KeyCode::Char('q')), EventResult::Quit);
    }

    #[test]
    fn test_pending_artifact_modal_keys() {
        let mut fx = started_fixture();
        fx.app.dispatch(WizardEvent::SendMessage("Glacier".into()));
        fx.app.dispatch(WizardEvent::ChatReplied(phase_reply(
            ArtifactKind::WorldDocument,
            json!({"world_name": "Rime"}),
        )));
        fx.drain_effects();

        // Insert mode is refused while the modal is up
        press(&mut fx.app, KeyCode::Char('i'));
        assert_eq!(fx.app.input_mode, InputMode::Normal);

        press(&mut fx.app, KeyCode::Char('v'));
        assert!(matches!(fx.app.overlay(), Some(Overlay::Viewer(_))));
        press(&mut fx.app, KeyCode::Esc);
        assert!(fx.app.state.pending.is_some());

        press(&mut fx.app, KeyCode::Char('y'));
        assert_eq!(fx.app.state.current_phase, Phase::Character);
        assert!(fx.app.state.pending.is_none());
    }

    #[test]
    fn test_trait_selector_keys() {
        let mut fx = started_fixture();
        fx.app.state.current_phase = Phase::Character;
        fx.app.dispatch(WizardEvent::SendMessage("A disgraced cartographer".into()));
        fx.app.dispatch(WizardEvent::ChatReplied(subphase_reply(
            ArtifactKind::CharacterConcept,
            json!({"name": "Ilse", "archetype": "Cartographer"}),
        )));
        assert!(fx.app.state.trait_selector.is_some());

        // Toggle the first three traits in the taxonomy
        for _ in 0..3 {
            press(&mut fx.app, KeyCode::Char(' '));
            press(&mut fx.app, KeyCode::Char('j'));
        }
        let selector = fx.app.state.trait_selector.as_ref().unwrap();
        for id in &TraitId::ALL[..3] {
            assert!(selector.is_selected(*id));
        }

        fx.drain_effects();
        press(&mut fx.app, KeyCode::Enter);
        let effects = fx.drain_effects();
        assert!(matches!(
            &effects[..],
            [WizardEffect::Chat(r)] if r.message.starts_with("I choose these traits")
        ));
    }

    #[test]
    fn test_wait_screen_cancel_returns_to_seed() {
        let mut fx = started_fixture();
        fx.app.state.current_phase = Phase::Seed;
        fx.app.dispatch(WizardEvent::SendMessage("Ambush".into()));
        fx.app.dispatch(WizardEvent::ChatReplied(phase_reply(
            ArtifactKind::StartingScenario,
            json!({"title": "Ash Road"}),
        )));
        press(&mut fx.app, KeyCode::Enter);
        assert!(fx.app.is_waiting());
        fx.drain_effects();

        // Retry is only offered after a failure
        press(&mut fx.app, KeyCode::Char('r'));
        assert!(fx.drain_effects().is_empty());

        press(&mut fx.app, KeyCode::Char('c'));
        assert!(!fx.app.is_waiting());
        assert!(matches!(
            fx.drain_effects()[..],
            [WizardEffect::CancelFinalize { attempt: 1 }]
        ));
        assert_eq!(
            fx.app.state.pending.as_ref().map(|a| &a.kind),
            Some(&ArtifactKind::StartingScenario)
        );
    }
}
