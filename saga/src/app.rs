//! Main application state and logic

use saga_api::SlotSummary;
use saga_core::{
    reduce, Artifact, FinalizeStatus, HandOff, Phase, TraitId, WizardConfig, WizardEffect,
    WizardEvent, WizardState,
};
use std::collections::VecDeque;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::ui::theme::SagaTheme;
use crate::ui::Overlay;

/// Vim-style input modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Normal mode - navigation and hotkeys (default)
    #[default]
    Normal,
    /// Insert mode - free text input
    Insert,
}

/// Top-level screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    SlotSelect,
    Wizard,
}

/// Slot list work the run loop performs against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    Refresh,
    /// Reset the slot, then start a new story in it if `start_after`.
    Reset { slot: u32, start_after: bool },
}

/// Main application state
pub struct App {
    // Channel communication with the effect worker
    effect_tx: mpsc::Sender<WizardEffect>,
    event_rx: mpsc::Receiver<WizardEvent>,
    // Effects the worker had no room for yet, in reducer order
    outbox: VecDeque<WizardEffect>,

    pub config: WizardConfig,
    pub state: WizardState,
    pub screen: Screen,

    // Slot selector
    pub slots: Vec<SlotSummary>,
    pub slot_cursor: usize,
    preferred_slot: Option<u32>,
    slot_action: Option<SlotAction>,

    // UI state
    pub theme: SagaTheme,
    overlay: Option<Overlay>,
    pub trait_cursor: usize,
    pub drawer_cursor: usize,
    // Highlighted transcript reference; the newest when unset
    reference_cursor: Option<usize>,

    // Transcript display
    pub transcript_scroll: usize,
    pub scroll_locked_to_bottom: bool,

    // Input state
    pub input_mode: InputMode,
    input_buffer: String,
    cursor_position: usize,

    // Status
    status_message: Option<String>,
    handoff: Option<HandOff>,
    pub should_quit: bool,

    // Animation
    pub animation_frame: u8,
}

impl App {
    /// Create a new application with channel endpoints to the effect worker
    pub fn new(
        config: WizardConfig,
        effect_tx: mpsc::Sender<WizardEffect>,
        event_rx: mpsc::Receiver<WizardEvent>,
    ) -> Self {
        Self {
            effect_tx,
            event_rx,
            outbox: VecDeque::new(),
            state: WizardState::new(1),
            config,
            screen: Screen::SlotSelect,
            slots: Vec::new(),
            slot_cursor: 0,
            preferred_slot: None,
            slot_action: None,
            theme: SagaTheme::default(),
            overlay: None,
            trait_cursor: 0,
            drawer_cursor: 0,
            reference_cursor: None,
            transcript_scroll: 0,
            scroll_locked_to_bottom: true,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            cursor_position: 0,
            status_message: None,
            handoff: None,
            should_quit: false,
            animation_frame: 0,
        }
    }

    // =========================================================================
    // Slot selector
    // =========================================================================

    /// Highlight `slot` once the slot list arrives.
    pub fn preselect_slot(&mut self, slot: Option<u32>) {
        self.preferred_slot = slot;
    }

    pub fn set_slots(&mut self, slots: Vec<SlotSummary>) {
        self.slots = slots;
        let preferred = self
            .preferred_slot
            .and_then(|slot| self.slots.iter().position(|s| s.slot == slot));
        self.slot_cursor = preferred.unwrap_or(self.slot_cursor);
        self.slot_cursor = self.slot_cursor.min(self.slots.len().saturating_sub(1));
    }

    pub fn selected_slot(&self) -> Option<&SlotSummary> {
        self.slots.get(self.slot_cursor)
    }

    pub fn slot_up(&mut self) {
        self.slot_cursor = self.slot_cursor.saturating_sub(1);
    }

    pub fn slot_down(&mut self) {
        if self.slot_cursor + 1 < self.slots.len() {
            self.slot_cursor += 1;
        }
    }

    pub fn queue_slot_action(&mut self, action: SlotAction) {
        self.slot_action = Some(action);
    }

    pub fn take_slot_action(&mut self) -> Option<SlotAction> {
        self.slot_action.take()
    }

    /// Resume the highlighted slot, or start fresh if it has nothing to resume.
    pub fn open_selected_slot(&mut self) {
        let Some(summary) = self.selected_slot() else {
            self.set_status("No slot selected");
            return;
        };
        let slot = summary.slot;
        let event = if summary.is_resumable() {
            WizardEvent::ResumeSession
        } else {
            WizardEvent::StartSession
        };
        self.begin_wizard(slot, event);
    }

    /// Switch to the wizard for `slot` and kick it off with `event`.
    pub fn begin_wizard(&mut self, slot: u32, event: WizardEvent) {
        self.state = WizardState::new(slot)
            .with_model(self.config.model.clone())
            .with_legacy_trait_heuristic(self.config.legacy_trait_heuristic);
        self.screen = Screen::Wizard;
        self.overlay = None;
        self.trait_cursor = 0;
        self.drawer_cursor = 0;
        self.reference_cursor = None;
        self.clear_input();
        self.input_mode = InputMode::Normal;
        self.scroll_to_bottom();
        self.dispatch(event);
    }

    // =========================================================================
    // Wizard plumbing
    // =========================================================================

    /// Apply an event and hand its effects to the worker.
    pub fn dispatch(&mut self, event: WizardEvent) {
        let message_count = self.state.messages.len();

        for effect in reduce(&mut self.state, event) {
            if let WizardEffect::HandOff { slot, session_id } = &effect {
                tracing::info!(slot, %session_id, "handing off to narrative session");
                self.handoff = Some(HandOff {
                    slot: *slot,
                    session_id: session_id.clone(),
                });
            }
            self.outbox.push_back(effect);
        }
        self.pump_effects();

        if self.state.messages.len() != message_count && self.scroll_locked_to_bottom {
            self.scroll_to_bottom();
        }
        if self.state.trait_selector.is_none() {
            self.trait_cursor = 0;
        }
    }

    /// Hand queued effects to the worker.
    ///
    /// A full channel keeps the rest queued for the next tick. A closed one
    /// turns each request into its failure event so the guard is released.
    pub fn pump_effects(&mut self) {
        let mut failures = Vec::new();
        while let Some(effect) = self.outbox.pop_front() {
            match self.effect_tx.try_send(effect) {
                Ok(()) => {}
                Err(TrySendError::Full(effect)) => {
                    tracing::debug!(queued = self.outbox.len() + 1, "effect worker busy");
                    self.outbox.push_front(effect);
                    break;
                }
                Err(TrySendError::Closed(effect)) => {
                    tracing::error!(?effect, "effect worker has stopped");
                    failures.extend(effect.failure("the background worker has stopped"));
                }
            }
        }

        if !failures.is_empty() {
            self.set_status("Background worker unavailable");
        }
        for event in failures {
            self.dispatch(event);
        }
    }

    /// Effects still waiting for room in the worker channel.
    pub fn queued_effects(&self) -> usize {
        self.outbox.len()
    }

    /// Apply every result the worker has produced so far.
    pub fn drain_worker_events(&mut self) -> bool {
        self.pump_effects();
        let mut applied = false;
        while let Ok(event) = self.event_rx.try_recv() {
            tracing::debug!(event = event.name(), "worker event");
            self.dispatch(event);
            applied = true;
        }
        applied
    }

    /// Close the worker's effect channel and wait for it to drain.
    pub async fn shutdown(self) {
        let App {
            effect_tx,
            mut event_rx,
            outbox,
            ..
        } = self;
        for effect in outbox {
            if effect_tx.send(effect).await.is_err() {
                break;
            }
        }
        drop(effect_tx);
        while event_rx.recv().await.is_some() {}
    }

    pub fn handoff(&self) -> Option<&HandOff> {
        self.handoff.as_ref()
    }

    /// The finalize sequence owns the screen.
    pub fn is_waiting(&self) -> bool {
        matches!(
            self.state.finalize,
            FinalizeStatus::Running { .. } | FinalizeStatus::Failed { .. }
        )
    }

    /// Send the input buffer as a chat message.
    pub fn submit_input(&mut self) -> bool {
        if self.input_buffer.trim().is_empty() || !self.state.input_enabled() {
            return false;
        }
        let input = std::mem::take(&mut self.input_buffer);
        self.cursor_position = 0;
        self.dispatch(WizardEvent::SendMessage(input));
        true
    }

    /// Pick a suggested reply by its 1-based number.
    pub fn choose(&mut self, number: usize) {
        if number == 0 || number > self.state.choices.len() {
            self.set_status(format!("No choice {number}"));
            return;
        }
        self.dispatch(WizardEvent::SelectChoice(number - 1));
    }

    pub fn trait_up(&mut self) {
        self.trait_cursor = self.trait_cursor.saturating_sub(1);
    }

    pub fn trait_down(&mut self) {
        self.trait_cursor = (self.trait_cursor + 1).min(TraitId::ALL.len() - 1);
    }

    pub fn toggle_trait_at_cursor(&mut self) {
        if let Some(id) = TraitId::ALL.get(self.trait_cursor) {
            self.dispatch(WizardEvent::ToggleTrait(*id));
        }
    }

    /// Committed artifacts in phase order.
    pub fn committed_artifacts(&self) -> Vec<Artifact> {
        Phase::all()
            .into_iter()
            .filter_map(|phase| self.state.data.artifact_for(phase))
            .collect()
    }

    pub fn drawer_up(&mut self) {
        self.drawer_cursor = self.drawer_cursor.saturating_sub(1);
    }

    pub fn drawer_down(&mut self) {
        let len = self.committed_artifacts().len();
        if self.drawer_cursor + 1 < len {
            self.drawer_cursor += 1;
        }
    }

    /// Open the highlighted drawer entry in the viewer.
    pub fn open_drawer_selection(&mut self) {
        match self.committed_artifacts().into_iter().nth(self.drawer_cursor) {
            Some(artifact) => self.overlay = Some(Overlay::Viewer(artifact)),
            None => self.set_status("Nothing committed yet"),
        }
    }

    /// Index of the highlighted transcript reference.
    pub fn selected_reference(&self) -> Option<usize> {
        let count = self.state.artifact_references().len();
        let last = count.checked_sub(1)?;
        Some(self.reference_cursor.map_or(last, |i| i.min(last)))
    }

    /// Highlight the reference before the current one.
    pub fn reference_prev(&mut self) {
        if let Some(current) = self.selected_reference() {
            self.reference_cursor = Some(current.saturating_sub(1));
        }
    }

    /// Highlight the reference after the current one.
    pub fn reference_next(&mut self) {
        if let Some(current) = self.selected_reference() {
            let last = self.state.artifact_references().len() - 1;
            self.reference_cursor = Some((current + 1).min(last));
        }
    }

    /// Open the highlighted transcript reference in the viewer.
    pub fn open_reference(&mut self) {
        let artifact = self
            .selected_reference()
            .and_then(|i| self.state.artifact_references().get(i).map(|a| (*a).clone()));
        match artifact {
            Some(artifact) => self.overlay = Some(Overlay::Viewer(artifact)),
            None => self.set_status("No artifacts in the transcript yet"),
        }
    }

    /// Preview the pending artifact without deciding on it.
    pub fn view_pending(&mut self) {
        if let Some(artifact) = self.state.pending.clone() {
            self.overlay = Some(Overlay::Viewer(artifact));
        }
    }

    // =========================================================================
    // Transcript scrolling
    // =========================================================================

    /// Scroll transcript to bottom and lock to bottom
    pub fn scroll_to_bottom(&mut self) {
        // The widget caps this to the real maximum
        self.transcript_scroll = usize::MAX / 2;
        self.scroll_locked_to_bottom = true;
    }

    /// Estimate max scroll assuming ~60 columns and ~20 visible rows
    fn estimate_max_scroll(&self) -> usize {
        const ESTIMATED_WIDTH: usize = 60;
        const ESTIMATED_VISIBLE_HEIGHT: usize = 20;

        let estimated_lines: usize = self
            .state
            .messages
            .iter()
            .map(|message| {
                message
                    .content
                    .lines()
                    .map(|line| (line.len() / ESTIMATED_WIDTH).max(1))
                    .sum::<usize>()
                    + 2
            })
            .sum();

        estimated_lines.saturating_sub(ESTIMATED_VISIBLE_HEIGHT)
    }

    /// Scroll transcript up (unlocks from bottom)
    pub fn scroll_up(&mut self, lines: usize) {
        let max_scroll = self.estimate_max_scroll();
        if self.transcript_scroll > max_scroll {
            self.transcript_scroll = max_scroll;
        }
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
        self.scroll_locked_to_bottom = false;
    }

    /// Scroll transcript down
    pub fn scroll_down(&mut self, lines: usize) {
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines);
        let max_scroll = self.estimate_max_scroll();
        self.transcript_scroll = self.transcript_scroll.min(max_scroll + 100);
    }

    pub fn scroll_to_top(&mut self) {
        self.transcript_scroll = 0;
        self.scroll_locked_to_bottom = false;
    }

    // =========================================================================
    // Input editing
    // =========================================================================

    /// Handle a typed character (unicode-safe)
    pub fn type_char(&mut self, c: char) {
        let byte_pos = self
            .input_buffer
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.input_buffer.len());
        self.input_buffer.insert(byte_pos, c);
        self.cursor_position += 1;
    }

    /// Handle backspace (unicode-safe)
    pub fn backspace(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            if let Some((byte_pos, ch)) = self.input_buffer.char_indices().nth(self.cursor_position)
            {
                self.input_buffer
                    .replace_range(byte_pos..byte_pos + ch.len_utf8(), "");
            }
        }
    }

    /// Handle delete (unicode-safe)
    pub fn delete(&mut self) {
        if let Some((byte_pos, ch)) = self.input_buffer.char_indices().nth(self.cursor_position) {
            self.input_buffer
                .replace_range(byte_pos..byte_pos + ch.len_utf8(), "");
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input_buffer.chars().count();
        self.cursor_position = (self.cursor_position + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor_position = self.input_buffer.chars().count();
    }

    pub fn clear_input(&mut self) {
        self.input_buffer.clear();
        self.cursor_position = 0;
    }

    /// Tick for animations
    pub fn tick(&mut self) {
        self.pump_effects();
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    // =========================================================================
    // Overlays and status
    // =========================================================================

    pub fn toggle_help(&mut self) {
        if matches!(self.overlay, Some(Overlay::Help)) {
            self.overlay = None;
        } else {
            self.overlay = Some(Overlay::Help);
        }
    }

    pub fn toggle_drawer(&mut self) {
        if matches!(self.overlay, Some(Overlay::Drawer)) {
            self.overlay = None;
        } else {
            self.drawer_cursor = 0;
            self.overlay = Some(Overlay::Drawer);
        }
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    /// Set status message (always overwrites)
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn input_buffer(&self) -> &str {
        &self.input_buffer
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor_position
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use saga_api::StartResponse;
    use saga_core::testing::{phase_reply, subphase_reply};
    use saga_core::{ArtifactKind, Choice};
    use serde_json::json;

    pub(crate) struct Fixture {
        pub app: App,
        pub effects: mpsc::Receiver<WizardEffect>,
        // Held so the app's receiver stays open
        _events: mpsc::Sender<WizardEvent>,
    }

    impl Fixture {
        pub fn drain_effects(&mut self) -> Vec<WizardEffect> {
            let mut effects = Vec::new();
            while let Ok(effect) = self.effects.try_recv() {
                effects.push(effect);
            }
            effects
        }
    }

    pub(crate) fn fixture() -> Fixture {
        let (effect_tx, effects) = mpsc::channel(64);
        let (events_tx, event_rx) = mpsc::channel(64);
        Fixture {
            app: App::new(WizardConfig::new("/tmp/saga-test"), effect_tx, event_rx),
            effects,
            _events: events_tx,
        }
    }

    /// A fixture already in the wizard with a live thread.
    pub(crate) fn started_fixture() -> Fixture {
        let mut fx = fixture();
        fx.app.begin_wizard(4, WizardEvent::StartSession);
        fx.app.dispatch(WizardEvent::SessionStarted(StartResponse {
            thread_id: "t-4".into(),
            welcome_message: Some("Welcome, storyteller.".into()),
            welcome_choices: vec![Choice::new("A desert empire"), Choice::new("A drowned city")],
        }));
        fx.drain_effects();
        fx
    }

    fn slot(n: u32, has_session: bool) -> SlotSummary {
        SlotSummary {
            slot: n,
            has_session,
            current_phase: None,
            last_activity: None,
            world_name: None,
        }
    }

    #[test]
    fn test_busy_worker_queues_effects_until_there_is_room() {
        let (effect_tx, mut effects) = mpsc::channel(1);
        let (_events_tx, event_rx) = mpsc::channel(1);
        let mut app = App::new(WizardConfig::new("/tmp/saga-test"), effect_tx, event_rx);

        app.begin_wizard(2, WizardEvent::StartSession);
        assert!(app.state.is_processing());
        assert_eq!(app.queued_effects(), 1);
        assert_eq!(effects.try_recv().unwrap(), WizardEffect::PersistActiveSlot(2));

        app.tick();
        assert_eq!(app.queued_effects(), 0);
        assert!(matches!(
            effects.try_recv().unwrap(),
            WizardEffect::StartSession { slot: 2, .. }
        ));
    }

    #[test]
    fn test_stopped_worker_releases_the_guard() {
        let (effect_tx, effects) = mpsc::channel(1);
        let (_events_tx, event_rx) = mpsc::channel(1);
        let mut app = App::new(WizardConfig::new("/tmp/saga-test"), effect_tx, event_rx);
        drop(effects);

        app.begin_wizard(2, WizardEvent::StartSession);
        assert!(!app.state.is_processing());
        assert_eq!(app.queued_effects(), 0);
        assert_eq!(app.status_message(), Some("Background worker unavailable"));
        assert!(app
            .state
            .notification
            .as_ref()
            .unwrap()
            .starts_with("Starting the session failed"));
    }

    #[test]
    fn test_preselects_remembered_slot() {
        let mut fx = fixture();
        fx.app.preselect_slot(Some(3));
        fx.app.set_slots(vec![slot(1, false), slot(2, false), slot(3, true)]);
        assert_eq!(fx.app.selected_slot().unwrap().slot, 3);
    }

    #[test]
    fn test_open_slot_resumes_or_starts() {
        let mut fx = fixture();
        fx.app.set_slots(vec![slot(1, true), slot(2, false)]);

        fx.app.open_selected_slot();
        assert_eq!(fx.app.screen, Screen::Wizard);
        let effects = fx.drain_effects();
        assert!(effects.contains(&WizardEffect::ResumeSession { slot: 1 }));

        let mut fx = fixture();
        fx.app.set_slots(vec![slot(1, true), slot(2, false)]);
        fx.app.slot_down();
        fx.app.open_selected_slot();
        let effects = fx.drain_effects();
        assert!(effects.contains(&WizardEffect::StartSession {
            slot: 2,
            model: None
        }));
    }

    #[test]
    fn test_config_model_reaches_start() {
        let (effect_tx, mut effects) = mpsc::channel(8);
        let (_events_tx, event_rx) = mpsc::channel(8);
        let config = WizardConfig::new("/tmp/saga-test").with_model("storyteller-large");
        let mut app = App::new(config, effect_tx, event_rx);

        app.begin_wizard(7, WizardEvent::StartSession);
        let mut saw_start = false;
        while let Ok(effect) = effects.try_recv() {
            if let WizardEffect::StartSession { model, .. } = effect {
                assert_eq!(model.as_deref(), Some("storyteller-large"));
                saw_start = true;
            }
        }
        assert!(saw_start);
    }

    #[test]
    fn test_submit_sends_and_clears() {
        let mut fx = started_fixture();
        for c in "A glacier city".chars() {
            fx.app.type_char(c);
        }
        assert!(fx.app.submit_input());
        assert!(fx.app.input_buffer().is_empty());

        let effects = fx.drain_effects();
        match &effects[..] {
            [WizardEffect::Chat(request)] => {
                assert_eq!(request.message, "A glacier city");
                assert_eq!(request.thread_id, "t-4");
            }
            other => panic!("unexpected effects {other:?}"),
        }

        // Still processing: a second submit is refused and keeps the text
        for c in "again".chars() {
            fx.app.type_char(c);
        }
        assert!(!fx.app.submit_input());
        assert_eq!(fx.app.input_buffer(), "again");
    }

    #[test]
    fn test_choose_is_one_based() {
        let mut fx = started_fixture();
        fx.app.choose(2);
        let effects = fx.drain_effects();
        match &effects[..] {
            [WizardEffect::Chat(request)] => assert_eq!(request.message, "A drowned city"),
            other => panic!("unexpected effects {other:?}"),
        }

        let mut fx = started_fixture();
        fx.app.choose(9);
        assert!(fx.drain_effects().is_empty());
        assert_eq!(fx.app.status_message(), Some("No choice 9"));
    }

    #[test]
    fn test_handoff_recorded_from_finalize() {
        let mut fx = started_fixture();
        fx.app.dispatch(WizardEvent::Finalized {
            attempt: 0,
            session_id: "stale".into(),
        });
        assert!(fx.app.handoff().is_none());

        fx.app.state.current_phase = Phase::Seed;
        fx.app.dispatch(WizardEvent::SendMessage("An ambush at dawn".into()));
        fx.app.dispatch(WizardEvent::ChatReplied(phase_reply(
            ArtifactKind::StartingScenario,
            json!({"title": "Ash Road", "situation": "Ambush"}),
        )));
        fx.app.dispatch(WizardEvent::ConfirmArtifact);
        assert!(fx.app.is_waiting());

        fx.app.dispatch(WizardEvent::Finalized {
            attempt: 1,
            session_id: "sess-9".into(),
        });
        let handoff = fx.app.handoff().unwrap();
        assert_eq!(handoff.slot, 4);
        assert_eq!(handoff.session_id, "sess-9");
    }

    #[test]
    fn test_older_transcript_reference_opens() {
        let mut fx = started_fixture();
        assert_eq!(fx.app.selected_reference(), None);

        fx.app.state.current_phase = Phase::Character;
        fx.app.dispatch(WizardEvent::ChatReplied(subphase_reply(
            ArtifactKind::CharacterConcept,
            json!({"name": "Ila", "archetype": "Smuggler"}),
        )));
        fx.app.dispatch(WizardEvent::ChatReplied(subphase_reply(
            ArtifactKind::TraitSelection,
            json!({"selected_traits": ["allies", "status", "domain"]}),
        )));
        assert!(fx.app.committed_artifacts().is_empty());
        assert_eq!(fx.app.selected_reference(), Some(1));

        fx.app.reference_prev();
        fx.app.reference_prev();
        assert_eq!(fx.app.selected_reference(), Some(0));
        fx.app.open_reference();
        match fx.app.overlay() {
            Some(Overlay::Viewer(artifact)) => {
                assert_eq!(artifact.kind, ArtifactKind::CharacterConcept)
            }
            other => panic!("expected the concept in the viewer, got {other:?}"),
        }

        fx.app.close_overlay();
        fx.app.reference_next();
        fx.app.reference_next();
        fx.app.open_reference();
        assert!(matches!(
            fx.app.overlay(),
            Some(Overlay::Viewer(artifact)) if artifact.kind == ArtifactKind::TraitSelection
        ));
    }

    #[test]
    fn test_drawer_lists_committed_artifacts() {
        let mut fx = started_fixture();
        assert!(fx.app.committed_artifacts().is_empty());

        fx.app.dispatch(WizardEvent::SendMessage("Glacier".into()));
        fx.app.dispatch(WizardEvent::ChatReplied(phase_reply(
            ArtifactKind::WorldDocument,
            json!({"world_name": "Rime"}),
        )));
        fx.app.dispatch(WizardEvent::ConfirmArtifact);

        let committed = fx.app.committed_artifacts();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].kind, ArtifactKind::WorldDocument);

        fx.app.toggle_drawer();
        fx.app.open_drawer_selection();
        assert!(matches!(fx.app.overlay(), Some(Overlay::Viewer(a)) if a.kind == ArtifactKind::WorldDocument));
    }

    #[test]
    fn test_unicode_editing() {
        let mut fx = fixture();
        for c in "héllo".chars() {
            fx.app.type_char(c);
        }
        fx.app.cursor_left();
        fx.app.backspace();
        assert_eq!(fx.app.input_buffer(), "hélo");
        fx.app.cursor_home();
        fx.app.delete();
        assert_eq!(fx.app.input_buffer(), "élo");
    }
}
