//! The wizard state machine.
//!
//! [`reduce`] applies one [`WizardEvent`] to a [`WizardState`] and returns the
//! [`WizardEffect`]s a runtime must carry out. It performs no I/O; results of
//! effects come back as further events.

use std::fmt;

use chrono::{DateTime, Utc};
use saga_api::{ArtifactKind, ChatReply, ChatRequest, Choice, Phase, ResumeState, StartResponse};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::artifact::{Artifact, WizardData};
use crate::message::{Message, Role};
use crate::normalize::extract_subphase_record;
use crate::phase::{CharacterStep, PhaseStatus, Stage};
use crate::store::PendingBootstrap;
use crate::traits::{
    mentions_trait_selection, suggest_from_concept, suggest_from_text, TraitConfirm, TraitId,
    TraitSelector, REQUIRED_TRAITS,
};

/// Sent after a subphase or phase artifact is accepted to fetch the next prompt.
pub const SYSTEM_PROCEED: &str = "[SYSTEM] Artifact confirmed, proceed";

/// Progress of the transition + bootstrap sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeStatus {
    Idle,
    Running {
        attempt: u32,
        started_at: DateTime<Utc>,
    },
    Failed {
        attempt: u32,
        error: String,
    },
    Complete {
        session_id: String,
    },
}

/// A backend request that can fail with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    StartSession,
    ResumeSession,
    Chat,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::StartSession => f.write_str("Starting the session"),
            Operation::ResumeSession => f.write_str("Resuming the session"),
            Operation::Chat => f.write_str("Sending the message"),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum WizardEvent {
    // ===== User =====
    StartSession,
    ResumeSession,
    SendMessage(String),
    SelectChoice(usize),
    /// Ask the backend to emit the current phase's artifact unconditionally.
    AcceptFate,
    ToggleTrait(TraitId),
    ConfirmTraits,
    ConfirmArtifact,
    ReviseArtifact,
    CancelFinalize,
    RetryFinalize,
    DismissNotification,

    // ===== Backend =====
    SessionStarted(StartResponse),
    SessionResumed(ResumeState),
    ChatReplied(ChatReply),
    RequestFailed { operation: Operation, error: String },
    Finalized { attempt: u32, session_id: String },
    FinalizeFailed { attempt: u32, error: String },
    FinalizeCancelled { attempt: u32 },
}

impl WizardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WizardEvent::StartSession => "start_session",
            WizardEvent::ResumeSession => "resume_session",
            WizardEvent::SendMessage(_) => "send_message",
            WizardEvent::SelectChoice(_) => "select_choice",
            WizardEvent::AcceptFate => "accept_fate",
            WizardEvent::ToggleTrait(_) => "toggle_trait",
            WizardEvent::ConfirmTraits => "confirm_traits",
            WizardEvent::ConfirmArtifact => "confirm_artifact",
            WizardEvent::ReviseArtifact => "revise_artifact",
            WizardEvent::CancelFinalize => "cancel_finalize",
            WizardEvent::RetryFinalize => "retry_finalize",
            WizardEvent::DismissNotification => "dismiss_notification",
            WizardEvent::SessionStarted(_) => "session_started",
            WizardEvent::SessionResumed(_) => "session_resumed",
            WizardEvent::ChatReplied(_) => "chat_replied",
            WizardEvent::RequestFailed { .. } => "request_failed",
            WizardEvent::Finalized { .. } => "finalized",
            WizardEvent::FinalizeFailed { .. } => "finalize_failed",
            WizardEvent::FinalizeCancelled { .. } => "finalize_cancelled",
        }
    }

    /// Events that may issue a request and so respect the processing guard.
    fn is_guarded(&self) -> bool {
        matches!(
            self,
            WizardEvent::StartSession
                | WizardEvent::ResumeSession
                | WizardEvent::SendMessage(_)
                | WizardEvent::SelectChoice(_)
                | WizardEvent::AcceptFate
                | WizardEvent::ConfirmTraits
                | WizardEvent::ConfirmArtifact
                | WizardEvent::ReviseArtifact
                | WizardEvent::RetryFinalize
        )
    }
}

/// Work the runtime must perform on behalf of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEffect {
    StartSession { slot: u32, model: Option<String> },
    ResumeSession { slot: u32 },
    Chat(ChatRequest),
    /// Run transition then bootstrap for `slot`.
    Finalize { slot: u32, attempt: u32 },
    CancelFinalize { attempt: u32 },
    PersistActiveSlot(u32),
    PersistBootstrap(PendingBootstrap),
    /// Leave the wizard for the narrative session.
    HandOff { slot: u32, session_id: String },
}

impl WizardEffect {
    /// The outcome to feed back when this effect can never be run.
    ///
    /// Only request effects hold the processing guard, so only they map to
    /// a failure event.
    pub fn failure(&self, error: impl Into<String>) -> Option<WizardEvent> {
        let error = error.into();
        let operation = match self {
            WizardEffect::StartSession { .. } => Operation::StartSession,
            WizardEffect::ResumeSession { .. } => Operation::ResumeSession,
            WizardEffect::Chat(_) => Operation::Chat,
            WizardEffect::Finalize { attempt, .. } => {
                return Some(WizardEvent::FinalizeFailed {
                    attempt: *attempt,
                    error,
                })
            }
            WizardEffect::CancelFinalize { .. }
            | WizardEffect::PersistActiveSlot(_)
            | WizardEffect::PersistBootstrap(_)
            | WizardEffect::HandOff { .. } => return None,
        };
        Some(WizardEvent::RequestFailed { operation, error })
    }
}

/// Everything the wizard holds for one slot.
#[derive(Debug, Clone)]
pub struct WizardState {
    pub slot: u32,
    pub thread_id: Option<String>,
    pub current_phase: Phase,
    pub data: WizardData,
    /// The single unconfirmed artifact, if any.
    pub pending: Option<Artifact>,
    pub choices: Vec<Choice>,
    pub messages: Vec<Message>,
    /// Open while the user is picking traits.
    pub trait_selector: Option<TraitSelector>,
    pub finalize: FinalizeStatus,
    pub notification: Option<String>,
    pub model: Option<String>,
    pub legacy_trait_heuristic: bool,
    processing: bool,
    finalize_attempts: u32,
}

impl WizardState {
    pub fn new(slot: u32) -> Self {
        Self {
            slot,
            thread_id: None,
            current_phase: Phase::Setting,
            data: WizardData::default(),
            pending: None,
            choices: Vec::new(),
            messages: Vec::new(),
            trait_selector: None,
            finalize: FinalizeStatus::Idle,
            notification: None,
            model: None,
            legacy_trait_heuristic: false,
            processing: false,
            finalize_attempts: 0,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_legacy_trait_heuristic(mut self, enabled: bool) -> Self {
        self.legacy_trait_heuristic = enabled;
        self
    }

    /// A request is in flight; guarded events are ignored.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Whether free text and choices are accepted.
    pub fn input_enabled(&self) -> bool {
        !self.processing
            && self.pending.is_none()
            && self.thread_id.is_some()
            && self.finalize == FinalizeStatus::Idle
    }

    /// Artifacts referenced from the transcript, oldest first.
    pub fn artifact_references(&self) -> Vec<&Artifact> {
        self.messages
            .iter()
            .filter_map(|message| message.artifact.as_ref())
            .collect()
    }

    pub fn stage(&self) -> Stage {
        if matches!(self.finalize, FinalizeStatus::Complete { .. }) {
            return Stage::Done;
        }
        match self.current_phase {
            Phase::Setting => Stage::Setting,
            Phase::Character if self.data.character.is_some() => {
                Stage::Character(CharacterStep::Complete)
            }
            Phase::Character => Stage::Character(self.data.character_state.step()),
            Phase::Seed => Stage::Seed,
        }
    }

    pub fn phase_status(&self, phase: Phase) -> PhaseStatus {
        if self.data.has_phase(phase) || phase < self.current_phase {
            PhaseStatus::Completed
        } else if phase == self.current_phase {
            PhaseStatus::Active
        } else {
            PhaseStatus::Locked
        }
    }

    /// Collected data as sent with each chat turn.
    pub fn context_data(&self) -> Value {
        serde_json::to_value(&self.data).unwrap_or_else(|e| {
            warn!(error = %e, "failed to serialize wizard data");
            Value::Object(Default::default())
        })
    }

    /// Time spent in the current finalize attempt.
    pub fn finalize_elapsed(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        match &self.finalize {
            FinalizeStatus::Running { started_at, .. } => (now - *started_at).to_std().ok(),
            _ => None,
        }
    }

    /// Fraction of the soft expectation used, capped below completion.
    pub fn finalize_progress(
        &self,
        now: DateTime<Utc>,
        expectation: std::time::Duration,
    ) -> Option<f64> {
        let elapsed = self.finalize_elapsed(now)?;
        if expectation.is_zero() {
            return Some(0.99);
        }
        Some((elapsed.as_secs_f64() / expectation.as_secs_f64()).min(0.99))
    }

    fn reset_session(&mut self) {
        self.current_phase = Phase::Setting;
        self.data = WizardData::default();
        self.pending = None;
        self.choices.clear();
        self.messages.clear();
        self.trait_selector = None;
        self.finalize = FinalizeStatus::Idle;
    }

    fn chat_request(&self, message: String, accept_fate: bool) -> Option<ChatRequest> {
        let thread_id = self.thread_id.clone()?;
        Some(ChatRequest {
            slot: self.slot,
            thread_id,
            message,
            model: self.model.clone(),
            current_phase: self.current_phase,
            context_data: self.context_data(),
            accept_fate,
        })
    }

    fn send_chat(&mut self, message: String, accept_fate: bool) -> Vec<WizardEffect> {
        match self.chat_request(message, accept_fate) {
            Some(request) => {
                self.processing = true;
                self.choices.clear();
                vec![WizardEffect::Chat(request)]
            }
            None => {
                warn!(slot = self.slot, "chat requested without a session");
                self.notification = Some("No active session for this slot".to_string());
                Vec::new()
            }
        }
    }

    fn start_finalize(&mut self) -> Vec<WizardEffect> {
        self.finalize_attempts += 1;
        let attempt = self.finalize_attempts;
        self.finalize = FinalizeStatus::Running {
            attempt,
            started_at: Utc::now(),
        };
        self.processing = true;
        info!(slot = self.slot, attempt, "finalizing story setup");
        vec![WizardEffect::Finalize {
            slot: self.slot,
            attempt,
        }]
    }

    fn running_attempt(&self) -> Option<u32> {
        match self.finalize {
            FinalizeStatus::Running { attempt, .. } => Some(attempt),
            _ => None,
        }
    }

    // Return to the confirmed seed so it can be edited or re-confirmed.
    fn abandon_finalize(&mut self) {
        self.finalize = FinalizeStatus::Idle;
        self.processing = false;
        self.pending = self.data.artifact_for(Phase::Seed);
    }
}

/// Apply one event.
pub fn reduce(state: &mut WizardState, event: WizardEvent) -> Vec<WizardEffect> {
    if state.processing && event.is_guarded() {
        debug!(event = event.name(), "ignoring event while a request is in flight");
        return Vec::new();
    }

    match event {
        WizardEvent::StartSession => {
            state.processing = true;
            vec![
                WizardEffect::PersistActiveSlot(state.slot),
                WizardEffect::StartSession {
                    slot: state.slot,
                    model: state.model.clone(),
                },
            ]
        }

        WizardEvent::ResumeSession => {
            state.processing = true;
            vec![
                WizardEffect::PersistActiveSlot(state.slot),
                WizardEffect::ResumeSession { slot: state.slot },
            ]
        }

        WizardEvent::SessionStarted(start) => {
            state.processing = false;
            state.reset_session();
            state.thread_id = Some(start.thread_id);
            if let Some(welcome) = start.welcome_message.filter(|m| !m.is_empty()) {
                state.messages.push(Message::assistant(welcome));
            }
            state.choices = start.welcome_choices;
            info!(slot = state.slot, "setup session started");
            Vec::new()
        }

        WizardEvent::SessionResumed(resume) => apply_resume(state, resume),

        WizardEvent::SendMessage(text) => {
            let text = text.trim().to_string();
            if text.is_empty() || !state.input_enabled() {
                debug!("ignoring message while input is disabled");
                return Vec::new();
            }
            state.messages.push(Message::user(text.clone()));
            state.send_chat(text, false)
        }

        WizardEvent::SelectChoice(index) => {
            if !state.input_enabled() {
                debug!("ignoring choice while input is disabled");
                return Vec::new();
            }
            let Some(choice) = state.choices.get(index).cloned() else {
                debug!(index, "ignoring out-of-range choice");
                return Vec::new();
            };
            state.messages.push(Message::user(choice.label.clone()));
            state.send_chat(choice.label, false)
        }

        WizardEvent::AcceptFate => {
            if !state.input_enabled() {
                return Vec::new();
            }
            state.messages.push(Message::system("You let fate decide."));
            state.send_chat(String::new(), true)
        }

        WizardEvent::ToggleTrait(id) => {
            if let Some(selector) = state.trait_selector.as_mut() {
                selector.toggle(id);
            }
            Vec::new()
        }

        WizardEvent::ConfirmTraits => confirm_traits(state),

        WizardEvent::ConfirmArtifact => confirm_artifact(state),

        WizardEvent::ReviseArtifact => {
            if let Some(artifact) = state.pending.take() {
                debug!(kind = %artifact.kind, "artifact sent back for revision");
                state
                    .messages
                    .push(Message::system(format!("{} set aside for revision.", artifact.kind.label())));
            }
            Vec::new()
        }

        WizardEvent::CancelFinalize => match state.finalize.clone() {
            FinalizeStatus::Running { attempt, .. } => {
                info!(attempt, "finalize cancelled by user");
                state.abandon_finalize();
                vec![WizardEffect::CancelFinalize { attempt }]
            }
            FinalizeStatus::Failed { .. } => {
                state.abandon_finalize();
                Vec::new()
            }
            _ => Vec::new(),
        },

        WizardEvent::RetryFinalize => {
            if matches!(state.finalize, FinalizeStatus::Failed { .. }) && state.data.seed.is_some() {
                state.start_finalize()
            } else {
                Vec::new()
            }
        }

        WizardEvent::DismissNotification => {
            state.notification = None;
            Vec::new()
        }

        WizardEvent::ChatReplied(reply) => {
            state.processing = false;
            apply_reply(state, reply)
        }

        WizardEvent::RequestFailed { operation, error } => {
            error!(%operation, %error, "request failed");
            state.processing = false;
            state.notification = Some(format!("{operation} failed: {error}"));
            Vec::new()
        }

        WizardEvent::Finalized {
            attempt,
            session_id,
        } => {
            if state.running_attempt() != Some(attempt) {
                warn!(attempt, "ignoring outcome of a stale finalize attempt");
                return Vec::new();
            }
            info!(slot = state.slot, %session_id, "story setup finalized");
            state.processing = false;
            state.finalize = FinalizeStatus::Complete {
                session_id: session_id.clone(),
            };
            vec![
                WizardEffect::PersistBootstrap(PendingBootstrap::new(state.slot, session_id.clone())),
                WizardEffect::HandOff {
                    slot: state.slot,
                    session_id,
                },
            ]
        }

        WizardEvent::FinalizeFailed { attempt, error } => {
            if state.running_attempt() != Some(attempt) {
                warn!(attempt, "ignoring failure of a stale finalize attempt");
                return Vec::new();
            }
            error!(attempt, %error, "finalize failed");
            state.processing = false;
            state.finalize = FinalizeStatus::Failed { attempt, error };
            Vec::new()
        }

        WizardEvent::FinalizeCancelled { attempt } => {
            if state.running_attempt() == Some(attempt) {
                state.abandon_finalize();
            } else {
                debug!(attempt, "finalize cancellation acknowledged");
            }
            Vec::new()
        }
    }
}

fn apply_resume(state: &mut WizardState, resume: ResumeState) -> Vec<WizardEffect> {
    state.processing = false;

    let Some(thread_id) = resume.thread_id else {
        info!(slot = state.slot, "nothing to resume, starting fresh");
        state.processing = true;
        return vec![WizardEffect::StartSession {
            slot: state.slot,
            model: state.model.clone(),
        }];
    };

    state.reset_session();
    state.thread_id = Some(thread_id);
    state.current_phase = resume.current_phase.unwrap_or(Phase::Setting);
    state.data = WizardData::from_resume(resume.wizard_data);
    state.messages = resume
        .messages
        .into_iter()
        .map(|entry| Message::new(Role::from_wire(&entry.role), entry.content))
        .collect();
    state.choices = resume.choices;

    // A committed artifact for the current phase was never finalized or advanced.
    if state.data.has_phase(state.current_phase) {
        state.pending = state.data.artifact_for(state.current_phase);
    } else if state.stage() == Stage::Character(CharacterStep::Traits) {
        open_trait_selector(state);
    }

    info!(slot = state.slot, phase = %state.current_phase, "setup session resumed");
    Vec::new()
}

fn confirm_traits(state: &mut WizardState) -> Vec<WizardEffect> {
    let Some(selector) = state.trait_selector.as_ref() else {
        debug!("no trait selector open");
        return Vec::new();
    };

    let message = match selector.confirm() {
        TraitConfirm::Valid(traits) => {
            let names: Vec<&str> = traits.iter().map(|t| t.title()).collect();
            format!("I choose these traits: {}.", names.join(", "))
        }
        TraitConfirm::Invalid { selected, count } => {
            debug!(count, "trait selection needs discussion");
            invalid_traits_message(&selected, count)
        }
    };

    state.messages.push(Message::user(message.clone()));
    state.send_chat(message, false)
}

fn invalid_traits_message(selected: &[TraitId], count: usize) -> String {
    if count == 0 {
        return format!(
            "I haven't picked any traits yet. Can you help me choose {REQUIRED_TRAITS}?"
        );
    }
    let names: Vec<&str> = selected.iter().map(|t| t.title()).collect();
    format!(
        "I've selected {count} trait{} ({}) but need exactly {REQUIRED_TRAITS}. Can you help me decide?",
        if count == 1 { "" } else { "s" },
        names.join(", ")
    )
}

fn confirm_artifact(state: &mut WizardState) -> Vec<WizardEffect> {
    let Some(artifact) = state.pending.take() else {
        debug!("nothing to confirm");
        return Vec::new();
    };

    let phase = state.current_phase;
    let expected = phase.expected_artifact();
    if artifact.kind != expected {
        warn!(
            phase = %phase,
            expected = %expected,
            got = %artifact.kind,
            "discarding artifact that does not match the current phase"
        );
        return Vec::new();
    }

    if let Err(e) = state.data.commit(phase, &artifact.data) {
        warn!(phase = %phase, error = %e, "artifact payload could not be read");
        state.notification = Some(format!(
            "The {} could not be read; ask for a revision.",
            artifact.kind.label()
        ));
        return Vec::new();
    }

    state.messages.push(
        Message::system(format!("{} confirmed.", artifact.kind.label())).with_artifact(artifact),
    );
    state.trait_selector = None;
    state.choices.clear();

    match phase.next() {
        Some(next) => {
            info!(from = %phase, to = %next, "phase complete");
            state.current_phase = next;
            state.send_chat(SYSTEM_PROCEED.to_string(), false)
        }
        None => state.start_finalize(),
    }
}

fn apply_reply(state: &mut WizardState, reply: ChatReply) -> Vec<WizardEffect> {
    match reply {
        ChatReply::PhaseComplete {
            artifact,
            data,
            phase,
            message,
        } => {
            push_assistant(state, message);
            if let Some(old) = &state.pending {
                debug!(kind = %old.kind, "replacing pending artifact");
            }
            if phase.is_some_and(|p| p != state.current_phase) {
                debug!(reported = ?phase, current = %state.current_phase, "phase mismatch in reply");
            }
            state.pending = Some(Artifact::new(artifact, data));
            state.choices.clear();
            state.trait_selector = None;
            Vec::new()
        }

        ChatReply::SubphaseComplete {
            artifact,
            data,
            message,
        } => {
            push_assistant(state, message);
            state.choices.clear();

            let record = extract_subphase_record(&artifact, &data);
            match state.data.character_state.merge(&artifact, record.clone()) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(kind = %artifact, "unexpected subphase artifact");
                    return Vec::new();
                }
                Err(e) => {
                    warn!(kind = %artifact, error = %e, "subphase payload could not be read");
                    state.notification =
                        Some(format!("The {} could not be read.", artifact.label()));
                    return Vec::new();
                }
            }

            state.messages.push(
                Message::system(format!("{} saved.", artifact.label()))
                    .with_artifact(Artifact::new(artifact.clone(), record)),
            );

            match artifact {
                ArtifactKind::CharacterConcept => {
                    open_trait_selector(state);
                    state.messages.push(Message::assistant(trait_intro(state)));
                    Vec::new()
                }
                _ => {
                    state.trait_selector = None;
                    state.send_chat(SYSTEM_PROCEED.to_string(), false)
                }
            }
        }

        ChatReply::Message { message, choices } => {
            let offer_traits = state.legacy_trait_heuristic
                && state.trait_selector.is_none()
                && state.stage() == Stage::Character(CharacterStep::Traits)
                && mentions_trait_selection(&message);

            if offer_traits {
                debug!("assistant text asks for traits; opening selector");
                state.trait_selector = Some(TraitSelector::with_suggestions(suggest_from_text(
                    &message,
                )));
            }
            push_assistant(state, Some(message));
            state.choices = choices;
            Vec::new()
        }
    }
}

fn push_assistant(state: &mut WizardState, message: Option<String>) {
    if let Some(text) = message.filter(|m| !m.trim().is_empty()) {
        state.messages.push(Message::assistant(text));
    }
}

fn open_trait_selector(state: &mut WizardState) {
    let suggestions = match &state.data.character_state.concept {
        Some(concept) => {
            let structured = suggest_from_concept(concept);
            if structured.is_empty() {
                concept
                    .summary
                    .as_deref()
                    .map(suggest_from_text)
                    .unwrap_or_default()
            } else {
                structured
            }
        }
        None => Vec::new(),
    };
    state.trait_selector = Some(TraitSelector::with_suggestions(suggestions));
}

fn trait_intro(state: &WizardState) -> String {
    let mut text = format!(
        "Your concept is taking shape. Now choose exactly {REQUIRED_TRAITS} background traits \
         that define who stands with you, what you hold, and what hunts you."
    );
    if let Some(selector) = &state.trait_selector {
        if !selector.selected().is_empty() {
            let names: Vec<&str> = selector.selected().iter().map(|t| t.title()).collect();
            text.push_str(&format!(
                " Based on your concept I've pre-selected {}; change them freely.",
                names.join(", ")
            ));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn started(slot: u32) -> WizardState {
        let mut state = WizardState::new(slot);
        reduce(
            &mut state,
            WizardEvent::SessionStarted(StartResponse {
                thread_id: "t-1".into(),
                welcome_message: Some("Welcome, traveler.".into()),
                welcome_choices: vec![Choice::new("A drowned empire")],
            }),
        );
        state
    }

    fn reply_artifact(kind: ArtifactKind, data: Value) -> WizardEvent {
        WizardEvent::ChatReplied(ChatReply::PhaseComplete {
            artifact: kind,
            data,
            phase: None,
            message: None,
        })
    }

    fn subphase(kind: ArtifactKind, data: Value) -> WizardEvent {
        WizardEvent::ChatReplied(ChatReply::SubphaseComplete {
            artifact: kind,
            data,
            message: None,
        })
    }

    fn only_chat(effects: &[WizardEffect]) -> &ChatRequest {
        match effects {
            [WizardEffect::Chat(request)] => request,
            other => panic!("expected a single chat effect, got {other:?}"),
        }
    }

    #[test]
    fn test_start_persists_slot_and_sets_guard() {
        let mut state = WizardState::new(4).with_model(Some("m".into()));
        let effects = reduce(&mut state, WizardEvent::StartSession);
        assert_eq!(
            effects,
            vec![
                WizardEffect::PersistActiveSlot(4),
                WizardEffect::StartSession {
                    slot: 4,
                    model: Some("m".into())
                }
            ]
        );
        assert!(state.is_processing());
        assert!(reduce(&mut state, WizardEvent::StartSession).is_empty());
    }

    #[test]
    fn test_session_started_shows_welcome() {
        let state = started(1);
        assert_eq!(state.thread_id.as_deref(), Some("t-1"));
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.choices.len(), 1);
        assert!(state.input_enabled());
        assert_eq!(state.stage(), Stage::Setting);
    }

    #[test]
    fn test_send_message_builds_request() {
        let mut state = started(2);
        let effects = reduce(&mut state, WizardEvent::SendMessage("  A glacier city ".into()));
        let request = only_chat(&effects);
        assert_eq!(request.message, "A glacier city");
        assert_eq!(request.thread_id, "t-1");
        assert_eq!(request.current_phase, Phase::Setting);
        assert!(!request.accept_fate);
        assert!(state.choices.is_empty());
        assert!(!state.input_enabled());
    }

    #[test]
    fn test_blank_message_is_ignored() {
        let mut state = started(1);
        assert!(reduce(&mut state, WizardEvent::SendMessage("   ".into())).is_empty());
        assert!(!state.is_processing());
    }

    #[test]
    fn test_select_choice_sends_label() {
        let mut state = started(1);
        assert!(reduce(&mut state, WizardEvent::SelectChoice(7)).is_empty());

        let effects = reduce(&mut state, WizardEvent::SelectChoice(0));
        assert_eq!(only_chat(&effects).message, "A drowned empire");
    }

    #[test]
    fn test_accept_fate_sends_empty_flagged_message() {
        let mut state = started(1);
        let effects = reduce(&mut state, WizardEvent::AcceptFate);
        let request = only_chat(&effects);
        assert!(request.message.is_empty());
        assert!(request.accept_fate);
    }

    #[test]
    fn test_phase_complete_sets_pending_and_blocks_input() {
        let mut state = started(1);
        reduce(&mut state, WizardEvent::SendMessage("go".into()));
        reduce(
            &mut state,
            reply_artifact(ArtifactKind::WorldDocument, json!({"world_name": "Veridia"})),
        );

        assert!(!state.is_processing());
        assert!(state.pending.is_some());
        assert!(!state.input_enabled());
        assert!(reduce(&mut state, WizardEvent::SendMessage("more".into())).is_empty());
    }

    #[test]
    fn test_revise_discards_pending() {
        let mut state = started(1);
        reduce(
            &mut state,
            reply_artifact(ArtifactKind::WorldDocument, json!({"world_name": "Veridia"})),
        );
        reduce(&mut state, WizardEvent::ReviseArtifact);
        assert!(state.pending.is_none());
        assert!(state.data.setting.is_none());
        assert!(state.input_enabled());
    }

    #[test]
    fn test_confirm_with_unreadable_payload_keeps_phase() {
        let mut state = started(1);
        reduce(
            &mut state,
            reply_artifact(ArtifactKind::WorldDocument, json!(["not", "an", "object"])),
        );
        let effects = reduce(&mut state, WizardEvent::ConfirmArtifact);
        assert!(effects.is_empty());
        assert_eq!(state.current_phase, Phase::Setting);
        assert!(state.notification.is_some());
    }

    #[test]
    fn test_concept_subphase_opens_selector_locally() {
        let mut state = started(1);
        state.current_phase = Phase::Character;
        let effects = reduce(
            &mut state,
            subphase(
                ArtifactKind::CharacterConcept,
                json!({"character_state": {"concept": {"name": "Ila", "suggested_traits": ["allies", "enemies"]}}}),
            ),
        );

        assert!(effects.is_empty());
        let selector = state.trait_selector.as_ref().unwrap();
        assert_eq!(selector.selected(), &[TraitId::Allies, TraitId::Enemies]);
        assert_eq!(state.stage(), Stage::Character(CharacterStep::Traits));
        let intro = &state.messages.last().unwrap().content;
        assert!(intro.contains("Allies, Enemies"));
    }

    #[test]
    fn test_trait_subphase_requests_next_prompt() {
        let mut state = started(1);
        state.current_phase = Phase::Character;
        reduce(
            &mut state,
            subphase(ArtifactKind::CharacterConcept, json!({"name": "Ila"})),
        );
        for id in [TraitId::Allies, TraitId::Status, TraitId::Domain] {
            reduce(&mut state, WizardEvent::ToggleTrait(id));
        }
        let effects = reduce(&mut state, WizardEvent::ConfirmTraits);
        assert_eq!(
            only_chat(&effects).message,
            "I choose these traits: Allies, Status, Domain."
        );
        assert!(state.trait_selector.is_some());

        let effects = reduce(
            &mut state,
            subphase(
                ArtifactKind::TraitSelection,
                json!({"selected_traits": ["allies", "status", "domain"]}),
            ),
        );
        assert_eq!(only_chat(&effects).message, SYSTEM_PROCEED);
        assert!(state.trait_selector.is_none());
        assert_eq!(state.stage(), Stage::Character(CharacterStep::Wildcard));
    }

    #[test]
    fn test_invalid_trait_confirm_is_conversational() {
        let mut state = started(1);
        state.current_phase = Phase::Character;
        state.trait_selector = Some(TraitSelector::new());
        reduce(&mut state, WizardEvent::ToggleTrait(TraitId::Allies));
        reduce(&mut state, WizardEvent::ToggleTrait(TraitId::Contacts));

        let effects = reduce(&mut state, WizardEvent::ConfirmTraits);
        let message = &only_chat(&effects).message;
        assert!(message.contains("selected 2 traits"));
        assert!(message.contains("Allies, Contacts"));
        assert!(state.data.character_state.trait_selection.is_none());
    }

    #[test]
    fn test_legacy_heuristic_is_opt_in() {
        let text = "Now choose three traits: Allies, Contacts, Patron.";
        let mut concept_ready = started(1);
        concept_ready.current_phase = Phase::Character;
        concept_ready.data.character_state.concept = Some(Default::default());

        let mut off = concept_ready.clone();
        reduce(
            &mut off,
            WizardEvent::ChatReplied(ChatReply::Message {
                message: text.into(),
                choices: vec![],
            }),
        );
        assert!(off.trait_selector.is_none());

        let mut on = concept_ready.with_legacy_trait_heuristic(true);
        reduce(
            &mut on,
            WizardEvent::ChatReplied(ChatReply::Message {
                message: text.into(),
                choices: vec![],
            }),
        );
        assert_eq!(on.trait_selector.unwrap().count(), 3);
    }

    #[test]
    fn test_request_failure_notifies_and_releases_guard() {
        let mut state = started(1);
        reduce(&mut state, WizardEvent::SendMessage("hi".into()));
        let data_before = state.data.clone();
        reduce(
            &mut state,
            WizardEvent::RequestFailed {
                operation: Operation::Chat,
                error: "connection refused".into(),
            },
        );
        assert!(!state.is_processing());
        assert_eq!(state.data, data_before);
        assert!(state.notification.as_ref().unwrap().contains("connection refused"));

        reduce(&mut state, WizardEvent::DismissNotification);
        assert!(state.notification.is_none());
    }

    #[test]
    fn test_resume_without_thread_starts_fresh() {
        let mut state = WizardState::new(3);
        reduce(&mut state, WizardEvent::ResumeSession);
        let effects = reduce(&mut state, WizardEvent::SessionResumed(ResumeState::default()));
        assert_eq!(
            effects,
            vec![WizardEffect::StartSession {
                slot: 3,
                model: None
            }]
        );
        assert!(state.is_processing());
    }

    #[test]
    fn test_resume_adopts_backend_phase() {
        let mut state = WizardState::new(3);
        reduce(&mut state, WizardEvent::ResumeSession);
        reduce(
            &mut state,
            WizardEvent::SessionResumed(ResumeState {
                thread_id: Some("t-9".into()),
                current_phase: Some(Phase::Character),
                wizard_data: Some(json!({
                    "setting": {"world_name": "Ashfall"},
                    "character_state": {"concept": {"name": "Ila", "suggested_traits": ["patron"]}}
                })),
                messages: vec![saga_api::TranscriptEntry {
                    role: "assistant".into(),
                    content: "Welcome back.".into(),
                }],
                choices: vec![],
            }),
        );

        assert_eq!(state.current_phase, Phase::Character);
        assert_eq!(state.phase_status(Phase::Setting), PhaseStatus::Completed);
        assert_eq!(state.phase_status(Phase::Character), PhaseStatus::Active);
        assert_eq!(state.phase_status(Phase::Seed), PhaseStatus::Locked);
        assert_eq!(
            state.trait_selector.as_ref().unwrap().selected(),
            &[TraitId::Patron]
        );
        assert_eq!(state.messages[0].role, Role::Assistant);
    }

    #[test]
    fn test_stale_finalize_outcomes_are_ignored() {
        let mut state = started(1);
        state.current_phase = Phase::Seed;
        reduce(
            &mut state,
            reply_artifact(ArtifactKind::StartingScenario, json!({"title": "The Flood"})),
        );
        reduce(&mut state, WizardEvent::ConfirmArtifact);
        reduce(&mut state, WizardEvent::CancelFinalize);
        reduce(&mut state, WizardEvent::ConfirmArtifact);

        let effects = reduce(
            &mut state,
            WizardEvent::Finalized {
                attempt: 1,
                session_id: "old".into(),
            },
        );
        assert!(effects.is_empty());
        assert!(matches!(state.finalize, FinalizeStatus::Running { attempt: 2, .. }));
    }

    #[test]
    fn test_finalize_failure_and_retry() {
        let mut state = started(1);
        state.current_phase = Phase::Seed;
        reduce(
            &mut state,
            reply_artifact(ArtifactKind::StartingScenario, json!({"title": "The Flood"})),
        );
        reduce(&mut state, WizardEvent::ConfirmArtifact);
        reduce(
            &mut state,
            WizardEvent::FinalizeFailed {
                attempt: 1,
                error: "bootstrap timed out".into(),
            },
        );
        assert!(!state.is_processing());
        assert!(state.data.seed.is_some());

        let effects = reduce(&mut state, WizardEvent::RetryFinalize);
        assert_eq!(effects, vec![WizardEffect::Finalize { slot: 1, attempt: 2 }]);

        let effects = reduce(
            &mut state,
            WizardEvent::Finalized {
                attempt: 2,
                session_id: "s-42".into(),
            },
        );
        assert_eq!(state.stage(), Stage::Done);
        assert!(matches!(effects[0], WizardEffect::PersistBootstrap(_)));
        assert_eq!(
            effects[1],
            WizardEffect::HandOff {
                slot: 1,
                session_id: "s-42".into()
            }
        );
    }

    #[test]
    fn test_undeliverable_requests_release_the_guard() {
        let mut state = started(1);
        let effects = reduce(&mut state, WizardEvent::SendMessage("A frozen sea".into()));
        assert!(state.is_processing());

        let failure = effects[0].failure("worker stopped").unwrap();
        reduce(&mut state, failure);
        assert!(!state.is_processing());
        assert!(state.notification.as_ref().unwrap().contains("worker stopped"));

        state.current_phase = Phase::Seed;
        reduce(
            &mut state,
            reply_artifact(ArtifactKind::StartingScenario, json!({"title": "The Flood"})),
        );
        let effects = reduce(&mut state, WizardEvent::ConfirmArtifact);
        let failure = effects
            .iter()
            .find_map(|effect| effect.failure("worker stopped"))
            .unwrap();
        reduce(&mut state, failure);
        assert!(matches!(state.finalize, FinalizeStatus::Failed { attempt: 1, .. }));
        assert!(!state.is_processing());

        assert!(WizardEffect::PersistActiveSlot(1).failure("x").is_none());
    }

    #[test]
    fn test_finalize_progress_is_capped() {
        let mut state = WizardState::new(1);
        let now = Utc::now();
        state.finalize = FinalizeStatus::Running {
            attempt: 1,
            started_at: now - chrono::Duration::seconds(300),
        };
        let progress = state
            .finalize_progress(now, std::time::Duration::from_secs(600))
            .unwrap();
        assert!((progress - 0.5).abs() < 0.01);

        let late = state
            .finalize_progress(now + chrono::Duration::hours(1), std::time::Duration::from_secs(600))
            .unwrap();
        assert!(late < 1.0);
    }
}
