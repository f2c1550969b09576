//! Testing utilities for the wizard.
//!
//! This module provides tools for integration testing:
//! - `MockBackend` for deterministic runs without a live backend
//! - `TestHarness` for driving the reducer directly
//! - Assertion helpers for verifying wizard state

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use saga_api::{
    ArtifactKind, BootstrapResponse, ChatReply, ChatRequest, Choice, Error, Phase, ResumeState,
    SlotSummary, StartResponse,
};
use serde_json::Value;
use tokio::sync::Notify;

use crate::machine::{reduce, WizardEffect, WizardEvent, WizardState};
use crate::phase::Stage;
use crate::worker::StoryBackend;

/// One call received by [`MockBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    StartSetup { slot: u32, model: Option<String> },
    ResumeSetup { slot: u32 },
    ResetSlot { slot: u32 },
    ListSlots,
    Chat(ChatRequest),
    Transition { slot: u32 },
    ContinueNarrative { slot: u32, user_text: String },
}

struct MockInner {
    thread_id: String,
    welcome: Option<String>,
    replies: VecDeque<Result<ChatReply, String>>,
    resume: ResumeState,
    slots: Vec<SlotSummary>,
    session_id: String,
    finalize_error: Option<String>,
    hold_finalize: bool,
    calls: Vec<BackendCall>,
}

/// A backend that returns scripted replies and records every call.
pub struct MockBackend {
    inner: Mutex<MockInner>,
    release: Notify,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockInner {
                thread_id: "mock-thread".to_string(),
                welcome: Some("Welcome. What kind of world shall we build?".to_string()),
                replies: VecDeque::new(),
                resume: ResumeState::default(),
                slots: Vec::new(),
                session_id: "mock-session".to_string(),
                finalize_error: None,
                hold_finalize: false,
                calls: Vec::new(),
            }),
            release: Notify::new(),
        }
    }

    /// Add a chat reply to the queue.
    pub fn queue_reply(&self, reply: ChatReply) -> &Self {
        self.lock().replies.push_back(Ok(reply));
        self
    }

    /// Make the next chat call fail with a network error.
    pub fn queue_failure(&self, message: impl Into<String>) -> &Self {
        self.lock().replies.push_back(Err(message.into()));
        self
    }

    pub fn set_resume(&self, resume: ResumeState) {
        self.lock().resume = resume;
    }

    pub fn set_slots(&self, slots: Vec<SlotSummary>) {
        self.lock().slots = slots;
    }

    pub fn set_session_id(&self, session_id: impl Into<String>) {
        self.lock().session_id = session_id.into();
    }

    /// Make the bootstrap call fail.
    pub fn fail_finalize(&self, message: impl Into<String>) {
        self.lock().finalize_error = Some(message.into());
    }

    pub fn clear_finalize_failure(&self) {
        self.lock().finalize_error = None;
    }

    /// Block the transition call until [`MockBackend::release_finalize`].
    pub fn hold_finalize(&self) {
        self.lock().hold_finalize = true;
    }

    pub fn release_finalize(&self) {
        self.lock().hold_finalize = false;
        self.release.notify_waiters();
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Chat(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn transition_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Transition { .. }))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        // A panicking test thread must not hide the calls recorded so far.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: BackendCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl StoryBackend for MockBackend {
    async fn start_setup(&self, slot: u32, model: Option<&str>) -> Result<StartResponse, Error> {
        self.record(BackendCall::StartSetup {
            slot,
            model: model.map(str::to_string),
        });
        let inner = self.lock();
        Ok(StartResponse {
            thread_id: inner.thread_id.clone(),
            welcome_message: inner.welcome.clone(),
            welcome_choices: vec![
                Choice::new("A city built on a glacier"),
                Choice::new("An archipelago of drowned gods"),
            ],
        })
    }

    async fn resume_setup(&self, slot: u32) -> Result<ResumeState, Error> {
        self.record(BackendCall::ResumeSetup { slot });
        Ok(self.lock().resume.clone())
    }

    async fn reset_slot(&self, slot: u32) -> Result<(), Error> {
        self.record(BackendCall::ResetSlot { slot });
        let mut inner = self.lock();
        inner.resume = ResumeState::default();
        inner.slots.retain(|s| s.slot != slot);
        Ok(())
    }

    async fn list_slots(&self) -> Result<Vec<SlotSummary>, Error> {
        self.record(BackendCall::ListSlots);
        Ok(self.lock().slots.clone())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, Error> {
        self.record(BackendCall::Chat(request.clone()));
        match self.lock().replies.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(Error::Network(message)),
            None => Ok(message_reply("The guide has nothing more to say.")),
        }
    }

    async fn transition(&self, slot: u32) -> Result<(), Error> {
        self.record(BackendCall::Transition { slot });
        loop {
            let released = self.release.notified();
            let held = self.lock().hold_finalize;
            if !held {
                return Ok(());
            }
            released.await;
        }
    }

    async fn continue_narrative(
        &self,
        slot: u32,
        user_text: &str,
    ) -> Result<BootstrapResponse, Error> {
        self.record(BackendCall::ContinueNarrative {
            slot,
            user_text: user_text.to_string(),
        });
        let inner = self.lock();
        match &inner.finalize_error {
            Some(message) => Err(Error::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(BootstrapResponse {
                session_id: inner.session_id.clone(),
            }),
        }
    }
}

// ============================================================================
// Reply builders
// ============================================================================

pub fn message_reply(text: impl Into<String>) -> ChatReply {
    ChatReply::Message {
        message: text.into(),
        choices: Vec::new(),
    }
}

pub fn phase_reply(kind: ArtifactKind, data: Value) -> ChatReply {
    ChatReply::PhaseComplete {
        phase: kind.phase(),
        artifact: kind,
        data,
        message: None,
    }
}

pub fn subphase_reply(kind: ArtifactKind, data: Value) -> ChatReply {
    ChatReply::SubphaseComplete {
        artifact: kind,
        data,
        message: None,
    }
}

// ============================================================================
// Reducer harness
// ============================================================================

/// Drives the reducer directly and keeps every emitted effect.
pub struct TestHarness {
    pub state: WizardState,
    pub effects: Vec<WizardEffect>,
}

impl TestHarness {
    /// A harness with a started session on `slot`.
    pub fn new(slot: u32) -> Self {
        let mut harness = Self::unstarted(slot);
        harness.apply(WizardEvent::SessionStarted(StartResponse {
            thread_id: "test-thread".to_string(),
            welcome_message: Some("Welcome.".to_string()),
            welcome_choices: Vec::new(),
        }));
        harness
    }

    /// A harness with no session yet.
    pub fn unstarted(slot: u32) -> Self {
        Self {
            state: WizardState::new(slot),
            effects: Vec::new(),
        }
    }

    /// Apply an event and return the effects it produced.
    pub fn apply(&mut self, event: WizardEvent) -> Vec<WizardEffect> {
        let effects = reduce(&mut self.state, event);
        self.effects.extend(effects.iter().cloned());
        effects
    }

    pub fn reply(&mut self, reply: ChatReply) -> Vec<WizardEffect> {
        self.apply(WizardEvent::ChatReplied(reply))
    }

    /// Every chat request emitted so far.
    pub fn chat_requests(&self) -> Vec<&ChatRequest> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                WizardEffect::Chat(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn last_chat(&self) -> Option<&ChatRequest> {
        self.chat_requests().into_iter().last()
    }

    /// Number of effects that would hit the network.
    pub fn network_calls(&self) -> usize {
        self.effects
            .iter()
            .filter(|effect| {
                matches!(
                    effect,
                    WizardEffect::StartSession { .. }
                        | WizardEffect::ResumeSession { .. }
                        | WizardEffect::Chat(_)
                        | WizardEffect::Finalize { .. }
                )
            })
            .count()
    }

    /// Walk the setting phase to a confirmed world named `world_name`.
    pub fn complete_setting(&mut self, world_name: &str) {
        self.reply(phase_reply(
            ArtifactKind::WorldDocument,
            serde_json::json!({ "world_name": world_name }),
        ));
        self.apply(WizardEvent::ConfirmArtifact);
        self.reply(message_reply("Now, who are you in this world?"));
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

#[track_caller]
pub fn assert_phase(harness: &TestHarness, phase: Phase) {
    assert_eq!(
        harness.state.current_phase, phase,
        "Expected phase {phase}, got {}",
        harness.state.current_phase
    );
}

#[track_caller]
pub fn assert_stage(harness: &TestHarness, stage: Stage) {
    assert_eq!(
        harness.state.stage(),
        stage,
        "Expected stage {stage}, got {}",
        harness.state.stage()
    );
}

/// Assert the pending artifact has the given kind.
#[track_caller]
pub fn assert_pending(harness: &TestHarness, kind: ArtifactKind) {
    match &harness.state.pending {
        Some(artifact) => assert_eq!(artifact.kind, kind, "Unexpected pending artifact"),
        None => panic!("Expected a pending {kind} artifact, found none"),
    }
}

#[track_caller]
pub fn assert_no_pending(harness: &TestHarness) {
    assert!(
        harness.state.pending.is_none(),
        "Expected no pending artifact, found {:?}",
        harness.state.pending
    );
}

#[track_caller]
pub fn assert_idle(harness: &TestHarness) {
    assert!(
        !harness.state.is_processing(),
        "Expected no request in flight"
    );
}
