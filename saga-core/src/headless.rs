//! Headless wizard interface for programmatic use.
//!
//! Wires the reducer to the effect worker without any terminal UI. It's
//! designed for:
//! - Integration tests against a scripted backend
//! - Script-driven setup sessions
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use saga_core::{ClientStore, HeadlessWizard, WizardEvent, WizardState};
//!
//! let api = Arc::new(saga_api::StoryApi::local()?);
//! let mut wizard = HeadlessWizard::new(api, ClientStore::in_memory(), WizardState::new(1));
//! wizard.send(WizardEvent::StartSession).await?;
//! wizard.send(WizardEvent::AcceptFate).await?;
//! if let Some(artifact) = &wizard.state().pending {
//!     println!("pending: {}", artifact.kind);
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::machine::{reduce, WizardEffect, WizardEvent, WizardState};
use crate::store::ClientStore;
use crate::worker::{spawn_worker, StoryBackend};

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("Effect worker stopped")]
    WorkerStopped,
}

/// Where the wizard handed off to once finalize completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandOff {
    pub slot: u32,
    pub session_id: String,
}

/// A wizard driven without a UI.
pub struct HeadlessWizard {
    state: WizardState,
    effect_tx: mpsc::Sender<WizardEffect>,
    event_rx: mpsc::Receiver<WizardEvent>,
    handoff: Option<HandOff>,
}

impl HeadlessWizard {
    /// Create a wizard and spawn its worker on the current runtime.
    pub fn new<B: StoryBackend>(backend: Arc<B>, store: ClientStore, state: WizardState) -> Self {
        let (effect_tx, event_rx) = spawn_worker(backend, store);
        Self {
            state,
            effect_tx,
            event_rx,
            handoff: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Set once the wizard has finalized and handed off.
    pub fn handoff(&self) -> Option<&HandOff> {
        self.handoff.as_ref()
    }

    /// Apply an event and forward its effects without waiting for results.
    pub async fn dispatch(&mut self, event: WizardEvent) -> Result<(), HeadlessError> {
        for effect in reduce(&mut self.state, event) {
            if let WizardEffect::HandOff { slot, session_id } = &effect {
                tracing::info!(slot, %session_id, "handing off to narrative session");
                self.handoff = Some(HandOff {
                    slot: *slot,
                    session_id: session_id.clone(),
                });
            }
            self.effect_tx
                .send(effect)
                .await
                .map_err(|_| HeadlessError::WorkerStopped)?;
        }
        Ok(())
    }

    /// Wait for one result from the worker and apply it.
    pub async fn next_event(&mut self) -> Result<(), HeadlessError> {
        let event = self
            .event_rx
            .recv()
            .await
            .ok_or(HeadlessError::WorkerStopped)?;
        self.dispatch(event).await
    }

    /// Apply results until no request is in flight.
    pub async fn settle(&mut self) -> Result<(), HeadlessError> {
        while self.state.is_processing() {
            self.next_event().await?;
        }
        Ok(())
    }

    /// Apply an event and wait for everything it started to finish.
    pub async fn send(&mut self, event: WizardEvent) -> Result<(), HeadlessError> {
        self.dispatch(event).await?;
        self.settle().await
    }

    /// Stop the worker once every queued effect has run.
    ///
    /// Results still arriving are dropped.
    pub async fn shutdown(self) {
        let Self {
            effect_tx,
            mut event_rx,
            ..
        } = self;
        drop(effect_tx);
        while event_rx.recv().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{message_reply, MockBackend};

    #[tokio::test]
    async fn test_start_and_chat() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_reply(message_reply("Tell me more about the glacier."));

        let mut wizard =
            HeadlessWizard::new(backend.clone(), ClientStore::in_memory(), WizardState::new(2));
        wizard.send(WizardEvent::StartSession).await.unwrap();
        wizard
            .send(WizardEvent::SendMessage("A glacier city".into()))
            .await
            .unwrap();

        let last = wizard.state().messages.last().unwrap();
        assert_eq!(last.content, "Tell me more about the glacier.");
        assert_eq!(backend.chat_requests()[0].thread_id, "mock-thread");
        assert!(wizard.handoff().is_none());
    }

    #[tokio::test]
    async fn test_start_remembers_active_slot() {
        let backend = Arc::new(MockBackend::new());
        let store = ClientStore::in_memory();

        let mut wizard = HeadlessWizard::new(backend, store.clone(), WizardState::new(5));
        wizard.send(WizardEvent::StartSession).await.unwrap();
        wizard.shutdown().await;

        assert_eq!(store.active_slot().await, Some(5));
    }
}
