//! Effect worker.
//!
//! Runs [`WizardEffect`]s against a [`StoryBackend`] and reports results as
//! [`WizardEvent`]s. Each network call runs in its own task so a
//! `CancelFinalize` can reach the worker while finalize is in flight.

use std::sync::Arc;

use async_trait::async_trait;
use saga_api::{
    BootstrapResponse, ChatReply, ChatRequest, Error, ResumeState, SlotSummary, StartResponse,
    StoryApi,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::machine::{Operation, WizardEffect, WizardEvent};
use crate::store::ClientStore;

/// The backend operations the wizard depends on.
#[async_trait]
pub trait StoryBackend: Send + Sync + 'static {
    async fn start_setup(&self, slot: u32, model: Option<&str>) -> Result<StartResponse, Error>;

    async fn resume_setup(&self, slot: u32) -> Result<ResumeState, Error>;

    async fn reset_slot(&self, slot: u32) -> Result<(), Error>;

    async fn list_slots(&self) -> Result<Vec<SlotSummary>, Error>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, Error>;

    async fn transition(&self, slot: u32) -> Result<(), Error>;

    async fn continue_narrative(&self, slot: u32, user_text: &str)
        -> Result<BootstrapResponse, Error>;
}

#[async_trait]
impl StoryBackend for StoryApi {
    async fn start_setup(&self, slot: u32, model: Option<&str>) -> Result<StartResponse, Error> {
        StoryApi::start_setup(self, slot, model).await
    }

    async fn resume_setup(&self, slot: u32) -> Result<ResumeState, Error> {
        StoryApi::resume_setup(self, slot).await
    }

    async fn reset_slot(&self, slot: u32) -> Result<(), Error> {
        StoryApi::reset_slot(self, slot).await
    }

    async fn list_slots(&self) -> Result<Vec<SlotSummary>, Error> {
        StoryApi::list_slots(self).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, Error> {
        StoryApi::chat(self, request).await
    }

    async fn transition(&self, slot: u32) -> Result<(), Error> {
        StoryApi::transition(self, slot).await
    }

    async fn continue_narrative(
        &self,
        slot: u32,
        user_text: &str,
    ) -> Result<BootstrapResponse, Error> {
        StoryApi::continue_narrative(self, slot, user_text).await
    }
}

/// Spawn the effect worker on the current tokio runtime.
///
/// The worker stops when the effect sender is dropped.
pub fn spawn_worker<B: StoryBackend>(
    backend: Arc<B>,
    store: ClientStore,
) -> (mpsc::Sender<WizardEffect>, mpsc::Receiver<WizardEvent>) {
    let (effect_tx, effect_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);

    tokio::spawn(worker_loop(backend, store, effect_rx, event_tx));

    (effect_tx, event_rx)
}

async fn worker_loop<B: StoryBackend>(
    backend: Arc<B>,
    store: ClientStore,
    mut effect_rx: mpsc::Receiver<WizardEffect>,
    event_tx: mpsc::Sender<WizardEvent>,
) {
    let mut finalize: Option<(u32, CancellationToken)> = None;

    while let Some(effect) = effect_rx.recv().await {
        match effect {
            WizardEffect::StartSession { slot, model } => {
                let backend = backend.clone();
                let tx = event_tx.clone();
                tokio::spawn(async move {
                    let event = match backend.start_setup(slot, model.as_deref()).await {
                        Ok(start) => WizardEvent::SessionStarted(start),
                        Err(e) => failed(Operation::StartSession, e),
                    };
                    let _ = tx.send(event).await;
                });
            }
            WizardEffect::ResumeSession { slot } => {
                let backend = backend.clone();
                let tx = event_tx.clone();
                tokio::spawn(async move {
                    let event = match backend.resume_setup(slot).await {
                        Ok(resume) => WizardEvent::SessionResumed(resume),
                        Err(e) => failed(Operation::ResumeSession, e),
                    };
                    let _ = tx.send(event).await;
                });
            }
            WizardEffect::Chat(request) => {
                let backend = backend.clone();
                let tx = event_tx.clone();
                tokio::spawn(async move {
                    let event = match backend.chat(&request).await {
                        Ok(reply) => WizardEvent::ChatReplied(reply),
                        Err(e) => failed(Operation::Chat, e),
                    };
                    let _ = tx.send(event).await;
                });
            }
            WizardEffect::Finalize { slot, attempt } => {
                if let Some((previous, token)) = finalize.take() {
                    tracing::debug!(previous, "superseding earlier finalize attempt");
                    token.cancel();
                }
                let token = CancellationToken::new();
                finalize = Some((attempt, token.clone()));

                let backend = backend.clone();
                let tx = event_tx.clone();
                tokio::spawn(async move {
                    let outcome = tokio::select! {
                        _ = token.cancelled() => None,
                        result = run_finalize(backend.as_ref(), slot) => Some(result),
                    };
                    let event = match outcome {
                        None => WizardEvent::FinalizeCancelled { attempt },
                        Some(Ok(session_id)) => WizardEvent::Finalized {
                            attempt,
                            session_id,
                        },
                        Some(Err(e)) => WizardEvent::FinalizeFailed {
                            attempt,
                            error: e.to_string(),
                        },
                    };
                    let _ = tx.send(event).await;
                });
            }
            WizardEffect::CancelFinalize { attempt } => match finalize.take() {
                Some((running, token)) if running == attempt => {
                    tracing::info!(attempt, "aborting finalize request");
                    token.cancel();
                }
                other => {
                    tracing::debug!(attempt, "no matching finalize to cancel");
                    finalize = other;
                }
            },
            WizardEffect::PersistActiveSlot(slot) => {
                if let Err(e) = store.set_active_slot(slot).await {
                    tracing::warn!(error = %e, "failed to remember active slot");
                }
            }
            WizardEffect::PersistBootstrap(record) => {
                if let Err(e) = store.set_pending_bootstrap(&record).await {
                    tracing::warn!(error = %e, "failed to record pending bootstrap");
                }
            }
            WizardEffect::HandOff { .. } => {
                tracing::debug!("hand-off is handled by the front end");
            }
        }
    }

    if let Some((_, token)) = finalize {
        token.cancel();
    }
    tracing::debug!("effect worker stopped");
}

async fn run_finalize<B: StoryBackend + ?Sized>(backend: &B, slot: u32) -> Result<String, Error> {
    backend.transition(slot).await?;
    let bootstrap = backend.continue_narrative(slot, "").await?;
    Ok(bootstrap.session_id)
}

fn failed(operation: Operation, error: Error) -> WizardEvent {
    WizardEvent::RequestFailed {
        operation,
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PendingBootstrap;
    use crate::testing::{BackendCall, MockBackend};

    #[tokio::test]
    async fn test_persist_effects_reach_store() {
        let store = ClientStore::in_memory();
        let (effect_tx, mut event_rx) = spawn_worker(Arc::new(MockBackend::new()), store.clone());

        effect_tx
            .send(WizardEffect::PersistActiveSlot(6))
            .await
            .unwrap();
        effect_tx
            .send(WizardEffect::PersistBootstrap(PendingBootstrap::new(6, "s-1")))
            .await
            .unwrap();
        drop(effect_tx);

        // The event channel closes once the worker loop has drained its queue.
        assert!(event_rx.recv().await.is_none());
        assert_eq!(store.active_slot().await, Some(6));
        assert_eq!(store.pending_bootstrap().await.unwrap().slot, 6);
    }

    #[tokio::test]
    async fn test_cancel_aborts_held_finalize() {
        let backend = Arc::new(MockBackend::new());
        backend.hold_finalize();
        let (effect_tx, mut event_rx) = spawn_worker(backend.clone(), ClientStore::in_memory());

        effect_tx
            .send(WizardEffect::Finalize { slot: 1, attempt: 1 })
            .await
            .unwrap();
        effect_tx
            .send(WizardEffect::CancelFinalize { attempt: 1 })
            .await
            .unwrap();

        let event = event_rx.recv().await.unwrap();
        assert!(matches!(event, WizardEvent::FinalizeCancelled { attempt: 1 }));
        assert!(!backend
            .calls()
            .iter()
            .any(|c| matches!(c, BackendCall::ContinueNarrative { .. })));
    }

    #[tokio::test]
    async fn test_chat_failure_becomes_event() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_failure("timed out");
        let (effect_tx, mut event_rx) = spawn_worker(backend, ClientStore::in_memory());

        let request = ChatRequest {
            slot: 1,
            thread_id: "t".into(),
            message: "hi".into(),
            model: None,
            current_phase: saga_api::Phase::Setting,
            context_data: serde_json::json!({}),
            accept_fate: false,
        };
        effect_tx.send(WizardEffect::Chat(request)).await.unwrap();

        match event_rx.recv().await.unwrap() {
            WizardEvent::RequestFailed { operation, error } => {
                assert_eq!(operation, Operation::Chat);
                assert!(error.contains("timed out"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
