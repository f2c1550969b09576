//! Story-setup wizard engine.
//!
//! This crate provides:
//! - The setting → character → seed phase state machine as a pure reducer
//! - Normalization of heterogeneous character payloads into one view model
//! - The fixed trait taxonomy and exactly-three trait selector
//! - An effect worker that runs backend calls and feeds results back as events
//! - A small persistent client store for resuming slots and bootstraps
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use saga_core::{ClientStore, HeadlessWizard, WizardConfig, WizardEvent, WizardState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WizardConfig::from_env()?;
//!     let api = Arc::new(saga_api::StoryApi::new(&config.api_base)?);
//!     let store = ClientStore::open(config.store_path()).await?;
//!
//!     let mut wizard = HeadlessWizard::new(api, store, WizardState::new(1));
//!     wizard.send(WizardEvent::StartSession).await?;
//!     wizard.send(WizardEvent::SendMessage("A city built on a glacier".into())).await?;
//!
//!     for message in &wizard.state().messages {
//!         println!("{}: {}", message.role, message.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod display;
pub mod headless;
pub mod machine;
pub mod message;
pub mod normalize;
pub mod phase;
pub mod store;
pub mod testing;
pub mod traits;
pub mod worker;

pub use saga_api::{ArtifactKind, ChatReply, ChatRequest, Choice, Phase};

// Primary public API
pub use artifact::{Artifact, WizardData};
pub use config::{ConfigError, WizardConfig};
pub use headless::{HandOff, HeadlessError, HeadlessWizard};
pub use machine::{reduce, FinalizeStatus, Operation, WizardEffect, WizardEvent, WizardState};
pub use message::{Message, Role};
pub use normalize::{normalize_character, CharacterView};
pub use phase::{CharacterStep, PhaseStatus, Stage};
pub use store::{ClientStore, PendingBootstrap, StoreError};
pub use testing::{BackendCall, MockBackend, TestHarness};
pub use traits::{TraitConfirm, TraitId, TraitSelector};
pub use worker::{spawn_worker, StoryBackend};
