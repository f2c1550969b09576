//! Minimal client for the story-setup backend.
//!
//! This crate provides a focused client for the wizard endpoints with:
//! - Session start, resume and slot management
//! - The conversational chat turn, with reply classification
//! - The transition and narrative bootstrap calls that finalize a story

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Story-setup API client.
#[derive(Clone)]
pub struct StoryApi {
    client: reqwest::Client,
    base_url: String,
}

impl StoryApi {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        // No client-wide timeout: finalize calls may legitimately run for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("empty base URL".to_string()));
        }

        Ok(Self { client, base_url })
    }

    /// Create a client for the default local backend.
    pub fn local() -> Result<Self, Error> {
        Self::new(DEFAULT_BASE_URL)
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Begin (or fetch) the wizard session for a slot.
    pub async fn start_setup(&self, slot: u32, model: Option<&str>) -> Result<StartResponse, Error> {
        let body = StartRequest { slot, model };
        self.post_json("/api/story/new/setup/start", &body, Some(REQUEST_TIMEOUT))
            .await
    }

    /// Fetch in-progress session state for resuming a slot.
    pub async fn resume_setup(&self, slot: u32) -> Result<ResumeState, Error> {
        let response = self
            .client
            .get(self.url("/api/story/new/setup/resume"))
            .query(&[("slot", slot)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        parse_json(check_status(response).await?).await
    }

    /// Clear a save slot.
    pub async fn reset_slot(&self, slot: u32) -> Result<(), Error> {
        self.post_unit("/api/story/new/setup/reset", &SlotRequest { slot }, Some(REQUEST_TIMEOUT))
            .await
    }

    /// List all save slots with their activity metadata.
    pub async fn list_slots(&self) -> Result<Vec<SlotSummary>, Error> {
        let response = self
            .client
            .get(self.url("/api/story/new/slots"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let listing: SlotListing = parse_json(check_status(response).await?).await?;
        Ok(listing.into_slots())
    }

    /// Run one conversational turn.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, Error> {
        tracing::debug!(
            slot = request.slot,
            phase = %request.current_phase,
            accept_fate = request.accept_fate,
            "chat turn"
        );
        self.post_json("/api/story/new/chat", request, Some(REQUEST_TIMEOUT))
            .await
    }

    /// Persist all collected artifacts for a slot to durable storage.
    ///
    /// Not time-limited; the caller is responsible for cancellation.
    pub async fn transition(&self, slot: u32) -> Result<(), Error> {
        self.post_unit("/api/story/new/transition", &SlotRequest { slot }, None)
            .await
    }

    /// Kick off first-content generation for a finalized slot.
    ///
    /// Not time-limited; the caller is responsible for cancellation.
    pub async fn continue_narrative(
        &self,
        slot: u32,
        user_text: &str,
    ) -> Result<BootstrapResponse, Error> {
        let body = BootstrapRequest {
            chunk_id: 0,
            slot,
            user_text,
        };
        self.post_json("/api/narrative/continue", &body, None).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, Error> {
        let mut builder = self.client.post(self.url(path)).json(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        check_status(response).await
    }

    async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<R, Error> {
        let response = self.send_post(path, body, timeout).await?;
        parse_json(response).await
    }

    async fn post_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        self.send_post(path, body, timeout).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    tracing::error!(status = status.as_u16(), "backend returned an error status");
    Err(Error::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            message
        },
    })
}

async fn parse_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, Error> {
    response
        .json()
        .await
        .map_err(|e| Error::Parse(e.to_string()))
}

// ============================================================================
// Phases and artifact kinds
// ============================================================================

/// One of the three top-level wizard stages, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setting,
    Character,
    Seed,
}

impl Phase {
    pub fn all() -> [Phase; 3] {
        [Phase::Setting, Phase::Character, Phase::Seed]
    }

    pub fn index(self) -> usize {
        match self {
            Phase::Setting => 0,
            Phase::Character => 1,
            Phase::Seed => 2,
        }
    }

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Setting => Some(Phase::Character),
            Phase::Character => Some(Phase::Seed),
            Phase::Seed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setting => "setting",
            Phase::Character => "character",
            Phase::Seed => "seed",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Phase::Setting => "World",
            Phase::Character => "Character",
            Phase::Seed => "Story Seed",
        }
    }

    /// The artifact the backend emits when this phase completes.
    pub fn expected_artifact(self) -> ArtifactKind {
        match self {
            Phase::Setting => ArtifactKind::WorldDocument,
            Phase::Character => ArtifactKind::CharacterSheet,
            Phase::Seed => ArtifactKind::StartingScenario,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `artifact_type` tag on phase and subphase results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtifactKind {
    WorldDocument,
    CharacterSheet,
    StartingScenario,
    CharacterConcept,
    TraitSelection,
    Wildcard,
    Other(String),
}

impl ArtifactKind {
    pub fn as_str(&self) -> &str {
        match self {
            ArtifactKind::WorldDocument => "submit_world_document",
            ArtifactKind::CharacterSheet => "submit_character_sheet",
            ArtifactKind::StartingScenario => "submit_starting_scenario",
            ArtifactKind::CharacterConcept => "submit_character_concept",
            ArtifactKind::TraitSelection => "submit_trait_selection",
            ArtifactKind::Wildcard => "submit_wildcard",
            ArtifactKind::Other(tag) => tag,
        }
    }

    /// Human-readable label for transcript references and modals.
    pub fn label(&self) -> &str {
        match self {
            ArtifactKind::WorldDocument => "World Document",
            ArtifactKind::CharacterSheet => "Character Sheet",
            ArtifactKind::StartingScenario => "Starting Scenario",
            ArtifactKind::CharacterConcept => "Character Concept",
            ArtifactKind::TraitSelection => "Trait Selection",
            ArtifactKind::Wildcard => "Wildcard Trait",
            ArtifactKind::Other(tag) => tag,
        }
    }

    /// The phase this artifact completes, if it is a phase artifact.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ArtifactKind::WorldDocument => Some(Phase::Setting),
            ArtifactKind::CharacterSheet => Some(Phase::Character),
            ArtifactKind::StartingScenario => Some(Phase::Seed),
            _ => None,
        }
    }
}

impl From<&str> for ArtifactKind {
    fn from(tag: &str) -> Self {
        match tag {
            "submit_world_document" | "world_document" => ArtifactKind::WorldDocument,
            "submit_character_sheet" | "character_sheet" => ArtifactKind::CharacterSheet,
            "submit_starting_scenario" | "starting_scenario" => ArtifactKind::StartingScenario,
            "submit_character_concept" | "character_concept" | "concept" => {
                ArtifactKind::CharacterConcept
            }
            "submit_trait_selection" | "trait_selection" | "traits" => ArtifactKind::TraitSelection,
            "submit_wildcard" | "wildcard" => ArtifactKind::Wildcard,
            other => ArtifactKind::Other(other.to_string()),
        }
    }
}

impl From<String> for ArtifactKind {
    fn from(tag: String) -> Self {
        ArtifactKind::from(tag.as_str())
    }
}

impl From<ArtifactKind> for String {
    fn from(kind: ArtifactKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A pre-authored option surfaced by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawChoice")]
pub struct Choice {
    pub id: Option<String>,
    pub label: String,
    pub description: Option<String>,
}

impl Choice {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            description: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChoice {
    Text(String),
    Detailed {
        #[serde(default)]
        id: Option<String>,
        #[serde(alias = "text")]
        label: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<RawChoice> for Choice {
    fn from(raw: RawChoice) -> Self {
        match raw {
            RawChoice::Text(label) => Choice::new(label),
            RawChoice::Detailed {
                id,
                label,
                description,
            } => Choice {
                id,
                label,
                description,
            },
        }
    }
}

/// Response to starting a wizard session.
#[derive(Debug, Clone, Deserialize)]
pub struct StartResponse {
    pub thread_id: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub welcome_choices: Vec<Choice>,
}

/// A transcript line returned when resuming.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

/// In-progress session state for a slot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResumeState {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub current_phase: Option<Phase>,
    #[serde(default)]
    pub wizard_data: Option<serde_json::Value>,
    #[serde(default)]
    pub messages: Vec<TranscriptEntry>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// One save slot as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlotSummary {
    pub slot: u32,
    #[serde(default)]
    pub has_session: bool,
    #[serde(default)]
    pub current_phase: Option<Phase>,
    #[serde(default)]
    pub last_activity: Option<String>,
    #[serde(default)]
    pub world_name: Option<String>,
}

impl SlotSummary {
    /// Whether this slot has an in-progress wizard to resume.
    pub fn is_resumable(&self) -> bool {
        self.has_session || self.current_phase.is_some()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlotListing {
    Wrapped { slots: Vec<SlotSummary> },
    Bare(Vec<SlotSummary>),
}

impl SlotListing {
    fn into_slots(self) -> Vec<SlotSummary> {
        match self {
            SlotListing::Wrapped { slots } | SlotListing::Bare(slots) => slots,
        }
    }
}

/// A conversational turn sent to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub slot: u32,
    pub thread_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub current_phase: Phase,
    pub context_data: serde_json::Value,
    /// Forces the backend to emit a tool result unconditionally.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub accept_fate: bool,
}

/// A classified reply from the chat endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawChatResponse")]
pub enum ChatReply {
    /// A full phase artifact awaiting confirmation.
    PhaseComplete {
        artifact: ArtifactKind,
        data: serde_json::Value,
        phase: Option<Phase>,
        message: Option<String>,
    },
    /// A character-creation subphase result.
    SubphaseComplete {
        artifact: ArtifactKind,
        data: serde_json::Value,
        message: Option<String>,
    },
    /// A plain assistant message, possibly with selectable choices.
    Message {
        message: String,
        choices: Vec<Choice>,
    },
}

#[derive(Deserialize)]
struct RawChatResponse {
    #[serde(default)]
    phase_complete: bool,
    #[serde(default)]
    subphase_complete: bool,
    #[serde(default)]
    artifact_type: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    phase: Option<Phase>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    choices: Option<Vec<Choice>>,
}

impl TryFrom<RawChatResponse> for ChatReply {
    type Error = String;

    fn try_from(raw: RawChatResponse) -> Result<Self, Self::Error> {
        if raw.phase_complete {
            let artifact = raw
                .artifact_type
                .ok_or("phase_complete reply without artifact_type")?;
            return Ok(ChatReply::PhaseComplete {
                artifact: ArtifactKind::from(artifact),
                data: raw.data.unwrap_or(serde_json::Value::Null),
                phase: raw.phase,
                message: raw.message,
            });
        }

        if raw.subphase_complete {
            let artifact = raw
                .artifact_type
                .ok_or("subphase_complete reply without artifact_type")?;
            return Ok(ChatReply::SubphaseComplete {
                artifact: ArtifactKind::from(artifact),
                data: raw.data.unwrap_or(serde_json::Value::Null),
                message: raw.message,
            });
        }

        Ok(ChatReply::Message {
            message: raw.message.unwrap_or_default(),
            choices: raw.choices.unwrap_or_default(),
        })
    }
}

/// Response to the narrative bootstrap call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrapResponse {
    pub session_id: String,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    slot: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SlotRequest {
    slot: u32,
}

#[derive(Debug, Serialize)]
struct BootstrapRequest<'a> {
    chunk_id: u32,
    slot: u32,
    user_text: &'a str,
}
