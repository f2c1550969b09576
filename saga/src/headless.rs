//! Headless mode for the wizard.
//!
//! A line-oriented interface for running the setup wizard without a TUI,
//! intended for scripts and automated testing:
//! - Plain lines are sent to the guide as chat messages
//! - Lines starting with `#` are commands (confirm, choose, traits, quit...)
//! - Output lines are tagged (`[GUIDE]`, `[PENDING]`, `[ERROR]`, ...)

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use saga_api::StoryApi;
use saga_core::display::{artifact_sections, Section};
use saga_core::traits::TraitCategory;
use saga_core::{
    ClientStore, FinalizeStatus, HandOff, HeadlessWizard, Phase, PhaseStatus, Role, StoryBackend,
    TraitId, WizardConfig, WizardEvent, WizardState,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// A parsed input line.
#[derive(Debug, Clone)]
pub enum Command {
    /// Anything the reducer handles directly.
    Wizard(WizardEvent),
    New,
    Status,
    View,
    /// List transcript references, or show the n-th (0-based) one.
    Reference(Option<usize>),
    Artifacts,
    Traits,
    Help,
    Quit,
}

/// Parse one trimmed, non-empty input line.
pub fn parse_line(line: &str) -> Result<Command, String> {
    let Some(command) = line.strip_prefix('#') else {
        return Ok(Command::Wizard(WizardEvent::SendMessage(line.to_string())));
    };

    let parts: Vec<&str> = command.split_whitespace().collect();
    let event = match parts.as_slice() {
        ["quit"] | ["exit"] => return Ok(Command::Quit),
        ["help"] => return Ok(Command::Help),
        ["status"] => return Ok(Command::Status),
        ["view"] => return Ok(Command::View),
        ["artifacts"] => return Ok(Command::Artifacts),
        ["ref"] => return Ok(Command::Reference(None)),
        ["ref", n] => {
            let number: usize = n
                .parse()
                .map_err(|_| format!("Not a reference number: {n}"))?;
            if number == 0 {
                return Err("References are numbered from 1".to_string());
            }
            return Ok(Command::Reference(Some(number - 1)));
        }
        ["traits"] => return Ok(Command::Traits),
        ["new"] => return Ok(Command::New),
        ["choose", n] => {
            let number: usize = n
                .parse()
                .map_err(|_| format!("Not a choice number: {n}"))?;
            if number == 0 {
                return Err("Choices are numbered from 1".to_string());
            }
            WizardEvent::SelectChoice(number - 1)
        }
        ["choose"] => return Err("Usage: #choose <number>".to_string()),
        ["fate"] => WizardEvent::AcceptFate,
        ["toggle", name] => WizardEvent::ToggleTrait(name.parse::<TraitId>()?),
        ["toggle"] => return Err("Usage: #toggle <trait>".to_string()),
        ["pick"] => WizardEvent::ConfirmTraits,
        ["confirm"] => WizardEvent::ConfirmArtifact,
        ["revise"] => WizardEvent::ReviseArtifact,
        ["retry"] => WizardEvent::RetryFinalize,
        ["cancel"] => WizardEvent::CancelFinalize,
        _ => return Err("Unknown command. Type #help for help.".to_string()),
    };
    Ok(Command::Wizard(event))
}

/// Run the wizard in headless mode on stdin/stdout.
pub async fn run_headless(
    api: Arc<StoryApi>,
    store: ClientStore,
    config: &WizardConfig,
    slot: u32,
) -> Result<()> {
    let state = WizardState::new(slot)
        .with_model(config.model.clone())
        .with_legacy_trait_heuristic(config.legacy_trait_heuristic);
    let mut wizard = HeadlessWizard::new(api.clone(), store.clone(), state);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    let handoff = run_session(&mut wizard, api.as_ref(), stdin, &mut stdout).await?;

    // Let the worker write the bootstrap record before it is consumed.
    wizard.shutdown().await;
    if handoff.is_some() {
        if let Err(e) = store.clear_pending_bootstrap().await {
            tracing::warn!(error = %e, "failed to clear pending bootstrap");
        }
    }
    Ok(())
}

/// Drive `wizard` from `input` until hand-off, `#quit` or end of input.
pub async fn run_session<B, R, W>(
    wizard: &mut HeadlessWizard,
    backend: &B,
    input: R,
    out: &mut W,
) -> Result<Option<HandOff>>
where
    B: StoryBackend + ?Sized,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut report = Reporter::default();
    let slot = wizard.state().slot;

    writeln!(out, "=== Saga Headless Mode ===")?;
    writeln!(out, "Slot: {slot}")?;
    writeln!(out, "Type #help for commands.")?;
    writeln!(out)?;

    wizard.dispatch(WizardEvent::ResumeSession).await?;
    settle(wizard, &mut lines, out).await?;
    report.emit(wizard, out).await?;

    loop {
        if let Some(handoff) = wizard.handoff() {
            writeln!(out, "[HANDOFF] slot {} session {}", handoff.slot, handoff.session_id)?;
            out.flush()?;
            return Ok(Some(handoff.clone()));
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match parse_line(line) {
            Ok(command) => command,
            Err(message) => {
                writeln!(out, "[ERROR] {message}")?;
                continue;
            }
        };

        match command {
            Command::Quit => {
                writeln!(out, "Goodbye!")?;
                break;
            }
            Command::Help => print_help(out)?,
            Command::Status => print_status(wizard.state(), out)?,
            Command::View => match &wizard.state().pending {
                Some(artifact) => {
                    writeln!(out, "[VIEW] {}", artifact.kind.label())?;
                    print_sections(&artifact_sections(artifact), out)?;
                }
                None => writeln!(out, "[ERROR] Nothing is pending")?,
            },
            Command::Reference(index) => print_reference(wizard.state(), index, out)?,
            Command::Artifacts => print_artifacts(wizard.state(), out)?,
            Command::Traits => match &wizard.state().trait_selector {
                Some(_) => print_traits(wizard.state(), out)?,
                None => writeln!(out, "[ERROR] The trait selector is not open")?,
            },
            Command::New => match backend.reset_slot(slot).await {
                Ok(()) => {
                    writeln!(out, "[STATUS] Slot {slot} reset")?;
                    wizard.dispatch(WizardEvent::StartSession).await?;
                }
                Err(e) => writeln!(out, "[ERROR] Reset failed: {e}")?,
            },
            Command::Wizard(event) => wizard.dispatch(event).await?,
        }

        settle(wizard, &mut lines, out).await?;
        report.emit(wizard, out).await?;
        out.flush()?;
    }

    Ok(None)
}

/// Wait for in-flight requests, honouring `#cancel` during finalize.
async fn settle<R, W>(
    wizard: &mut HeadlessWizard,
    lines: &mut Lines<R>,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut input_open = true;
    while wizard.state().is_processing() {
        let finalizing = matches!(wizard.state().finalize, FinalizeStatus::Running { .. });
        if !(finalizing && input_open) {
            wizard.next_event().await?;
            continue;
        }

        tokio::select! {
            result = wizard.next_event() => result?,
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "#cancel" => {
                    wizard.dispatch(WizardEvent::CancelFinalize).await?;
                }
                Some(_) => writeln!(out, "[WAIT] Starting the story; only #cancel is accepted")?,
                None => input_open = false,
            },
        }
    }
    Ok(())
}

/// Prints what changed since the last report.
#[derive(Default)]
struct Reporter {
    printed_messages: usize,
    pending_shown: bool,
    selector_shown: bool,
    failure_shown: bool,
}

impl Reporter {
    async fn emit<W: Write>(&mut self, wizard: &mut HeadlessWizard, out: &mut W) -> Result<()> {
        let state = wizard.state();

        // A new or resumed session replaces the transcript
        if state.messages.len() < self.printed_messages {
            self.printed_messages = 0;
        }
        for message in &state.messages[self.printed_messages..] {
            match message.role {
                Role::User => {}
                Role::Assistant => {
                    writeln!(out, "[GUIDE]")?;
                    for para in message.content.split("\n\n") {
                        writeln!(out, "{para}")?;
                    }
                    writeln!(out)?;
                }
                Role::System => writeln!(out, "[SYSTEM] {}", message.content)?,
            }
        }
        self.printed_messages = state.messages.len();

        match &state.pending {
            Some(artifact) if !self.pending_shown => {
                writeln!(out, "[PENDING] {}", artifact.kind.label())?;
                print_sections(&artifact_sections(artifact), out)?;
                writeln!(out, "Confirm with #confirm or revise with #revise.")?;
                self.pending_shown = true;
            }
            Some(_) => {}
            None => self.pending_shown = false,
        }

        match &state.trait_selector {
            Some(_) if !self.selector_shown => {
                print_traits(state, out)?;
                self.selector_shown = true;
            }
            Some(_) => {}
            None => self.selector_shown = false,
        }

        if state.input_enabled() && state.trait_selector.is_none() && !state.choices.is_empty() {
            writeln!(out, "[CHOICES]")?;
            for (i, choice) in state.choices.iter().enumerate() {
                match &choice.description {
                    Some(description) => {
                        writeln!(out, "  {}) {} - {}", i + 1, choice.label, description)?
                    }
                    None => writeln!(out, "  {}) {}", i + 1, choice.label)?,
                }
            }
        }

        match &state.finalize {
            FinalizeStatus::Failed { error, .. } if !self.failure_shown => {
                writeln!(out, "[FAILED] Starting the story failed: {error}")?;
                writeln!(out, "Try again with #retry or go back with #cancel.")?;
                self.failure_shown = true;
            }
            FinalizeStatus::Failed { .. } => {}
            _ => self.failure_shown = false,
        }

        if let Some(notification) = state.notification.clone() {
            writeln!(out, "[ERROR] {notification}")?;
            wizard.dispatch(WizardEvent::DismissNotification).await?;
        }

        Ok(())
    }
}

fn print_sections<W: Write>(sections: &[Section], out: &mut W) -> io::Result<()> {
    for section in sections {
        writeln!(out, "  {}:", section.title)?;
        for line in section.body.lines() {
            writeln!(out, "    {line}")?;
        }
    }
    Ok(())
}

fn print_traits<W: Write>(state: &WizardState, out: &mut W) -> io::Result<()> {
    let Some(selector) = &state.trait_selector else {
        return Ok(());
    };
    writeln!(out, "[TRAITS] {}/3 selected", selector.count())?;
    for category in TraitCategory::all() {
        writeln!(out, "  {}", category.title())?;
        for id in category.traits() {
            let mark = if selector.is_selected(id) { "x" } else { " " };
            let hint = if selector.is_suggested(id) { " (suggested)" } else { "" };
            writeln!(out, "    [{mark}] {:<12} {}{hint}", id.as_str(), id.description())?;
        }
    }
    writeln!(out, "Toggle with #toggle <trait>, then #pick.")
}

fn print_status<W: Write>(state: &WizardState, out: &mut W) -> io::Result<()> {
    writeln!(out, "[STATUS]")?;
    writeln!(out, "  Slot: {}", state.slot)?;
    writeln!(out, "  Stage: {}", state.stage())?;
    for phase in Phase::all() {
        let status = match state.phase_status(phase) {
            PhaseStatus::Locked => "locked",
            PhaseStatus::Active => "active",
            PhaseStatus::Completed => "completed",
        };
        writeln!(out, "  {}: {status}", phase.title())?;
    }
    if let Some(artifact) = &state.pending {
        writeln!(out, "  Pending: {}", artifact.kind.label())?;
    }
    if let Some(name) = state.data.character_view().name() {
        writeln!(out, "  Character: {name}")?;
    }
    Ok(())
}

fn print_artifacts<W: Write>(state: &WizardState, out: &mut W) -> io::Result<()> {
    let mut any = false;
    for phase in Phase::all() {
        if let Some(artifact) = state.data.artifact_for(phase) {
            writeln!(out, "[ARTIFACT] {}", artifact.kind.label())?;
            print_sections(&artifact_sections(&artifact), out)?;
            any = true;
        }
    }
    if !any {
        writeln!(out, "[ARTIFACT] Nothing committed yet")?;
    }
    Ok(())
}

fn print_reference<W: Write>(
    state: &WizardState,
    index: Option<usize>,
    out: &mut W,
) -> io::Result<()> {
    let references = state.artifact_references();
    match index {
        None if references.is_empty() => writeln!(out, "[REFS] None in the transcript yet"),
        None => {
            writeln!(out, "[REFS]")?;
            for (i, artifact) in references.iter().enumerate() {
                writeln!(out, "  {}) {}", i + 1, artifact.kind.label())?;
            }
            writeln!(out, "Show one with #ref <n>.")
        }
        Some(i) => match references.get(i) {
            Some(artifact) => {
                writeln!(out, "[VIEW] {}", artifact.kind.label())?;
                print_sections(&artifact_sections(artifact), out)
            }
            None => writeln!(out, "[ERROR] No reference {}", i + 1),
        },
    }
}

fn print_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "[HELP]")?;
    writeln!(out, "  <text>            - Send a message to the guide")?;
    writeln!(out, "  #choose <n>       - Pick a suggested reply")?;
    writeln!(out, "  #fate             - Let the guide decide")?;
    writeln!(out, "  #confirm          - Accept the pending artifact")?;
    writeln!(out, "  #revise           - Send the pending artifact back")?;
    writeln!(out, "  #view             - Show the pending artifact")?;
    writeln!(out, "  #traits           - Show the trait selector")?;
    writeln!(out, "  #toggle <trait>   - Select or deselect a trait")?;
    writeln!(out, "  #pick             - Confirm the selected traits")?;
    writeln!(out, "  #retry / #cancel  - Retry or abandon starting the story")?;
    writeln!(out, "  #ref [n]          - List transcript artifacts, or show one")?;
    writeln!(out, "  #artifacts        - Show committed artifacts")?;
    writeln!(out, "  #status           - Show wizard progress")?;
    writeln!(out, "  #new              - Reset this slot and start over")?;
    writeln!(out, "  #quit             - Exit")
}
