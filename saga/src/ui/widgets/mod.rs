//! TUI widgets for the wizard

pub mod artifact;
pub mod choices;
pub mod input;
pub mod phase_dock;
pub mod slot_list;
pub mod trait_selector;
pub mod transcript;
pub mod wait_screen;

pub use artifact::ArtifactWidget;
pub use choices::ChoiceListWidget;
pub use input::InputWidget;
pub use phase_dock::PhaseDockWidget;
pub use slot_list::SlotListWidget;
pub use trait_selector::TraitSelectorWidget;
pub use transcript::TranscriptWidget;
pub use wait_screen::WaitScreenWidget;
