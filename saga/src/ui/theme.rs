//! Color theme and styling for the wizard TUI

use ratatui::style::{Color, Modifier, Style};
use saga_core::{PhaseStatus, Role};

/// Wizard UI color theme
#[derive(Debug, Clone)]
pub struct SagaTheme {
    // Base colors
    pub foreground: Color,
    pub border: Color,
    pub border_focused: Color,
    pub accent: Color,

    // Transcript colors
    pub user_text: Color,
    pub guide_text: Color,
    pub system_text: Color,

    // Phase dock colors
    pub phase_locked: Color,
    pub phase_active: Color,
    pub phase_completed: Color,

    // Trait picker colors
    pub selected: Color,
    pub suggested: Color,

    pub error: Color,
}

impl Default for SagaTheme {
    fn default() -> Self {
        Self {
            foreground: Color::White,
            border: Color::DarkGray,
            border_focused: Color::Cyan,
            accent: Color::Yellow,

            user_text: Color::Cyan,
            guide_text: Color::White,
            system_text: Color::DarkGray,

            phase_locked: Color::DarkGray,
            phase_active: Color::Yellow,
            phase_completed: Color::Green,

            selected: Color::LightGreen,
            suggested: Color::LightBlue,

            error: Color::LightRed,
        }
    }
}

impl SagaTheme {
    /// Style for a transcript entry by speaker
    pub fn role_style(&self, role: Role) -> Style {
        match role {
            Role::User => Style::default()
                .fg(self.user_text)
                .add_modifier(Modifier::ITALIC),
            Role::Assistant => Style::default().fg(self.guide_text),
            Role::System => Style::default()
                .fg(self.system_text)
                .add_modifier(Modifier::DIM),
        }
    }

    pub fn phase_style(&self, status: PhaseStatus) -> Style {
        match status {
            PhaseStatus::Locked => Style::default()
                .fg(self.phase_locked)
                .add_modifier(Modifier::DIM),
            PhaseStatus::Active => Style::default()
                .fg(self.phase_active)
                .add_modifier(Modifier::BOLD),
            PhaseStatus::Completed => Style::default().fg(self.phase_completed),
        }
    }

    /// Style for a highlighted list row
    pub fn cursor_style(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
    }

    pub fn heading_style(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    /// Plain body text
    pub fn text_style(&self) -> Style {
        Style::default().fg(self.foreground)
    }

    pub fn hint_style(&self) -> Style {
        self.text_style().add_modifier(Modifier::DIM)
    }

    pub fn error_style(&self) -> Style {
        Style::default()
            .fg(self.error)
            .add_modifier(Modifier::BOLD)
    }

    /// Get border style
    pub fn border_style(&self, focused: bool) -> Style {
        Style::default().fg(if focused {
            self.border_focused
        } else {
            self.border
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_styles_use_foreground() {
        let theme = SagaTheme {
            foreground: Color::Gray,
            ..SagaTheme::default()
        };
        assert_eq!(theme.text_style().fg, Some(Color::Gray));
        assert_eq!(theme.hint_style().fg, Some(Color::Gray));
        assert!(theme.hint_style().add_modifier.contains(Modifier::DIM));
    }
}
