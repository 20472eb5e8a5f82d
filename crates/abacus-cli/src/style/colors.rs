//! Semantic color palette for terminal output.
//!
//! Uses owo-colors for zero-allocation terminal coloring.

use abacus_policy::Effect;
use owo_colors::{OwoColorize, Style};

/// Returns the style for success messages (green bold).
pub fn success_style() -> Style {
    Style::new().green().bold()
}

/// Returns the style for error messages (red bold).
pub fn error_style() -> Style {
    Style::new().red().bold()
}

/// Returns the style for muted/secondary text (dimmed).
pub fn muted_style() -> Style {
    Style::new().dimmed()
}

/// Returns the style for headers (bold).
pub fn header_style() -> Style {
    Style::new().bold()
}

/// Returns the style for code/paths (blue).
pub fn code_style() -> Style {
    Style::new().blue()
}

/// Trait extension to apply semantic styles.
pub trait SemanticStyle: Sized {
    /// Apply success styling (green bold).
    fn success(&self) -> String;
    /// Apply error styling (red bold).
    fn error(&self) -> String;
    /// Apply muted styling (dimmed).
    fn muted(&self) -> String;
    /// Apply header styling (bold).
    fn header(&self) -> String;
    /// Apply code styling (blue).
    fn code(&self) -> String;
}

fn styled<T: std::fmt::Display>(value: &T, style: Style) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(style).to_string()
    }
}

impl<T: std::fmt::Display> SemanticStyle for T {
    fn success(&self) -> String {
        styled(self, success_style())
    }

    fn error(&self) -> String {
        styled(self, error_style())
    }

    fn muted(&self) -> String {
        styled(self, muted_style())
    }

    fn header(&self) -> String {
        styled(self, header_style())
    }

    fn code(&self) -> String {
        styled(self, code_style())
    }
}

/// Colors a decision: Permit green, Deny red.
pub fn effect(effect: Effect) -> String {
    match effect {
        Effect::Permit => effect.success(),
        Effect::Deny => effect.error(),
    }
}
