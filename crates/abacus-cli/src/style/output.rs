//! Output helper functions for consistent styled messages.
//!
//! Status messages go to stderr so stdout carries only command results.

use super::colors::SemanticStyle;

/// Prints a success message with a checkmark.
pub fn print_success(msg: &str) {
    eprintln!("{} {}", "✓".success(), msg);
}

/// Prints an error message with an X mark.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".error(), msg);
}

/// Prints a section title.
pub fn print_header(title: &str) {
    println!("{}", title.header());
}

/// Prints an empty line for spacing.
pub fn print_spacer() {
    println!();
}
