//! Terminal styling for the few places trip talks to a human.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use owo_colors::{OwoColorize, Style};

static NO_COLOR: AtomicBool = AtomicBool::new(false);

pub fn set_no_color(value: bool) {
    NO_COLOR.store(value, Ordering::Relaxed);
}

fn paint(value: impl Display, style: Style) -> String {
    if NO_COLOR.load(Ordering::Relaxed) {
        value.to_string()
    } else {
        value.style(style).to_string()
    }
}

/// Reports a failure on stderr, after a red cross.
pub fn print_error(msg: &str) {
    eprintln!("{} {msg}", paint("✗", Style::new().red().bold()));
}

pub fn print_heading(title: &str) {
    println!("{}", paint(title, Style::new().bold()));
}

/// One `key: value` line under a heading, keys padded to `width`.
pub fn print_field(key: &str, value: impl Display, width: usize) {
    println!("  {} {value}", paint(format_args!("{key:<width$}"), Style::new().dimmed()));
}
