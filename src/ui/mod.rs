//! Terminal output helpers for the CLI driver.

use console::style;

pub mod progress;

pub fn success(text: &str) {
    println!("{} {text}", style("✓").green().bold());
}

pub fn failure(text: &str) {
    eprintln!("{} {text}", style("✗").red().bold());
}

pub fn note(text: &str) {
    println!("{}", style(text).dim());
}
