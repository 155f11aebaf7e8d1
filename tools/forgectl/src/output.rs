//! Output helpers: data goes to stdout as JSON, status lines to stderr

use anyhow::Result;
use colored::*;
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn success(message: impl AsRef<str>) {
    eprintln!("{} {}", "✓".green(), message.as_ref());
}

pub fn failure(message: impl AsRef<str>) {
    eprintln!("{} {}", "✗".red(), message.as_ref().red());
}
