// UI layer: terminal output for the migration. A progress bar over the
// export records, a hidden password prompt when no password is configured,
// and printing of created posts. Everything is synchronous.

use anyhow::{Context, Result};
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::IsTerminal;

/// Progress bar for the record loop, or a hidden one when disabled or when
/// stderr is not a terminal.
pub fn progress_bar(enabled: bool) -> ProgressBar {
    if !enabled || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

/// Ask for the blog password when it is missing from the config. Returns
/// `None` if stdin is not interactive.
pub fn prompt_password(username: &str) -> Result<Option<String>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let password = Password::new()
        .with_prompt(format!("Password for {}", username))
        .interact()
        .context("Reading password")?;
    Ok(Some(password))
}

/// Print a created post. Goes through the progress bar when it is visible
/// so the bar is redrawn below the output.
pub fn print_post_result(pb: &ProgressBar, post: &serde_json::Value) {
    let text = serde_json::to_string_pretty(post).unwrap_or_else(|_| post.to_string());
    if pb.is_hidden() {
        println!("{}", text);
    } else {
        pb.println(text);
    }
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}
