//! Interactive mode: one session, one command per line.
//!
//! Configuration changes made with `set` stick for the rest of the session;
//! every action replaces whatever result was shown before.

use std::io::{BufRead, Write};
use std::path::Path;

use astro_portal_core::{Session, Transport};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::args::Action;
use crate::run_action;

#[derive(Debug, Parser)]
#[command(name = "astro-portal", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Subcommand)]
enum ShellCommand {
    #[command(flatten)]
    Action(Action),
    /// Change session configuration.
    #[command(subcommand)]
    Set(SetCommand),
    /// Print the current configuration.
    Show,
    /// Leave the shell.
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Subcommand)]
enum SetCommand {
    BaseUrl { url: String },
    /// Omit the token to clear it.
    Token { token: Option<String> },
    /// Omit the value to restore per-operation defaults.
    TimeoutSecs { secs: Option<u64> },
}

/// Outcome of the last action run in the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastOutcome {
    None,
    Success,
    Failure,
}

pub fn run<T: Transport>(
    session: &mut Session<T>,
    out_dir: &Path,
    input: impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<LastOutcome> {
    let mut last = LastOutcome::None;
    writeln!(out, "Connected to {}. Type `help` for commands.", session.config().base_url())?;

    for line in input.lines() {
        let line = line?;
        let tokens = split_line(&line);
        if tokens.is_empty() {
            continue;
        }
        let parsed = match ShellLine::try_parse_from(&tokens) {
            Ok(parsed) => parsed,
            Err(err) => {
                write!(out, "{}", err.render())?;
                continue;
            }
        };
        debug!(command = ?parsed.command, "shell command");

        match parsed.command {
            ShellCommand::Action(action) => {
                last = match run_action(session, &action, out_dir, out) {
                    Ok(true) => LastOutcome::Success,
                    Ok(false) => LastOutcome::Failure,
                    Err(err) => {
                        writeln!(out, "Error: {err:#}")?;
                        LastOutcome::Failure
                    }
                };
            }
            ShellCommand::Set(SetCommand::BaseUrl { url }) => match session.set_base_url(&url) {
                Ok(()) => writeln!(out, "Base URL set to {}", session.config().base_url())?,
                Err(err) => writeln!(out, "Error: {err}")?,
            },
            ShellCommand::Set(SetCommand::Token { token }) => {
                session.set_credential(token.as_deref());
                let state = if session.config().credential().is_some() {
                    "set"
                } else {
                    "cleared"
                };
                writeln!(out, "Token {state}")?;
            }
            ShellCommand::Set(SetCommand::TimeoutSecs { secs }) => {
                session.set_timeout(secs.map(std::time::Duration::from_secs));
                match secs {
                    Some(secs) => writeln!(out, "Timeout set to {secs}s")?,
                    None => writeln!(out, "Timeout restored to per-operation defaults")?,
                }
            }
            ShellCommand::Show => {
                let config = session.config();
                writeln!(out, "base url: {}", config.base_url())?;
                writeln!(
                    out,
                    "token:    {}",
                    if config.credential().is_some() { "set" } else { "none" }
                )?;
                match config.timeout() {
                    Some(timeout) => writeln!(out, "timeout:  {}s", timeout.as_secs())?,
                    None => writeln!(out, "timeout:  per-operation defaults")?,
                }
            }
            ShellCommand::Quit => break,
        }
    }
    Ok(last)
}

/// Splits on whitespace, keeping double-quoted runs together.
fn split_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}
