mod args;
mod render;
mod shell;

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use astro_portal_core::{Session, Transport};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::{Action, Cli, Command};
use render::{render, Output};

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.global.configuration()?;
    let mut session = Session::new(config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let ok = match &cli.command {
        Command::Action(action) => run_action(&mut session, action, &cli.global.out_dir, &mut out)?,
        Command::Shell => {
            let outcome = shell::run(&mut session, &cli.global.out_dir, io::stdin().lock(), &mut out)?;
            outcome != shell::LastOutcome::Failure
        }
    };
    out.flush()?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Runs one action through the session and renders its result. Returns
/// whether the action succeeded.
pub(crate) fn run_action<T: Transport>(
    session: &mut Session<T>,
    action: &Action,
    out_dir: &Path,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let output = Output {
        out_dir,
        out_file: action.out_path().map(|p| p.as_path()),
    };
    let result = match action.operation() {
        Ok(op) => session.run(&op),
        Err(err) => session.reject(err),
    };
    render(out, result, &output)?;
    Ok(result.is_ok())
}
