//! Command-line surface: global connection flags and one subcommand per
//! operator action.

use std::path::PathBuf;
use std::time::Duration;

use astro_portal_core::{
    ApiError, ConfigError, Configuration, Operation, UserForm, UserId, DEFAULT_BASE_URL,
};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "astro-portal",
    about = "Manage users and generate astrology booklets through the portal backend",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Backend base URL.
    #[arg(long, env = "API_BASE_URL", default_value = DEFAULT_BASE_URL, value_name = "url")]
    pub base_url: String,
    /// Bearer token attached to every request.
    #[arg(long, env = "API_TOKEN", hide_env_values = true, value_name = "token")]
    pub token: Option<String>,
    /// Override every per-operation timeout.
    #[arg(long, value_name = "secs")]
    pub timeout_secs: Option<u64>,
    /// Directory generated documents are written to.
    #[arg(long, default_value = ".", value_name = "dir")]
    pub out_dir: PathBuf,
}

impl GlobalArgs {
    pub fn configuration(&self) -> Result<Configuration, ConfigError> {
        let mut config = Configuration::new(&self.base_url)?;
        config.set_credential(self.token.as_deref());
        config.set_timeout(self.timeout_secs.map(Duration::from_secs));
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Action(Action),
    /// Keep one session open and read commands from stdin.
    Shell,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    /// List all users.
    Users,
    /// Fetch one user.
    User { id: String },
    /// Create a user, or update it when --id is given.
    SaveUser(SaveUser),
    /// Full placement set for a user.
    Placements { id: String },
    /// Sun, Moon and Ascendant for a user.
    BigThree { id: String },
    /// Generate the booklet PDF.
    Booklet {
        id: String,
        /// Output file; defaults to booklet_<id>.pdf in --out-dir.
        #[arg(long, value_name = "path")]
        out: Option<PathBuf>,
    },
    /// Generate the yearly calendar PDF.
    Calendar {
        id: String,
        #[arg(long)]
        year: Option<u16>,
        /// Output file; defaults to calendar_<id>_<year>.pdf in --out-dir.
        #[arg(long, value_name = "path")]
        out: Option<PathBuf>,
    },
    /// Check that the backend is up.
    Health,
}

#[derive(Debug, Clone, Default, Args)]
pub struct SaveUser {
    #[arg(long)]
    pub id: Option<String>,
    #[arg(long, default_value = "")]
    pub first_name: String,
    #[arg(long)]
    pub last_name: Option<String>,
    /// Birth date as YYYY-MM-DD.
    #[arg(long, value_parser = parse_date, value_name = "YYYY-MM-DD")]
    pub birthdate: Option<NaiveDate>,
    /// Birth time as 24h HH:MM.
    #[arg(long, value_parser = parse_time, value_name = "HH:MM")]
    pub birthtime: Option<NaiveTime>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub country: Option<String>,
    /// Login or email.
    #[arg(long)]
    pub login: Option<String>,
    /// IANA timezone, e.g. Europe/Brussels.
    #[arg(long)]
    pub timezone: Option<String>,
}

impl SaveUser {
    fn into_form(self) -> UserForm {
        UserForm {
            id: self.id.as_deref().map(UserId::from),
            first_name: self.first_name,
            last_name: self.last_name,
            birthdate: self.birthdate,
            birthtime: self.birthtime,
            city: self.city,
            country: self.country,
            login: self.login,
            timezone: self.timezone,
        }
    }
}

impl Action {
    /// Backend operation for this action. Form validation failures come back
    /// as `Unsupported`.
    pub fn operation(&self) -> Result<Operation, ApiError> {
        let op = match self {
            Action::Users => Operation::ListUsers,
            Action::User { id } => Operation::GetUser(UserId::from(id.as_str())),
            Action::SaveUser(save) => Operation::UpsertUser(save.clone().into_form().into_draft()?),
            Action::Placements { id } => Operation::GetPlacements(UserId::from(id.as_str())),
            Action::BigThree { id } => Operation::GetBigThree(UserId::from(id.as_str())),
            Action::Booklet { id, .. } => Operation::GenerateBooklet(UserId::from(id.as_str())),
            Action::Calendar { id, year, .. } => Operation::GenerateCalendar {
                id: UserId::from(id.as_str()),
                year: *year,
            },
            Action::Health => Operation::HealthCheck,
        };
        Ok(op)
    }

    /// Explicit output path for document actions.
    pub fn out_path(&self) -> Option<&PathBuf> {
        match self {
            Action::Booklet { out, .. } | Action::Calendar { out, .. } => out.as_ref(),
            _ => None,
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("astro-portal").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_target_local_backend() {
        let cli = parse(&["users"]);
        let config = cli.global.configuration().unwrap();
        assert_eq!(config.base_url().as_str(), "http://localhost:8010/");
        assert!(config.credential().is_none());
        assert!(matches!(cli.command, Command::Action(Action::Users)));
    }

    #[test]
    fn global_flags_build_configuration() {
        let cli = parse(&[
            "--base-url",
            "https://api.example.com",
            "--token",
            "abc",
            "--timeout-secs",
            "3",
            "health",
        ]);
        let config = cli.global.configuration().unwrap();
        assert_eq!(config.credential().map(|c| c.expose()), Some("abc"));
        assert_eq!(config.timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn numeric_ids_become_integers() {
        let Command::Action(action) = parse(&["user", "42"]).command else {
            panic!("expected action");
        };
        assert_eq!(action.operation().unwrap(), Operation::GetUser(UserId::Int(42)));
    }

    #[test]
    fn calendar_year_is_optional_at_parse_time() {
        let Command::Action(action) = parse(&["calendar", "7"]).command else {
            panic!("expected action");
        };
        assert_eq!(
            action.operation().unwrap(),
            Operation::GenerateCalendar {
                id: UserId::Int(7),
                year: None
            }
        );
    }

    #[test]
    fn save_user_builds_draft() {
        let Command::Action(action) = parse(&[
            "save-user",
            "--first-name",
            "Ada",
            "--birthdate",
            "1990-04-02",
            "--birthtime",
            "07:30",
        ])
        .command
        else {
            panic!("expected action");
        };
        let Operation::UpsertUser(draft) = action.operation().unwrap() else {
            panic!("expected upsert");
        };
        assert!(draft.id.is_none());
        assert_eq!(draft.fields["birthtime"], "07:30");
    }

    #[test]
    fn save_user_without_first_name_is_rejected() {
        let Command::Action(action) = parse(&["save-user", "--city", "Ghent"]).command else {
            panic!("expected action");
        };
        assert!(matches!(action.operation(), Err(ApiError::Unsupported { .. })));
    }

    #[test]
    fn bad_birthdate_is_a_parse_error() {
        let result = Cli::try_parse_from(["astro-portal", "save-user", "--birthdate", "02/04/1990"]);
        assert!(result.is_err());
    }
}
