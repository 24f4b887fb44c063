//! Operator actions and the backend route each one maps to.

use std::fmt;
use std::time::Duration;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::types::{ArtifactKind, UserDraft, UserId};

/// One operator-triggered backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ListUsers,
    GetUser(UserId),
    /// Creates when the draft has no id, updates otherwise.
    UpsertUser(UserDraft),
    GetPlacements(UserId),
    GetBigThree(UserId),
    GenerateBooklet(UserId),
    /// `year` is checked before dispatch; a calendar request without one is
    /// rejected.
    GenerateCalendar {
        id: UserId,
        year: Option<u16>,
    },
    HealthCheck,
}

/// Shape the interpreter should decode a response into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedKind {
    Users,
    User,
    Placements,
    BigThree,
    Artifact { kind: ArtifactKind, user_id: UserId },
    Health,
}

impl ExpectedKind {
    pub fn is_document(&self) -> bool {
        matches!(self, ExpectedKind::Artifact { .. })
    }
}

const STRUCTURED_TIMEOUT: Duration = Duration::from_secs(10);
const ASTROLOGY_TIMEOUT: Duration = Duration::from_secs(30);
const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(120);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

impl Operation {
    pub fn method(&self) -> HttpMethod {
        match self {
            Operation::UpsertUser(draft) if draft.id.is_some() => HttpMethod::Put,
            Operation::UpsertUser(_) => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }

    /// Unencoded path segments below the base URL.
    pub fn path_segments(&self) -> Vec<String> {
        let users = "users".to_string();
        match self {
            Operation::ListUsers => vec![users],
            Operation::GetUser(id) => vec![users, id.to_string()],
            Operation::UpsertUser(draft) => match &draft.id {
                Some(id) => vec![users, id.to_string()],
                None => vec![users],
            },
            Operation::GetPlacements(id) => vec![users, id.to_string(), "placements".to_string()],
            Operation::GetBigThree(id) => vec![users, id.to_string(), "big-three".to_string()],
            Operation::GenerateBooklet(id) => vec![users, id.to_string(), "booklet".to_string()],
            Operation::GenerateCalendar { id, year } => {
                let mut segments = vec![users, id.to_string(), "calendar".to_string()];
                if let Some(year) = year {
                    segments.push(year.to_string());
                }
                segments
            }
            Operation::HealthCheck => vec!["health".to_string()],
        }
    }

    /// `None` when the response will never be interpretable, e.g. a calendar
    /// without a year.
    pub fn expected_kind(&self) -> Option<ExpectedKind> {
        let kind = match self {
            Operation::ListUsers => ExpectedKind::Users,
            Operation::GetUser(_) | Operation::UpsertUser(_) => ExpectedKind::User,
            Operation::GetPlacements(_) => ExpectedKind::Placements,
            Operation::GetBigThree(_) => ExpectedKind::BigThree,
            Operation::GenerateBooklet(id) => ExpectedKind::Artifact {
                kind: ArtifactKind::Booklet,
                user_id: id.clone(),
            },
            Operation::GenerateCalendar { id, year } => ExpectedKind::Artifact {
                kind: ArtifactKind::Calendar { year: (*year)? },
                user_id: id.clone(),
            },
            Operation::HealthCheck => ExpectedKind::Health,
        };
        Some(kind)
    }

    /// Like [`Operation::expected_kind`], rejecting operations that are
    /// missing a required parameter.
    pub fn checked_expected_kind(&self) -> Result<ExpectedKind, ApiError> {
        self.expected_kind()
            .ok_or_else(|| ApiError::unsupported(format!("{} requires a year", self.label())))
    }

    pub fn is_mutating(&self) -> bool {
        matches!(self, Operation::UpsertUser(_))
    }

    /// Transport timeout used when the session does not override it.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Operation::HealthCheck => HEALTH_TIMEOUT,
            Operation::ListUsers | Operation::GetUser(_) | Operation::UpsertUser(_) => {
                STRUCTURED_TIMEOUT
            }
            Operation::GetPlacements(_) | Operation::GetBigThree(_) => ASTROLOGY_TIMEOUT,
            Operation::GenerateBooklet(_) | Operation::GenerateCalendar { .. } => DOCUMENT_TIMEOUT,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::ListUsers => "list_users",
            Operation::GetUser(_) => "get_user",
            Operation::UpsertUser(_) => "upsert_user",
            Operation::GetPlacements(_) => "get_placements",
            Operation::GetBigThree(_) => "get_big_three",
            Operation::GenerateBooklet(_) => "generate_booklet",
            Operation::GenerateCalendar { .. } => "generate_calendar",
            Operation::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
