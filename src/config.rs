//! Configuration management for the worksheet engine.
//!
//! Configuration can be set via environment variables:
//! - `WORKSHEET_API_URL` - Required. Base URL of the worksheet API.
//! - `WORKSHEET_API_TOKEN` - Optional. Bearer token identifying the acting user.
//! - `WORKSHEET_REQUEST_TIMEOUT_SECS` - Optional. Request timeout. Defaults to `30`.
//! - `GENERAL_TASKS_MIN_FUNCTION_LEVEL` - Optional. Defaults to `3`.
//! - `INDIVIDUAL_TASKS_MIN_FUNCTION_LEVEL` - Optional. Defaults to `2`.
//! - `APPROVERS_OUTSIDE_TEAM` - Optional. Offer approvers from other teams. Defaults to `false`.
//! - `ACTOR_ID` - Optional. Id of the acting user (needed for task actions).
//! - `ACTOR_FUNCTION_LEVEL` - Optional. Function level of the acting user. Defaults to `0`.
//! - `ACTOR_TEAM` - Optional. Team of the acting user.
//! - `ACTOR_CROSS_TEAM` - Optional. Whether the acting user may act across teams.

use thiserror::Error;

use crate::role::{Actor, ApprovalPolicy, FunctionLevel, UserId};
use crate::worksheet::TeamId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worksheet API base URL
    pub api_url: String,

    /// Bearer token for the API
    pub api_token: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Capability thresholds
    pub policy: ApprovalPolicy,

    /// The acting user, if configured
    pub actor: Option<Actor>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `WORKSHEET_API_URL` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("WORKSHEET_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("WORKSHEET_API_URL".to_string()))?;

        let api_token = lookup("WORKSHEET_API_TOKEN").filter(|t| !t.is_empty());

        let request_timeout_secs = parse_or(&lookup, "WORKSHEET_REQUEST_TIMEOUT_SECS", 30u64)?;

        let defaults = ApprovalPolicy::default();
        let policy = ApprovalPolicy {
            general_min: FunctionLevel(parse_or(
                &lookup,
                "GENERAL_TASKS_MIN_FUNCTION_LEVEL",
                defaults.general_min.0,
            )?),
            individual_min: FunctionLevel(parse_or(
                &lookup,
                "INDIVIDUAL_TASKS_MIN_FUNCTION_LEVEL",
                defaults.individual_min.0,
            )?),
            approvers_outside_team: parse_bool(&lookup, "APPROVERS_OUTSIDE_TEAM")?,
        };

        let actor = match lookup("ACTOR_ID") {
            Some(id) => Some(Actor {
                id: UserId::new(id),
                function_level: FunctionLevel(parse_or(&lookup, "ACTOR_FUNCTION_LEVEL", 0u8)?),
                team: lookup("ACTOR_TEAM").map(TeamId::new),
                cross_team: parse_bool(&lookup, "ACTOR_CROSS_TEAM")?,
            }),
            None => None,
        };

        Ok(Self {
            api_url,
            api_token,
            request_timeout_secs,
            policy,
            actor,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_token: None,
            request_timeout_secs: 30,
            policy: ApprovalPolicy::default(),
            actor: None,
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool, ConfigError> {
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("expected a boolean, got '{}'", other),
        )),
    }
}
