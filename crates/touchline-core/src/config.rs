//! Session configuration
//!
//! Everything needed to join a match, consumed once by
//! [`crate::Session::create`] and never re-read.

use std::{env, time::Duration};

use thiserror::Error;
use touchline_proto::{JoinRequest, Point, TeamSide};

/// Protocol version sent with every join request.
pub const PROTOCOL_VERSION: &str = "2.0";

/// How the connection to the authority is secured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityMode {
    /// Unencrypted, unauthenticated transport (local matches, tests).
    Plaintext,
    /// TLS-authenticated transport.
    Authenticated {
        /// Name the authority's certificate must be valid for.
        server_name: String,
    },
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Authority address (`host:port`).
    pub authority_addr: String,
    /// Transport security mode.
    pub security: SecurityMode,
    /// Participant token.
    pub token: String,
    /// Participant number.
    pub number: u32,
    /// Initial position requested at join time.
    pub initial_position: Point,
    /// Team the participant plays for.
    pub team_side: TeamSide,
    /// Upper bound on the join exchange (connection dial excluded).
    pub handshake_timeout: Duration,
}

impl SessionConfig {
    /// Default bound on the join exchange.
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

    /// Plaintext configuration with an empty token, starting at the origin.
    pub fn new(authority_addr: impl Into<String>, number: u32, team_side: TeamSide) -> Self {
        Self {
            authority_addr: authority_addr.into(),
            security: SecurityMode::Plaintext,
            token: String::new(),
            number,
            initial_position: Point::default(),
            team_side,
            handshake_timeout: Self::DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Set the participant token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the transport security mode.
    #[must_use]
    pub fn with_security(mut self, security: SecurityMode) -> Self {
        self.security = security;
        self
    }

    /// Set the initial position.
    #[must_use]
    pub fn with_initial_position(mut self, position: Point) -> Self {
        self.initial_position = position;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Join request carrying this configuration and [`PROTOCOL_VERSION`].
    pub fn join_request(&self) -> JoinRequest {
        JoinRequest {
            token: self.token.clone(),
            number: self.number,
            init_position: self.initial_position,
            team_side: self.team_side,
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// Load configuration from `TOUCHLINE_*` environment variables.
    ///
    /// | Variable | Meaning | Default |
    /// |----------|---------|---------|
    /// | `TOUCHLINE_AUTHORITY` | authority `host:port` | `localhost:5000` |
    /// | `TOUCHLINE_INSECURE` | `true` for plaintext | `false` |
    /// | `TOUCHLINE_SERVER_NAME` | TLS name | host part of the address |
    /// | `TOUCHLINE_TOKEN` | participant token | empty |
    /// | `TOUCHLINE_NUMBER` | participant number | required |
    /// | `TOUCHLINE_TEAM` | `home` or `away` | required |
    /// | `TOUCHLINE_INIT_POSITION` | `x,y` | `0,0` |
    /// | `TOUCHLINE_HANDSHAKE_TIMEOUT_SECS` | join timeout | `30` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let authority_addr =
            lookup("TOUCHLINE_AUTHORITY").unwrap_or_else(|| "localhost:5000".to_string());

        let insecure = match lookup("TOUCHLINE_INSECURE") {
            Some(raw) => parse_bool("TOUCHLINE_INSECURE", &raw)?,
            None => false,
        };
        let security = if insecure {
            SecurityMode::Plaintext
        } else {
            let server_name =
                lookup("TOUCHLINE_SERVER_NAME").unwrap_or_else(|| host_part(&authority_addr));
            SecurityMode::Authenticated { server_name }
        };

        let number = lookup("TOUCHLINE_NUMBER")
            .ok_or(ConfigError::Missing("TOUCHLINE_NUMBER"))?
            .parse::<u32>()
            .map_err(|e| invalid("TOUCHLINE_NUMBER", e))?;

        let team_side = match lookup("TOUCHLINE_TEAM")
            .ok_or(ConfigError::Missing("TOUCHLINE_TEAM"))?
            .to_ascii_lowercase()
            .as_str()
        {
            "home" => TeamSide::Home,
            "away" => TeamSide::Away,
            other => return Err(invalid("TOUCHLINE_TEAM", format!("unknown side {other:?}"))),
        };

        let initial_position = match lookup("TOUCHLINE_INIT_POSITION") {
            Some(raw) => parse_point("TOUCHLINE_INIT_POSITION", &raw)?,
            None => Point::default(),
        };

        let handshake_timeout = match lookup("TOUCHLINE_HANDSHAKE_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>().map_err(|e| invalid("TOUCHLINE_HANDSHAKE_TIMEOUT_SECS", e))?,
            ),
            None => Self::DEFAULT_HANDSHAKE_TIMEOUT,
        };

        Ok(Self {
            authority_addr,
            security,
            token: lookup("TOUCHLINE_TOKEN").unwrap_or_default(),
            number,
            initial_position,
            team_side,
            handshake_timeout,
        })
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variable is not set.
    #[error("missing required variable {0}")]
    Missing(&'static str),

    /// Variable is set but cannot be parsed.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Parse failure.
        reason: String,
    },
}

fn invalid(key: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid { key, reason: reason.to_string() }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(invalid(key, format!("expected a boolean, got {other:?}"))),
    }
}

fn parse_point(key: &'static str, raw: &str) -> Result<Point, ConfigError> {
    let Some((x, y)) = raw.split_once(',') else {
        return Err(invalid(key, "expected x,y"));
    };
    let x = x.trim().parse::<i32>().map_err(|e| invalid(key, e))?;
    let y = y.trim().parse::<i32>().map_err(|e| invalid(key, e))?;
    Ok(Point::new(x, y))
}

/// Host portion of `host:port`, tolerating bracketed IPv6 literals.
fn host_part(addr: &str) -> String {
    let host = match addr.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => addr,
    };
    host.trim_start_matches('[').trim_end_matches(']').to_string()
}
