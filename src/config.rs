//! Runtime configuration.
//!
//! Values come from the environment. The admission secret and chat token are
//! required (the process cannot do its job without either); everything else
//! has a sensible default. Lookup is injected so tests never mutate the
//! process environment.

use std::net::SocketAddr;

use thiserror::Error;

use crate::types::ChannelId;

pub const ENV_APPROVER_ID: &str = "NOMAD_APPROVER_ID";
pub const ENV_APPROVER_SECRET: &str = "NOMAD_APPROVER_SECRET";
pub const ENV_SLACK_TOKEN: &str = "SLACK_TOKEN";
pub const ENV_SLACK_CHANNEL: &str = "SLACK_CHANNEL";
pub const ENV_NOMAD_ADDR: &str = "NOMAD_ADDR";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";

const DEFAULT_CHANNEL: &str = "#job-approvals";
const DEFAULT_NOMAD_ADDR: &str = "http://127.0.0.1:4646";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Errors that make startup impossible.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Everything the process needs to run.
#[derive(Debug, Clone)]
pub struct Config {
    /// This process's approver identity; a registration qualifies only when
    /// it names this identity as the next approver.
    pub approver_id: String,

    /// Secret authenticating admission decisions to the scheduler.
    pub approver_secret: String,

    /// Chat API token.
    pub slack_token: String,

    /// Channel approval notifications are posted to.
    pub slack_channel: ChannelId,

    /// Scheduler HTTP address.
    pub nomad_addr: String,

    /// Address the callback listener binds to.
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary lookup function.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigError> {
        let get = |name: &'static str| lookup(name).filter(|value| !value.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::MissingVar(name));

        let approver_secret = required(ENV_APPROVER_SECRET)?;
        let slack_token = required(ENV_SLACK_TOKEN)?;

        let approver_id = get(ENV_APPROVER_ID).unwrap_or_default();
        let slack_channel =
            ChannelId::new(get(ENV_SLACK_CHANNEL).unwrap_or_else(|| DEFAULT_CHANNEL.to_string()));
        let nomad_addr = get(ENV_NOMAD_ADDR).unwrap_or_else(|| DEFAULT_NOMAD_ADDR.to_string());

        let bind_text = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_text
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name: ENV_BIND_ADDR,
                value: bind_text.clone(),
            })?;

        Ok(Config {
            approver_id,
            approver_secret,
            slack_token,
            slack_channel,
            nomad_addr,
            bind_addr,
        })
    }
}
