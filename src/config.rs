use poise::serenity_prelude::{ChannelId, RoleId};
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_LIFESPAN_MINUTES: i64 = 30;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SHEET_RANGE: &str = "A:B";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("'{0}' environment variable not found")]
    Missing(&'static str),
    #[error("'{name}' has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// SMTP account used to send announcement emails.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Spreadsheet holding the announcement mailing list.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub sheet_id: String,
    pub api_key: String,
    pub range: String,
}

/// Email settings. Each half is `None` when any of its variables is unset;
/// `missing` lists the unset variable names for error reporting.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub smtp: Option<SmtpConfig>,
    pub sheet: Option<SheetConfig>,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub data_dir: PathBuf,
    pub announcement_channel: Option<ChannelId>,
    pub announcement_lifespan: chrono::Duration,
    pub archive_category: Option<ChannelId>,
    pub member_role: Option<RoleId>,
    pub introductions_channel: Option<ChannelId>,
    pub self_assignable_roles: Vec<RoleId>,
    pub email: EmailConfig,
}

impl Config {
    /// Reads the configuration from the process environment, loading `.env`
    /// first if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let discord_token = var("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let announcement_lifespan = match var("ANNOUNCEMENT_LIFESPAN_MINUTES") {
            Some(value) => Some(parse::<i64>("ANNOUNCEMENT_LIFESPAN_MINUTES", &value)?)
                .filter(|minutes| *minutes > 0)
                .and_then(chrono::Duration::try_minutes)
                .ok_or(ConfigError::Invalid {
                    name: "ANNOUNCEMENT_LIFESPAN_MINUTES",
                    value,
                })?,
            None => chrono::Duration::minutes(DEFAULT_LIFESPAN_MINUTES),
        };

        let self_assignable_roles = match var("SELF_ASSIGNABLE_ROLE_IDS") {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| snowflake("SELF_ASSIGNABLE_ROLE_IDS", id).map(RoleId::new))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Config {
            discord_token,
            data_dir,
            announcement_channel: optional_id(&var, "ANNOUNCEMENT_CHANNEL_ID")?
                .map(ChannelId::new),
            announcement_lifespan,
            archive_category: optional_id(&var, "ARCHIVE_CATEGORY_ID")?.map(ChannelId::new),
            member_role: optional_id(&var, "MEMBER_ROLE_ID")?.map(RoleId::new),
            introductions_channel: optional_id(&var, "INTRODUCTIONS_CHANNEL_ID")?
                .map(ChannelId::new),
            self_assignable_roles,
            email: email_config(&var)?,
        })
    }

    pub fn announcements_path(&self) -> PathBuf {
        self.data_dir.join("announcements.json")
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }
}

fn email_config<F>(var: &F) -> Result<EmailConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();
    let mut require = |name: &'static str| {
        let value = var(name);
        if value.is_none() {
            missing.push(name);
        }
        value
    };

    let host = require("SMTP_HOST");
    let username = require("SMTP_USERNAME");
    let password = require("SMTP_PASSWORD");
    let from = require("SMTP_FROM");
    let sheet_id = require("SHEET_ID");
    let api_key = require("SHEETS_API_KEY");

    let port = match var("SMTP_PORT") {
        Some(value) => parse::<u16>("SMTP_PORT", &value)?,
        None => DEFAULT_SMTP_PORT,
    };

    let smtp = match (host, username, password, from) {
        (Some(host), Some(username), Some(password), Some(from)) => Some(SmtpConfig {
            host,
            port,
            username,
            password,
            from,
        }),
        _ => None,
    };

    let sheet = match (sheet_id, api_key) {
        (Some(sheet_id), Some(api_key)) => Some(SheetConfig {
            sheet_id,
            api_key,
            range: var("SHEET_RANGE").unwrap_or_else(|| DEFAULT_SHEET_RANGE.to_string()),
        }),
        _ => None,
    };

    Ok(EmailConfig {
        smtp,
        sheet,
        missing,
    })
}

fn optional_id<F>(var: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(name).map(|value| snowflake(name, &value)).transpose()
}

fn snowflake(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    // Discord rejects zero ids and serenity panics on them
    parse::<u64>(name, value).and_then(|id| {
        if id == 0 {
            Err(ConfigError::Invalid {
                name,
                value: value.to_string(),
            })
        } else {
            Ok(id)
        }
    })
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
