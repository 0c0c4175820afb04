use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;

use archive_application::plan::{Feed, RunMode};
use archive_application::retry::RetryPolicy;
use archive_domain::{
    date_to_millis, parse_date, parse_rfc3339_millis, EventId, EventKind, EventQuery, TimeRange,
};

use super::validation::{validate_endpoint, validate_identifier};

pub const CONFIG_PATH_ENV: &str = "SUI_ARCHIVE_CONFIG";
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    File,
    Database,
    Both,
}

impl Target {
    pub fn uses_files(&self) -> bool {
        matches!(self, Target::File | Target::Both)
    }

    pub fn uses_database(&self) -> bool {
        matches!(self, Target::Database | Target::Both)
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" | "files" | "parquet" => Ok(Target::File),
            "database" | "db" | "clickhouse" => Ok(Target::Database),
            "both" => Ok(Target::Both),
            other => Err(format!("unknown target {:?}, expected file, database or both", other)),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Target::File => "file",
            Target::Database => "database",
            Target::Both => "both",
        })
    }
}

/// A fully resolved run: what to fetch, where to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub mode: RunMode,
    pub target: Target,
    /// Kinds kept by the schema registry; `None` keeps all of them.
    pub filter: Option<EventKind>,
    /// Kinds written to Parquet when files are a target.
    pub file_kinds: Vec<EventKind>,
    /// Appended to every Parquet file name.
    pub file_suffix: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArchiveConfig {
    pub endpoint: String,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub cron_seconds: u64,
    pub cursor_tx_digest: Option<String>,
    pub cursor_event_seq: Option<u64>,
    pub event_type: Option<String>,
    pub all_events: bool,
    pub target: Option<Target>,
    pub file_event_types: Vec<String>,
    pub folder: String,
    pub schema: String,
    pub clickhouse_url: String,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
    pub page_limit: Option<u32>,
    pub rate_limit_backoff_seconds: u64,
    pub overload_backoff_seconds: u64,
    pub request_timeout_seconds: u64,
    pub log_dir: Option<String>,
    /// File the settings were read from; `None` when running on defaults and environment.
    #[serde(skip)]
    pub loaded_from: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://fullnode.devnet.sui.io".to_string(),
            date: None,
            start_time: None,
            end_time: None,
            cron_seconds: 0,
            cursor_tx_digest: None,
            cursor_event_seq: None,
            event_type: None,
            all_events: false,
            target: None,
            file_event_types: Vec::new(),
            folder: ".".to_string(),
            schema: "sui_devnet".to_string(),
            clickhouse_url: "http://127.0.0.1:8123".to_string(),
            clickhouse_user: None,
            clickhouse_password: None,
            page_limit: None,
            rate_limit_backoff_seconds: 10,
            overload_backoff_seconds: 5,
            request_timeout_seconds: 30,
            log_dir: None,
            loaded_from: None,
        }
    }
}

impl ArchiveConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "./archive.toml".to_string());
        let file_path = Path::new(&path);
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path).await?;
            let mut config: ArchiveConfig =
                toml::from_str(&content).map_err(|err| anyhow!("invalid {}: {}", path, err))?;
            config.loaded_from = Some(path.clone());
            config
        } else {
            ArchiveConfig::default()
        };
        config.apply_env_overrides()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn normalize(&mut self) {
        for value in [
            &mut self.date,
            &mut self.start_time,
            &mut self.end_time,
            &mut self.cursor_tx_digest,
            &mut self.event_type,
            &mut self.clickhouse_user,
            &mut self.clickhouse_password,
            &mut self.log_dir,
        ] {
            *value = value
                .take()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());
        }
        if self.page_limit == Some(0) {
            self.page_limit = None;
        }
        self.endpoint = self.endpoint.trim().to_string();
        self.file_event_types = normalize_list(std::mem::take(&mut self.file_event_types));
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint(&self.endpoint)?;
        validate_identifier("schema", &self.schema)?;
        if self.folder.trim().is_empty() {
            return Err(anyhow!("folder must not be empty"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow!("request_timeout_seconds must be greater than 0"));
        }
        self.plan()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            rate_limit_backoff: Duration::from_secs(self.rate_limit_backoff_seconds),
            overload_backoff: Duration::from_secs(self.overload_backoff_seconds),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Resolves the run mode, sinks and filters, rejecting contradictory settings.
    pub fn plan(&self) -> Result<RunPlan> {
        let range = self.time_range()?;
        let kind = self.event_kind()?;
        let cursor = self.start_cursor()?;
        let file_kinds = self.file_kinds()?;

        if self.cron_seconds > 0 {
            if cursor.is_some() {
                return Err(anyhow!(
                    "a start cursor only applies to bulk runs; perpetual runs resume from the database"
                ));
            }
            let target = self.target.unwrap_or(Target::Database);
            if target != Target::Database {
                return Err(anyhow!(
                    "perpetual mode (cron_seconds) writes to the database only, got target {}",
                    target
                ));
            }
            let feed = match (range, kind) {
                (Some((outer, _)), _) => Feed::Windows {
                    outer: Some(outer),
                    duration: Duration::from_secs(self.cron_seconds),
                },
                (None, Some(kind)) => Feed::Cursor(EventQuery::EventType(kind)),
                (None, None) if self.all_events => Feed::Cursor(EventQuery::All),
                (None, None) => Feed::Windows {
                    outer: None,
                    duration: Duration::from_secs(self.cron_seconds),
                },
            };
            return Ok(RunPlan {
                mode: RunMode::Perpetual {
                    feed,
                    poll_interval: Duration::from_secs((self.cron_seconds / 2).max(1)),
                },
                target,
                filter: kind,
                file_kinds,
                file_suffix: String::new(),
            });
        }

        let (query, file_suffix) = match (range, kind) {
            (Some((range, suffix)), _) => (EventQuery::TimeRange(range), suffix),
            (None, Some(kind)) => (EventQuery::EventType(kind), format!("-{}", kind.tag())),
            (None, None) if self.all_events => (EventQuery::All, "-all".to_string()),
            (None, None) => {
                return Err(anyhow!(
                    "nothing to archive: set a date like SUI_ARCHIVE_DATE=2023-03-07, or both \
                     SUI_ARCHIVE_START_TIME=2023-03-07T00:00:00Z and \
                     SUI_ARCHIVE_END_TIME=2023-03-07T10:00:00Z, or SUI_ARCHIVE_EVENT_TYPE, or \
                     SUI_ARCHIVE_ALL_EVENTS=true, optionally with SUI_ARCHIVE_CRON_SECONDS=60 to \
                     keep polling"
                ))
            }
        };
        Ok(RunPlan {
            mode: RunMode::Bulk { query, cursor },
            target: self.target.unwrap_or(Target::File),
            filter: kind,
            file_kinds,
            file_suffix,
        })
    }

    /// The configured `[start, end)` together with the file name suffix describing it.
    fn time_range(&self) -> Result<Option<(TimeRange, String)>> {
        if let Some(date) = &self.date {
            if self.start_time.is_some() || self.end_time.is_some() {
                return Err(anyhow!("set either date or start_time/end_time, not both"));
            }
            let day = parse_date(date).map_err(|err| anyhow!("invalid date {:?}: {}", date, err))?;
            let start = date_to_millis(day);
            return Ok(Some((TimeRange::new(start, start + DAY_MS), format!("-{}", date))));
        }
        match (&self.start_time, &self.end_time) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let range = TimeRange::new(parse_rfc3339_millis(start)?, parse_rfc3339_millis(end)?);
                if range.is_empty() {
                    return Err(anyhow!("end_time {} must be after start_time {}", end, start));
                }
                Ok(Some((range, format!("-{}-{}", start, end))))
            }
            _ => Err(anyhow!("start_time and end_time must be set together")),
        }
    }

    fn event_kind(&self) -> Result<Option<EventKind>> {
        self.event_type
            .as_deref()
            .map(|value| value.parse::<EventKind>().map_err(|err| anyhow!(err)))
            .transpose()
    }

    fn start_cursor(&self) -> Result<Option<EventId>> {
        match (&self.cursor_tx_digest, self.cursor_event_seq) {
            (None, None) => Ok(None),
            (Some(digest), Some(seq)) => Ok(EventId::new(digest.clone(), seq).non_zero()),
            _ => Err(anyhow!(
                "cursor_tx_digest and cursor_event_seq must be set together"
            )),
        }
    }

    fn file_kinds(&self) -> Result<Vec<EventKind>> {
        if self.file_event_types.is_empty() {
            return Ok(EventKind::ALL.to_vec());
        }
        let mut kinds = Vec::with_capacity(self.file_event_types.len());
        for value in &self.file_event_types {
            let kind = value.parse::<EventKind>().map_err(|err| anyhow!(err))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let vars: HashMap<String, String> = env::vars()
            .filter(|(key, _)| key.starts_with("SUI_ARCHIVE_"))
            .collect();
        self.apply_overrides(|key| vars.get(key).cloned())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("SUI_ARCHIVE_ENDPOINT") {
            self.endpoint = value;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_DATE") {
            self.date = Some(value);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_START_TIME") {
            self.start_time = Some(value);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_END_TIME") {
            self.end_time = Some(value);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_CRON_SECONDS") {
            self.cron_seconds = parse_env("SUI_ARCHIVE_CRON_SECONDS", &value)?;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_CURSOR_TXDIGEST") {
            self.cursor_tx_digest = Some(value);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_CURSOR_EVENTSEQ") {
            self.cursor_event_seq = Some(parse_env("SUI_ARCHIVE_CURSOR_EVENTSEQ", &value)?);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_EVENT_TYPE") {
            self.event_type = Some(value);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_ALL_EVENTS") {
            self.all_events = parse_flag("SUI_ARCHIVE_ALL_EVENTS", &value)?;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_TARGET") {
            self.target = Some(value.parse().map_err(|err: String| anyhow!(err))?);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_FILE_EVENT_TYPES") {
            self.file_event_types = value.split(',').map(ToString::to_string).collect();
        }
        if let Some(value) = lookup("SUI_ARCHIVE_FOLDER") {
            self.folder = value;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_SCHEMA") {
            self.schema = value;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_CLICKHOUSE_URL") {
            self.clickhouse_url = value;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_CLICKHOUSE_USER") {
            self.clickhouse_user = Some(value);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_CLICKHOUSE_PASSWORD") {
            self.clickhouse_password = Some(value);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_PAGE_LIMIT") {
            self.page_limit = Some(parse_env("SUI_ARCHIVE_PAGE_LIMIT", &value)?);
        }
        if let Some(value) = lookup("SUI_ARCHIVE_RATE_LIMIT_BACKOFF_SECONDS") {
            self.rate_limit_backoff_seconds =
                parse_env("SUI_ARCHIVE_RATE_LIMIT_BACKOFF_SECONDS", &value)?;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_OVERLOAD_BACKOFF_SECONDS") {
            self.overload_backoff_seconds =
                parse_env("SUI_ARCHIVE_OVERLOAD_BACKOFF_SECONDS", &value)?;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds =
                parse_env("SUI_ARCHIVE_REQUEST_TIMEOUT_SECONDS", &value)?;
        }
        if let Some(value) = lookup("SUI_ARCHIVE_LOG_DIR") {
            self.log_dir = Some(value);
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| anyhow!("invalid {}={:?}: {}", key, value, err))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        _ => Err(anyhow!("invalid {}={:?}: expected true or false", key, value)),
    }
}

fn normalize_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
