//! Configuration loading and resolution.
//!
//! Every setting resolves in the same order: command-line flag, then the
//! `WALLCOUNT_*` environment variable, then a built-in default.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BotError, BotResult};

pub const ENV_PGK: &str = "WALLCOUNT_PGK";
pub const ENV_FID: &str = "WALLCOUNT_FID";
pub const ENV_GYM: &str = "WALLCOUNT_GYM";
pub const ENV_STORAGE: &str = "WALLCOUNT_STORAGE";
pub const ENV_SCHEDULE: &str = "WALLCOUNT_SCHEDULE";
pub const ENV_TIMEOUT_MS: &str = "WALLCOUNT_TIMEOUT_MS";
pub const ENV_BASE_URL: &str = "WALLCOUNT_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "https://portal.rockgympro.com";
pub const DEFAULT_SCHEDULE: &str = "default=300";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Values supplied on the command line. `None` defers to the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pgk: Option<String>,
    pub fid: Option<String>,
    pub gym: Option<String>,
    pub storage: Option<String>,
    pub schedule: Option<String>,
}

/// A named periodic pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub name: String,
    pub every: Duration,
}

/// Fully resolved service settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pgk: Option<String>,
    pub fid: Option<String>,
    pub gym: Option<String>,
    pub storage: PathBuf,
    pub schedule: Vec<ScheduledJob>,
    pub timeout_ms: u64,
    pub base_url: String,
}

impl Settings {
    /// Resolve settings from flags and the process environment.
    pub fn resolve(overrides: &Overrides) -> BotResult<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings using `env` to look up environment variables.
    pub fn resolve_with(
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> BotResult<Self> {
        let pick = |flag: &Option<String>, key: &str| {
            flag.clone()
                .or_else(|| env(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let storage = match pick(&overrides.storage, ENV_STORAGE) {
            Some(path) => PathBuf::from(path),
            None => default_storage_path(),
        };

        let schedule_raw =
            pick(&overrides.schedule, ENV_SCHEDULE).unwrap_or_else(|| DEFAULT_SCHEDULE.to_string());

        let timeout_ms = match env(ENV_TIMEOUT_MS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                BotError::InvalidSetting(format!("{ENV_TIMEOUT_MS}={raw:?} is not a number"))
            })?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let base_url = env(ENV_BASE_URL)
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            pgk: pick(&overrides.pgk, ENV_PGK),
            fid: pick(&overrides.fid, ENV_FID),
            gym: pick(&overrides.gym, ENV_GYM),
            storage,
            schedule: parse_schedule(&schedule_raw)?,
            timeout_ms,
            base_url,
        })
    }

    /// The registry key of the tracked location.
    pub fn gym(&self) -> BotResult<&str> {
        self.gym
            .as_deref()
            .ok_or(BotError::MissingSetting(ENV_GYM))
    }

    /// The occupancy widget URL for the configured facility.
    pub fn portal_url(&self) -> BotResult<String> {
        let pgk = self.pgk.as_deref().ok_or(BotError::MissingSetting(ENV_PGK))?;
        let fid = self.fid.as_deref().ok_or(BotError::MissingSetting(ENV_FID))?;
        Ok(format!(
            "{}/portal/public/{pgk}/occupancy?iframeid=occupancyCounter&fId={fid}",
            self.base_url
        ))
    }
}

/// Parse `name=seconds|name=seconds`.
///
/// Entries without `=` or with a non-numeric interval are skipped. A zero or
/// negative interval is an error.
pub fn parse_schedule(raw: &str) -> BotResult<Vec<ScheduledJob>> {
    let mut jobs = Vec::new();
    for entry in raw.split('|').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, secs)) = entry.split_once('=') else {
            tracing::warn!("ignoring schedule entry without '=': {entry:?}");
            continue;
        };
        let Ok(secs) = secs.trim().parse::<i64>() else {
            tracing::warn!("ignoring schedule entry with a non-numeric interval: {entry:?}");
            continue;
        };
        if secs <= 0 {
            return Err(BotError::InvalidSetting(format!(
                "schedule entry {entry:?} needs a positive interval in seconds"
            )));
        }
        jobs.push(ScheduledJob {
            name: name.trim().to_string(),
            every: Duration::from_secs(secs.unsigned_abs()),
        });
    }
    Ok(jobs)
}

fn default_storage_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wallcount")
        .join("observations.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_only() {
        let env = env_of(&[
            (ENV_PGK, "abc123"),
            (ENV_FID, "7"),
            (ENV_GYM, "SBG"),
            (ENV_STORAGE, "/tmp/wall.db"),
        ]);
        let settings = Settings::resolve_with(&Overrides::default(), env).unwrap();

        assert_eq!(settings.gym().unwrap(), "SBG");
        assert_eq!(settings.storage, PathBuf::from("/tmp/wall.db"));
        assert_eq!(
            settings.portal_url().unwrap(),
            "https://portal.rockgympro.com/portal/public/abc123/occupancy?iframeid=occupancyCounter&fId=7"
        );
        assert_eq!(
            settings.schedule,
            vec![ScheduledJob {
                name: "default".to_string(),
                every: Duration::from_secs(300)
            }]
        );
        assert_eq!(settings.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_flags_override_env() {
        let overrides = Overrides {
            gym: Some("SBL".to_string()),
            schedule: Some("fast=60".to_string()),
            ..Default::default()
        };
        let env = env_of(&[(ENV_GYM, "SBG"), (ENV_SCHEDULE, "slow=3600")]);
        let settings = Settings::resolve_with(&overrides, env).unwrap();

        assert_eq!(settings.gym().unwrap(), "SBL");
        assert_eq!(settings.schedule[0].name, "fast");
        assert_eq!(settings.schedule[0].every, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_required_values() {
        let settings = Settings::resolve_with(&Overrides::default(), env_of(&[])).unwrap();
        assert!(matches!(settings.gym(), Err(BotError::MissingSetting(ENV_GYM))));
        assert!(matches!(
            settings.portal_url(),
            Err(BotError::MissingSetting(ENV_PGK))
        ));
        assert!(settings.storage.ends_with(".wallcount/observations.db"));
    }

    #[test]
    fn test_base_url_override_strips_slash() {
        let env = env_of(&[
            (ENV_PGK, "k"),
            (ENV_FID, "f"),
            (ENV_BASE_URL, "http://127.0.0.1:9999/"),
        ]);
        let settings = Settings::resolve_with(&Overrides::default(), env).unwrap();
        assert!(settings
            .portal_url()
            .unwrap()
            .starts_with("http://127.0.0.1:9999/portal/public/k/"));
    }

    #[test]
    fn test_bad_timeout() {
        let env = env_of(&[(ENV_TIMEOUT_MS, "soon")]);
        assert!(matches!(
            Settings::resolve_with(&Overrides::default(), env),
            Err(BotError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_parse_schedule() {
        let jobs = parse_schedule("morning=600| evening = 120 |garbage|weird=5m").unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "morning");
        assert_eq!(jobs[1].name, "evening");
        assert_eq!(jobs[1].every, Duration::from_secs(120));

        assert!(parse_schedule("").unwrap().is_empty());
        assert!(parse_schedule("zero=0").is_err());
        assert!(parse_schedule("back=-5").is_err());
    }
}
