use crate::streak::FreezePolicy;
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub freeze_policy: FreezePolicy,
    pub reminder_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_path: PathBuf::from("data/state.json"),
            freeze_policy: FreezePolicy::Unlimited,
            reminder_interval: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let data_path = lookup("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_path);
        let port = parse_or("PORT", lookup("PORT"), defaults.port);
        let freeze_policy = match lookup("STREAK_FREEZES_PER_USER") {
            Some(raw) => match raw.trim().parse() {
                Ok(count) => FreezePolicy::PerUser(count),
                Err(_) => {
                    warn!(value = %raw, "invalid STREAK_FREEZES_PER_USER, using unlimited");
                    FreezePolicy::Unlimited
                }
            },
            None => defaults.freeze_policy,
        };
        let minutes: u64 = parse_or("REMINDER_INTERVAL_MINUTES", lookup("REMINDER_INTERVAL_MINUTES"), 30);
        let reminder_interval = match minutes.checked_mul(60) {
            Some(0) => {
                warn!("REMINDER_INTERVAL_MINUTES must be positive, using 30");
                defaults.reminder_interval
            }
            Some(secs) => Duration::from_secs(secs),
            None => {
                warn!(minutes, "REMINDER_INTERVAL_MINUTES too large, using 30");
                defaults.reminder_interval
            }
        };

        Self {
            port,
            data_path,
            freeze_policy,
            reminder_interval,
        }
    }
}

fn parse_or<T: FromStr + Copy>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "invalid value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_path, PathBuf::from("data/state.json"));
        assert_eq!(config.freeze_policy, FreezePolicy::Unlimited);
        assert_eq!(config.reminder_interval, Duration::from_secs(1800));
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "9090"),
            ("APP_DATA_PATH", "/tmp/streaks.json"),
            ("STREAK_FREEZES_PER_USER", "2"),
            ("REMINDER_INTERVAL_MINUTES", "5"),
        ]);
        assert_eq!(config.port, 9090);
        assert_eq!(config.data_path, PathBuf::from("/tmp/streaks.json"));
        assert_eq!(config.freeze_policy, FreezePolicy::PerUser(2));
        assert_eq!(config.reminder_interval, Duration::from_secs(300));
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("STREAK_FREEZES_PER_USER", "-1"),
            ("REMINDER_INTERVAL_MINUTES", "0"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.freeze_policy, FreezePolicy::Unlimited);
        assert_eq!(config.reminder_interval, Duration::from_secs(1800));
    }

    #[test]
    fn oversized_interval_falls_back() {
        let config = config_from(&[("REMINDER_INTERVAL_MINUTES", "18446744073709551615")]);
        assert_eq!(config.reminder_interval, Duration::from_secs(1800));

        let config = config_from(&[("REMINDER_INTERVAL_MINUTES", "307445734561825860")]);
        assert_eq!(config.reminder_interval, Duration::from_secs(307445734561825860 * 60));
    }
}
