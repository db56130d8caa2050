use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_ONEAPI_BASE_URL: &str = "https://api.zsapi.net/zia/api/v1";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_URL_LOOKUP_DELAY_MS: u64 = 1000;
const URL_LOOKUP_DELAY_MS_MAX: u64 = 60_000;
const HTTP_TIMEOUT_SECS_MAX: u64 = 600;

pub const ACCESS_TOKEN_ENV: &str = "ZSCALER_ACCESS_TOKEN";
pub const ONEAPI_BASE_URL_ENV: &str = "ZSCALER_ZIA_BASE_URL";
pub const LEGACY_CLOUD_ENV: &str = "ZIA_CLOUD";
pub const LEGACY_BASE_URL_ENV: &str = "ZIA_LEGACY_BASE_URL";
pub const LEGACY_SESSION_ENV: &str = "ZIA_LEGACY_SESSION";
pub const HTTP_TIMEOUT_ENV: &str = "ZIA_MCP_HTTP_TIMEOUT_SECS";
pub const URL_LOOKUP_DELAY_ENV: &str = "ZIA_MCP_URL_LOOKUP_DELAY_MS";

/// Credentials persisted in the user's config directory.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub base_url: Option<String>,
    pub cloud: Option<String>,
    pub legacy_session: Option<String>,
}

pub fn client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

pub fn config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zia-mcp");
    config_dir.join("credentials.json")
}

pub fn load_credentials() -> Option<StoredCredentials> {
    let path = config_path();
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(creds) => Some(creds),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable credentials file");
            None
        }
    }
}

/// Connection settings for the HTTP client adapter.
///
/// Environment variables win over the stored credentials file.
#[derive(Debug, Clone, PartialEq)]
pub struct ZiaSettings {
    pub oneapi_base_url: String,
    pub access_token: Option<String>,
    pub legacy_base_url: Option<String>,
    pub legacy_session: Option<String>,
    pub timeout: Duration,
}

impl ZiaSettings {
    pub fn from_env() -> Self {
        Self::from_sources(|key| std::env::var(key).ok(), load_credentials().unwrap_or_default())
    }

    pub fn from_sources(lookup: impl Fn(&str) -> Option<String>, stored: StoredCredentials) -> Self {
        let env = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let oneapi_base_url = env(ONEAPI_BASE_URL_ENV)
            .or(stored.base_url)
            .unwrap_or_else(|| DEFAULT_ONEAPI_BASE_URL.to_string());
        let legacy_base_url = env(LEGACY_BASE_URL_ENV).or_else(|| {
            env(LEGACY_CLOUD_ENV)
                .or(stored.cloud)
                .map(|cloud| format!("https://zsapi.{}.net/api/v1", cloud.trim()))
        });
        let (timeout_secs, _) = parse_env_u64_with_bounds(
            env(HTTP_TIMEOUT_ENV),
            1,
            HTTP_TIMEOUT_SECS_MAX,
            DEFAULT_HTTP_TIMEOUT_SECS,
        );

        Self {
            oneapi_base_url,
            access_token: env(ACCESS_TOKEN_ENV).or(stored.access_token),
            legacy_base_url,
            legacy_session: env(LEGACY_SESSION_ENV).or(stored.legacy_session),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Pacing delay between URL lookup batches.
pub fn url_lookup_delay(raw: Option<String>) -> Duration {
    let (millis, clamped) = parse_env_u64_with_bounds(
        raw,
        0,
        URL_LOOKUP_DELAY_MS_MAX,
        DEFAULT_URL_LOOKUP_DELAY_MS,
    );
    if clamped {
        tracing::warn!(env = URL_LOOKUP_DELAY_ENV, millis, "URL lookup delay out of bounds; clamped");
    }
    Duration::from_millis(millis)
}

/// Returns the parsed value (default when absent or unparsable) and whether it was clamped.
pub fn parse_env_u64_with_bounds(raw: Option<String>, min: u64, max: u64, default: u64) -> (u64, bool) {
    let Some(parsed) = raw.and_then(|value| value.trim().parse::<u64>().ok()) else {
        return (default, false);
    };
    let clamped = parsed.clamp(min, max);
    (clamped, clamped != parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let settings = ZiaSettings::from_sources(lookup(&[]), StoredCredentials::default());
        assert_eq!(settings.oneapi_base_url, DEFAULT_ONEAPI_BASE_URL);
        assert_eq!(settings.access_token, None);
        assert_eq!(settings.legacy_base_url, None);
        assert_eq!(settings.timeout, Duration::from_secs(60));
    }

    #[test]
    fn environment_wins_over_stored_credentials() {
        let stored = StoredCredentials {
            access_token: Some("from-file".into()),
            cloud: Some("zscalertwo".into()),
            ..StoredCredentials::default()
        };
        let settings = ZiaSettings::from_sources(
            lookup(&[(ACCESS_TOKEN_ENV, "from-env"), (HTTP_TIMEOUT_ENV, "15")]),
            stored,
        );
        assert_eq!(settings.access_token.as_deref(), Some("from-env"));
        assert_eq!(
            settings.legacy_base_url.as_deref(),
            Some("https://zsapi.zscalertwo.net/api/v1")
        );
        assert_eq!(settings.timeout, Duration::from_secs(15));
    }

    #[test]
    fn explicit_legacy_base_url_beats_cloud_name() {
        let settings = ZiaSettings::from_sources(
            lookup(&[
                (LEGACY_CLOUD_ENV, "zscaler"),
                (LEGACY_BASE_URL_ENV, "https://zsapi.example.net/api/v1"),
            ]),
            StoredCredentials::default(),
        );
        assert_eq!(
            settings.legacy_base_url.as_deref(),
            Some("https://zsapi.example.net/api/v1")
        );
    }

    #[test]
    fn url_lookup_delay_parses_and_clamps() {
        assert_eq!(url_lookup_delay(None), Duration::from_millis(1000));
        assert_eq!(url_lookup_delay(Some("250".into())), Duration::from_millis(250));
        assert_eq!(url_lookup_delay(Some("abc".into())), Duration::from_millis(1000));
        assert_eq!(
            url_lookup_delay(Some("999999".into())),
            Duration::from_millis(URL_LOOKUP_DELAY_MS_MAX)
        );
    }
}
