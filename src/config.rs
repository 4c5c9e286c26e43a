//! Runtime configuration.
//!
//! Settings come from an optional TOML file and the process environment;
//! environment variables win. The result is one immutable [`Config`] built at
//! startup. Keys in the file are the lower-cased environment variable names.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nsgroup_keycloak::KeycloakConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const NAMESPACE_FILTER: &str = "NAMESPACE_FILTER";
pub const GROUP_POSTFIXES: &str = "GROUP_POSTFIXES";
pub const GROUPS_PREFIX: &str = "GROUPS_PREFIX";
pub const NAMESPACE_LABEL_SELECTOR: &str = "NAMESPACE_LABEL_SELECTOR";
pub const KEYCLOAK_URL: &str = "KEYCLOAK_URL";
pub const KEYCLOAK_USER: &str = "KEYCLOAK_USER";
pub const KEYCLOAK_PASS: &str = "KEYCLOAK_PASS";
pub const KEYCLOAK_REALM: &str = "KEYCLOAK_REALM";
pub const KEYCLOAK_LOGIN_REALM: &str = "KEYCLOAK_LOGIN_REALM";
pub const KEYCLOAK_CLIENT_ID: &str = "KEYCLOAK_CLIENT_ID";
pub const KEYCLOAK_TIMEOUT_SECS: &str = "KEYCLOAK_TIMEOUT_SECS";

/// Every environment variable the service reads.
pub const ENV_KEYS: [&str; 11] = [
    NAMESPACE_FILTER,
    GROUP_POSTFIXES,
    GROUPS_PREFIX,
    NAMESPACE_LABEL_SELECTOR,
    KEYCLOAK_URL,
    KEYCLOAK_USER,
    KEYCLOAK_PASS,
    KEYCLOAK_REALM,
    KEYCLOAK_LOGIN_REALM,
    KEYCLOAK_CLIENT_ID,
    KEYCLOAK_TIMEOUT_SECS,
];

const DEFAULT_NAMESPACE_FILTER: &str = ".*";

/// Configuration loading and validation errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {key}")]
    Missing { key: &'static str },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Raw settings before validation. Every field is optional so file and
/// environment layers can be merged.
#[derive(Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub namespace_filter: Option<String>,
    pub group_postfixes: Option<Vec<String>>,
    pub groups_prefix: Option<String>,
    pub namespace_label_selector: Option<String>,
    pub keycloak_url: Option<String>,
    pub keycloak_user: Option<String>,
    pub keycloak_pass: Option<String>,
    pub keycloak_realm: Option<String>,
    pub keycloak_login_realm: Option<String>,
    pub keycloak_client_id: Option<String>,
    pub keycloak_timeout_secs: Option<u64>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("namespace_filter", &self.namespace_filter)
            .field("group_postfixes", &self.group_postfixes)
            .field("groups_prefix", &self.groups_prefix)
            .field("namespace_label_selector", &self.namespace_label_selector)
            .field("keycloak_url", &self.keycloak_url)
            .field("keycloak_user", &self.keycloak_user)
            .field("keycloak_pass", &self.keycloak_pass.as_ref().map(|_| "<redacted>"))
            .field("keycloak_realm", &self.keycloak_realm)
            .field("keycloak_login_realm", &self.keycloak_login_realm)
            .field("keycloak_client_id", &self.keycloak_client_id)
            .field("keycloak_timeout_secs", &self.keycloak_timeout_secs)
            .finish()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Read` if the file cannot be read and `Parse` if it is not
    /// valid TOML or contains unknown keys.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override settings with environment variables.
    ///
    /// Unknown variables are ignored; empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if a numeric variable does not parse.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }

            match key.as_ref() {
                NAMESPACE_FILTER => self.namespace_filter = Some(value),
                GROUP_POSTFIXES => self.group_postfixes = Some(split_postfixes(&value)),
                GROUPS_PREFIX => self.groups_prefix = Some(value),
                NAMESPACE_LABEL_SELECTOR => self.namespace_label_selector = Some(value),
                KEYCLOAK_URL => self.keycloak_url = Some(value),
                KEYCLOAK_USER => self.keycloak_user = Some(value),
                KEYCLOAK_PASS => self.keycloak_pass = Some(value),
                KEYCLOAK_REALM => self.keycloak_realm = Some(value),
                KEYCLOAK_LOGIN_REALM => self.keycloak_login_realm = Some(value),
                KEYCLOAK_CLIENT_ID => self.keycloak_client_id = Some(value),
                KEYCLOAK_TIMEOUT_SECS => {
                    let secs = value.trim().parse().map_err(|e| ConfigError::Invalid {
                        key: KEYCLOAK_TIMEOUT_SECS,
                        reason: format!("{value:?}: {e}"),
                    })?;
                    self.keycloak_timeout_secs = Some(secs);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate and fill in defaults.
    ///
    /// # Errors
    ///
    /// Returns `Missing` for absent required settings and `Invalid` for
    /// values that cannot be used.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let group_postfixes: Vec<String> = self
            .group_postfixes
            .unwrap_or_default()
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if group_postfixes.is_empty() {
            return Err(ConfigError::Missing {
                key: GROUP_POSTFIXES,
            });
        }

        let raw_url = required(self.keycloak_url, KEYCLOAK_URL)?;
        let base_url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::Invalid {
            key: KEYCLOAK_URL,
            reason: format!("{raw_url:?}: {e}"),
        })?;

        let mut keycloak = KeycloakConfig::new(
            base_url,
            required(self.keycloak_user, KEYCLOAK_USER)?,
            required(self.keycloak_pass, KEYCLOAK_PASS)?,
            required(self.keycloak_realm, KEYCLOAK_REALM)?,
        );
        if let Some(realm) = self.keycloak_login_realm {
            keycloak = keycloak.login_realm(realm);
        }
        if let Some(client_id) = self.keycloak_client_id {
            keycloak = keycloak.client_id(client_id);
        }
        if let Some(secs) = self.keycloak_timeout_secs {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: KEYCLOAK_TIMEOUT_SECS,
                    reason: "must be at least 1".to_string(),
                });
            }
            keycloak = keycloak.timeout(Duration::from_secs(secs));
        }

        Ok(Config {
            namespace_filter: self
                .namespace_filter
                .unwrap_or_else(|| DEFAULT_NAMESPACE_FILTER.to_string()),
            group_postfixes,
            groups_prefix: self.groups_prefix.unwrap_or_default(),
            label_selector: self
                .namespace_label_selector
                .filter(|s| !s.trim().is_empty()),
            keycloak,
        })
    }
}

/// Validated configuration. The Keycloak password is redacted from `Debug`.
#[derive(Debug, Clone)]
pub struct Config {
    pub namespace_filter: String,
    pub group_postfixes: Vec<String>,
    pub groups_prefix: String,
    pub label_selector: Option<String>,
    pub keycloak: KeycloakConfig,
}

impl Config {
    /// Load from an optional file, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be loaded or the merged
    /// settings are incomplete or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env(known_env_vars(std::env::vars_os())?)?;
        settings.into_config()
    }
}

/// Pick the variables named in [`ENV_KEYS`] out of a raw environment.
///
/// Other variables are ignored whatever their encoding.
///
/// # Errors
///
/// Returns `Invalid` if one of our variables is not valid UTF-8.
pub fn known_env_vars<I>(vars: I) -> Result<Vec<(&'static str, String)>, ConfigError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut known = Vec::new();
    for (key, value) in vars {
        let Some(key) = key.to_str().and_then(|k| ENV_KEYS.into_iter().find(|known| *known == k)) else {
            continue;
        };
        let value = value.into_string().map_err(|_| ConfigError::Invalid {
            key,
            reason: "value is not valid UTF-8".to_string(),
        })?;
        known.push((key, value));
    }
    Ok(known)
}

/// Split a comma-separated postfix list, trimming whitespace and dropping
/// empty entries.
pub fn split_postfixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { key })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use super::*;

    fn base_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (GROUP_POSTFIXES, "admins, viewers"),
            (KEYCLOAK_URL, "https://sso.example.com"),
            (KEYCLOAK_USER, "admin"),
            (KEYCLOAK_PASS, "hunter2"),
            (KEYCLOAK_REALM, "apps"),
        ]
    }

    fn from_env(vars: Vec<(&'static str, &'static str)>) -> Result<Config, ConfigError> {
        let mut settings = Settings::default();
        settings.apply_env(vars)?;
        settings.into_config()
    }

    #[test]
    fn test_defaults_applied() {
        let config = from_env(base_env()).unwrap();
        assert_eq!(config.namespace_filter, ".*");
        assert_eq!(config.groups_prefix, "");
        assert_eq!(config.group_postfixes, vec!["admins", "viewers"]);
        assert_eq!(config.label_selector, None);
        assert_eq!(config.keycloak.login_realm, "master");
        assert_eq!(config.keycloak.client_id, "admin-cli");
        assert_eq!(config.keycloak.realm, "apps");
    }

    #[test]
    fn test_postfix_parsing() {
        assert_eq!(split_postfixes(" admins ,, viewers ,"), vec!["admins", "viewers"]);
        assert!(split_postfixes(" , ,").is_empty());
    }

    #[test]
    fn test_postfixes_required() {
        let mut env = base_env();
        env.retain(|(k, _)| *k != GROUP_POSTFIXES);
        env.push((GROUP_POSTFIXES, " , "));

        let result = from_env(env);
        assert!(matches!(
            result,
            Err(ConfigError::Missing {
                key: GROUP_POSTFIXES
            })
        ));
    }

    #[test]
    fn test_missing_keycloak_url() {
        let mut env = base_env();
        env.retain(|(k, _)| *k != KEYCLOAK_URL);

        let result = from_env(env);
        assert!(matches!(
            result,
            Err(ConfigError::Missing { key: KEYCLOAK_URL })
        ));
    }

    #[test]
    fn test_invalid_url_and_timeout() {
        let mut env = base_env();
        env.push((KEYCLOAK_URL, "not a url"));
        assert!(matches!(
            from_env(env),
            Err(ConfigError::Invalid { key: KEYCLOAK_URL, .. })
        ));

        let mut env = base_env();
        env.push((KEYCLOAK_TIMEOUT_SECS, "soon"));
        assert!(matches!(
            from_env(env),
            Err(ConfigError::Invalid {
                key: KEYCLOAK_TIMEOUT_SECS,
                ..
            })
        ));
    }

    #[test]
    fn test_optional_overrides() {
        let mut env = base_env();
        env.extend([
            (NAMESPACE_FILTER, "^team-"),
            (GROUPS_PREFIX, "team-"),
            (NAMESPACE_LABEL_SELECTOR, "sync=enabled"),
            (KEYCLOAK_LOGIN_REALM, "apps"),
            (KEYCLOAK_CLIENT_ID, "sync-bot"),
            (KEYCLOAK_TIMEOUT_SECS, "5"),
        ]);

        let config = from_env(env).unwrap();
        assert_eq!(config.namespace_filter, "^team-");
        assert_eq!(config.groups_prefix, "team-");
        assert_eq!(config.label_selector.as_deref(), Some("sync=enabled"));
        assert_eq!(config.keycloak.login_realm, "apps");
        assert_eq!(config.keycloak.client_id, "sync-bot");
        assert_eq!(config.keycloak.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
namespace_filter = "^team-"
group_postfixes = ["admins"]
groups_prefix = "team-"
keycloak_url = "https://sso.example.com/auth"
keycloak_user = "file-admin"
keycloak_pass = "from-file"
keycloak_realm = "apps"
"#
        )
        .unwrap();

        let mut settings = Settings::from_file(file.path()).unwrap();
        settings
            .apply_env([(KEYCLOAK_USER, "env-admin"), (GROUPS_PREFIX, "")])
            .unwrap();
        let config = settings.into_config().unwrap();

        assert_eq!(config.keycloak.username, "env-admin");
        assert_eq!(config.keycloak.password, "from-file");
        assert_eq!(config.groups_prefix, "team-");
        assert_eq!(config.group_postfixes, vec!["admins"]);
        assert_eq!(config.keycloak.base_url.as_str(), "https://sso.example.com/auth");
    }

    /// # GIVEN: an environment with a foreign variable that is not UTF-8
    /// # WHEN: our variables are picked out of it
    /// # THEN: the foreign variable is ignored and ours are kept
    #[cfg(unix)]
    #[test]
    fn test_foreign_non_utf8_variable_is_ignored() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("BAD"), OsString::from_vec(vec![0xff])),
            (OsString::from_vec(vec![0xfe]), OsString::from("x")),
            (OsString::from(KEYCLOAK_REALM), OsString::from("apps")),
        ];

        let known = known_env_vars(vars).unwrap();
        assert_eq!(known, vec![(KEYCLOAK_REALM, "apps".to_string())]);
    }

    /// # GIVEN: one of our variables holds bytes that are not UTF-8
    /// # WHEN: our variables are picked out of the environment
    /// # THEN: loading fails with an invalid-value error naming that variable
    #[cfg(unix)]
    #[test]
    fn test_non_utf8_value_of_known_variable_is_invalid() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![(OsString::from(KEYCLOAK_PASS), OsString::from_vec(vec![b'p', 0xff]))];

        assert!(matches!(
            known_env_vars(vars),
            Err(ConfigError::Invalid { key: KEYCLOAK_PASS, .. })
        ));
    }

    #[test]
    fn test_unknown_file_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"keycloak_password = "typo""#).unwrap();

        assert!(matches!(
            Settings::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut settings = Settings::default();
        settings.apply_env(base_env()).unwrap();
        assert!(!format!("{settings:?}").contains("hunter2"));

        let config = settings.into_config().unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
