//! Configuration for the Keycloak client.

use std::fmt;
use std::time::Duration;

use url::Url;

/// Realm the admin user logs in to when none is configured.
pub const DEFAULT_LOGIN_REALM: &str = "master";
/// OAuth client used for the password grant when none is configured.
pub const DEFAULT_CLIENT_ID: &str = "admin-cli";

/// Configuration for the [`KeycloakClient`](crate::KeycloakClient).
///
/// The password never appears in `Debug` output.
#[derive(Clone)]
pub struct KeycloakConfig {
    /// Base URL of the server, including any `/auth` path prefix.
    pub base_url: Url,
    /// Admin username.
    pub username: String,
    /// Admin password.
    pub password: String,
    /// Realm whose groups are managed.
    pub realm: String,
    /// Realm the admin user authenticates against.
    pub login_realm: String,
    /// OAuth client id for the password grant.
    pub client_id: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts per request before giving up on retryable errors.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub retry_base_delay: Duration,
    /// Groups fetched per page when listing.
    pub page_size: u32,
}

impl KeycloakConfig {
    /// Create a configuration with the default login realm, client and limits.
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            realm: realm.into(),
            login_realm: DEFAULT_LOGIN_REALM.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay: default_retry_base_delay(),
            page_size: default_page_size(),
        }
    }

    /// Set the login realm.
    #[must_use]
    pub fn login_realm(mut self, realm: impl Into<String>) -> Self {
        self.login_realm = realm.into();
        self
    }

    /// Set the OAuth client id.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Set the listing page size. Zero is raised to one.
    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("realm", &self.realm)
            .field("login_realm", &self.login_realm)
            .field("client_id", &self.client_id)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_base_delay() -> Duration {
    Duration::from_secs(1)
}

const fn default_page_size() -> u32 {
    100
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn base() -> Url {
        Url::parse("https://sso.example.com").unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = KeycloakConfig::new(base(), "admin", "secret", "apps");
        assert_eq!(config.login_realm, "master");
        assert_eq!(config.client_id, "admin-cli");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn test_config_builder() {
        let config = KeycloakConfig::new(base(), "admin", "secret", "apps")
            .login_realm("apps")
            .client_id("sync-bot")
            .timeout(Duration::from_secs(5))
            .retries(1, Duration::from_millis(10))
            .page_size(0);

        assert_eq!(config.login_realm, "apps");
        assert_eq!(config.client_id, "sync-bot");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_base_delay, Duration::from_millis(10));
        assert_eq!(config.page_size, 1);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = KeycloakConfig::new(base(), "admin", "hunter2", "apps");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("admin"));
    }
}
