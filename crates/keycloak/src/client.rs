//! Keycloak admin API client.
//!
//! Authenticates with the password grant, caches the access token until
//! shortly before it expires and retries transient failures with
//! exponential backoff.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::KeycloakConfig;
use crate::error::{Error, Result};
use crate::types::{GroupRepresentation, NewGroup, TokenResponse};

/// A token this close to expiry is replaced before use.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now.checked_add(TOKEN_REFRESH_MARGIN)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

/// Client for the realm group endpoints of the Keycloak admin API.
#[derive(Debug, Clone)]
pub struct KeycloakClient {
    config: Arc<KeycloakConfig>,
    http_client: reqwest::Client,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl KeycloakClient {
    /// Create a new client. No request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the HTTP client cannot be built or the base
    /// URL cannot carry a path.
    pub fn new(config: KeycloakConfig) -> Result<Self> {
        if config.base_url.cannot_be_a_base() {
            return Err(Error::config_error(format!(
                "base URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config_error(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Realm whose groups this client manages.
    pub fn realm(&self) -> &str {
        &self.config.realm
    }

    /// List every top-level group of the realm, page by page.
    ///
    /// Stops early if a page starts with a group already seen, as happens
    /// when a server or proxy ignores the `first` offset.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or any page cannot be fetched.
    pub async fn list_groups(&self) -> Result<Vec<GroupRepresentation>> {
        let url = self.admin_url(&["groups"])?;
        let page_size = self.config.page_size.max(1);
        let max = page_size.to_string();

        let mut groups = Vec::new();
        let mut seen = HashSet::new();
        let mut first = 0u32;
        loop {
            let offset = first.to_string();
            let response = self
                .send(|| {
                    self.http_client.get(url.clone()).query(&[
                        ("first", offset.as_str()),
                        ("max", max.as_str()),
                        ("briefRepresentation", "true"),
                    ])
                })
                .await?;
            let page: Vec<GroupRepresentation> = decode(response).await?;

            let fetched = page.len();
            if page.first().is_some_and(|group| seen.contains(&group.id)) {
                warn!(realm = %self.config.realm, first, "Group page repeats an earlier page, stopping");
                break;
            }
            seen.extend(page.iter().map(|group| group.id.clone()));
            groups.extend(page);
            if fetched < page_size as usize {
                break;
            }
            first = first.saturating_add(page_size);
        }

        debug!(realm = %self.config.realm, count = groups.len(), "Listed groups");
        Ok(groups)
    }

    /// Find a top-level group by exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the search request fails.
    pub async fn find_group(&self, name: &str) -> Result<Option<GroupRepresentation>> {
        let url = self.admin_url(&["groups"])?;
        let response = self
            .send(|| {
                self.http_client
                    .get(url.clone())
                    .query(&[("search", name), ("exact", "true")])
            })
            .await?;
        let matches: Vec<GroupRepresentation> = decode(response).await?;

        // Older servers ignore `exact` and match substrings.
        Ok(matches.into_iter().find(|group| group.name == name))
    }

    /// Create a top-level group.
    ///
    /// # Errors
    ///
    /// Returns `GroupExists` if the realm already holds a group with this
    /// name, or another error if the request fails.
    pub async fn create_group(&self, name: &str) -> Result<()> {
        let url = self.admin_url(&["groups"])?;
        let result = self
            .send(|| self.http_client.post(url.clone()).json(&NewGroup { name }))
            .await;

        match result {
            Ok(_) => {
                info!(realm = %self.config.realm, group = name, "Created group");
                Ok(())
            }
            Err(Error::Api { status: 409, .. }) => Err(Error::group_exists(name)),
            Err(e) => Err(e),
        }
    }

    /// Delete a top-level group by name.
    ///
    /// The name is resolved to the group's id first.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` if no group has this name, or another error
    /// if a request fails.
    pub async fn delete_group(&self, name: &str) -> Result<()> {
        let group = self
            .find_group(name)
            .await?
            .ok_or_else(|| Error::group_not_found(name))?;
        let url = self.admin_url(&["groups", group.id.as_str()])?;

        match self.send(|| self.http_client.delete(url.clone())).await {
            Ok(_) => {
                info!(realm = %self.config.realm, group = name, id = %group.id, "Deleted group");
                Ok(())
            }
            Err(Error::Api { status: 404, .. }) => Err(Error::group_not_found(name)),
            Err(e) => Err(e),
        }
    }

    /// Build `{base}/admin/realms/{realm}/{segments..}`.
    fn admin_url(&self, segments: &[&str]) -> Result<Url> {
        let mut path = vec!["admin", "realms", self.config.realm.as_str()];
        path.extend_from_slice(segments);
        self.endpoint(&path)
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::config_error(format!(
                    "base URL cannot carry a path: {}",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send an authenticated request with retry logic.
    ///
    /// A 401 clears the cached token and repeats the request once without
    /// counting as an attempt. Retryable errors back off exponentially:
    /// base delay, then twice that, then four times, until `max_retries`
    /// attempts have been made.
    async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0u32;
        let mut reauthenticated = false;

        loop {
            attempt = attempt.saturating_add(1);

            match self.send_once(&build).await {
                Err(Error::Api { status: 401, .. }) if !reauthenticated => {
                    debug!(realm = %self.config.realm, "Access token rejected, logging in again");
                    reauthenticated = true;
                    attempt = attempt.saturating_sub(1);
                    self.invalidate_token().await;
                }
                Err(e) if attempt < self.config.max_retries && e.is_retryable() => {
                    let delay = self.backoff(attempt);
                    info!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying Keycloak request (attempt {}/{})",
                        attempt,
                        self.config.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// A single request attempt; non-2xx statuses become `Error::Api`.
    async fn send_once<F>(&self, build: &F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let token = self.access_token().await?;
        let response = build().bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::api(status.as_u16(), body))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config.retry_base_delay.saturating_mul(factor)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let token = self.login().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Password grant against the login realm's token endpoint.
    async fn login(&self) -> Result<CachedToken> {
        let url = self.endpoint(&[
            "realms",
            self.config.login_realm.as_str(),
            "protocol",
            "openid-connect",
            "token",
        ])?;

        let response = self
            .http_client
            .post(url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.config.client_id.as_str()),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(Error::api(status.as_u16(), body));
            }
            return Err(Error::authentication_failed(format!("{status}: {body}")));
        }

        let token: TokenResponse = decode(response).await?;
        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(token.expires_in))
            .unwrap_or(now);

        debug!(
            login_realm = %self.config.login_realm,
            expires_in = token.expires_in,
            "Obtained admin access token"
        );

        Ok(CachedToken {
            value: token.access_token,
            expires_at,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::invalid_response(e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn client(base: &str) -> KeycloakClient {
        let config = KeycloakConfig::new(Url::parse(base).unwrap(), "admin", "secret", "apps");
        KeycloakClient::new(config).unwrap()
    }

    #[test]
    fn test_admin_url_keeps_base_path() {
        let client = client("https://sso.example.com/auth/");
        let url = client.admin_url(&["groups", "1f2e"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sso.example.com/auth/admin/realms/apps/groups/1f2e"
        );
    }

    #[test]
    fn test_admin_url_encodes_segments() {
        let client = client("https://sso.example.com");
        let url = client.admin_url(&["groups", "a/b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sso.example.com/admin/realms/apps/groups/a%2Fb"
        );
    }

    #[test]
    fn test_backoff_doubles() {
        let config = KeycloakConfig::new(
            Url::parse("https://sso.example.com").unwrap(),
            "admin",
            "secret",
            "apps",
        )
        .retries(4, Duration::from_millis(100));
        let client = KeycloakClient::new(config).unwrap();

        assert_eq!(client.backoff(1), Duration::from_millis(100));
        assert_eq!(client.backoff(2), Duration::from_millis(200));
        assert_eq!(client.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_token_freshness_margin() {
        let now = Instant::now();
        let fresh = CachedToken {
            value: "a".to_string(),
            expires_at: now + Duration::from_secs(60),
        };
        let stale = CachedToken {
            value: "b".to_string(),
            expires_at: now + Duration::from_secs(5),
        };
        assert!(fresh.is_fresh(now));
        assert!(!stale.is_fresh(now));
    }

    #[test]
    fn test_rejects_cannot_be_a_base_url() {
        let config = KeycloakConfig::new(
            Url::parse("mailto:admin@example.com").unwrap(),
            "admin",
            "secret",
            "apps",
        );
        assert!(matches!(
            KeycloakClient::new(config),
            Err(Error::ConfigError { .. })
        ));
    }
}
