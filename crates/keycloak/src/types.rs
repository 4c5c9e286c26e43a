//! Wire types for the Keycloak admin and token endpoints.

use serde::{Deserialize, Serialize};

/// A group as returned by `GET /admin/realms/{realm}/groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRepresentation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Body of a group creation request.
#[derive(Debug, Clone, Serialize)]
pub struct NewGroup<'a> {
    pub name: &'a str,
}

/// Successful response from the OpenID Connect token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_group_representation_ignores_extra_fields() {
        let json = r#"{"id":"1f2e","name":"team-a-admins","path":"/team-a-admins","subGroups":[],"attributes":{}}"#;
        let group: GroupRepresentation = serde_json::from_str(json).unwrap();
        assert_eq!(group.id, "1f2e");
        assert_eq!(group.name, "team-a-admins");
        assert_eq!(group.path.as_deref(), Some("/team-a-admins"));
    }

    #[test]
    fn test_token_response_parses() {
        let json = r#"{"access_token":"abc","expires_in":60,"refresh_expires_in":1800,"token_type":"Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, 60);
    }
}
