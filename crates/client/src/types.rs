//! Request and response types for the ActaLog API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Authenticated user as returned by the backend
///
/// Only `id` is required. Fields this crate does not model are preserved in
/// `extra` so a stored identity round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl User {
    /// Name to greet the user with, falling back to email and then id
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("user #{}", self.id))
    }
}

/// Login request
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Ask the server for a refresh token
    pub remember_me: bool,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Response of login, register and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Access token
    pub token: String,
    pub user: User,
    /// Only issued by login when `remember_me` was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Body of refresh and revoke requests
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Profile update request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
}

impl UpdateProfileRequest {
    /// Whether the request would change nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.birthday.is_none()
    }
}

/// Profile response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
}

/// Forgot password and resend verification request
#[derive(Debug, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Password reset request
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Plain message response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_user_round_trips() {
        let user: User = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(serde_json::to_value(&user).unwrap(), json!({"id": 1}));
    }

    #[test]
    fn test_unknown_user_fields_are_preserved() {
        let raw = json!({"id": 7, "name": "Ada", "theme": "dark"});
        let user: User = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert_eq!(user.extra.get("theme"), Some(&json!("dark")));
        assert_eq!(serde_json::to_value(&user).unwrap(), raw);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user: User = serde_json::from_value(json!({"id": 3})).unwrap();
        assert_eq!(user.display_name(), "user #3");
        user.email = Some("a@b.c".into());
        assert_eq!(user.display_name(), "a@b.c");
        user.name = Some("Ada".into());
        assert_eq!(user.display_name(), "Ada");
    }

    #[test]
    fn test_auth_response_without_refresh_token() {
        let response: AuthResponse =
            serde_json::from_value(json!({"token": "t1", "user": {"id": 1}})).unwrap();
        assert_eq!(response.token, "t1");
        assert!(response.refresh_token.is_none());
    }

    #[test]
    fn test_profile_update_skips_absent_fields() {
        let update = UpdateProfileRequest {
            name: Some("Ada".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"name": "Ada"}));
    }
}
