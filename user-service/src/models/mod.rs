use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{FileSummary, Pagination, Role, User, UserPublic};
use shared::CommonError;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

pub type UserResult<T> = Result<T, UserError>;

/// Failures from the service's own dependencies (Redis, GitHub, hashing).
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Session store error: {0}")]
    SessionStore(#[from] redis::RedisError),

    #[error("GitHub request failed: {0}")]
    Github(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl From<reqwest::Error> for UserError {
    fn from(err: reqwest::Error) -> Self {
        UserError::Github(err.to_string())
    }
}

impl From<UserError> for CommonError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::SessionStore(e) => CommonError::ExternalService(e.to_string()),
            UserError::Github(e) => CommonError::ExternalService(e),
            UserError::PasswordHash(e) => CommonError::Internal(e),
        }
    }
}

pub fn validation_error(err: validator::ValidationErrors) -> CommonError {
    CommonError::ValidationFailed(err.to_string())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be at least 2 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Emails are matched case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserPublic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: Role,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        let role = user.role();
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            image: user.image,
            role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: SessionUser,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GithubCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,

    #[validate(url(message = "Image must be a URL"))]
    pub image: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.bio.is_none() && self.image.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ProfileStats {
    pub uploads: i64,
    pub downloads: i64,
    pub favorites: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserPublic,
    pub stats: ProfileStats,
}

/// What anyone can see about a user. No email.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub uploads: i64,
}

impl PublicProfile {
    pub fn new(user: User, uploads: i64) -> Self {
        let role = user.role();
        Self {
            id: user.id,
            name: user.name,
            image: user.image,
            bio: user.bio,
            role,
            created_at: user.created_at,
            uploads,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub success: bool,
    pub image: String,
}

/// Which of the caller's file lists to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileList {
    Uploads,
    Downloads,
    Favorites,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub success: bool,
    pub favorited: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be at least 2 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 2, max = 200, message = "Subject is required"))]
    pub subject: String,

    #[validate(length(min = 10, max = 5000, message = "Message must be at least 10 characters"))]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminUserQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserPublic>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "correct-horse".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short_name = RegisterRequest {
            name: "A".to_string(),
            ..ok_register()
        };
        assert!(short_name.validate().is_err());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..ok_register()
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            password: "1234567".to_string(),
            ..ok_register()
        };
        assert!(short_password.validate().is_err());
    }

    fn ok_register() -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "correct-horse".to_string(),
        }
    }

    #[test]
    fn test_login_accepts_six_character_passwords() {
        let login = LoginRequest {
            email: "alice@example.com".to_string(),
            password: "123456".to_string(),
        };
        assert!(login.validate().is_ok());

        let login = LoginRequest {
            password: "12345".to_string(),
            ..login
        };
        assert!(login.validate().is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_update_profile_validation() {
        let empty: UpdateProfileRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
        assert!(empty.validate().is_ok());

        let bad_image: UpdateProfileRequest =
            serde_json::from_str(r#"{"image": "nope"}"#).unwrap();
        assert!(!bad_image.is_empty());
        assert!(bad_image.validate().is_err());

        let long_bio = UpdateProfileRequest {
            name: None,
            bio: Some("x".repeat(501)),
            image: None,
        };
        assert!(long_bio.validate().is_err());
    }

    #[test]
    fn test_refresh_request_is_camel_case() {
        let req: RefreshTokenRequest =
            serde_json::from_str(r#"{"refreshToken": "abc"}"#).unwrap();
        assert_eq!(req.refresh_token, "abc");
    }

    #[test]
    fn test_public_profile_hides_email() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: Some("hash".to_string()),
            image: None,
            bio: Some("Kernel hacker".to_string()),
            github_id: None,
            role: "admin".to_string(),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(PublicProfile::new(user, 3)).unwrap();
        assert!(json.get("email").is_none());
        assert_eq!(json["role"], "admin");
        assert_eq!(json["uploads"], 3);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_user_error_status() {
        let err: CommonError = UserError::Github("timeout".to_string()).into();
        assert_eq!(err.http_status_code(), 502);

        let err: CommonError = UserError::PasswordHash("bad".to_string()).into();
        assert_eq!(err.http_status_code(), 500);
    }
}
