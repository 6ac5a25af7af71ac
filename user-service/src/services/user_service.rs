use shared::auth::{TokenPair, TokenService, TokenType};
use shared::database::contains_pattern;
use shared::types::{FileWithAuthor, PageRequest, Role, User, UserPublic, FILE_COLUMNS};
use shared::{CommonError, CommonResult};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth;
use crate::models::*;
use crate::services::github::GithubIdentity;
use crate::services::session_store::SessionStore;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, image, bio, github_id, role, created_at, updated_at";

fn invalid_credentials() -> CommonError {
    CommonError::AuthenticationFailed("Invalid credentials".to_string())
}

fn user_not_found() -> CommonError {
    CommonError::NotFound("User not found".to_string())
}

/// Tables and ordering behind each of a user's file lists. `$1` is the user id.
fn file_list_source(list: FileList) -> (&'static str, &'static str) {
    match list {
        FileList::Uploads => (
            "FROM files f JOIN users u ON u.id = f.author_id WHERE f.author_id = $1",
            "f.created_at DESC",
        ),
        FileList::Downloads => (
            "FROM user_downloads l JOIN files f ON f.id = l.file_id \
             JOIN users u ON u.id = f.author_id WHERE l.user_id = $1",
            "l.created_at DESC",
        ),
        FileList::Favorites => (
            "FROM user_favorites l JOIN files f ON f.id = l.file_id \
             JOIN users u ON u.id = f.author_id WHERE l.user_id = $1",
            "l.created_at DESC",
        ),
    }
}

pub fn file_list_query(list: FileList) -> String {
    let (source, order) = file_list_source(list);
    format!(
        "SELECT {}, u.name AS author_name, u.image AS author_image {} ORDER BY {} LIMIT $2 OFFSET $3",
        FILE_COLUMNS, source, order
    )
}

pub fn file_list_count_query(list: FileList) -> String {
    let (source, _) = file_list_source(list);
    format!("SELECT COUNT(*) {}", source)
}

/// ILIKE pattern for the admin user search. Blank searches match everyone.
fn user_search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(contains_pattern)
}

pub struct UserService {
    db_pool: PgPool,
    tokens: Arc<TokenService>,
    sessions: Arc<dyn SessionStore>,
}

impl UserService {
    pub fn new(db_pool: PgPool, tokens: Arc<TokenService>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            db_pool,
            tokens,
            sessions,
        }
    }

    // ============= Authentication =============

    pub async fn register(&self, req: RegisterRequest) -> CommonResult<AuthResponse> {
        let email = normalize_email(&req.email);

        if self.find_by_email(&email).await?.is_some() {
            return Err(CommonError::AlreadyExists(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = auth::hash_password(&req.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(req.name.trim())
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(user_id = %user.id, "User registered");

        self.start_session(user).await
    }

    pub async fn login(&self, req: LoginRequest) -> CommonResult<AuthResponse> {
        let email = normalize_email(&req.email);

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(invalid_credentials)?;

        // GitHub-only accounts have no password to check
        let password_hash = user
            .password_hash
            .as_deref()
            .ok_or_else(invalid_credentials)?;

        if !auth::verify_password(&req.password, password_hash)? {
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            return Err(invalid_credentials());
        }

        tracing::info!(user_id = %user.id, "User logged in");

        self.start_session(user).await
    }

    /// Rotate both tokens. The refresh token must be the one on record.
    pub async fn refresh(&self, refresh_token: &str) -> CommonResult<AuthResponse> {
        let claims = self.tokens.validate_as(refresh_token, TokenType::Refresh)?;
        let user_id = claims.user_id()?;

        let stored = self.sessions.get_session(user_id).await?;
        if stored.as_deref() != Some(refresh_token) {
            return Err(CommonError::AuthenticationFailed(
                "Session expired or revoked".to_string(),
            ));
        }

        // Re-read so a role change shows up in the new tokens
        let user = self.get_user(user_id).await?;
        self.start_session(user).await
    }

    pub async fn logout(&self, user_id: Uuid) -> CommonResult<()> {
        self.sessions.delete_session(user_id).await?;
        tracing::info!(%user_id, "User logged out");
        Ok(())
    }

    /// Find the account for a GitHub identity: by GitHub id, then by email
    /// (linking the two), else create one.
    pub async fn login_with_github(&self, identity: GithubIdentity) -> CommonResult<AuthResponse> {
        let email = normalize_email(&identity.email);

        let user = match self.find_by_github_id(&identity.github_id).await? {
            Some(user) => user,
            None => match self.find_by_email(&email).await? {
                Some(existing) => {
                    tracing::info!(user_id = %existing.id, "Linking GitHub account");
                    sqlx::query_as::<_, User>(&format!(
                        "UPDATE users SET github_id = $2, image = COALESCE(image, $3), \
                         updated_at = NOW() WHERE id = $1 RETURNING {}",
                        USER_COLUMNS
                    ))
                    .bind(existing.id)
                    .bind(&identity.github_id)
                    .bind(&identity.avatar_url)
                    .fetch_one(&self.db_pool)
                    .await?
                }
                None => {
                    let user = sqlx::query_as::<_, User>(&format!(
                        "INSERT INTO users (name, email, image, github_id) \
                         VALUES ($1, $2, $3, $4) RETURNING {}",
                        USER_COLUMNS
                    ))
                    .bind(&identity.name)
                    .bind(&email)
                    .bind(&identity.avatar_url)
                    .bind(&identity.github_id)
                    .fetch_one(&self.db_pool)
                    .await?;
                    tracing::info!(user_id = %user.id, "User registered via GitHub");
                    user
                }
            },
        };

        self.start_session(user).await
    }

    async fn start_session(&self, user: User) -> CommonResult<AuthResponse> {
        let TokenPair {
            access_token,
            refresh_token,
            expires_in,
        } = self.tokens.issue_pair(&user)?;

        self.sessions
            .store_session(user.id, &refresh_token, self.tokens.refresh_token_ttl())
            .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            expires_in,
            user: UserPublic::from(user),
        })
    }

    // ============= Users =============

    async fn find_by_email(&self, email: &str) -> CommonResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(user)
    }

    async fn find_by_github_id(&self, github_id: &str) -> CommonResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE github_id = $1",
            USER_COLUMNS
        ))
        .bind(github_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> CommonResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn profile_stats(&self, user_id: Uuid) -> CommonResult<ProfileStats> {
        let stats = sqlx::query_as::<_, ProfileStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM files WHERE author_id = $1) AS uploads,
                (SELECT COUNT(*) FROM user_downloads WHERE user_id = $1) AS downloads,
                (SELECT COUNT(*) FROM user_favorites WHERE user_id = $1) AS favorites
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(stats)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> CommonResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                bio = COALESCE($3, bio),
                image = COALESCE($4, image),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(&req.bio)
        .bind(&req.image)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(user_not_found)
    }

    /// Point the user at a new avatar, returning the image it replaced.
    pub async fn set_avatar(&self, user_id: Uuid, image_url: &str) -> CommonResult<Option<String>> {
        let previous = sqlx::query_scalar::<_, Option<String>>(
            r#"
            UPDATE users u
            SET image = $2, updated_at = NOW()
            FROM (SELECT id, image FROM users WHERE id = $1 FOR UPDATE) old
            WHERE u.id = old.id
            RETURNING old.image
            "#,
        )
        .bind(user_id)
        .bind(image_url)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(user_not_found)?;

        Ok(previous)
    }

    // ============= File lists =============

    pub async fn list_files(
        &self,
        user_id: Uuid,
        list: FileList,
        page: PageRequest,
    ) -> CommonResult<(Vec<FileWithAuthor>, u64)> {
        let rows = sqlx::query_as::<_, FileWithAuthor>(&file_list_query(list))
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.db_pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&file_list_count_query(list))
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await?;

        Ok((rows, total.max(0) as u64))
    }

    async fn ensure_file_exists(&self, file_id: Uuid) -> CommonResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM files WHERE id = $1)")
            .bind(file_id)
            .fetch_one(&self.db_pool)
            .await?;

        if !exists {
            return Err(CommonError::NotFound("File not found".to_string()));
        }
        Ok(())
    }

    pub async fn add_favorite(&self, user_id: Uuid, file_id: Uuid) -> CommonResult<()> {
        self.ensure_file_exists(file_id).await?;

        sqlx::query(
            "INSERT INTO user_favorites (user_id, file_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(file_id)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    pub async fn remove_favorite(&self, user_id: Uuid, file_id: Uuid) -> CommonResult<()> {
        self.ensure_file_exists(file_id).await?;

        sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND file_id = $2")
            .bind(user_id)
            .bind(file_id)
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }

    // ============= Contact =============

    pub async fn save_contact_message(&self, req: ContactRequest) -> CommonResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO contact_messages (name, email, subject, message)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(req.name.trim())
        .bind(normalize_email(&req.email))
        .bind(req.subject.trim())
        .bind(&req.message)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(id)
    }

    // ============= Admin =============

    pub async fn list_users(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> CommonResult<(Vec<User>, u64)> {
        let pattern = user_search_pattern(search);

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE $1::TEXT IS NULL OR name ILIKE $1 OR email ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            USER_COLUMNS
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE $1::TEXT IS NULL OR name ILIKE $1 OR email ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.db_pool)
        .await?;

        Ok((users, total.max(0) as u64))
    }

    pub async fn set_role(&self, user_id: Uuid, role: Role) -> CommonResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(user_not_found)?;

        tracing::info!(%user_id, role = role.as_str(), "User role updated");
        Ok(user)
    }
}
