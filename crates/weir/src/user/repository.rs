//! User repository for database operations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::models::{
    CreateUserRequest, OAuthAccount, OAuthLogin, UpdateUserRequest, User, UserListQuery, UserStats,
};

const USER_COLUMNS: &str = "id, email, hashed_password, is_active, is_superuser, is_verified, \
                            created_at, updated_at, last_login_at";

/// Repository for user and OAuth-account database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. The password, when given, must already be hashed.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        debug!("creating user {} ({})", request.email, id);

        sqlx::query(
            r#"
            INSERT INTO users (id, email, hashed_password, is_active, is_superuser, is_verified)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.email)
        .bind(&request.password)
        .bind(request.is_active)
        .bind(request.is_superuser)
        .bind(request.is_verified)
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        Ok(user)
    }

    /// Get a user by email.
    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        Ok(user)
    }

    /// Get the user owning an OAuth identity.
    #[instrument(skip(self))]
    pub async fn get_by_oauth(&self, provider: &str, account_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.hashed_password, u.is_active, u.is_superuser, u.is_verified,
                   u.created_at, u.updated_at, u.last_login_at
            FROM users u
            JOIN oauth_accounts a ON a.user_id = u.id
            WHERE a.provider = ? AND a.account_id = ?
            "#,
        )
        .bind(provider)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by OAuth account")?;

        Ok(user)
    }

    /// List users with optional filters.
    #[instrument(skip(self))]
    pub async fn list(&self, query: UserListQuery) -> Result<Vec<User>> {
        let limit = query.limit.unwrap_or(100).clamp(1, 1000);
        let offset = query.offset.unwrap_or(0).max(0);
        let search = query
            .search
            .map(|s| format!("%{}%", s.replace('%', "\\%")));

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE (? IS NULL OR is_active = ?)
              AND (? IS NULL OR is_superuser = ?)
              AND (? IS NULL OR email LIKE ? ESCAPE '\')
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(query.is_active)
        .bind(query.is_active)
        .bind(query.is_superuser)
        .bind(query.is_superuser)
        .bind(&search)
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        Ok(users)
    }

    /// Update a user. Only the provided fields change. The password, when
    /// given, must already be hashed.
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateUserRequest) -> Result<Option<User>> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE(?, email),
                hashed_password = COALESCE(?, hashed_password),
                is_active = COALESCE(?, is_active),
                is_superuser = COALESCE(?, is_superuser),
                is_verified = COALESCE(?, is_verified),
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(&request.email)
        .bind(&request.password)
        .bind(request.is_active)
        .bind(request.is_superuser)
        .bind(request.is_verified)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update user")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Delete a user and, via cascade, their OAuth accounts and tokens.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip the active flag.
    #[instrument(skip(self))]
    pub async fn set_active(&self, id: &str, active: bool) -> Result<Option<User>> {
        self.update(
            id,
            UpdateUserRequest {
                is_active: Some(active),
                ..Default::default()
            },
        )
        .await
    }

    /// Record a successful login.
    #[instrument(skip(self))]
    pub async fn touch_last_login(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to record login time")?;
        Ok(())
    }

    /// Aggregate counts for the admin overview.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<UserStats> {
        let (total, active, superusers) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(is_active), 0),
                   COALESCE(SUM(is_superuser), 0)
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute user stats")?;

        Ok(UserStats {
            total,
            active,
            superusers,
        })
    }

    /// Resolve an OAuth login to a local user, creating or linking as
    /// needed: an existing linked identity wins, otherwise the account is
    /// associated to the user with the same email, otherwise a fresh
    /// verified user is created. Provider tokens are refreshed either way.
    #[instrument(skip(self, login), fields(provider = %login.provider, email = %login.email))]
    pub async fn resolve_oauth_login(&self, login: OAuthLogin) -> Result<User> {
        let user = match self.get_by_oauth(&login.provider, &login.account_id).await? {
            Some(user) => user,
            None => match self.get_by_email(&login.email).await? {
                Some(user) => user,
                None => {
                    self.create(CreateUserRequest {
                        email: login.email.clone(),
                        password: None,
                        is_superuser: false,
                        is_active: true,
                        // Identities vouched for by the provider count as verified.
                        is_verified: true,
                    })
                    .await?
                }
            },
        };

        self.link_oauth_account(&user.id, &login).await?;
        Ok(user)
    }

    /// Insert or refresh the provider link for a user.
    #[instrument(skip(self, login))]
    async fn link_oauth_account(&self, user_id: &str, login: &OAuthLogin) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_accounts
                (id, user_id, provider, account_id, account_email, access_token, refresh_token, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (provider, account_id) DO UPDATE SET
                user_id = excluded.user_id,
                account_email = excluded.account_email,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&login.provider)
        .bind(&login.account_id)
        .bind(&login.email)
        .bind(&login.access_token)
        .bind(&login.refresh_token)
        .bind(&login.expires_at)
        .execute(&self.pool)
        .await
        .context("Failed to link OAuth account")?;
        Ok(())
    }

    /// OAuth accounts linked to a user.
    #[instrument(skip(self))]
    pub async fn oauth_accounts(&self, user_id: &str) -> Result<Vec<OAuthAccount>> {
        let accounts = sqlx::query_as::<_, OAuthAccount>(
            r#"
            SELECT id, user_id, provider, account_id, account_email,
                   access_token, refresh_token, expires_at
            FROM oauth_accounts
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list OAuth accounts")?;

        Ok(accounts)
    }
}
