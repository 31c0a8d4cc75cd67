//! Opaque access tokens.
//!
//! Tokens are random strings stored server-side with their issue time; a
//! token is valid while it exists and is younger than the configured
//! lifetime. The first four characters encode what the token
//! authenticates, the way the hosted counterpart does it:
//! `wru_` a user, `wrb_` a service account (bot).

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

/// What a token authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    User,
    Service,
}

impl TokenKind {
    pub fn prefix(self) -> &'static str {
        match self {
            TokenKind::User => "wru_",
            TokenKind::Service => "wrb_",
        }
    }

    /// Classify a token by its first four characters.
    pub fn of(token: &str) -> Option<Self> {
        if token.starts_with(TokenKind::User.prefix()) {
            Some(TokenKind::User)
        } else if token.starts_with(TokenKind::Service.prefix()) {
            Some(TokenKind::Service)
        } else {
            None
        }
    }
}

/// Access token row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
    pub token: String,
    pub user_id: String,
    pub created_at: String,
}

/// Repository for access token operations.
#[derive(Debug, Clone)]
pub struct TokenRepository {
    pool: SqlitePool,
    lifetime_secs: i64,
}

impl TokenRepository {
    pub fn new(pool: SqlitePool, lifetime_secs: i64) -> Self {
        Self {
            pool,
            lifetime_secs,
        }
    }

    /// Issue a new token for a user.
    #[instrument(skip(self))]
    pub async fn create(&self, user_id: &str, kind: TokenKind) -> Result<AccessToken> {
        let token = format!("{}{}", kind.prefix(), nanoid::nanoid!(43));

        sqlx::query("INSERT INTO access_tokens (token, user_id) VALUES (?, ?)")
            .bind(&token)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to insert access token")?;

        debug!("issued {:?} token for user {}", kind, user_id);

        self.get(&token)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Token not found after creation"))
    }

    /// Fetch a token regardless of validity.
    #[instrument(skip(self, token))]
    pub async fn get(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query_as::<_, AccessToken>(
            "SELECT token, user_id, created_at FROM access_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch access token")?;

        Ok(row)
    }

    /// Fetch a token only if it is still within its lifetime.
    #[instrument(skip(self, token))]
    pub async fn get_valid(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query_as::<_, AccessToken>(
            r#"
            SELECT token, user_id, created_at
            FROM access_tokens
            WHERE token = ? AND created_at > datetime('now', '-' || ? || ' seconds')
            "#,
        )
        .bind(token)
        .bind(self.lifetime_secs)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch access token")?;

        Ok(row)
    }

    /// Revoke a token. Returns whether it existed.
    #[instrument(skip(self, token))]
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .context("Failed to revoke access token")?;

        Ok(result.rows_affected() > 0)
    }

    /// All tokens, oldest last, for the admin surface.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<AccessToken>> {
        let rows = sqlx::query_as::<_, AccessToken>(
            "SELECT token, user_id, created_at FROM access_tokens ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list access tokens")?;

        Ok(rows)
    }

    /// Drop tokens past their lifetime.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM access_tokens WHERE created_at <= datetime('now', '-' || ? || ' seconds')",
        )
        .bind(self.lifetime_secs)
        .execute(&self.pool)
        .await
        .context("Failed to purge expired tokens")?;

        Ok(result.rows_affected())
    }

    /// Stash an OAuth authorization state for later verification.
    #[instrument(skip(self, state))]
    pub async fn insert_oauth_state(&self, state: &str) -> Result<()> {
        sqlx::query("INSERT INTO oauth_states (state) VALUES (?)")
            .bind(state)
            .execute(&self.pool)
            .await
            .context("Failed to store authorization state")?;
        Ok(())
    }

    /// Consume an OAuth authorization state. Valid at most once, and only
    /// for ten minutes.
    #[instrument(skip(self, state))]
    pub async fn consume_oauth_state(&self, state: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM oauth_states
            WHERE state = ? AND created_at > datetime('now', '-600 seconds')
            "#,
        )
        .bind(state)
        .execute(&self.pool)
        .await
        .context("Failed to consume authorization state")?;

        Ok(result.rows_affected() > 0)
    }
}
