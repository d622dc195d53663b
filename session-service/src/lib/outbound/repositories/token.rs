use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::principal::models::PrincipalId;
use crate::domain::session::errors::RepositoryError;
use crate::domain::session::models::MarkUsed;
use crate::domain::session::models::StoredToken;
use crate::domain::session::models::TokenKind;
use crate::domain::session::ports::TokenRepository;

#[derive(Debug, FromRow)]
struct TokenRow {
    token: String,
    user_id: Uuid,
    kind: String,
    expires_at: DateTime<Utc>,
    used: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for StoredToken {
    type Error = RepositoryError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        Ok(StoredToken {
            value: row.token,
            subject_id: PrincipalId(row.user_id),
            kind: row.kind.parse::<TokenKind>().map_err(RepositoryError::Database)?,
            expires_at: row.expires_at,
            used: row.used,
            created_at: row.created_at,
        })
    }
}

/// Token store over the `tokens` table.
///
/// Refresh, verification and password reset tokens share the table and are
/// told apart by `kind`.
pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn create(&self, token: StoredToken) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (token, user_id, kind, expires_at, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&token.value)
        .bind(token.subject_id.0)
        .bind(token.kind.as_str())
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return RepositoryError::Conflict("token value already exists".to_string());
                }
            }
            RepositoryError::Database(e.to_string())
        })?;

        Ok(())
    }

    async fn fetch_by_value(&self, value: &str) -> Result<StoredToken, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT token, user_id, kind, expires_at, used, created_at
            FROM tokens
            WHERE token = $1
            "#,
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    async fn mark_used(&self, value: &str) -> Result<MarkUsed, RepositoryError> {
        // Single conditional update: concurrent callers serialize on the row.
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET used = TRUE
            WHERE token = $1 AND used = FALSE
            "#,
        )
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(MarkUsed::Marked);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM tokens WHERE token = $1)
            "#,
        )
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if exists {
            Ok(MarkUsed::AlreadyUsed)
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    async fn invalidate_one(&self, value: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE token = $1
            "#,
        )
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(())
    }

    async fn invalidate_all_for_subject(
        &self,
        subject_id: &PrincipalId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE user_id = $1 AND kind = $2
            "#,
        )
        .bind(subject_id.0)
        .bind(TokenKind::Refresh.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn count_active_for_subject(
        &self,
        subject_id: &PrincipalId,
    ) -> Result<u64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM tokens
            WHERE user_id = $1 AND kind = $2 AND used = FALSE AND expires_at > NOW()
            "#,
        )
        .bind(subject_id.0)
        .bind(TokenKind::Refresh.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(count.max(0) as u64)
    }

    async fn revoke_oldest(
        &self,
        subject_id: &PrincipalId,
        keep: u32,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE token IN (
                SELECT token
                FROM tokens
                WHERE user_id = $1 AND kind = $2 AND used = FALSE AND expires_at > NOW()
                ORDER BY created_at DESC
                OFFSET $3
            )
            "#,
        )
        .bind(subject_id.0)
        .bind(TokenKind::Refresh.as_str())
        .bind(i64::from(keep))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
