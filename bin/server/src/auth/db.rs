//! Database repositories for users and sessions.

use async_trait::async_trait;
use chrono::Duration;
use fedgate_core::UserId;
use fedgate_sso::{LocalUser, Role, Session, SessionSigner, StoreError, UserStore};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

fn backend(error: &sqlx::Error) -> StoreError {
    StoreError::Backend {
        details: error.to_string(),
    }
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    username: String,
    password: String,
    permission: i32,
    base_path: String,
    role: i32,
    disabled: bool,
    sso_id: String,
}

impl UserRow {
    fn try_into_user(self) -> Result<LocalUser, sqlx::Error> {
        let id = UserId::from_str(&self.id)
            .map_err(|e| decode_error(format!("invalid user id '{}': {}", self.id, e)))?;
        let role = Role::try_from(self.role)
            .map_err(|e| decode_error(format!("user {}: {e}", self.id)))?;
        Ok(LocalUser::with_all_fields(
            id,
            self.username,
            self.password,
            self.permission,
            self.base_path,
            role,
            self.disabled,
            self.sso_id,
        ))
    }
}

/// PostgreSQL-backed [`UserStore`].
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Creates a new user store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_user_by_sso_id(&self, sso_id: &str) -> fedgate_core::Result<LocalUser, StoreError> {
        if sso_id.is_empty() {
            return Err(StoreError::NotFound.into());
        }

        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password, permission, base_path, role, disabled, sso_id
            FROM users
            WHERE sso_id = $1
            "#,
        )
        .bind(sso_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend(&e))?;

        match row {
            Some(r) => Ok(r.try_into_user().map_err(|e| backend(&e))?),
            None => Err(StoreError::NotFound.into()),
        }
    }

    async fn create_user(&self, user: &LocalUser) -> fedgate_core::Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password, permission, base_path, role, disabled, sso_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.username())
        .bind(user.password())
        .bind(user.permission())
        .bind(user.base_path())
        .bind(user.role().as_i32())
        .bind(user.disabled())
        .bind(user.sso_id())
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(&e, user))?;

        Ok(())
    }
}

/// Maps an insert failure, recognising the username and sso id uniqueness
/// constraints.
fn insert_error(error: &sqlx::Error, user: &LocalUser) -> StoreError {
    if let sqlx::Error::Database(db_err) = error
        && db_err.is_unique_violation()
    {
        match db_err.constraint() {
            Some(c) if c.contains("username") => {
                return StoreError::UsernameTaken {
                    username: user.username().to_string(),
                };
            }
            Some(c) if c.contains("sso_id") => {
                return StoreError::SsoIdTaken {
                    sso_id: user.sso_id().to_string(),
                };
            }
            _ => {}
        }
    }
    backend(error)
}

/// Repository for session operations.
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Creates a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a new session.
    pub async fn create(&self, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.id().to_string())
        .bind(session.user_id().to_string())
        .bind(session.created_at())
        .bind(session.expires_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// [`SessionSigner`] that persists an opaque session and returns its ID.
pub struct DbSessionSigner {
    sessions: SessionRepository,
    duration: Duration,
}

impl DbSessionSigner {
    /// Creates a signer issuing sessions valid for `duration`.
    pub fn new(sessions: SessionRepository, duration: Duration) -> Self {
        Self { sessions, duration }
    }
}

#[async_trait]
impl SessionSigner for DbSessionSigner {
    async fn generate_token(&self, user: &LocalUser) -> fedgate_core::Result<String, StoreError> {
        if user.disabled() {
            return Err(StoreError::Backend {
                details: format!("user {} is disabled", user.id()),
            }
            .into());
        }

        let session = Session::new(user.id(), self.duration);
        self.sessions
            .create(&session)
            .await
            .map_err(|e| backend(&e))?;

        tracing::info!(user_id = %user.id(), expires_at = %session.expires_at(), "issued session");
        Ok(session.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_row(role: i32) -> UserRow {
        UserRow {
            id: UserId::new().to_string(),
            username: "alice".to_string(),
            password: "placeholder".to_string(),
            permission: 7,
            base_path: "/alice".to_string(),
            role,
            disabled: false,
            sso_id: "ext1".to_string(),
        }
    }

    #[test]
    fn user_row_round_trips_fields() {
        let user = user_row(2).try_into_user().expect("user");
        assert_eq!(user.username(), "alice");
        assert_eq!(user.permission(), 7);
        assert_eq!(user.base_path(), "/alice");
        assert!(user.role().is_admin());
        assert_eq!(user.sso_id(), "ext1");
    }

    #[test]
    fn unknown_role_is_decode_error() {
        let Err(err) = user_row(9).try_into_user() else {
            panic!("expected decode error");
        };
        assert!(matches!(err, sqlx::Error::Decode(_)));
    }

    #[test]
    fn bad_user_id_is_decode_error() {
        let mut row = user_row(0);
        row.id = "ses_01HZX".to_string();
        assert!(matches!(row.try_into_user(), Err(sqlx::Error::Decode(_))));
    }

    #[derive(Debug)]
    struct UniqueViolation {
        constraint: &'static str,
    }

    impl std::fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates {}", self.constraint)
        }
    }

    impl std::error::Error for UniqueViolation {}

    impl sqlx::error::DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    fn violation(constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(UniqueViolation { constraint }))
    }

    fn alice() -> LocalUser {
        LocalUser::new(
            "alice".to_string(),
            "x".to_string(),
            0,
            "/".to_string(),
            "ext1".to_string(),
        )
    }

    #[test]
    fn non_database_insert_error_is_backend() {
        let err = insert_error(&sqlx::Error::PoolTimedOut, &alice());
        assert!(matches!(err, StoreError::Backend { .. }));
    }

    #[test]
    fn username_violation_is_username_taken() {
        let err = insert_error(&violation("users_username_key"), &alice());
        assert_eq!(
            err,
            StoreError::UsernameTaken {
                username: "alice".to_string()
            }
        );
    }

    #[test]
    fn sso_id_violation_is_sso_id_taken() {
        let err = insert_error(&violation("users_sso_id_idx"), &alice());
        assert_eq!(
            err,
            StoreError::SsoIdTaken {
                sso_id: "ext1".to_string()
            }
        );
    }

    #[test]
    fn other_unique_violation_is_backend() {
        let err = insert_error(&violation("users_pkey"), &alice());
        assert!(matches!(err, StoreError::Backend { .. }));
    }
}
