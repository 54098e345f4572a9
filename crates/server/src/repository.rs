//! SQLite-backed expression and user storage.

use async_trait::async_trait;
use sqlx::SqlitePool;

use abacus_compute::ExpressionRepository;
use abacus_core::{AbacusError, Expression, ExpressionId, NewExpression, Outcome, UserId};

use crate::auth::{generate_salt, hash_password};

fn storage_error(e: sqlx::Error) -> AbacusError {
    AbacusError::Storage(e.to_string())
}

// ── Expressions ──────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct ExpressionRow {
    id: i64,
    expression: String,
    status: String,
    result: f64,
    error: Option<String>,
    user_id: i64,
}

impl TryFrom<ExpressionRow> for Expression {
    type Error = AbacusError;

    fn try_from(row: ExpressionRow) -> Result<Self, Self::Error> {
        Ok(Expression {
            id: row.id,
            expression: row.expression,
            status: row.status.parse()?,
            result: row.result,
            error: row.error,
            user_id: row.user_id,
        })
    }
}

fn into_expressions(rows: Vec<ExpressionRow>) -> Result<Vec<Expression>, AbacusError> {
    rows.into_iter().map(Expression::try_from).collect()
}

const SELECT_EXPRESSION: &str =
    "SELECT id, expression, status, result, error, user_id FROM expressions";

pub struct SqliteExpressionRepository {
    pool: SqlitePool,
}

impl SqliteExpressionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn ensure_exists(&self, id: ExpressionId) -> Result<(), AbacusError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM expressions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        found
            .map(|_| ())
            .ok_or(AbacusError::ExpressionNotFound(id))
    }
}

#[async_trait]
impl ExpressionRepository for SqliteExpressionRepository {
    async fn insert(&self, new: NewExpression) -> Result<ExpressionId, AbacusError> {
        let done = sqlx::query(
            "INSERT INTO expressions (expression, status, result, user_id)
             VALUES (?, 'pending', 0, ?)",
        )
        .bind(&new.expression)
        .bind(new.user_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(done.last_insert_rowid())
    }

    async fn get(&self, id: ExpressionId) -> Result<Option<Expression>, AbacusError> {
        sqlx::query_as::<_, ExpressionRow>(&format!("{} WHERE id = ?", SELECT_EXPRESSION))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Expression::try_from)
            .transpose()
    }

    async fn get_for_user(
        &self,
        id: ExpressionId,
        user_id: UserId,
    ) -> Result<Option<Expression>, AbacusError> {
        sqlx::query_as::<_, ExpressionRow>(&format!(
            "{} WHERE id = ? AND user_id = ?",
            SELECT_EXPRESSION
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .map(Expression::try_from)
        .transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Expression>, AbacusError> {
        let rows = sqlx::query_as::<_, ExpressionRow>(&format!(
            "{} WHERE user_id = ? ORDER BY id ASC",
            SELECT_EXPRESSION
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        into_expressions(rows)
    }

    async fn list_unfinished(&self) -> Result<Vec<Expression>, AbacusError> {
        let rows = sqlx::query_as::<_, ExpressionRow>(&format!(
            "{} WHERE status IN ('pending', 'computing') ORDER BY id ASC",
            SELECT_EXPRESSION
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        into_expressions(rows)
    }

    async fn mark_computing(&self, id: ExpressionId) -> Result<(), AbacusError> {
        let done = sqlx::query(
            "UPDATE expressions SET status = 'computing' WHERE id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if done.rows_affected() == 0 {
            self.ensure_exists(id).await?;
        }
        Ok(())
    }

    async fn finish(&self, id: ExpressionId, outcome: &Outcome) -> Result<(), AbacusError> {
        let done = sqlx::query(
            "UPDATE expressions SET status = ?, result = ?, error = ?
             WHERE id = ? AND status NOT IN ('done', 'error')",
        )
        .bind(outcome.status().as_str())
        .bind(outcome.result())
        .bind(outcome.error())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if done.rows_affected() == 0 {
            self.ensure_exists(id).await?;
        }
        Ok(())
    }
}

// ── Users ────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub password_hash: String,
    pub salt: String,
}

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new user with a freshly salted password hash.
    pub async fn create(&self, login: &str, password: &str) -> Result<UserId, AbacusError> {
        let salt = generate_salt();
        let hash = hash_password(password, &salt);

        let result = sqlx::query("INSERT INTO users (login, password_hash, salt) VALUES (?, ?, ?)")
            .bind(login)
            .bind(&hash)
            .bind(hex::encode(salt))
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AbacusError::UserExists)
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    pub async fn find_by_login(&self, login: &str) -> Result<Option<User>, AbacusError> {
        sqlx::query_as::<_, User>(
            "SELECT id, login, password_hash, salt FROM users WHERE login = ?",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)
    }

    /// Check a login/password pair, returning the user on success.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<User, AbacusError> {
        let user = self
            .find_by_login(login)
            .await?
            .ok_or_else(|| AbacusError::Auth("user not found".into()))?;

        let salt = hex::decode(&user.salt)
            .map_err(|e| AbacusError::Storage(format!("corrupt salt for {}: {}", login, e)))?;

        if hash_password(password, &salt) != user.password_hash {
            return Err(AbacusError::Auth("invalid password".into()));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use abacus_core::Status;

    use super::*;
    use crate::db::init_memory_pool;

    async fn repos() -> (SqliteExpressionRepository, UserRepository) {
        let pool = init_memory_pool().await.unwrap();
        (
            SqliteExpressionRepository::new(pool.clone()),
            UserRepository::new(pool),
        )
    }

    #[tokio::test]
    async fn register_and_authenticate() {
        let (_, users) = repos().await;
        let id = users.create("alice", "secret").await.unwrap();

        assert_eq!(users.authenticate("alice", "secret").await.unwrap().id, id);
        assert!(matches!(
            users.authenticate("alice", "wrong").await,
            Err(AbacusError::Auth(_))
        ));
        assert!(matches!(
            users.authenticate("bob", "secret").await,
            Err(AbacusError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_login_is_rejected() {
        let (_, users) = repos().await;
        users.create("alice", "secret").await.unwrap();
        assert!(matches!(
            users.create("alice", "other").await,
            Err(AbacusError::UserExists)
        ));
    }

    #[tokio::test]
    async fn expression_lifecycle() {
        let (expressions, users) = repos().await;
        let alice = users.create("alice", "pw").await.unwrap();
        let bob = users.create("bob", "pw").await.unwrap();

        let first = expressions
            .insert(NewExpression {
                expression: "2+2".into(),
                user_id: alice,
            })
            .await
            .unwrap();
        let second = expressions
            .insert(NewExpression {
                expression: "1/0".into(),
                user_id: alice,
            })
            .await
            .unwrap();

        expressions.mark_computing(first).await.unwrap();
        expressions.finish(first, &Outcome::Done(4.0)).await.unwrap();
        // Finished rows are frozen.
        expressions.mark_computing(first).await.unwrap();
        expressions
            .finish(
                first,
                &Outcome::Failed {
                    result: 0.0,
                    error: "late".into(),
                },
            )
            .await
            .unwrap();

        let listed = expressions.list_for_user(alice).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first);
        assert_eq!(listed[0].status, Status::Done);
        assert_eq!(listed[0].result, 4.0);
        assert!(listed[0].error.is_none());
        assert_eq!(listed[1].status, Status::Pending);

        assert!(expressions.get_for_user(first, bob).await.unwrap().is_none());
        assert!(expressions.list_for_user(bob).await.unwrap().is_empty());

        let unfinished = expressions.list_unfinished().await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].id, second);
    }

    #[tokio::test]
    async fn missing_expression_is_reported() {
        let (expressions, _) = repos().await;
        assert!(matches!(
            expressions.mark_computing(77).await,
            Err(AbacusError::ExpressionNotFound(77))
        ));
        assert!(expressions.get(77).await.unwrap().is_none());
    }
}
