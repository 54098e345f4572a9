//! Durable expression records.
//!
//! The scheduler only talks to storage through [`ExpressionRepository`]. The
//! server backs it with SQLite; [`MemoryExpressionRepository`] serves tests
//! and single-process demos.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use abacus_core::{AbacusError, Expression, ExpressionId, NewExpression, Outcome, Status, UserId};

/// Storage backend for expression records.
///
/// Status writes are monotonic: implementations must never move an
/// expression out of `Done` or `Error`, and never back to `Pending`.
#[async_trait]
pub trait ExpressionRepository: Send + Sync {
    /// Persist a new `Pending` expression and return its assigned id.
    async fn insert(&self, new: NewExpression) -> Result<ExpressionId, AbacusError>;

    async fn get(&self, id: ExpressionId) -> Result<Option<Expression>, AbacusError>;

    /// Fetch an expression only if `user_id` owns it.
    async fn get_for_user(
        &self,
        id: ExpressionId,
        user_id: UserId,
    ) -> Result<Option<Expression>, AbacusError>;

    /// All expressions owned by `user_id`, ascending by id.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Expression>, AbacusError>;

    /// Expressions still `Pending` or `Computing`, ascending by id.
    async fn list_unfinished(&self) -> Result<Vec<Expression>, AbacusError>;

    /// Move a `Pending` expression to `Computing`. No-op for any other status.
    async fn mark_computing(&self, id: ExpressionId) -> Result<(), AbacusError>;

    /// Record the terminal outcome. No-op if the expression already finished.
    async fn finish(&self, id: ExpressionId, outcome: &Outcome) -> Result<(), AbacusError>;
}

// ── In-memory backend ─────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    next_id: ExpressionId,
    rows: BTreeMap<ExpressionId, Expression>,
}

/// Process-local repository. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryExpressionRepository {
    inner: RwLock<MemoryInner>,
}

fn poisoned<T>(_: T) -> AbacusError {
    AbacusError::Storage("expression store lock poisoned".into())
}

impl MemoryExpressionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as-is, keeping its id. Used to simulate a restart.
    pub fn restore(&self, expression: Expression) -> Result<(), AbacusError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.next_id = inner.next_id.max(expression.id);
        inner.rows.insert(expression.id, expression);
        Ok(())
    }
}

#[async_trait]
impl ExpressionRepository for MemoryExpressionRepository {
    async fn insert(&self, new: NewExpression) -> Result<ExpressionId, AbacusError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.insert(
            id,
            Expression {
                id,
                expression: new.expression,
                status: Status::Pending,
                result: 0.0,
                error: None,
                user_id: new.user_id,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: ExpressionId) -> Result<Option<Expression>, AbacusError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.rows.get(&id).cloned())
    }

    async fn get_for_user(
        &self,
        id: ExpressionId,
        user_id: UserId,
    ) -> Result<Option<Expression>, AbacusError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.rows.get(&id).filter(|e| e.user_id == user_id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Expression>, AbacusError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .rows
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_unfinished(&self) -> Result<Vec<Expression>, AbacusError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .rows
            .values()
            .filter(|e| !e.is_finished())
            .cloned()
            .collect())
    }

    async fn mark_computing(&self, id: ExpressionId) -> Result<(), AbacusError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        match inner.rows.get_mut(&id) {
            Some(expr) => {
                if expr.status == Status::Pending {
                    expr.status = Status::Computing;
                }
                Ok(())
            }
            None => Err(AbacusError::ExpressionNotFound(id)),
        }
    }

    async fn finish(&self, id: ExpressionId, outcome: &Outcome) -> Result<(), AbacusError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        match inner.rows.get_mut(&id) {
            Some(expr) => {
                if !expr.is_finished() {
                    expr.status = outcome.status();
                    expr.result = outcome.result();
                    expr.error = outcome.error().map(str::to_string);
                }
                Ok(())
            }
            None => Err(AbacusError::ExpressionNotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_expr(text: &str, user_id: UserId) -> NewExpression {
        NewExpression {
            expression: text.into(),
            user_id,
        }
    }

    #[tokio::test]
    async fn ids_increase_and_listing_is_scoped() {
        let repo = MemoryExpressionRepository::new();
        let a = repo.insert(new_expr("1+1", 1)).await.unwrap();
        let b = repo.insert(new_expr("2+2", 2)).await.unwrap();
        let c = repo.insert(new_expr("3+3", 1)).await.unwrap();
        assert!(a < b && b < c);

        let mine: Vec<ExpressionId> = repo
            .list_for_user(1)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(mine, vec![a, c]);
        assert!(repo.get_for_user(b, 1).await.unwrap().is_none());
        assert!(repo.get_for_user(b, 2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn status_never_regresses() {
        let repo = MemoryExpressionRepository::new();
        let id = repo.insert(new_expr("4/2", 1)).await.unwrap();

        repo.mark_computing(id).await.unwrap();
        repo.finish(id, &Outcome::Done(2.0)).await.unwrap();
        repo.mark_computing(id).await.unwrap();
        repo.finish(
            id,
            &Outcome::Failed {
                result: 0.0,
                error: "late".into(),
            },
        )
        .await
        .unwrap();

        let expr = repo.get(id).await.unwrap().unwrap();
        assert_eq!(expr.status, Status::Done);
        assert_eq!(expr.result, 2.0);
        assert!(expr.error.is_none());
        assert!(repo.list_unfinished().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_an_error() {
        let repo = MemoryExpressionRepository::new();
        assert!(matches!(
            repo.mark_computing(99).await,
            Err(AbacusError::ExpressionNotFound(99))
        ));
    }
}
