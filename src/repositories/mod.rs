//! Storage seam for subscriptions.
//!
//! The service only talks to [`SubscriptionRepository`]; Postgres backs it in
//! production and [`InMemorySubscriptionRepository`] backs it in tests.

pub mod memory;
pub mod postgres;

pub use memory::InMemorySubscriptionRepository;
pub use postgres::PgSubscriptionRepository;

use crate::error::AppResult;
use crate::models::{NewSubscription, Subscription, TotalFilter};
use async_trait::async_trait;
use uuid::Uuid;

/// Result of an upsert: whether a new row was inserted or an existing one replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum Upserted {
    Created(Subscription),
    Replaced(Subscription),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Inserts a new record, failing with `AppError::Conflict` when the
    /// (user, service) pair already exists, including when a concurrent insert wins.
    async fn insert(&self, record: NewSubscription) -> AppResult<Subscription>;

    /// Replaces price and period of an existing record. `None` when absent.
    async fn update(&self, record: NewSubscription) -> AppResult<Option<Subscription>>;

    /// Atomic insert-or-replace keyed on (user, service).
    async fn upsert(&self, record: NewSubscription) -> AppResult<Upserted>;

    async fn find(&self, user_id: Uuid, service_name: &str) -> AppResult<Option<Subscription>>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, user_id: Uuid, service_name: &str) -> AppResult<bool>;

    /// All records of a user ordered by service name, case-insensitively.
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>>;

    /// Sum of prices of records active in `[filter.start_month, filter.end_month]`.
    async fn sum_active(&self, filter: &TotalFilter) -> AppResult<i64>;
}
