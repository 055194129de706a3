use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::repositories::{SubscriptionRepository, Upserted};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct SubscriptionService {
    repo: Arc<dyn SubscriptionRepository>,
    store_timeout: Duration,
}

impl SubscriptionService {
    pub fn new(repo: Arc<dyn SubscriptionRepository>, store_timeout: Duration) -> Self {
        Self {
            repo,
            store_timeout,
        }
    }

    /// Runs one store round trip, giving up after `store_timeout`.
    /// Dropping the returned future cancels the store call as well.
    async fn bounded<T>(&self, call: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "store call exceeded {} ms",
                    self.store_timeout.as_millis()
                ))
            })?
    }

    /// Creates a subscription; `Conflict` when the user already has this service.
    pub async fn create_subscription(&self, req: SubscriptionRequest) -> AppResult<Subscription> {
        let record = req.validate()?;
        self.bounded(self.repo.insert(record)).await
    }

    pub async fn update_subscription(&self, req: SubscriptionRequest) -> AppResult<Subscription> {
        let record = req.validate()?;
        self.bounded(self.repo.update(record))
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))
    }

    pub async fn upsert_subscription(&self, req: SubscriptionRequest) -> AppResult<Upserted> {
        let record = req.validate()?;
        self.bounded(self.repo.upsert(record)).await
    }

    pub async fn get_subscription(
        &self,
        user_id: Uuid,
        service_name: &str,
    ) -> AppResult<Subscription> {
        self.bounded(self.repo.find(user_id, service_name))
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))
    }

    pub async fn delete_subscription(&self, user_id: Uuid, service_name: &str) -> AppResult<()> {
        let service_name = service_name.trim();
        if service_name.is_empty() {
            return Err(AppError::ValidationError(
                "service_name is required".to_string(),
            ));
        }
        if self.bounded(self.repo.delete(user_id, service_name)).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Subscription not found".to_string()))
        }
    }

    pub async fn list_subscriptions(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        self.bounded(self.repo.list_by_user(user_id)).await
    }

    /// Sum of prices of every subscription active at some point in
    /// `[start_month, end_month]`, narrowed by the optional user/service filters.
    pub async fn calculate_total(&self, filter: &TotalFilter) -> AppResult<i64> {
        if filter.start_month > filter.end_month {
            return Err(AppError::InvalidRange(format!(
                "start_month {} is after end_month {}",
                filter.start_month, filter.end_month
            )));
        }
        self.bounded(self.repo.sum_active(filter)).await
    }
}
