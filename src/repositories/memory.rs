use super::{SubscriptionRepository, Upserted};
use crate::error::{AppError, AppResult};
use crate::models::{NewSubscription, Subscription, TotalFilter};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

type Key = (Uuid, String);

/// Process-local store with the same semantics as the Postgres repository.
/// Clones share the same records.
#[derive(Clone, Default)]
pub struct InMemorySubscriptionRepository {
    records: Arc<RwLock<HashMap<Key, Subscription>>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key_of(record: &NewSubscription) -> Key {
    (record.user_id, record.service_name.clone())
}

fn fresh(record: NewSubscription) -> Subscription {
    let now = Utc::now();
    Subscription {
        user_id: record.user_id,
        service_name: record.service_name,
        price: record.price,
        start_date: record.period.start,
        end_date: record.period.end,
        created_at: now,
        updated_at: now,
    }
}

fn replace(existing: &mut Subscription, record: NewSubscription) {
    existing.price = record.price;
    existing.start_date = record.period.start;
    existing.end_date = record.period.end;
    existing.updated_at = Utc::now();
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn insert(&self, record: NewSubscription) -> AppResult<Subscription> {
        let mut records = self.records.write().await;
        let key = key_of(&record);
        if records.contains_key(&key) {
            return Err(AppError::Conflict("Subscription already exists".to_string()));
        }
        let sub = fresh(record);
        records.insert(key, sub.clone());
        Ok(sub)
    }

    async fn update(&self, record: NewSubscription) -> AppResult<Option<Subscription>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&key_of(&record)).map(|existing| {
            replace(existing, record);
            existing.clone()
        }))
    }

    async fn upsert(&self, record: NewSubscription) -> AppResult<Upserted> {
        let mut records = self.records.write().await;
        let key = key_of(&record);
        match records.get_mut(&key) {
            Some(existing) => {
                replace(existing, record);
                Ok(Upserted::Replaced(existing.clone()))
            }
            None => {
                let sub = fresh(record);
                records.insert(key, sub.clone());
                Ok(Upserted::Created(sub))
            }
        }
    }

    async fn find(&self, user_id: Uuid, service_name: &str) -> AppResult<Option<Subscription>> {
        let records = self.records.read().await;
        Ok(records.get(&(user_id, service_name.to_string())).cloned())
    }

    async fn delete(&self, user_id: Uuid, service_name: &str) -> AppResult<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(&(user_id, service_name.to_string())).is_some())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        let records = self.records.read().await;
        let mut subs: Vec<Subscription> = records
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| {
            a.service_name
                .to_lowercase()
                .cmp(&b.service_name.to_lowercase())
                .then_with(|| a.service_name.cmp(&b.service_name))
        });
        Ok(subs)
    }

    async fn sum_active(&self, filter: &TotalFilter) -> AppResult<i64> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|s| filter.matches(s))
            .map(|s| i64::from(s.price))
            .sum())
    }
}
