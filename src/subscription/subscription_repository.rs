use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use sqlx::PgPool;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use uuid::Uuid;

use super::subscription_models::{NewSubscription, PushSubscription};
use crate::error::Result;

/// Storage of push subscriptions, read by the relay and written by registration.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Every subscription owned by `user_id`, oldest first.
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>>;

    /// Registers a device. An existing endpoint is re-bound to the new owner and keys.
    async fn upsert(&self, subscription: NewSubscription) -> Result<PushSubscription>;

    async fn delete(&self, id: Uuid) -> Result<u64>;

    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<u64>;
}

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
        let subscriptions = sqlx::query_as::<_, PushSubscription>(
            "SELECT * FROM push_subscriptions WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn upsert(&self, subscription: NewSubscription) -> Result<PushSubscription> {
        let subscription = sqlx::query_as::<_, PushSubscription>(
            "INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, user_agent)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (endpoint) DO UPDATE
             SET user_id = EXCLUDED.user_id,
                 p256dh = EXCLUDED.p256dh,
                 auth = EXCLUDED.auth,
                 user_agent = EXCLUDED.user_agent
             RETURNING *"
        )
        .bind(subscription.user_id)
        .bind(&subscription.endpoint)
        .bind(&subscription.p256dh)
        .bind(&subscription.auth)
        .bind(&subscription.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
            .bind(endpoint)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Process-local store used when no database is configured.
///
/// `by_endpoint` is always locked before `subscriptions`, and holding an
/// endpoint's entry serialises every write to that endpoint.
#[derive(Clone, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Arc<DashMap<Uuid, (u64, PushSubscription)>>,
    by_endpoint: Arc<DashMap<String, Uuid>>,
    sequence: Arc<AtomicU64>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
        let mut found: Vec<(u64, PushSubscription)> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().1.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|(seq, _)| *seq);

        Ok(found.into_iter().map(|(_, sub)| sub).collect())
    }

    async fn upsert(&self, subscription: NewSubscription) -> Result<PushSubscription> {
        let slot = self
            .by_endpoint
            .entry(subscription.endpoint.clone())
            .or_insert_with(Uuid::new_v4);
        let id = *slot;

        let record = match self.subscriptions.entry(id) {
            Entry::Occupied(mut occupied) => {
                let (_, existing) = occupied.get_mut();
                existing.user_id = subscription.user_id;
                existing.p256dh = subscription.p256dh;
                existing.auth = subscription.auth;
                existing.user_agent = subscription.user_agent;
                existing.clone()
            }
            Entry::Vacant(vacant) => {
                let record = PushSubscription {
                    id,
                    user_id: subscription.user_id,
                    endpoint: subscription.endpoint,
                    p256dh: subscription.p256dh,
                    auth: subscription.auth,
                    user_agent: subscription.user_agent,
                    created_at: Utc::now(),
                };
                let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
                vacant.insert((seq, record.clone()));
                record
            }
        };

        drop(slot);
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        let Some(endpoint) = self
            .subscriptions
            .get(&id)
            .map(|entry| entry.value().1.endpoint.clone())
        else {
            return Ok(0);
        };

        match self.by_endpoint.entry(endpoint) {
            Entry::Occupied(slot) if *slot.get() == id => {
                slot.remove();
                Ok(self.subscriptions.remove(&id).map_or(0, |_| 1))
            }
            _ => Ok(0),
        }
    }

    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<u64> {
        match self.by_endpoint.entry(endpoint.to_string()) {
            Entry::Occupied(slot) => {
                let id = slot.remove();
                Ok(self.subscriptions.remove(&id).map_or(0, |_| 1))
            }
            Entry::Vacant(_) => Ok(0),
        }
    }
}
