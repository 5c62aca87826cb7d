//! Persistence for audiences, contacts, subscribers and campaigns.
//!
//! Services talk to the [`MembershipStore`] and [`CampaignStore`] traits. [`PgStore`] is the
//! production implementation; [`InMemoryStore`] keeps the same invariants without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Audience, AudienceSelector, Campaign, CampaignStatus, Contact, DeliveryError, Subscriber,
    SubscriberEmail, UnsubscribeToken,
};

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("A record with the same {0} already exists.")]
    Conflict(&'static str),
    #[error("Failed to decode a stored record: {0}")]
    Corrupted(String),
    #[error("The store is unavailable.")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Final write of a broadcast run.
#[derive(Debug, Clone)]
pub struct CampaignCompletion {
    pub status: CampaignStatus,
    pub sent_at: DateTime<Utc>,
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<DeliveryError>,
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn insert_audience(&self, audience: &Audience) -> Result<(), StoreError>;

    async fn find_audience(&self, id: Uuid) -> Result<Option<Audience>, StoreError>;

    async fn list_active_audiences(&self) -> Result<Vec<Audience>, StoreError>;

    /// Returns `false` when the audience no longer exists locally.
    async fn set_audience_external_id(&self, id: Uuid, external_id: &str)
        -> Result<bool, StoreError>;

    /// Removes the audience together with its contacts. Returns `false` if it did not exist.
    async fn delete_audience(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn find_contact(
        &self,
        email: &SubscriberEmail,
        audience_id: Uuid,
    ) -> Result<Option<Contact>, StoreError>;

    async fn insert_contact(&self, contact: &Contact) -> Result<(), StoreError>;

    async fn update_contact(&self, contact: &Contact) -> Result<(), StoreError>;

    async fn delete_contact(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Stamps `subscribed_at` (or `unsubscribed_at`) with `at`, but only while the contact is
    /// still in the `subscribed` state the stamp belongs to.
    async fn stamp_contact_transition(
        &self,
        id: Uuid,
        subscribed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email is already registered.
    async fn insert_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError>;

    /// Persists status, names, interests and timestamps. The token is never rewritten.
    async fn update_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError>;

    async fn find_subscriber_by_email(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscriber>, StoreError>;

    async fn find_subscriber_by_token(
        &self,
        token: &UnsubscribeToken,
    ) -> Result<Option<Subscriber>, StoreError>;

    /// Active subscribers matched by `selector`, ordered by subscription date.
    async fn active_subscribers(
        &self,
        selector: &AudienceSelector,
    ) -> Result<Vec<Subscriber>, StoreError>;
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError>;

    async fn find_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError>;

    /// Saves subject, bodies and target of a campaign that has not started sending.
    async fn update_campaign_draft(&self, campaign: &Campaign) -> Result<(), StoreError>;

    /// Moves a draft or scheduled campaign to `sending` and records its recipient count.
    /// Returns `false` when the campaign was not in a sendable state.
    async fn begin_sending(&self, id: Uuid, recipient_count: usize) -> Result<bool, StoreError>;

    async fn complete_campaign(
        &self,
        id: Uuid,
        completion: &CampaignCompletion,
    ) -> Result<(), StoreError>;
}

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
