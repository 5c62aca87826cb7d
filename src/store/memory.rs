use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CampaignCompletion, CampaignStore, MembershipStore, StoreError};
use crate::domain::{
    Audience, AudienceSelector, Campaign, CampaignStatus, Contact, Subscriber, SubscriberEmail,
    UnsubscribeToken,
};

/// Process-local store. Used by the test-suite and for running the service without Postgres.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    audiences: HashMap<Uuid, Audience>,
    contacts: HashMap<Uuid, Contact>,
    subscribers: HashMap<Uuid, Subscriber>,
    subscribers_by_email: HashMap<String, Uuid>,
    subscribers_by_token: HashMap<String, Uuid>,
    campaigns: HashMap<Uuid, Campaign>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock is poisoned".into()))
    }

    /// All contacts of an audience, including unsubscribed ones.
    pub fn contacts_of(&self, audience_id: Uuid) -> Vec<Contact> {
        match self.lock() {
            Ok(inner) => inner
                .contacts
                .values()
                .filter(|contact| contact.audience_id == audience_id)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn insert_audience(&self, audience: &Audience) -> Result<(), StoreError> {
        self.lock()?.audiences.insert(audience.id, audience.clone());
        Ok(())
    }

    async fn find_audience(&self, id: Uuid) -> Result<Option<Audience>, StoreError> {
        Ok(self.lock()?.audiences.get(&id).cloned())
    }

    async fn list_active_audiences(&self) -> Result<Vec<Audience>, StoreError> {
        let mut audiences: Vec<Audience> = self
            .lock()?
            .audiences
            .values()
            .filter(|audience| audience.is_active)
            .cloned()
            .collect();
        audiences.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(audiences)
    }

    async fn set_audience_external_id(
        &self,
        id: Uuid,
        external_id: &str,
    ) -> Result<bool, StoreError> {
        match self.lock()?.audiences.get_mut(&id) {
            Some(audience) => {
                audience.external_id = Some(external_id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_audience(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;

        if inner.audiences.remove(&id).is_none() {
            return Ok(false);
        }
        inner.contacts.retain(|_, contact| contact.audience_id != id);

        Ok(true)
    }

    async fn find_contact(
        &self,
        email: &SubscriberEmail,
        audience_id: Uuid,
    ) -> Result<Option<Contact>, StoreError> {
        Ok(self
            .lock()?
            .contacts
            .values()
            .find(|contact| contact.audience_id == audience_id && &contact.email == email)
            .cloned())
    }

    async fn insert_contact(&self, contact: &Contact) -> Result<(), StoreError> {
        self.lock()?.contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn update_contact(&self, contact: &Contact) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        if let Some(stored) = inner.contacts.get_mut(&contact.id) {
            *stored = contact.clone();
        }
        Ok(())
    }

    async fn delete_contact(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock()?.contacts.remove(&id).is_some())
    }

    async fn stamp_contact_transition(
        &self,
        id: Uuid,
        subscribed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        match inner.contacts.get_mut(&id) {
            Some(contact) if contact.subscribed == subscribed => {
                if subscribed {
                    contact.subscribed_at = at;
                } else {
                    contact.unsubscribed_at = Some(at);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn insert_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let email = subscriber.email.as_ref().to_string();

        if inner.subscribers_by_email.contains_key(&email) {
            return Err(StoreError::Conflict("email"));
        }

        inner.subscribers_by_email.insert(email, subscriber.id);
        inner.subscribers_by_token.insert(
            subscriber.unsubscribe_token.as_ref().to_string(),
            subscriber.id,
        );
        inner.subscribers.insert(subscriber.id, subscriber.clone());

        Ok(())
    }

    async fn update_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        if let Some(stored) = inner.subscribers.get_mut(&subscriber.id) {
            let token = stored.unsubscribe_token.clone();
            *stored = subscriber.clone();
            stored.unsubscribe_token = token;
        }
        Ok(())
    }

    async fn find_subscriber_by_email(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscriber>, StoreError> {
        let inner = self.lock()?;

        Ok(inner
            .subscribers_by_email
            .get(email.as_ref())
            .and_then(|id| inner.subscribers.get(id))
            .cloned())
    }

    async fn find_subscriber_by_token(
        &self,
        token: &UnsubscribeToken,
    ) -> Result<Option<Subscriber>, StoreError> {
        let inner = self.lock()?;

        Ok(inner
            .subscribers_by_token
            .get(token.as_ref())
            .and_then(|id| inner.subscribers.get(id))
            .cloned())
    }

    async fn active_subscribers(
        &self,
        selector: &AudienceSelector,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let mut subscribers: Vec<Subscriber> = self
            .lock()?
            .subscribers
            .values()
            .filter(|subscriber| subscriber.status.is_active())
            .filter(|subscriber| selector.matches(&subscriber.interests))
            .cloned()
            .collect();
        subscribers.sort_by_key(|subscriber| subscriber.subscribed_at);

        Ok(subscribers)
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        self.lock()?.campaigns.insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn find_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        Ok(self.lock()?.campaigns.get(&id).cloned())
    }

    async fn update_campaign_draft(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        if let Some(stored) = inner.campaigns.get_mut(&campaign.id) {
            if stored.status.is_sendable() {
                stored.subject = campaign.subject.clone();
                stored.content = campaign.content.clone();
                stored.html_content = campaign.html_content.clone();
                stored.target_audience = campaign.target_audience.clone();
            }
        }
        Ok(())
    }

    async fn begin_sending(&self, id: Uuid, recipient_count: usize) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;

        match inner.campaigns.get_mut(&id) {
            Some(campaign) if campaign.status.is_sendable() => {
                campaign.status = CampaignStatus::Sending;
                campaign.recipient_count = recipient_count;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_campaign(
        &self,
        id: Uuid,
        completion: &CampaignCompletion,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        if let Some(campaign) = inner
            .campaigns
            .get_mut(&id)
            .filter(|campaign| campaign.status == CampaignStatus::Sending)
        {
            campaign.status = completion.status;
            campaign.sent_at = Some(completion.sent_at);
            campaign.success_count = completion.success_count;
            campaign.failure_count = completion.failure_count;
            campaign.errors = completion.errors.clone();
        }
        Ok(())
    }
}
