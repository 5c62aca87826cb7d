//! Audience, contact and subscriber membership.
//!
//! Audience contacts and global subscribers share one subscribe/unsubscribe vocabulary: callers
//! pick a [`Scope`] and get back a [`MembershipChange`] describing what happened. Repeating a
//! subscribe or unsubscribe is never an error, except that a second global subscription for an
//! active email is reported as a conflict.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    Audience, Contact, ContactFields, NewAudience, NewSubscriber, Subscriber, SubscriberEmail,
    SubscriberStatus, UnsubscribeToken,
};
use crate::provider_sync::{ContactChange, ProviderJob, SyncHandle};
use crate::store::{error_chain_fmt, MembershipStore, StoreError};

#[derive(thiserror::Error)]
pub enum MembershipError {
    #[error("{0}")]
    Validation(String),
    #[error("The {0} was not found.")]
    NotFound(&'static str),
    #[error("{0} is already subscribed.")]
    Conflict(String),
    #[error("Failed to access the membership store.")]
    Store(#[source] StoreError),
}

impl std::fmt::Debug for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<StoreError> for MembershipError {
    fn from(err: StoreError) -> Self {
        MembershipError::Store(err)
    }
}

/// Where a membership lives: the global subscriber list or a single audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Audience(Uuid),
}

impl From<Option<Uuid>> for Scope {
    fn from(audience_id: Option<Uuid>) -> Self {
        audience_id.map(Scope::Audience).unwrap_or(Scope::Global)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Transition {
    Created,
    Resubscribed,
    AlreadySubscribed,
    Unsubscribed,
    AlreadyUnsubscribed,
    Bounced,
    AlreadyBounced,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Member {
    Subscriber(Subscriber),
    Contact(Contact),
}

#[derive(Debug, Clone)]
pub struct MembershipChange<T> {
    pub record: T,
    pub transition: Transition,
}

impl<T> MembershipChange<T> {
    fn new(record: T, transition: Transition) -> Self {
        Self { record, transition }
    }

    pub fn already_subscribed(&self) -> bool {
        self.transition == Transition::AlreadySubscribed
    }

    pub fn already_unsubscribed(&self) -> bool {
        self.transition == Transition::AlreadyUnsubscribed
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> MembershipChange<U> {
        MembershipChange::new(f(self.record), self.transition)
    }
}

/// Identity presented by an unsubscribe link or form.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub token: Option<String>,
    pub email: Option<String>,
}

pub struct Membership {
    store: Arc<dyn MembershipStore>,
    sync: SyncHandle,
}

impl Membership {
    pub fn new(store: Arc<dyn MembershipStore>, sync: SyncHandle) -> Self {
        Self { store, sync }
    }

    pub fn sync_handle(&self) -> &SyncHandle {
        &self.sync
    }

    #[tracing::instrument(name = "Create audience", skip(self, new_audience), fields(audience_name = %new_audience.name))]
    pub async fn create_audience(&self, new_audience: NewAudience) -> Result<Audience, MembershipError> {
        let audience = Audience::new(new_audience, Utc::now());

        self.store.insert_audience(&audience).await?;
        self.sync.enqueue(ProviderJob::CreateAudience {
            audience_id: audience.id,
            name: audience.name.clone(),
        });

        Ok(audience)
    }

    pub async fn list_audiences(&self) -> Result<Vec<Audience>, MembershipError> {
        Ok(self.store.list_active_audiences().await?)
    }

    /// Deletes the audience and its contacts locally, then asks the provider to drop it too.
    #[tracing::instrument(name = "Delete audience", skip(self))]
    pub async fn delete_audience(&self, audience_id: Uuid) -> Result<(), MembershipError> {
        let audience = self.find_audience(audience_id).await?;

        if !self.store.delete_audience(audience_id).await? {
            return Err(MembershipError::NotFound("audience"));
        }
        if let Some(external_id) = audience.external_id {
            self.sync.enqueue(ProviderJob::DeleteAudience { external_id });
        }

        Ok(())
    }

    async fn find_audience(&self, audience_id: Uuid) -> Result<Audience, MembershipError> {
        self.store
            .find_audience(audience_id)
            .await?
            .ok_or(MembershipError::NotFound("audience"))
    }

    /// Find-or-upsert of the contact for `(email, audience_id)`.
    #[tracing::instrument(name = "Upsert contact", skip(self, fields), fields(contact_email = %email))]
    pub async fn upsert_contact(
        &self,
        email: SubscriberEmail,
        audience_id: Uuid,
        fields: ContactFields,
    ) -> Result<MembershipChange<Contact>, MembershipError> {
        self.find_audience(audience_id).await?;
        let now = Utc::now();

        match self.store.find_contact(&email, audience_id).await? {
            Some(contact) if contact.subscribed => {
                tracing::info!("Contact is already subscribed");
                Ok(MembershipChange::new(contact, Transition::AlreadySubscribed))
            }
            Some(mut contact) => {
                contact.resubscribe(fields, now);
                self.store.update_contact(&contact).await?;
                self.sync.enqueue(ProviderJob::UpsertContact {
                    contact: contact.clone(),
                    change: ContactChange::Toggled(now),
                });

                Ok(MembershipChange::new(contact, Transition::Resubscribed))
            }
            None => {
                let contact = Contact::new(email, audience_id, fields, now);
                self.store.insert_contact(&contact).await?;
                self.sync.enqueue(ProviderJob::UpsertContact {
                    contact: contact.clone(),
                    change: ContactChange::Created,
                });

                Ok(MembershipChange::new(contact, Transition::Created))
            }
        }
    }

    #[tracing::instrument(name = "Unsubscribe contact", skip(self), fields(contact_email = %email))]
    pub async fn unsubscribe_contact(
        &self,
        email: &SubscriberEmail,
        audience_id: Uuid,
    ) -> Result<MembershipChange<Contact>, MembershipError> {
        let mut contact = self
            .store
            .find_contact(email, audience_id)
            .await?
            .ok_or(MembershipError::NotFound("contact"))?;

        if !contact.subscribed {
            return Ok(MembershipChange::new(contact, Transition::AlreadyUnsubscribed));
        }

        let now = Utc::now();
        contact.unsubscribe(now);
        self.store.update_contact(&contact).await?;
        self.sync.enqueue(ProviderJob::UpsertContact {
            contact: contact.clone(),
            change: ContactChange::Toggled(now),
        });

        Ok(MembershipChange::new(contact, Transition::Unsubscribed))
    }

    #[tracing::instrument(name = "Remove contact", skip(self), fields(contact_email = %email))]
    pub async fn remove_contact(
        &self,
        email: &SubscriberEmail,
        audience_id: Uuid,
    ) -> Result<(), MembershipError> {
        let contact = self
            .store
            .find_contact(email, audience_id)
            .await?
            .ok_or(MembershipError::NotFound("contact"))?;

        self.store.delete_contact(contact.id).await?;
        self.sync.enqueue(ProviderJob::RemoveContact {
            audience_id,
            email: contact.email,
        });

        Ok(())
    }

    /// Registers a new global subscriber and queues the welcome email.
    #[tracing::instrument(name = "Create subscriber", skip(self, new_subscriber), fields(subscriber_email = %new_subscriber.email))]
    pub async fn create_subscriber(
        &self,
        new_subscriber: NewSubscriber,
    ) -> Result<Subscriber, MembershipError> {
        let email = new_subscriber.email.as_ref().to_string();

        if self
            .store
            .find_subscriber_by_email(&new_subscriber.email)
            .await?
            .is_some()
        {
            return Err(MembershipError::Conflict(email));
        }

        let subscriber = Subscriber::new(new_subscriber, Utc::now());
        self.store
            .insert_subscriber(&subscriber)
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => MembershipError::Conflict(email),
                err => MembershipError::Store(err),
            })?;

        self.sync.enqueue(ProviderJob::SendWelcome {
            subscriber: subscriber.clone(),
        });

        Ok(subscriber)
    }

    /// Token wins over email. A token that resolves to nobody falls back to the email.
    pub async fn resolve_subscriber(&self, identity: &Identity) -> Result<Subscriber, MembershipError> {
        if identity.token.is_none() && identity.email.is_none() {
            return Err(MembershipError::Validation(
                "An unsubscribe token or an email is required.".to_string(),
            ));
        }

        if let Some(token) = identity.token.clone() {
            if let Ok(token) = UnsubscribeToken::parse(token) {
                if let Some(subscriber) = self.store.find_subscriber_by_token(&token).await? {
                    return Ok(subscriber);
                }
            }
        }

        if let Some(email) = identity.email.clone() {
            match SubscriberEmail::parse(email) {
                Ok(email) => {
                    if let Some(subscriber) = self.store.find_subscriber_by_email(&email).await? {
                        return Ok(subscriber);
                    }
                }
                // With a token present, a bad fallback email just leaves the identity unresolved
                Err(err) if identity.token.is_none() => {
                    return Err(MembershipError::Validation(err));
                }
                Err(_) => {}
            }
        }

        Err(MembershipError::NotFound("subscriber"))
    }

    #[tracing::instrument(name = "Set subscriber status", skip(self, subscriber), fields(subscriber_email = %subscriber.email, status = %status.as_ref()))]
    pub async fn set_subscriber_status(
        &self,
        mut subscriber: Subscriber,
        status: SubscriberStatus,
    ) -> Result<MembershipChange<Subscriber>, MembershipError> {
        let changed = subscriber.transition_to(status, Utc::now());

        if changed {
            self.store.update_subscriber(&subscriber).await?;
        }

        let transition = match (status, changed) {
            (SubscriberStatus::Active, true) => Transition::Resubscribed,
            (SubscriberStatus::Active, false) => Transition::AlreadySubscribed,
            (SubscriberStatus::Unsubscribed, true) => Transition::Unsubscribed,
            (SubscriberStatus::Unsubscribed, false) => Transition::AlreadyUnsubscribed,
            (SubscriberStatus::Bounced, true) => Transition::Bounced,
            (SubscriberStatus::Bounced, false) => Transition::AlreadyBounced,
        };

        Ok(MembershipChange::new(subscriber, transition))
    }

    /// Self-service subscribe. A previously unsubscribed (or bounced) global subscriber is
    /// reactivated in place; names and interests supplied on the form are merged in.
    pub async fn subscribe(
        &self,
        scope: Scope,
        new_subscriber: NewSubscriber,
    ) -> Result<MembershipChange<Member>, MembershipError> {
        match scope {
            Scope::Audience(audience_id) => {
                let fields = ContactFields {
                    first_name: new_subscriber.first_name,
                    last_name: new_subscriber.last_name,
                    source: new_subscriber.source,
                };
                let change = self
                    .upsert_contact(new_subscriber.email, audience_id, fields)
                    .await?;

                Ok(change.map(Member::Contact))
            }
            Scope::Global => {
                let existing = self
                    .store
                    .find_subscriber_by_email(&new_subscriber.email)
                    .await?;

                match existing {
                    Some(subscriber) if subscriber.status.is_active() => {
                        Err(MembershipError::Conflict(subscriber.email.as_ref().to_string()))
                    }
                    Some(mut subscriber) => {
                        if new_subscriber.first_name.is_some() {
                            subscriber.first_name = new_subscriber.first_name;
                        }
                        if new_subscriber.last_name.is_some() {
                            subscriber.last_name = new_subscriber.last_name;
                        }
                        if !new_subscriber.interests.is_empty() {
                            subscriber.interests = new_subscriber.interests;
                        }
                        let change = self
                            .set_subscriber_status(subscriber, SubscriberStatus::Active)
                            .await?;

                        Ok(change.map(Member::Subscriber))
                    }
                    None => {
                        let subscriber = self.create_subscriber(new_subscriber).await?;

                        Ok(MembershipChange::new(
                            Member::Subscriber(subscriber),
                            Transition::Created,
                        ))
                    }
                }
            }
        }
    }

    /// Self-service unsubscribe. Audience contacts are found by email; global subscribers by
    /// token first, then email.
    pub async fn unsubscribe(
        &self,
        scope: Scope,
        identity: &Identity,
    ) -> Result<MembershipChange<Member>, MembershipError> {
        match scope {
            Scope::Audience(audience_id) => {
                let email = identity
                    .email
                    .clone()
                    .ok_or_else(|| MembershipError::Validation("An email is required.".to_string()))
                    .and_then(|email| {
                        SubscriberEmail::parse(email).map_err(MembershipError::Validation)
                    })?;
                let change = self.unsubscribe_contact(&email, audience_id).await?;

                Ok(change.map(Member::Contact))
            }
            Scope::Global => {
                let subscriber = self.resolve_subscriber(identity).await?;
                let change = self
                    .set_subscriber_status(subscriber, SubscriberStatus::Unsubscribed)
                    .await?;

                Ok(change.map(Member::Subscriber))
            }
        }
    }
}
