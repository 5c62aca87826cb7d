//! Mirrors local membership changes to the email provider.
//!
//! Local writes are the source of truth. Every change is queued as a [`ProviderJob`] and handled by
//! a single background worker, so callers never wait on the provider and never see its errors.
//! Jobs are processed in the order they were queued.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::domain::{Contact, Subscriber, SubscriberEmail};
use crate::email_client::{EmailClient, ProviderContact};
use crate::store::{error_chain_fmt, MembershipStore, StoreError};
use crate::templates;

#[derive(Debug)]
pub enum ProviderJob {
    CreateAudience {
        audience_id: Uuid,
        name: String,
    },
    DeleteAudience {
        external_id: String,
    },
    UpsertContact {
        contact: Contact,
        change: ContactChange,
    },
    RemoveContact {
        audience_id: Uuid,
        email: SubscriberEmail,
    },
    SendWelcome {
        subscriber: Subscriber,
    },
    Settle(oneshot::Sender<()>),
}

/// What happened to a contact locally before the job was queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactChange {
    Created,
    /// `subscribed` flipped. Carries the time of the flip.
    Toggled(DateTime<Utc>),
    Updated,
}

#[derive(thiserror::Error)]
enum SyncError {
    #[error("The provider rejected the request.")]
    Provider(#[from] reqwest::Error),
    #[error("Failed to read or write the local record.")]
    Store(#[from] StoreError),
    #[error("Audience {0} has not been created on the provider yet.")]
    AudienceNotSynced(Uuid),
}

impl std::fmt::Debug for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Sending half of the job queue. Cheap to clone.
#[derive(Clone)]
pub struct SyncHandle {
    sender: mpsc::UnboundedSender<ProviderJob>,
}

impl SyncHandle {
    pub fn enqueue(&self, job: ProviderJob) {
        if let Err(err) = self.sender.send(job) {
            tracing::error!(job = ?err.0, "Provider sync worker is gone, dropping job");
        }
    }

    /// Resolves once every job queued before this call has been handled.
    pub async fn settle(&self) {
        let (done, wait) = oneshot::channel();

        if self.sender.send(ProviderJob::Settle(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

struct ProviderSyncWorker {
    email_client: Arc<EmailClient>,
    store: Arc<dyn MembershipStore>,
    base_url: String,
}

/// Starts the worker on the current tokio runtime. It stops when every handle is dropped.
pub fn spawn_worker(
    email_client: Arc<EmailClient>,
    store: Arc<dyn MembershipStore>,
    base_url: String,
) -> SyncHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let worker = ProviderSyncWorker {
        email_client,
        store,
        base_url,
    };

    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            worker.process(job).await;
        }
        tracing::info!("Provider sync worker stopped");
    });

    SyncHandle { sender }
}

impl ProviderSyncWorker {
    async fn process(&self, job: ProviderJob) {
        let result = match job {
            ProviderJob::CreateAudience { audience_id, name } => {
                self.create_audience(audience_id, &name).await
            }
            ProviderJob::DeleteAudience { external_id } => self
                .email_client
                .delete_audience(&external_id)
                .await
                .map_err(SyncError::from),
            ProviderJob::UpsertContact { contact, change } => {
                self.upsert_contact(&contact, change).await
            }
            ProviderJob::RemoveContact { audience_id, email } => {
                self.remove_contact(audience_id, &email).await
            }
            ProviderJob::SendWelcome { subscriber } => self.send_welcome(&subscriber).await,
            ProviderJob::Settle(done) => {
                let _ = done.send(());
                Ok(())
            }
        };

        if let Err(err) = result {
            tracing::warn!(error = ?err, "Provider sync failed, local state is kept");
        }
    }

    #[tracing::instrument(name = "Sync audience creation", skip(self))]
    async fn create_audience(&self, audience_id: Uuid, name: &str) -> Result<(), SyncError> {
        let external_id = self.email_client.create_audience(name).await?;

        let linked = self
            .store
            .set_audience_external_id(audience_id, &external_id)
            .await?;
        // Deleted locally while the create was queued
        if !linked {
            tracing::info!(%external_id, "Audience was deleted before sync, removing it from the provider");
            self.email_client.delete_audience(&external_id).await?;
        }

        Ok(())
    }

    async fn external_audience_id(&self, audience_id: Uuid) -> Result<String, SyncError> {
        self.store
            .find_audience(audience_id)
            .await?
            .and_then(|audience| audience.external_id)
            .ok_or(SyncError::AudienceNotSynced(audience_id))
    }

    #[tracing::instrument(
        name = "Sync contact",
        skip(self, contact),
        fields(contact_email = %contact.email, audience_id = %contact.audience_id)
    )]
    async fn upsert_contact(&self, contact: &Contact, change: ContactChange) -> Result<(), SyncError> {
        let synced = self.push_contact(contact, change).await;

        // The timestamp write happens whether or not the provider accepted the change.
        if let ContactChange::Toggled(at) = change {
            self.store
                .stamp_contact_transition(contact.id, contact.subscribed, at)
                .await?;
        }

        synced
    }

    async fn push_contact(&self, contact: &Contact, change: ContactChange) -> Result<(), SyncError> {
        let external_id = self.external_audience_id(contact.audience_id).await?;
        let payload = ProviderContact {
            email: contact.email.as_ref(),
            first_name: contact.first_name.as_ref().map(AsRef::as_ref),
            last_name: contact.last_name.as_ref().map(AsRef::as_ref),
            unsubscribed: !contact.subscribed,
        };

        match change {
            ContactChange::Created => {
                self.email_client
                    .create_contact(&external_id, &payload)
                    .await?
            }
            _ => {
                self.email_client
                    .update_contact(&external_id, &payload)
                    .await?
            }
        }

        Ok(())
    }

    #[tracing::instrument(name = "Sync contact removal", skip(self))]
    async fn remove_contact(&self, audience_id: Uuid, email: &SubscriberEmail) -> Result<(), SyncError> {
        let external_id = self.external_audience_id(audience_id).await?;

        self.email_client.remove_contact(&external_id, email).await?;

        Ok(())
    }

    #[tracing::instrument(name = "Send welcome email", skip(self, subscriber), fields(subscriber_email = %subscriber.email))]
    async fn send_welcome(&self, subscriber: &Subscriber) -> Result<(), SyncError> {
        let link = templates::unsubscribe_link(
            &self.base_url,
            Some(&subscriber.unsubscribe_token),
            &subscriber.email,
        );
        let welcome = templates::welcome_email(subscriber.display_name(), &link);

        self.email_client
            .send_email(&subscriber.email, &welcome.subject, &welcome.html, &welcome.text)
            .await?;

        Ok(())
    }
}
