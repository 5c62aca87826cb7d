//! Campaign lifecycle and the broadcast dispatcher.
//!
//! A send resolves its recipients, marks the campaign `sending`, mails the recipients in
//! fixed-size batches and writes the totals back once, after the last batch has settled.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use crate::config::BroadcastSettings;
use crate::domain::{
    AudienceSelector, Campaign, CampaignContent, CampaignStatus, DeliveryError, DeliveryReport,
    NewCampaign, Subscriber, SubscriberEmail, UnsubscribeToken,
};
use crate::email_client::EmailClient;
use crate::store::{error_chain_fmt, CampaignCompletion, CampaignStore, MembershipStore, StoreError};
use crate::templates;

#[derive(thiserror::Error)]
pub enum CampaignError {
    #[error("{0}")]
    Validation(String),
    #[error("The campaign was not found.")]
    NotFound,
    #[error("No active subscribers match the campaign's target audience.")]
    NoRecipients,
    #[error("A campaign in status {0:?} cannot be sent.")]
    InvalidTransition(CampaignStatus),
    #[error("Failed to access the campaign store.")]
    Store(#[from] StoreError),
}

impl std::fmt::Debug for CampaignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// One addressee of a broadcast.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub email: SubscriberEmail,
    pub first_name: Option<String>,
    pub token: Option<UnsubscribeToken>,
}

impl From<&Subscriber> for Recipient {
    fn from(subscriber: &Subscriber) -> Self {
        Recipient {
            email: subscriber.email.clone(),
            first_name: subscriber.display_name().map(String::from),
            token: Some(subscriber.unsubscribe_token.clone()),
        }
    }
}

/// Rendered campaign bodies, before personalization.
#[derive(Debug, Clone)]
pub struct CampaignMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl CampaignMessage {
    /// `html_content` overrides the HTML rendering of `content`. The text part falls back to a
    /// stripped version of the HTML when no plain content was written.
    pub fn from_campaign(campaign: &Campaign) -> CampaignMessage {
        let html = campaign
            .html_content
            .clone()
            .unwrap_or_else(|| templates::text_to_html(&campaign.content));
        let text = if campaign.content.trim().is_empty() {
            templates::html_to_text(&html)
        } else {
            campaign.content.clone()
        };

        CampaignMessage {
            subject: campaign.subject.clone(),
            html,
            text,
        }
    }
}

pub struct Dispatcher {
    email_client: Arc<EmailClient>,
    settings: BroadcastSettings,
    base_url: String,
}

impl Dispatcher {
    pub fn new(email_client: Arc<EmailClient>, settings: BroadcastSettings, base_url: String) -> Self {
        Self {
            email_client,
            settings,
            base_url,
        }
    }

    /// Sends one email per recipient. Failures are recorded, never propagated, and never
    /// abort the rest of the batch.
    #[tracing::instrument(
        name = "Dispatch campaign",
        skip(self, message, recipients),
        fields(subject = %message.subject, recipients = recipients.len())
    )]
    pub async fn dispatch(&self, message: &CampaignMessage, recipients: &[Recipient]) -> DeliveryReport {
        let batch_size = self.settings.batch_size.max(1);
        let batch_count = recipients.len().div_ceil(batch_size);
        let mut report = DeliveryReport {
            total_recipients: recipients.len(),
            ..Default::default()
        };

        for (index, batch) in recipients.chunks(batch_size).enumerate() {
            let outcomes = join_all(batch.iter().map(|recipient| self.send_one(message, recipient))).await;

            for (recipient, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(()) => report.successful += 1,
                    Err(err) => {
                        tracing::warn!(
                            recipient = %recipient.email,
                            error = %err,
                            "Failed to deliver campaign email"
                        );
                        report.failed += 1;
                        if report.errors.len() < self.settings.max_logged_errors {
                            report.errors.push(DeliveryError {
                                email: recipient.email.as_ref().to_string(),
                                error: err.to_string(),
                                timestamp: Utc::now(),
                            });
                        }
                    }
                }
            }

            tracing::info!(
                batch = index + 1,
                batches = batch_count,
                successful = report.successful,
                failed = report.failed,
                "Campaign batch settled"
            );

            if index + 1 < batch_count {
                tokio::time::sleep(self.settings.get_batch_pause()).await;
            }
        }

        report
    }

    async fn send_one(&self, message: &CampaignMessage, recipient: &Recipient) -> Result<(), reqwest::Error> {
        let link = templates::unsubscribe_link(&self.base_url, recipient.token.as_ref(), &recipient.email);
        let first_name = recipient.first_name.as_deref();
        let html = format!(
            "{}{}",
            templates::personalize(&message.html, first_name.map(templates::escape_html).as_deref()),
            templates::html_footer(&link)
        );
        let text = format!(
            "{}{}",
            templates::personalize(&message.text, first_name),
            templates::text_footer(&link)
        );

        self.email_client
            .send_email(&recipient.email, &message.subject, &html, &text)
            .await
    }
}

/// Content and target supplied with a send request.
#[derive(Debug, Clone)]
pub struct SendCampaign {
    pub campaign_id: Uuid,
    pub content: CampaignContent,
    pub target_audience: Option<AudienceSelector>,
}

pub struct Broadcaster {
    campaigns: Arc<dyn CampaignStore>,
    members: Arc<dyn MembershipStore>,
    dispatcher: Dispatcher,
}

impl Broadcaster {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        members: Arc<dyn MembershipStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            campaigns,
            members,
            dispatcher,
        }
    }

    #[tracing::instrument(name = "Create campaign", skip(self, new_campaign), fields(subject = %new_campaign.content.subject))]
    pub async fn create_campaign(&self, new_campaign: NewCampaign) -> Result<Campaign, CampaignError> {
        let campaign = Campaign::new(new_campaign, Utc::now());

        self.campaigns.insert_campaign(&campaign).await?;

        Ok(campaign)
    }

    pub async fn get_campaign(&self, id: Uuid) -> Result<Campaign, CampaignError> {
        self.campaigns
            .find_campaign(id)
            .await?
            .ok_or(CampaignError::NotFound)
    }

    /// Sends a draft or scheduled campaign now. Delivery failures end up in the campaign's
    /// counters and error log, not in the returned error.
    #[tracing::instrument(name = "Send campaign", skip(self, request), fields(campaign_id = %request.campaign_id))]
    pub async fn send_campaign(&self, request: SendCampaign) -> Result<DeliveryReport, CampaignError> {
        let mut campaign = self.get_campaign(request.campaign_id).await?;

        if !campaign.status.is_sendable() {
            return Err(CampaignError::InvalidTransition(campaign.status));
        }

        campaign.set_content(request.content);
        if let Some(target_audience) = request.target_audience {
            campaign.target_audience = target_audience;
        }
        self.campaigns.update_campaign_draft(&campaign).await?;

        let recipients: Vec<Recipient> = self
            .members
            .active_subscribers(&campaign.target_audience)
            .await?
            .iter()
            .map(Recipient::from)
            .collect();

        if recipients.is_empty() {
            return Err(CampaignError::NoRecipients);
        }

        if !self.campaigns.begin_sending(campaign.id, recipients.len()).await? {
            let current = self.get_campaign(campaign.id).await?;
            return Err(CampaignError::InvalidTransition(current.status));
        }

        let message = CampaignMessage::from_campaign(&campaign);
        let report = self.dispatcher.dispatch(&message, &recipients).await;
        let completion = CampaignCompletion {
            status: report.final_status(),
            sent_at: Utc::now(),
            success_count: report.successful,
            failure_count: report.failed,
            errors: report.errors.clone(),
        };

        self.campaigns.complete_campaign(campaign.id, &completion).await?;
        tracing::info!(
            status = %completion.status.as_ref(),
            successful = report.successful,
            failed = report.failed,
            "Campaign finished"
        );

        Ok(report)
    }
}
