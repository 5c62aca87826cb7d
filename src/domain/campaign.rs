use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::interests::AudienceSelector;

/// Lifecycle of a campaign. Transitions only move forward:
/// `draft -> scheduled -> sending -> sent | failed`, with `draft -> sending` allowed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;

        matches!(
            (self, next),
            (Draft, Scheduled) | (Draft, Sending) | (Scheduled, Sending) | (Sending, Sent) | (Sending, Failed)
        )
    }

    pub fn is_sendable(&self) -> bool {
        self.can_transition_to(CampaignStatus::Sending)
    }

    pub fn parse(status: String) -> Result<CampaignStatus, String> {
        match status.as_str() {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "sent" => Ok(CampaignStatus::Sent),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("{} is not a valid campaign status", status)),
        }
    }
}

impl AsRef<str> for CampaignStatus {
    fn as_ref(&self) -> &str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Failed => "failed",
        }
    }
}

/// Subject and body of a campaign. At least one of the bodies is non-empty.
#[derive(Debug, Clone)]
pub struct CampaignContent {
    pub subject: String,
    pub content: String,
    pub html_content: Option<String>,
}

impl CampaignContent {
    pub fn parse(
        subject: Option<String>,
        content: Option<String>,
        html_content: Option<String>,
    ) -> Result<CampaignContent, String> {
        let subject = subject.unwrap_or_default().trim().to_string();
        let content = content.unwrap_or_default();
        let html_content = html_content.filter(|html| !html.trim().is_empty());

        if subject.is_empty() {
            return Err("campaign subject is required".to_string());
        }
        if content.trim().is_empty() && html_content.is_none() {
            return Err("campaign content or htmlContent is required".to_string());
        }

        Ok(CampaignContent {
            subject,
            content,
            html_content,
        })
    }
}

/// A failed delivery recorded in the campaign's error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryError {
    pub email: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Totals accumulated by one broadcast run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub total_recipients: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<DeliveryError>,
}

impl DeliveryReport {
    /// Partial success still counts as sent. Only a run where nothing got through fails.
    pub fn final_status(&self) -> CampaignStatus {
        if self.successful == 0 {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Sent
        }
    }
}

pub struct NewCampaign {
    pub content: CampaignContent,
    pub target_audience: AudienceSelector,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub subject: String,
    pub content: String,
    pub html_content: Option<String>,
    pub status: CampaignStatus,
    pub target_audience: AudienceSelector,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub recipient_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<DeliveryError>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Campaigns start as drafts. Supplying `scheduled_at` marks them scheduled,
    /// which is informational only: nothing sends them automatically.
    pub fn new(new_campaign: NewCampaign, now: DateTime<Utc>) -> Campaign {
        let status = if new_campaign.scheduled_at.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };

        Campaign {
            id: Uuid::new_v4(),
            subject: new_campaign.content.subject,
            content: new_campaign.content.content,
            html_content: new_campaign.content.html_content,
            status,
            target_audience: new_campaign.target_audience,
            scheduled_at: new_campaign.scheduled_at,
            sent_at: None,
            recipient_count: 0,
            success_count: 0,
            failure_count: 0,
            errors: Vec::new(),
            created_at: now,
        }
    }

    pub fn set_content(&mut self, content: CampaignContent) {
        self.subject = content.subject;
        self.content = content.content;
        self.html_content = content.html_content;
    }
}
