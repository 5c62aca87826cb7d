use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::interests::Interests;
use crate::domain::new_subscriber::NewSubscriber;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::domain::subscription_source::SubscriptionSource;
use crate::domain::unsubscribe_token::UnsubscribeToken;

/// Global subscriber used by the campaign path. Unique by email.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub first_name: Option<SubscriberName>,
    pub last_name: Option<SubscriberName>,
    pub status: SubscriberStatus,
    pub interests: Interests,
    pub source: SubscriptionSource,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub unsubscribe_token: UnsubscribeToken,
}

impl Subscriber {
    pub fn new(new_subscriber: NewSubscriber, now: DateTime<Utc>) -> Subscriber {
        Subscriber {
            id: Uuid::new_v4(),
            email: new_subscriber.email,
            first_name: new_subscriber.first_name,
            last_name: new_subscriber.last_name,
            status: SubscriberStatus::Active,
            interests: new_subscriber.interests,
            source: new_subscriber.source,
            subscribed_at: now,
            unsubscribed_at: None,
            unsubscribe_token: UnsubscribeToken::generate(),
        }
    }

    /// Moves the subscriber to `status`, keeping the timestamps consistent with it.
    /// Returns `false` when the subscriber already was in that status.
    pub fn transition_to(&mut self, status: SubscriberStatus, now: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }

        match status {
            SubscriberStatus::Active => {
                self.subscribed_at = now;
                self.unsubscribed_at = None;
            }
            SubscriberStatus::Unsubscribed => {
                self.unsubscribed_at = Some(now);
            }
            SubscriberStatus::Bounced => {}
        }
        self.status = status;

        true
    }

    pub fn display_name(&self) -> Option<&str> {
        self.first_name.as_ref().map(AsRef::as_ref)
    }
}
