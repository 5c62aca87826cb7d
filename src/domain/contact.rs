use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscription_source::SubscriptionSource;

/// A subscriber scoped to a single audience. At most one per `(email, audience_id)`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub first_name: Option<SubscriberName>,
    pub last_name: Option<SubscriberName>,
    pub audience_id: Uuid,
    pub subscribed: bool,
    pub source: SubscriptionSource,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// Optional fields supplied when subscribing a contact.
#[derive(Debug, Clone, Default)]
pub struct ContactFields {
    pub first_name: Option<SubscriberName>,
    pub last_name: Option<SubscriberName>,
    pub source: SubscriptionSource,
}

impl Contact {
    pub fn new(
        email: SubscriberEmail,
        audience_id: Uuid,
        fields: ContactFields,
        now: DateTime<Utc>,
    ) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            email,
            first_name: fields.first_name,
            last_name: fields.last_name,
            audience_id,
            subscribed: true,
            source: fields.source,
            subscribed_at: now,
            unsubscribed_at: None,
        }
    }

    /// Flips an unsubscribed contact back on. Names are refreshed only when supplied.
    pub fn resubscribe(&mut self, fields: ContactFields, now: DateTime<Utc>) {
        if fields.first_name.is_some() {
            self.first_name = fields.first_name;
        }
        if fields.last_name.is_some() {
            self.last_name = fields.last_name;
        }
        self.subscribed = true;
        self.subscribed_at = now;
        self.unsubscribed_at = None;
    }

    pub fn unsubscribe(&mut self, now: DateTime<Utc>) {
        self.subscribed = false;
        self.unsubscribed_at = Some(now);
    }
}
