use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{CampaignCompletion, CampaignStore, MembershipStore, StoreError};
use crate::domain::{
    Audience, AudienceSelector, Campaign, CampaignStatus, Contact, DeliveryError, Interests,
    Subscriber, SubscriberEmail, SubscriberName, SubscriberStatus, SubscriptionSource,
    UnsubscribeToken,
};

const UNIQUE_VIOLATION: &str = "23505";

const SUBSCRIBER_COLUMNS: &str = "id, email, first_name, last_name, status, interests, source, \
     subscribed_at, unsubscribed_at, unsubscribe_token";
const CONTACT_COLUMNS: &str = "id, email, first_name, last_name, audience_id, subscribed, source, \
     subscribed_at, unsubscribed_at";
const CAMPAIGN_COLUMNS: &str = "id, subject, content, html_content, status, target_audience, \
     scheduled_at, sent_at, recipient_count, success_count, failure_count, errors, created_at";

/// Postgres-backed store. Tables are created by the migrations under `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::Conflict("email")
            }
            _ => StoreError::Unavailable(Box::new(err)),
        }
    }
}

fn corrupted(message: String) -> StoreError {
    StoreError::Corrupted(message)
}

fn optional_name(value: Option<String>) -> Result<Option<SubscriberName>, StoreError> {
    SubscriberName::parse_optional(value).map_err(corrupted)
}

fn count(value: i64) -> usize {
    usize::try_from(value).unwrap_or_default()
}

fn audience_from_row(row: &PgRow) -> Result<Audience, StoreError> {
    Ok(Audience {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        external_id: row.try_get("external_id")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn contact_from_row(row: &PgRow) -> Result<Contact, StoreError> {
    Ok(Contact {
        id: row.try_get("id")?,
        email: SubscriberEmail::parse(row.try_get("email")?).map_err(corrupted)?,
        first_name: optional_name(row.try_get("first_name")?)?,
        last_name: optional_name(row.try_get("last_name")?)?,
        audience_id: row.try_get("audience_id")?,
        subscribed: row.try_get("subscribed")?,
        source: SubscriptionSource::parse(row.try_get("source")?).map_err(corrupted)?,
        subscribed_at: row.try_get("subscribed_at")?,
        unsubscribed_at: row.try_get("unsubscribed_at")?,
    })
}

fn subscriber_from_row(row: &PgRow) -> Result<Subscriber, StoreError> {
    Ok(Subscriber {
        id: row.try_get("id")?,
        email: SubscriberEmail::parse(row.try_get("email")?).map_err(corrupted)?,
        first_name: optional_name(row.try_get("first_name")?)?,
        last_name: optional_name(row.try_get("last_name")?)?,
        status: SubscriberStatus::parse(row.try_get("status")?).map_err(corrupted)?,
        interests: Interests::parse(row.try_get("interests")?).map_err(corrupted)?,
        source: SubscriptionSource::parse(row.try_get("source")?).map_err(corrupted)?,
        subscribed_at: row.try_get("subscribed_at")?,
        unsubscribed_at: row.try_get("unsubscribed_at")?,
        unsubscribe_token: UnsubscribeToken::parse(row.try_get("unsubscribe_token")?)
            .map_err(corrupted)?,
    })
}

fn campaign_from_row(row: &PgRow) -> Result<Campaign, StoreError> {
    let errors: Json<Vec<DeliveryError>> = row.try_get("errors")?;

    Ok(Campaign {
        id: row.try_get("id")?,
        subject: row.try_get("subject")?,
        content: row.try_get("content")?,
        html_content: row.try_get("html_content")?,
        status: CampaignStatus::parse(row.try_get("status")?).map_err(corrupted)?,
        target_audience: AudienceSelector::parse(row.try_get("target_audience")?)
            .map_err(corrupted)?,
        scheduled_at: row.try_get("scheduled_at")?,
        sent_at: row.try_get("sent_at")?,
        recipient_count: count(row.try_get("recipient_count")?),
        success_count: count(row.try_get("success_count")?),
        failure_count: count(row.try_get("failure_count")?),
        errors: errors.0,
        created_at: row.try_get("created_at")?,
    })
}

fn name_value(name: &Option<SubscriberName>) -> Option<&str> {
    name.as_ref().map(AsRef::as_ref)
}

#[async_trait]
impl MembershipStore for PgStore {
    #[tracing::instrument(name = "Insert audience", skip(self, audience), fields(audience_id = %audience.id))]
    async fn insert_audience(&self, audience: &Audience) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audiences (id, name, description, external_id, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(audience.id)
        .bind(&audience.name)
        .bind(&audience.description)
        .bind(&audience.external_id)
        .bind(audience.is_active)
        .bind(audience.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_audience(&self, id: Uuid) -> Result<Option<Audience>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, external_id, is_active, created_at FROM audiences WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(audience_from_row).transpose()
    }

    async fn list_active_audiences(&self) -> Result<Vec<Audience>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, external_id, is_active, created_at
            FROM audiences
            WHERE is_active = true
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(audience_from_row).collect()
    }

    async fn set_audience_external_id(
        &self,
        id: Uuid,
        external_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE audiences SET external_id = $2 WHERE id = $1")
            .bind(id)
            .bind(external_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Delete audience", skip(self))]
    async fn delete_audience(&self, id: Uuid) -> Result<bool, StoreError> {
        // contacts go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM audiences WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_contact(
        &self,
        email: &SubscriberEmail,
        audience_id: Uuid,
    ) -> Result<Option<Contact>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM contacts WHERE audience_id = $1 AND email = $2 LIMIT 1",
            CONTACT_COLUMNS
        ))
        .bind(audience_id)
        .bind(email.as_ref())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(contact_from_row).transpose()
    }

    #[tracing::instrument(name = "Insert contact", skip(self, contact), fields(contact_email = %contact.email))]
    async fn insert_contact(&self, contact: &Contact) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO contacts ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            CONTACT_COLUMNS
        ))
        .bind(contact.id)
        .bind(contact.email.as_ref())
        .bind(name_value(&contact.first_name))
        .bind(name_value(&contact.last_name))
        .bind(contact.audience_id)
        .bind(contact.subscribed)
        .bind(contact.source.as_ref())
        .bind(contact.subscribed_at)
        .bind(contact.unsubscribed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Update contact", skip(self, contact), fields(contact_email = %contact.email))]
    async fn update_contact(&self, contact: &Contact) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE contacts
            SET first_name = $2, last_name = $3, subscribed = $4,
                subscribed_at = $5, unsubscribed_at = $6
            WHERE id = $1
            "#,
        )
        .bind(contact.id)
        .bind(name_value(&contact.first_name))
        .bind(name_value(&contact.last_name))
        .bind(contact.subscribed)
        .bind(contact.subscribed_at)
        .bind(contact.unsubscribed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_contact(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stamp_contact_transition(
        &self,
        id: Uuid,
        subscribed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let query = if subscribed {
            "UPDATE contacts SET subscribed_at = $2 WHERE id = $1 AND subscribed = true"
        } else {
            "UPDATE contacts SET unsubscribed_at = $2 WHERE id = $1 AND subscribed = false"
        };

        sqlx::query(query)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Insert subscriber", skip(self, subscriber), fields(subscriber_email = %subscriber.email))]
    async fn insert_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO subscribers ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            SUBSCRIBER_COLUMNS
        ))
        .bind(subscriber.id)
        .bind(subscriber.email.as_ref())
        .bind(name_value(&subscriber.first_name))
        .bind(name_value(&subscriber.last_name))
        .bind(subscriber.status.as_ref())
        .bind(subscriber.interests.to_vec())
        .bind(subscriber.source.as_ref())
        .bind(subscriber.subscribed_at)
        .bind(subscriber.unsubscribed_at)
        .bind(subscriber.unsubscribe_token.as_ref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Update subscriber", skip(self, subscriber), fields(subscriber_email = %subscriber.email))]
    async fn update_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE subscribers
            SET first_name = $2, last_name = $3, status = $4, interests = $5,
                subscribed_at = $6, unsubscribed_at = $7
            WHERE id = $1
            "#,
        )
        .bind(subscriber.id)
        .bind(name_value(&subscriber.first_name))
        .bind(name_value(&subscriber.last_name))
        .bind(subscriber.status.as_ref())
        .bind(subscriber.interests.to_vec())
        .bind(subscriber.subscribed_at)
        .bind(subscriber.unsubscribed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_subscriber_by_email(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscribers WHERE email = $1",
            SUBSCRIBER_COLUMNS
        ))
        .bind(email.as_ref())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subscriber_from_row).transpose()
    }

    async fn find_subscriber_by_token(
        &self,
        token: &UnsubscribeToken,
    ) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscribers WHERE unsubscribe_token = $1",
            SUBSCRIBER_COLUMNS
        ))
        .bind(token.as_ref())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subscriber_from_row).transpose()
    }

    #[tracing::instrument(name = "Resolve campaign recipients", skip(self))]
    async fn active_subscribers(
        &self,
        selector: &AudienceSelector,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let (select_all, tags) = match selector {
            AudienceSelector::All => (true, Vec::new()),
            AudienceSelector::Interests(interests) => (false, interests.to_vec()),
        };

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM subscribers
            WHERE status = 'active' AND ($1 OR interests && $2)
            ORDER BY subscribed_at
            "#,
            SUBSCRIBER_COLUMNS
        ))
        .bind(select_all)
        .bind(tags)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscriber_from_row).collect()
    }
}

#[async_trait]
impl CampaignStore for PgStore {
    #[tracing::instrument(name = "Insert campaign", skip(self, campaign), fields(campaign_id = %campaign.id))]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO campaigns ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            CAMPAIGN_COLUMNS
        ))
        .bind(campaign.id)
        .bind(&campaign.subject)
        .bind(&campaign.content)
        .bind(&campaign.html_content)
        .bind(campaign.status.as_ref())
        .bind(campaign.target_audience.tags())
        .bind(campaign.scheduled_at)
        .bind(campaign.sent_at)
        .bind(campaign.recipient_count as i64)
        .bind(campaign.success_count as i64)
        .bind(campaign.failure_count as i64)
        .bind(Json(&campaign.errors))
        .bind(campaign.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn update_campaign_draft(&self, campaign: &Campaign) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET subject = $2, content = $3, html_content = $4, target_audience = $5
            WHERE id = $1 AND status IN ('draft', 'scheduled')
            "#,
        )
        .bind(campaign.id)
        .bind(&campaign.subject)
        .bind(&campaign.content)
        .bind(&campaign.html_content)
        .bind(campaign.target_audience.tags())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Mark campaign as sending", skip(self))]
    async fn begin_sending(&self, id: Uuid, recipient_count: usize) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'sending', recipient_count = $2
            WHERE id = $1 AND status IN ('draft', 'scheduled')
            "#,
        )
        .bind(id)
        .bind(recipient_count as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Record campaign outcome", skip(self, completion), fields(status = %completion.status.as_ref()))]
    async fn complete_campaign(
        &self,
        id: Uuid,
        completion: &CampaignCompletion,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2, sent_at = $3, success_count = $4, failure_count = $5, errors = $6
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(completion.status.as_ref())
        .bind(completion.sent_at)
        .bind(completion.success_count as i64)
        .bind(completion.failure_count as i64)
        .bind(Json(&completion.errors))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
