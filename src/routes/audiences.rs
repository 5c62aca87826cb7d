use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Audience, ContactFields, NewAudience, SubscriberEmail, SubscriberName, SubscriptionSource,
};
use crate::membership::{Membership, MembershipError, Transition};

#[derive(Deserialize, Debug)]
pub struct NewAudienceBody {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Serialize)]
struct AudienceSummary {
    id: Uuid,
    name: String,
    description: String,
}

impl From<Audience> for AudienceSummary {
    fn from(audience: Audience) -> Self {
        AudienceSummary {
            id: audience.id,
            name: audience.name,
            description: audience.description,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContactBody {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub source: Option<String>,
}

impl ContactBody {
    fn parse(self) -> Result<(SubscriberEmail, ContactFields), String> {
        let email = SubscriberEmail::parse(self.email)?;
        let fields = ContactFields {
            first_name: SubscriberName::parse_optional(self.first_name)?,
            last_name: SubscriberName::parse_optional(self.last_name)?,
            source: SubscriptionSource::parse_optional(self.source)?,
        };

        Ok((email, fields))
    }
}

#[derive(Deserialize, Debug)]
pub struct ContactEmailBody {
    pub email: String,
}

#[derive(Deserialize, Debug)]
pub struct ContactPath {
    pub audience_id: Uuid,
    pub email: String,
}

fn parse_email(email: String) -> Result<SubscriberEmail, MembershipError> {
    SubscriberEmail::parse(email).map_err(MembershipError::Validation)
}

#[tracing::instrument(name = "List audiences", skip(membership))]
pub async fn handle_list_audiences(
    membership: web::Data<Membership>,
) -> Result<HttpResponse, MembershipError> {
    let audiences: Vec<AudienceSummary> = membership
        .list_audiences()
        .await?
        .into_iter()
        .map(AudienceSummary::from)
        .collect();

    Ok(HttpResponse::Ok().json(audiences))
}

#[tracing::instrument(name = "Create audience handler", skip(membership, body), fields(audience_name = %body.name))]
pub async fn handle_create_audience(
    membership: web::Data<Membership>,
    body: web::Json<NewAudienceBody>,
) -> Result<HttpResponse, MembershipError> {
    let body = body.into_inner();
    let new_audience =
        NewAudience::parse(body.name, body.description).map_err(MembershipError::Validation)?;

    let audience = membership.create_audience(new_audience).await?;

    Ok(HttpResponse::Created().json(AudienceSummary::from(audience)))
}

#[tracing::instrument(name = "Delete audience handler", skip(membership))]
pub async fn handle_delete_audience(
    membership: web::Data<Membership>,
    audience_id: web::Path<Uuid>,
) -> Result<HttpResponse, MembershipError> {
    membership.delete_audience(audience_id.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}

#[tracing::instrument(
    name = "Subscribe contact handler",
    skip(membership, body),
    fields(contact_email = %body.email)
)]
pub async fn handle_subscribe_contact(
    membership: web::Data<Membership>,
    audience_id: web::Path<Uuid>,
    body: web::Json<ContactBody>,
) -> Result<HttpResponse, MembershipError> {
    let (email, fields) = body
        .into_inner()
        .parse()
        .map_err(MembershipError::Validation)?;

    let change = membership
        .upsert_contact(email, audience_id.into_inner(), fields)
        .await?;
    let mut response = match change.transition {
        Transition::Created => HttpResponse::Created(),
        _ => HttpResponse::Ok(),
    };

    Ok(response.json(serde_json::json!({
        "success": true,
        "alreadySubscribed": change.already_subscribed(),
        "contact": change.record,
    })))
}

#[tracing::instrument(
    name = "Unsubscribe contact handler",
    skip(membership, body),
    fields(contact_email = %body.email)
)]
pub async fn handle_unsubscribe_contact(
    membership: web::Data<Membership>,
    audience_id: web::Path<Uuid>,
    body: web::Json<ContactEmailBody>,
) -> Result<HttpResponse, MembershipError> {
    let email = parse_email(body.into_inner().email)?;

    let change = membership
        .unsubscribe_contact(&email, audience_id.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "alreadyUnsubscribed": change.already_unsubscribed(),
        "contact": change.record,
    })))
}

#[tracing::instrument(name = "Remove contact handler", skip(membership))]
pub async fn handle_remove_contact(
    membership: web::Data<Membership>,
    path: web::Path<ContactPath>,
) -> Result<HttpResponse, MembershipError> {
    let ContactPath { audience_id, email } = path.into_inner();
    let email = parse_email(email)?;

    membership.remove_contact(&email, audience_id).await?;

    Ok(HttpResponse::NoContent().finish())
}
