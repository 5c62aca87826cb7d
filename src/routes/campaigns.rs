use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::broadcast::{Broadcaster, CampaignError, SendCampaign};
use crate::domain::{AudienceSelector, CampaignContent, NewCampaign};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaignBody {
    pub subject: Option<String>,
    pub content: Option<String>,
    pub html_content: Option<String>,
    pub target_audience: Option<Vec<String>>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl TryFrom<NewCampaignBody> for NewCampaign {
    type Error = String;

    fn try_from(body: NewCampaignBody) -> Result<Self, Self::Error> {
        Ok(NewCampaign {
            content: CampaignContent::parse(body.subject, body.content, body.html_content)?,
            target_audience: AudienceSelector::parse(body.target_audience.unwrap_or_default())?,
            scheduled_at: body.scheduled_at,
        })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendCampaignBody {
    pub campaign_id: Option<Uuid>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub html_content: Option<String>,
    pub target_audience: Option<Vec<String>>,
}

impl TryFrom<SendCampaignBody> for SendCampaign {
    type Error = String;

    fn try_from(body: SendCampaignBody) -> Result<Self, Self::Error> {
        let campaign_id = body
            .campaign_id
            .ok_or_else(|| "campaignId is required".to_string())?;

        Ok(SendCampaign {
            campaign_id,
            content: CampaignContent::parse(body.subject, body.content, body.html_content)?,
            target_audience: body
                .target_audience
                .map(AudienceSelector::parse)
                .transpose()?,
        })
    }
}

#[tracing::instrument(name = "Create campaign handler", skip(broadcaster, body))]
pub async fn handle_create_campaign(
    broadcaster: web::Data<Broadcaster>,
    body: web::Json<NewCampaignBody>,
) -> Result<HttpResponse, CampaignError> {
    let new_campaign: NewCampaign = body
        .into_inner()
        .try_into()
        .map_err(CampaignError::Validation)?;

    let campaign = broadcaster.create_campaign(new_campaign).await?;

    Ok(HttpResponse::Created().json(campaign))
}

#[tracing::instrument(name = "Get campaign handler", skip(broadcaster))]
pub async fn handle_get_campaign(
    broadcaster: web::Data<Broadcaster>,
    campaign_id: web::Path<Uuid>,
) -> Result<HttpResponse, CampaignError> {
    let campaign = broadcaster.get_campaign(campaign_id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(campaign))
}

#[tracing::instrument(
    name = "Send campaign handler",
    skip(broadcaster, body),
    fields(campaign_id = ?body.campaign_id)
)]
pub async fn handle_send_campaign(
    broadcaster: web::Data<Broadcaster>,
    body: web::Json<SendCampaignBody>,
) -> Result<HttpResponse, CampaignError> {
    let request: SendCampaign = body.into_inner().try_into().map_err(|err| {
        tracing::error!("Validation error: {:?}", err);
        CampaignError::Validation(err)
    })?;

    let report = broadcaster.send_campaign(request).await?;

    Ok(HttpResponse::Ok().json(report))
}
