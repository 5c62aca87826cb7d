use actix_web::{web, HttpResponse};

use crate::domain::new_subscriber::{NewSubscriber, NewSubscriberBody};
use crate::membership::{Membership, MembershipError, Scope, Transition};

#[tracing::instrument(
    name = "Creating a new subscriber handler",
    skip(body, membership),
    fields(
        subscriber_email = %body.email,
    )
)]
pub async fn handle_create_subscription(
    body: web::Json<NewSubscriberBody>,
    membership: web::Data<Membership>,
) -> Result<HttpResponse, MembershipError> {
    let new_subscriber: NewSubscriber = body.into_inner().try_into().map_err(|err| {
        tracing::error!("Validation error: {:?}", err);
        MembershipError::Validation(err)
    })?;

    let change = membership.subscribe(Scope::Global, new_subscriber).await?;
    let (mut response, message) = match change.transition {
        Transition::Created => (HttpResponse::Created(), "Successfully subscribed."),
        _ => (HttpResponse::Ok(), "Welcome back! Your subscription is active again."),
    };

    Ok(response.json(serde_json::json!({
        "success": true,
        "message": message,
        "subscriber": change.record,
    })))
}
