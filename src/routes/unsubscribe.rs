use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::membership::{Identity, Membership, MembershipError, Scope};
use crate::templates::escape_html;

#[derive(Deserialize, Debug)]
pub struct UnsubscribeParameters {
    pub token: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeBody {
    pub token: Option<String>,
    pub email: Option<String>,
    pub audience_id: Option<Uuid>,
}

fn page(status: StatusCode, title: &str, message: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(format!(
            r#"<!DOCTYPE html>
<html>
  <head><meta charset="utf-8"><title>{title}</title></head>
  <body>
    <main>
      <h1>{title}</h1>
      <p>{message}</p>
    </main>
  </body>
</html>"#,
            title = escape_html(title),
            message = escape_html(message)
        ))
}

/// Target of the link printed in every email footer. Always answers with a readable page.
#[tracing::instrument(name = "Unsubscribe from a link", skip(membership, parameters))]
pub async fn handle_unsubscribe_link(
    membership: web::Data<Membership>,
    parameters: web::Query<UnsubscribeParameters>,
) -> HttpResponse {
    let parameters = parameters.into_inner();
    let identity = Identity {
        token: parameters.token,
        email: parameters.email,
    };

    match membership.unsubscribe(Scope::Global, &identity).await {
        Ok(change) if change.already_unsubscribed() => page(
            StatusCode::OK,
            "Already unsubscribed",
            "You were already unsubscribed. You will not receive any more emails from us.",
        ),
        Ok(_) => page(
            StatusCode::OK,
            "Unsubscribed",
            "You have been unsubscribed. You will not receive any more emails from us.",
        ),
        Err(MembershipError::Validation(_)) => page(
            StatusCode::BAD_REQUEST,
            "Invalid link",
            "This unsubscribe link is incomplete. Please use the link from one of our emails.",
        ),
        Err(MembershipError::NotFound(_)) => page(
            StatusCode::NOT_FOUND,
            "Subscription not found",
            "We could not find a subscription for this link. It may have been removed already.",
        ),
        Err(err) => {
            tracing::error!("Failed to unsubscribe: {:?}", err);
            page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "We could not process your request right now. Please try again later.",
            )
        }
    }
}

#[tracing::instrument(name = "Unsubscribe from a form", skip(membership, body))]
pub async fn handle_unsubscribe(
    membership: web::Data<Membership>,
    body: web::Json<UnsubscribeBody>,
) -> Result<HttpResponse, MembershipError> {
    let body = body.into_inner();
    let identity = Identity {
        token: body.token,
        email: body.email,
    };

    let change = membership
        .unsubscribe(Scope::from(body.audience_id), &identity)
        .await?;
    let message = if change.already_unsubscribed() {
        "You were already unsubscribed."
    } else {
        "Successfully unsubscribed."
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": message,
        "alreadyUnsubscribed": change.already_unsubscribed(),
    })))
}
