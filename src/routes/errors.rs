use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::broadcast::CampaignError;
use crate::membership::MembershipError;

fn json_error(status: StatusCode, message: String) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({
        "success": false,
        "error": message,
    }))
}

impl ResponseError for MembershipError {
    fn status_code(&self) -> StatusCode {
        match self {
            MembershipError::Validation(_) => StatusCode::BAD_REQUEST,
            MembershipError::NotFound(_) => StatusCode::NOT_FOUND,
            MembershipError::Conflict(_) => StatusCode::CONFLICT,
            MembershipError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        json_error(self.status_code(), self.to_string())
    }
}

impl ResponseError for CampaignError {
    fn status_code(&self) -> StatusCode {
        match self {
            CampaignError::Validation(_) | CampaignError::NoRecipients => StatusCode::BAD_REQUEST,
            CampaignError::NotFound => StatusCode::NOT_FOUND,
            CampaignError::InvalidTransition(_) => StatusCode::CONFLICT,
            CampaignError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        json_error(self.status_code(), self.to_string())
    }
}
