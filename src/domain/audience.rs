use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

const MAX_NAME_LENGTH: usize = 128;
const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// A named grouping of contacts mirrored to the email provider.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub external_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewAudience {
    pub name: String,
    pub description: String,
}

impl NewAudience {
    pub fn parse(name: String, description: Option<String>) -> Result<NewAudience, String> {
        let name = name.trim().to_string();
        let description = description.unwrap_or_default().trim().to_string();

        if name.is_empty() || name.graphemes(true).count() > MAX_NAME_LENGTH {
            return Err(format!("{} is not a valid audience name", name));
        }
        if description.graphemes(true).count() > MAX_DESCRIPTION_LENGTH {
            return Err("audience description is too long".to_string());
        }

        Ok(NewAudience { name, description })
    }
}

impl Audience {
    pub fn new(new_audience: NewAudience, now: DateTime<Utc>) -> Audience {
        Audience {
            id: Uuid::new_v4(),
            name: new_audience.name,
            description: new_audience.description,
            external_id: None,
            is_active: true,
            created_at: now,
        }
    }
}
