use serde::Deserialize;

use crate::domain::interests::Interests;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscription_source::SubscriptionSource;

#[derive(Debug)]
pub struct NewSubscriber {
    pub email: SubscriberEmail,
    pub first_name: Option<SubscriberName>,
    pub last_name: Option<SubscriberName>,
    pub interests: Interests,
    pub source: SubscriptionSource,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscriberBody {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub interests: Option<Vec<String>>,
    pub source: Option<String>,
}

impl TryFrom<NewSubscriberBody> for NewSubscriber {
    type Error = String;

    fn try_from(body: NewSubscriberBody) -> Result<Self, Self::Error> {
        let email = SubscriberEmail::parse(body.email)?;
        let first_name = SubscriberName::parse_optional(body.first_name)?;
        let last_name = SubscriberName::parse_optional(body.last_name)?;
        let interests = Interests::parse(body.interests.unwrap_or_default())?;
        let source = SubscriptionSource::parse_optional(body.source)?;

        Ok(NewSubscriber {
            email,
            first_name,
            last_name,
            interests,
            source,
        })
    }
}
