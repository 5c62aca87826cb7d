pub mod audience;
pub mod campaign;
pub mod contact;
pub mod interests;
pub mod new_subscriber;
pub mod subscriber;
pub mod subscriber_email;
pub mod subscriber_name;
pub mod subscriber_status;
pub mod subscription_source;
pub mod unsubscribe_token;

pub use audience::{Audience, NewAudience};
pub use campaign::{
    Campaign, CampaignContent, CampaignStatus, DeliveryError, DeliveryReport, NewCampaign,
};
pub use contact::{Contact, ContactFields};
pub use interests::{AudienceSelector, Interests};
pub use new_subscriber::{NewSubscriber, NewSubscriberBody};
pub use subscriber::Subscriber;
pub use subscriber_email::SubscriberEmail;
pub use subscriber_name::SubscriberName;
pub use subscriber_status::SubscriberStatus;
pub use subscription_source::SubscriptionSource;
pub use unsubscribe_token::UnsubscribeToken;
