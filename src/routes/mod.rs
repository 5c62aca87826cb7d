mod audiences;
mod campaigns;
mod errors;
mod health_check;
mod subscriptions;
mod unsubscribe;

pub use audiences::*;
pub use campaigns::*;
pub use health_check::*;
pub use subscriptions::*;
pub use unsubscribe::*;
