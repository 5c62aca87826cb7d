pub mod broadcast;
pub mod config;
pub mod domain;
pub mod email_client;
pub mod membership;
pub mod provider_sync;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod templates;
