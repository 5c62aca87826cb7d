use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use crate::broadcast::{Broadcaster, Dispatcher};
use crate::config::{DatabaseSettings, Settings};
use crate::email_client::EmailClient;
use crate::membership::Membership;
use crate::provider_sync::spawn_worker;
use crate::routes::{
    handle_create_audience, handle_create_campaign, handle_create_subscription,
    handle_delete_audience, handle_get_campaign, handle_list_audiences, handle_remove_contact,
    handle_send_campaign, handle_subscribe_contact, handle_unsubscribe,
    handle_unsubscribe_contact, handle_unsubscribe_link, health_check,
};
use crate::store::{CampaignStore, MembershipStore, PgStore};

pub struct Application {
    pub port: u16,
    pub server: Server,
    membership: web::Data<Membership>,
}

fn invalid_config(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
}

impl Application {
    /// Builds the application on top of Postgres. The pool connects lazily.
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let store = Arc::new(PgStore::new(get_connection_db_pool(&config.database)));

        Self::build_with_store(config, store).await
    }

    pub async fn build_with_store<S>(config: Settings, store: Arc<S>) -> Result<Self, std::io::Error>
    where
        S: MembershipStore + CampaignStore + 'static,
    {
        let sender_email = config.get_email_client_sender().map_err(invalid_config)?;
        let email_client = EmailClient::new(
            config.get_email_client_base_url(),
            sender_email,
            config.get_email_client_api(),
            Some(config.get_email_client_timeout()),
        )
        .map_err(invalid_config)?;
        let email_client = Arc::new(email_client);
        let base_url = config.get_app_base_url();

        let members: Arc<dyn MembershipStore> = store.clone();
        let campaigns: Arc<dyn CampaignStore> = store;

        let sync = spawn_worker(email_client.clone(), members.clone(), base_url.clone());
        let membership = web::Data::new(Membership::new(members.clone(), sync));
        let dispatcher = Dispatcher::new(email_client, config.get_broadcast(), base_url);
        let broadcaster = Broadcaster::new(campaigns, members, dispatcher);

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(listener, membership.clone(), web::Data::new(broadcaster))?;

        tracing::info!("Server listening on {}", config.get_address());

        Ok(Self {
            port,
            server,
            membership,
        })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Shared membership service, used to wait on the provider sync queue.
    pub fn membership(&self) -> web::Data<Membership> {
        self.membership.clone()
    }

    /// Serves until the server stops, then drains the provider sync queue.
    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await?;
        self.membership.sync_handle().settle().await;
        tracing::info!("Provider sync queue drained");

        Ok(())
    }
}

pub fn run(
    listener: TcpListener,
    membership: web::Data<Membership>,
    broadcaster: web::Data<Broadcaster>,
) -> Result<Server, std::io::Error> {
    let server = HttpServer::new(move || {
        App::new()
            // Request logger with a request id on every span
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/subscriptions", web::post().to(handle_create_subscription))
            .route("/unsubscribe", web::get().to(handle_unsubscribe_link))
            .route("/unsubscribe", web::post().to(handle_unsubscribe))
            .service(
                web::scope("/audiences")
                    .route("", web::get().to(handle_list_audiences))
                    .route("", web::post().to(handle_create_audience))
                    .route("/{audience_id}", web::delete().to(handle_delete_audience))
                    .route(
                        "/{audience_id}/contacts",
                        web::post().to(handle_subscribe_contact),
                    )
                    .route(
                        "/{audience_id}/contacts/unsubscribe",
                        web::post().to(handle_unsubscribe_contact),
                    )
                    .route(
                        "/{audience_id}/contacts/{email}",
                        web::delete().to(handle_remove_contact),
                    ),
            )
            .service(
                web::scope("/campaigns")
                    .route("", web::post().to(handle_create_campaign))
                    .route("/send", web::post().to(handle_send_campaign))
                    .route("/{campaign_id}", web::get().to(handle_get_campaign)),
            )
            .app_data(membership.clone())
            .app_data(broadcaster.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
