use mailing_engine::config::get_configuration;
use mailing_engine::startup::Application;
use mailing_engine::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber(
        String::from("mailing_engine"),
        String::from("info"),
        std::io::stdout,
    );

    init_subscriber(subscriber);

    let config = get_configuration()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let application = Application::build(config).await?;

    application.run_until_stop().await
}
