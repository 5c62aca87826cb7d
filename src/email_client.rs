use reqwest::{Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::subscriber_email::SubscriberEmail;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// Client for the email-delivery provider: transactional sends plus its audience/contact model.
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(serde::Serialize)]
struct CreateAudienceBody<'a> {
    name: &'a str,
}

#[derive(serde::Deserialize)]
struct CreatedResource {
    id: String,
}

/// Contact representation on the provider side.
#[derive(Debug, serde::Serialize)]
pub struct ProviderContact<'a> {
    pub email: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub unsubscribed: bool,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<EmailClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(EmailClient {
            http_client,
            base_url,
            sender,
            api_key,
        })
    }

    /// Local parts may contain `#`, `?` or `/`, so the email is pushed as an encoded segment.
    fn contact_url(&self, audience_id: &str, email: &str) -> String {
        match Url::parse(&self.base_url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments
                        .pop_if_empty()
                        .extend(["audiences", audience_id, "contacts", email]);
                }
                url.to_string()
            }
            // Left for reqwest to reject when the request is built
            Err(_) => format!("{}/audiences/{}/contacts/{}", self.base_url, audience_id, email),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        )
    }

    pub async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/emails", self.base_url);
        let body = SendEmailBody {
            from: self.sender.as_ref(),
            to: vec![recipient.as_ref()],
            subject,
            html: html_content,
            text: text_content,
        };

        self.authorized(self.http_client.post(&url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?; // return an error when server response status code is 4xx or 5xx

        Ok(())
    }

    /// Creates an audience on the provider and returns its id there.
    pub async fn create_audience(&self, name: &str) -> Result<String, reqwest::Error> {
        let url = format!("{}/audiences", self.base_url);

        let created: CreatedResource = self
            .authorized(self.http_client.post(&url))
            .json(&CreateAudienceBody { name })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(created.id)
    }

    pub async fn delete_audience(&self, audience_id: &str) -> Result<(), reqwest::Error> {
        let url = format!("{}/audiences/{}", self.base_url, audience_id);

        self.authorized(self.http_client.delete(&url))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    pub async fn create_contact(
        &self,
        audience_id: &str,
        contact: &ProviderContact<'_>,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/audiences/{}/contacts", self.base_url, audience_id);

        self.authorized(self.http_client.post(&url))
            .json(contact)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Contacts are addressed by email on the provider side.
    pub async fn update_contact(
        &self,
        audience_id: &str,
        contact: &ProviderContact<'_>,
    ) -> Result<(), reqwest::Error> {
        let url = self.contact_url(audience_id, contact.email);

        self.authorized(self.http_client.patch(&url))
            .json(contact)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    pub async fn remove_contact(
        &self,
        audience_id: &str,
        email: &SubscriberEmail,
    ) -> Result<(), reqwest::Error> {
        let url = self.contact_url(audience_id, email.as_ref());

        self.authorized(self.http_client.delete(&url))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
