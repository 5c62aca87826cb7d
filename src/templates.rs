//! Email bodies: personalization, unsubscribe footers and the welcome message.

use reqwest::Url;

use crate::domain::{SubscriberEmail, UnsubscribeToken};

/// Replaced by the recipient's first name.
pub const FIRST_NAME_PLACEHOLDER: &str = "{{firstName}}";
const FIRST_NAME_FALLBACK: &str = "there";

/// Link to the self-service unsubscribe page. The token is preferred; the email is the fallback
/// for recipients that have none.
pub fn unsubscribe_link(
    base_url: &str,
    token: Option<&UnsubscribeToken>,
    email: &SubscriberEmail,
) -> String {
    let endpoint = format!("{}/unsubscribe", base_url.trim_end_matches('/'));
    let params = match token {
        Some(token) => [("token", token.as_ref())],
        None => [("email", email.as_ref())],
    };

    match Url::parse_with_params(&endpoint, &params) {
        Ok(url) => url.to_string(),
        Err(_) => endpoint,
    }
}

pub fn personalize(body: &str, first_name: Option<&str>) -> String {
    body.replace(FIRST_NAME_PLACEHOLDER, first_name.unwrap_or(FIRST_NAME_FALLBACK))
}

pub fn html_footer(unsubscribe_link: &str) -> String {
    format!(
        r#"<hr/><p style="font-size:12px;color:#666">You are receiving this email because you subscribed to our updates. <a href="{}">Unsubscribe</a></p>"#,
        unsubscribe_link
    )
}

pub fn text_footer(unsubscribe_link: &str) -> String {
    format!(
        "\n\n--\nYou are receiving this email because you subscribed to our updates.\nUnsubscribe: {}",
        unsubscribe_link
    )
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

/// Renders plain text as HTML, one paragraph per blank-line separated block.
pub fn text_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| format!("<p>{}</p>", escape_html(block).replace('\n', "<br/>")))
        .collect()
}

/// Crude HTML-to-text for the plain-text alternative when only HTML was authored.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut tag = String::new();

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag.trim_start_matches('/').to_lowercase();
                if name.starts_with("br") || name.starts_with('p') || name.starts_with("div") {
                    text.push('\n');
                }
            }
            _ if in_tag => tag.push(c),
            _ => text.push(c),
        }
    }

    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct WelcomeEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn welcome_email(first_name: Option<&str>, unsubscribe_link: &str) -> WelcomeEmail {
    let greeting = personalize("Hi {{firstName}},", first_name);
    let html = format!(
        r#"<div><h1>Welcome to our newsletter!</h1><p>{}</p><p>Thanks for subscribing. We will keep you posted on our research and news.</p></div>{}"#,
        escape_html(&greeting),
        html_footer(unsubscribe_link)
    );
    let text = format!(
        "{}\n\nThanks for subscribing. We will keep you posted on our research and news.{}",
        greeting,
        text_footer(unsubscribe_link)
    );

    WelcomeEmail {
        subject: "Welcome to our newsletter".to_string(),
        html,
        text,
    }
}
