use claim::assert_some;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{sent_emails, TestApp};

#[tokio::test]
async fn the_link_in_the_welcome_email_unsubscribes_the_user() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app
        .post_subscription(&serde_json::json!({ "email": "frank@test.com" }))
        .await;
    test_app.settle().await;

    let emails = sent_emails(&test_app.email_server).await;
    let links = test_app.get_unsubscribe_links(&emails[0]);
    let response = reqwest::get(links.html).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(response.text().await.unwrap().contains("You have been unsubscribed"));

    let subscriber = assert_some!(test_app.find_subscriber("frank@test.com").await);
    assert_eq!(subscriber.status.as_ref(), "unsubscribed");
    assert_some!(subscriber.unsubscribed_at);
}

#[tokio::test]
async fn clicking_the_link_twice_reports_already_unsubscribed() {
    let test_app = TestApp::spawn_app().await;
    let subscriber = test_app.seed_subscriber("frank@test.com", None, &[]).await;
    let token = subscriber.unsubscribe_token.as_ref();

    let first = test_app.get_unsubscribe(&[("token", token)]).await;
    let first_unsubscribed_at = test_app
        .find_subscriber("frank@test.com")
        .await
        .unwrap()
        .unsubscribed_at;
    let second = test_app.get_unsubscribe(&[("token", token)]).await;

    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 200);
    assert!(second.text().await.unwrap().contains("already unsubscribed"));
    let stored = test_app.find_subscriber("frank@test.com").await.unwrap();
    assert_eq!(stored.unsubscribed_at, first_unsubscribed_at);
}

#[tokio::test]
async fn the_link_without_token_or_email_is_rejected_with_400() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app.get_unsubscribe(&[]).await;

    assert_eq!(response.status().as_u16(), 400);
    assert!(response.text().await.unwrap().contains("<html>"));
}

#[tokio::test]
async fn the_link_for_an_unknown_email_returns_404() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .get_unsubscribe(&[("email", "nobody@test.com")])
        .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn the_token_wins_over_the_email() {
    let test_app = TestApp::spawn_app().await;
    let frank = test_app.seed_subscriber("frank@test.com", None, &[]).await;
    test_app.seed_subscriber("ana@test.com", None, &[]).await;

    let response = test_app
        .get_unsubscribe(&[
            ("token", frank.unsubscribe_token.as_ref()),
            ("email", "ana@test.com"),
        ])
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let frank = test_app.find_subscriber("frank@test.com").await.unwrap();
    let ana = test_app.find_subscriber("ana@test.com").await.unwrap();
    assert_eq!(frank.status.as_ref(), "unsubscribed");
    assert_eq!(ana.status.as_ref(), "active");
}

#[tokio::test]
async fn an_unknown_token_falls_back_to_the_email() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscriber("frank@test.com", None, &[]).await;

    let response = test_app
        .get_unsubscribe(&[
            ("token", "0123456789abcdefghijABCDEFGHIJ01"),
            ("email", "Frank@Test.com"),
        ])
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let frank = test_app.find_subscriber("frank@test.com").await.unwrap();
    assert_eq!(frank.status.as_ref(), "unsubscribed");
}

#[tokio::test]
async fn an_unknown_token_with_a_malformed_email_returns_404() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .get_unsubscribe(&[
            ("token", "0123456789abcdefghijABCDEFGHIJ01"),
            ("email", "not-an-email"),
        ])
        .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn the_form_reports_whether_the_user_was_already_unsubscribed() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscriber("frank@test.com", None, &[]).await;
    let body = serde_json::json!({ "email": "frank@test.com" });

    let first: serde_json::Value = test_app.post_unsubscribe(&body).await.json().await.unwrap();
    let second: serde_json::Value = test_app.post_unsubscribe(&body).await.json().await.unwrap();

    assert_eq!(first["success"], true);
    assert_eq!(first["alreadyUnsubscribed"], false);
    assert_eq!(second["success"], true);
    assert_eq!(second["alreadyUnsubscribed"], true);
}

#[tokio::test]
async fn the_form_returns_404_for_an_unknown_email() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .post_unsubscribe(&serde_json::json!({ "email": "nobody@test.com" }))
        .await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn the_form_unsubscribes_an_audience_contact() {
    let test_app = TestApp::spawn_app().await;
    let audience: serde_json::Value = test_app
        .post_audience(&serde_json::json!({ "name": "Lab news" }))
        .await
        .json()
        .await
        .unwrap();
    let audience_id = audience["id"].as_str().unwrap();
    test_app
        .post_contact(audience_id, &serde_json::json!({ "email": "frank@test.com" }))
        .await;

    let response = test_app
        .post_unsubscribe(&serde_json::json!({
            "email": "frank@test.com",
            "audienceId": audience_id
        }))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["alreadyUnsubscribed"], false);
    let contacts = test_app.store.contacts_of(audience_id.parse().unwrap());
    assert!(!contacts[0].subscribed);
}
