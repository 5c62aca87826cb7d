use claim::{assert_none, assert_some};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{sent_emails, TestApp};

async fn mount_email_ok(test_app: &TestApp) {
    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;
}

#[tokio::test]
async fn subscribe_returns_201_when_body_is_valid() {
    let test_app = TestApp::spawn_app().await;
    mount_email_ok(&test_app).await;

    let response = test_app
        .post_subscription(&serde_json::json!({
            "email": "frank@test.com",
            "firstName": "Frank",
            "interests": ["Research", "events"]
        }))
        .await;

    assert_eq!(201, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["subscriber"]["email"], "frank@test.com");
    assert_eq!(body["subscriber"]["status"], "active");
    assert!(body["subscriber"].get("unsubscribeToken").is_none());
}

#[tokio::test]
async fn subscribe_persists_the_new_subscriber() {
    let test_app = TestApp::spawn_app().await;
    mount_email_ok(&test_app).await;

    test_app
        .post_subscription(&serde_json::json!({
            "email": "  Frank@Test.com ",
            "firstName": "Frank",
            "source": "manual",
            "interests": ["Research"]
        }))
        .await;

    let subscriber = assert_some!(test_app.find_subscriber("frank@test.com").await);
    assert_eq!(subscriber.email.as_ref(), "frank@test.com");
    assert_eq!(subscriber.first_name.unwrap().as_ref(), "Frank");
    assert_eq!(subscriber.status.as_ref(), "active");
    assert!(subscriber.interests.contains("research"));
    assert_none!(subscriber.unsubscribed_at);
}

#[tokio::test]
async fn subscribe_returns_409_for_an_active_subscriber() {
    let test_app = TestApp::spawn_app().await;
    mount_email_ok(&test_app).await;
    let body = serde_json::json!({ "email": "frank@test.com" });

    let first = test_app.post_subscription(&body).await;
    let second = test_app.post_subscription(&body).await;

    assert_eq!(first.status().as_u16(), 201);
    assert_eq!(second.status().as_u16(), 409);
    let error: serde_json::Value = second.json().await.unwrap();
    assert_eq!(error["success"], false);
}

#[tokio::test]
async fn subscribe_reactivates_an_unsubscribed_email() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscriber("frank@test.com", None, &[]).await;
    test_app
        .post_unsubscribe(&serde_json::json!({ "email": "frank@test.com" }))
        .await;

    let response = test_app
        .post_subscription(&serde_json::json!({
            "email": "frank@test.com",
            "firstName": "Francis"
        }))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let subscriber = assert_some!(test_app.find_subscriber("frank@test.com").await);
    assert_eq!(subscriber.status.as_ref(), "active");
    assert_eq!(subscriber.first_name.unwrap().as_ref(), "Francis");
    assert_none!(subscriber.unsubscribed_at);
}

#[tokio::test]
async fn subscribe_returns_400_when_body_is_invalid() {
    let test_app = TestApp::spawn_app().await;
    let test_cases = vec![
        (serde_json::json!({}), "missing email"),
        (serde_json::json!({ "email": "" }), "empty email"),
        (serde_json::json!({ "email": "not-an-email" }), "invalid email"),
        (
            serde_json::json!({ "email": "frank@test.com", "source": "carrier pigeon" }),
            "unknown source",
        ),
        (
            serde_json::json!({ "email": "frank@test.com", "interests": ["two words"] }),
            "invalid interest tag",
        ),
    ];

    for (body, description) in test_cases {
        let response = test_app.post_subscription(&body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload was {}.",
            description
        );
    }
}

#[tokio::test]
async fn subscribe_sends_a_welcome_email_with_an_unsubscribe_link() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    test_app
        .post_subscription(&serde_json::json!({ "email": "frank@test.com", "firstName": "Frank" }))
        .await;
    test_app.settle().await;

    let emails = sent_emails(&test_app.email_server).await;
    let links = test_app.get_unsubscribe_links(&emails[0]);
    let subscriber = assert_some!(test_app.find_subscriber("frank@test.com").await);

    assert_eq!(links.html, links.plain_text);
    assert_eq!(
        links.html.query(),
        Some(format!("token={}", subscriber.unsubscribe_token.as_ref()).as_str())
    );
}

#[tokio::test]
async fn subscribe_succeeds_when_the_welcome_email_fails() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let response = test_app
        .post_subscription(&serde_json::json!({ "email": "frank@test.com" }))
        .await;
    test_app.settle().await;

    assert_eq!(response.status().as_u16(), 201);
    let subscriber = assert_some!(test_app.find_subscriber("frank@test.com").await);
    assert!(subscriber.status.is_active());
}
