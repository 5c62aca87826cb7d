use claim::{assert_none, assert_some};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, Request, ResponseTemplate};

use crate::helpers::TestApp;

async fn mount_provider_audience(test_app: &TestApp, external_id: &str) {
    Mock::given(path("/audiences"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": external_id })))
        .mount(&test_app.email_server)
        .await;
}

async fn create_audience(test_app: &TestApp, name: &str) -> String {
    let response = test_app
        .post_audience(&serde_json::json!({ "name": name, "description": "Monthly updates" }))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let audience: serde_json::Value = response.json().await.unwrap();

    audience["id"].as_str().unwrap().to_string()
}

fn contact_bodies(requests: &[Request], http_method: &str) -> Vec<serde_json::Value> {
    requests
        .iter()
        .filter(|request| request.method.to_string() == http_method)
        .filter(|request| request.url.path().contains("/contacts"))
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

#[tokio::test]
async fn created_audiences_are_listed() {
    let test_app = TestApp::spawn_app().await;
    mount_provider_audience(&test_app, "aud_123").await;

    let audience_id = create_audience(&test_app, "Lab news").await;
    let response = test_app.get_audiences().await;

    assert_eq!(response.status().as_u16(), 200);
    let audiences: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(audiences.len(), 1);
    assert_eq!(audiences[0]["id"], audience_id.as_str());
    assert_eq!(audiences[0]["name"], "Lab news");
    assert_eq!(audiences[0]["description"], "Monthly updates");
}

#[tokio::test]
async fn audience_creation_stores_the_provider_id() {
    let test_app = TestApp::spawn_app().await;
    mount_provider_audience(&test_app, "aud_123").await;

    let audience_id = create_audience(&test_app, "Lab news").await;
    test_app.settle().await;

    let audience = test_app
        .store_audience(audience_id.parse().unwrap())
        .await;
    assert_eq!(audience.external_id.as_deref(), Some("aud_123"));
}

#[tokio::test]
async fn audience_creation_succeeds_when_the_provider_is_down() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/audiences"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let audience_id = create_audience(&test_app, "Lab news").await;
    test_app.settle().await;

    let audience = test_app
        .store_audience(audience_id.parse().unwrap())
        .await;
    assert_none!(audience.external_id);
}

#[tokio::test]
async fn audience_without_a_name_is_rejected() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .post_audience(&serde_json::json!({ "name": "   " }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn adding_a_contact_twice_reports_already_subscribed() {
    let test_app = TestApp::spawn_app().await;
    let audience_id = create_audience(&test_app, "Lab news").await;
    let body = serde_json::json!({ "email": "alice@example.com", "firstName": "Alice" });

    let first = test_app.post_contact(&audience_id, &body).await;
    let second = test_app.post_contact(&audience_id, &body).await;

    assert_eq!(first.status().as_u16(), 201);
    assert_eq!(second.status().as_u16(), 200);
    let first: serde_json::Value = first.json().await.unwrap();
    let second: serde_json::Value = second.json().await.unwrap();
    assert_eq!(first["alreadySubscribed"], false);
    assert_eq!(second["alreadySubscribed"], true);
    assert_eq!(test_app.store.contacts_of(audience_id.parse().unwrap()).len(), 1);
}

#[tokio::test]
async fn contacts_of_an_unknown_audience_return_404() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .post_contact(
            &Uuid::new_v4().to_string(),
            &serde_json::json!({ "email": "alice@example.com" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn unsubscribing_an_unknown_contact_returns_404() {
    let test_app = TestApp::spawn_app().await;
    let audience_id = create_audience(&test_app, "Lab news").await;

    let response = test_app
        .post_contact_unsubscribe(&audience_id, "alice@example.com")
        .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn a_contact_can_unsubscribe_and_come_back() {
    let test_app = TestApp::spawn_app().await;
    let audience_id = create_audience(&test_app, "Lab news").await;
    let audience_uuid: Uuid = audience_id.parse().unwrap();
    let body = serde_json::json!({ "email": "alice@example.com" });

    test_app.post_contact(&audience_id, &body).await;
    let unsubscribed = test_app
        .post_contact_unsubscribe(&audience_id, "alice@example.com")
        .await;
    assert_eq!(unsubscribed.status().as_u16(), 200);
    let contact = test_app.store.contacts_of(audience_uuid).remove(0);
    assert!(!contact.subscribed);
    assert_some!(contact.unsubscribed_at);

    let again = test_app
        .post_contact_unsubscribe(&audience_id, "alice@example.com")
        .await;
    let again: serde_json::Value = again.json().await.unwrap();
    assert_eq!(again["alreadyUnsubscribed"], true);

    let resubscribed = test_app.post_contact(&audience_id, &body).await;
    assert_eq!(resubscribed.status().as_u16(), 200);
    let contact = test_app.store.contacts_of(audience_uuid).remove(0);
    assert!(contact.subscribed);
    assert_none!(contact.unsubscribed_at);
}

#[tokio::test]
async fn removing_a_contact_deletes_it() {
    let test_app = TestApp::spawn_app().await;
    let audience_id = create_audience(&test_app, "Lab news").await;
    test_app
        .post_contact(&audience_id, &serde_json::json!({ "email": "alice@example.com" }))
        .await;

    let removed = test_app
        .delete_contact(&audience_id, "alice@example.com")
        .await;
    let missing = test_app
        .delete_contact(&audience_id, "alice@example.com")
        .await;

    assert_eq!(removed.status().as_u16(), 204);
    assert_eq!(missing.status().as_u16(), 404);
    assert!(test_app
        .store
        .contacts_of(audience_id.parse().unwrap())
        .is_empty());
}

#[tokio::test]
async fn deleting_an_audience_removes_its_contacts() {
    let test_app = TestApp::spawn_app().await;
    mount_provider_audience(&test_app, "aud_123").await;
    let audience_id = create_audience(&test_app, "Lab news").await;
    test_app.settle().await;
    test_app
        .post_contact(&audience_id, &serde_json::json!({ "email": "alice@example.com" }))
        .await;

    Mock::given(path("/audiences/aud_123"))
        .and(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let deleted = test_app.delete_audience(&audience_id).await;
    let missing = test_app.delete_audience(&audience_id).await;
    test_app.settle().await;

    assert_eq!(deleted.status().as_u16(), 204);
    assert_eq!(missing.status().as_u16(), 404);
    assert!(test_app
        .store
        .contacts_of(audience_id.parse().unwrap())
        .is_empty());
    let audiences: Vec<serde_json::Value> = test_app.get_audiences().await.json().await.unwrap();
    assert!(audiences.is_empty());
}

#[tokio::test]
async fn contact_lifecycle_is_mirrored_to_the_provider() {
    let test_app = TestApp::spawn_app().await;
    mount_provider_audience(&test_app, "aud_123").await;

    Mock::given(path("/audiences/aud_123/contacts"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&test_app.email_server)
        .await;
    Mock::given(path("/audiences/aud_123/contacts/alice@example.com"))
        .and(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&test_app.email_server)
        .await;

    let audience_id = create_audience(&test_app, "Lab news").await;
    let audience_uuid: Uuid = audience_id.parse().unwrap();
    test_app.settle().await;

    let body = serde_json::json!({ "email": "alice@example.com", "firstName": "Alice" });
    test_app.post_contact(&audience_id, &body).await;
    test_app
        .post_contact_unsubscribe(&audience_id, "alice@example.com")
        .await;
    test_app.settle().await;
    let unsubscribed_at = test_app.store.contacts_of(audience_uuid)[0].unsubscribed_at;

    test_app.post_contact(&audience_id, &body).await;
    test_app.settle().await;

    let requests = test_app.email_server.received_requests().await.unwrap();
    let created = contact_bodies(&requests, "POST");
    let updated = contact_bodies(&requests, "PATCH");
    assert_eq!(created[0]["email"], "alice@example.com");
    assert_eq!(created[0]["unsubscribed"], false);
    assert_eq!(updated[0]["unsubscribed"], true);
    assert_eq!(updated[1]["unsubscribed"], false);

    assert_some!(unsubscribed_at);
    let contact = test_app.store.contacts_of(audience_uuid).remove(0);
    assert!(contact.subscribed);
    assert_none!(contact.unsubscribed_at);
    assert_eq!(contact.first_name.unwrap().as_ref(), "Alice");
}
