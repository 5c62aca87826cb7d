use uuid::Uuid;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{sent_emails, SentTo, TestApp};

fn draft() -> serde_json::Value {
    serde_json::json!({
        "subject": "Lab update",
        "content": "Hi {{firstName}}, here is what we did this month."
    })
}

async fn mount_email_ok(test_app: &TestApp) {
    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;
}

async fn send(test_app: &TestApp, campaign_id: &str) -> reqwest::Response {
    test_app
        .send_campaign(&serde_json::json!({
            "campaignId": campaign_id,
            "subject": "Lab update",
            "content": "Hi {{firstName}}, here is what we did this month."
        }))
        .await
}

#[tokio::test]
async fn created_campaigns_start_as_drafts() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app.post_campaign(&draft()).await;

    assert_eq!(response.status().as_u16(), 201);
    let campaign: serde_json::Value = response.json().await.unwrap();
    assert_eq!(campaign["status"], "draft");
    assert_eq!(campaign["targetAudience"], serde_json::json!(["all"]));
    assert_eq!(campaign["recipientCount"], 0);
}

#[tokio::test]
async fn campaigns_with_a_schedule_are_marked_scheduled() {
    let test_app = TestApp::spawn_app().await;
    let mut body = draft();
    body["scheduledAt"] = serde_json::json!("2030-01-01T09:00:00Z");

    let response = test_app.post_campaign(&body).await;

    let campaign: serde_json::Value = response.json().await.unwrap();
    assert_eq!(campaign["status"], "scheduled");
}

#[tokio::test]
async fn campaigns_without_subject_or_body_are_rejected() {
    let test_app = TestApp::spawn_app().await;
    let test_cases = vec![
        (serde_json::json!({ "content": "Body" }), "missing subject"),
        (serde_json::json!({ "subject": "Lab update" }), "missing body"),
        (
            serde_json::json!({ "subject": "Lab update", "content": "  ", "htmlContent": "" }),
            "blank bodies",
        ),
    ];

    for (body, description) in test_cases {
        let response = test_app.post_campaign(&body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload was {}.",
            description
        );
    }
}

#[tokio::test]
async fn unknown_campaigns_return_404() {
    let test_app = TestApp::spawn_app().await;
    let campaign_id = Uuid::new_v4().to_string();

    let fetched = test_app.get_campaign(&campaign_id).await;
    let sent = send(&test_app, &campaign_id).await;

    assert_eq!(fetched.status().as_u16(), 404);
    assert_eq!(sent.status().as_u16(), 404);
}

#[tokio::test]
async fn send_requests_without_a_campaign_id_are_rejected() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .send_campaign(&serde_json::json!({ "subject": "Lab update", "content": "Body" }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn campaigns_are_delivered_to_active_subscribers_only() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscriber("ana@test.com", Some("Ana"), &[]).await;
    test_app.seed_subscriber("bo@test.com", None, &[]).await;
    test_app.seed_subscriber("gone@test.com", None, &[]).await;
    test_app
        .post_unsubscribe(&serde_json::json!({ "email": "gone@test.com" }))
        .await;
    mount_email_ok(&test_app).await;
    let campaign_id = test_app.create_draft_campaign(&draft()).await;

    let response = send(&test_app, &campaign_id).await;

    assert_eq!(response.status().as_u16(), 200);
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["totalRecipients"], 2);
    assert_eq!(report["successful"], 2);
    assert_eq!(report["failed"], 0);

    let campaign: serde_json::Value = test_app.get_campaign(&campaign_id).await.json().await.unwrap();
    assert_eq!(campaign["status"], "sent");
    assert_eq!(campaign["recipientCount"], 2);
    assert_eq!(campaign["successCount"], 2);
    assert!(campaign["sentAt"].is_string());
}

#[tokio::test]
async fn delivered_emails_are_personalized_and_carry_an_unsubscribe_link() {
    let test_app = TestApp::spawn_app().await;
    let ana = test_app.seed_subscriber("ana@test.com", Some("Ana"), &[]).await;
    mount_email_ok(&test_app).await;
    let campaign_id = test_app.create_draft_campaign(&draft()).await;

    send(&test_app, &campaign_id).await;

    let emails = sent_emails(&test_app.email_server).await;
    let body: serde_json::Value = serde_json::from_slice(&emails[0].body).unwrap();
    assert!(body["text"].as_str().unwrap().starts_with("Hi Ana,"));
    let links = test_app.get_unsubscribe_links(&emails[0]);
    assert_eq!(
        links.plain_text.query(),
        Some(format!("token={}", ana.unsubscribe_token.as_ref()).as_str())
    );

    let response = reqwest::get(links.plain_text).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let ana = test_app.find_subscriber("ana@test.com").await.unwrap();
    assert_eq!(ana.status.as_ref(), "unsubscribed");
}

#[tokio::test]
async fn partial_failure_still_marks_the_campaign_sent() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscriber("ana@test.com", None, &[]).await;
    test_app.seed_subscriber("bo@test.com", None, &[]).await;
    let campaign_id = test_app.create_draft_campaign(&draft()).await;

    Mock::given(SentTo("bo@test.com"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .expect(1)
        .mount(&test_app.email_server)
        .await;
    mount_email_ok(&test_app).await;

    let report: serde_json::Value = send(&test_app, &campaign_id).await.json().await.unwrap();

    assert_eq!(report["successful"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["errors"][0]["email"], "bo@test.com");

    let campaign: serde_json::Value = test_app.get_campaign(&campaign_id).await.json().await.unwrap();
    assert_eq!(campaign["status"], "sent");
    assert_eq!(campaign["failureCount"], 1);
    assert_eq!(campaign["errors"][0]["email"], "bo@test.com");
}

#[tokio::test]
async fn campaign_fails_when_no_email_gets_through() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscriber("ana@test.com", None, &[]).await;
    test_app.seed_subscriber("bo@test.com", None, &[]).await;
    let campaign_id = test_app.create_draft_campaign(&draft()).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&test_app.email_server)
        .await;

    let response = send(&test_app, &campaign_id).await;

    assert_eq!(response.status().as_u16(), 200);
    let campaign: serde_json::Value = test_app.get_campaign(&campaign_id).await.json().await.unwrap();
    assert_eq!(campaign["status"], "failed");
    assert_eq!(campaign["successCount"], 0);
    assert_eq!(campaign["failureCount"], 2);
}

#[tokio::test]
async fn campaigns_without_recipients_stay_drafts() {
    let test_app = TestApp::spawn_app().await;
    let campaign_id = test_app.create_draft_campaign(&draft()).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    let response = send(&test_app, &campaign_id).await;

    assert_eq!(response.status().as_u16(), 400);
    let campaign: serde_json::Value = test_app.get_campaign(&campaign_id).await.json().await.unwrap();
    assert_eq!(campaign["status"], "draft");
}

#[tokio::test]
async fn sent_campaigns_cannot_be_sent_again() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscriber("ana@test.com", None, &[]).await;
    mount_email_ok(&test_app).await;
    let campaign_id = test_app.create_draft_campaign(&draft()).await;

    let first = send(&test_app, &campaign_id).await;
    let second = send(&test_app, &campaign_id).await;

    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 409);
    assert_eq!(sent_emails(&test_app.email_server).await.len(), 1);
}

#[tokio::test]
async fn target_audience_selects_subscribers_by_interest() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscriber("ana@test.com", None, &["research"]).await;
    test_app.seed_subscriber("bo@test.com", None, &["events"]).await;
    test_app.seed_subscriber("cy@test.com", None, &[]).await;
    mount_email_ok(&test_app).await;
    let campaign_id = test_app.create_draft_campaign(&draft()).await;

    let report: serde_json::Value = test_app
        .send_campaign(&serde_json::json!({
            "campaignId": campaign_id,
            "subject": "Research digest",
            "content": "New papers",
            "targetAudience": ["Research"]
        }))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(report["totalRecipients"], 1);
    let emails = sent_emails(&test_app.email_server).await;
    let body: serde_json::Value = serde_json::from_slice(&emails[0].body).unwrap();
    assert_eq!(body["to"][0], "ana@test.com");
    assert_eq!(body["subject"], "Research digest");
}

#[tokio::test]
async fn large_sends_are_split_into_batches() {
    let test_app = TestApp::spawn_with(|config| {
        config.broadcast.batch_size = 2;
        config.broadcast.batch_pause_milliseconds = 50;
    })
    .await;
    for n in 0..5 {
        test_app
            .seed_subscriber(&format!("reader{}@test.com", n), None, &[])
            .await;
    }
    mount_email_ok(&test_app).await;
    let campaign_id = test_app.create_draft_campaign(&draft()).await;

    let started = std::time::Instant::now();
    let report: serde_json::Value = send(&test_app, &campaign_id).await.json().await.unwrap();

    assert_eq!(report["successful"], 5);
    assert_eq!(sent_emails(&test_app.email_server).await.len(), 5);
    // Three batches, two pauses between them
    assert!(started.elapsed() >= std::time::Duration::from_millis(100));
}
