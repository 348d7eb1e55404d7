//! Subscription detection and the three unsubscribe paths

mod common;

use common::{
    create_newsletter_message, create_test_message, service, service_allowing_http_one_click,
    FakeMailbox,
};
use smart_inbox::error::GmailError;
use smart_inbox::models::{Subscription, UnsubscribeOutcome};
use std::sync::Arc;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn subscription_for(id: &str) -> Subscription {
    Subscription {
        id: id.to_string(),
        sender: "Anyone".to_string(),
        email: "anyone@example.com".to_string(),
        unsubscribe_link: None,
        unsubscribe_email: None,
        one_click: false,
        last_seen: String::new(),
    }
}

#[tokio::test]
async fn test_list_subscriptions_newest_per_sender() {
    let mailbox = Arc::new(FakeMailbox::with_messages(vec![
        create_newsletter_message("w2", "Weekly <weekly@news.org>", "<https://news.org/u/2>"),
        create_test_message("p1", "Mom <mom@family.net>", "Dinner"),
        create_newsletter_message("s1", "Shop <deals@shop.com>", "<mailto:leave@shop.com?subject=stop>"),
        create_newsletter_message("w1", "Weekly <weekly@news.org>", "<https://news.org/u/1>"),
    ]));

    let subs = service(mailbox).list_subscriptions().await.unwrap();

    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].id, "w2");
    assert_eq!(subs[0].sender, "Weekly");
    assert_eq!(subs[0].unsubscribe_link.as_deref(), Some("https://news.org/u/2"));
    assert_eq!(subs[1].email, "deals@shop.com");
    assert_eq!(
        subs[1].unsubscribe_email.as_deref(),
        Some("mailto:leave@shop.com?subject=stop")
    );
}

#[tokio::test]
async fn test_unsubscribe_by_mailto_sends_email() {
    let mailbox = Arc::new(FakeMailbox::with_messages(vec![create_newsletter_message(
        "s1",
        "Shop <deals@shop.com>",
        "<mailto:leave@shop.com?subject=Remove%20me>, <https://shop.com/u>",
    )]));

    let outcome = service(mailbox.clone())
        .unsubscribe(&subscription_for("s1"))
        .await
        .unwrap();

    assert_eq!(outcome, UnsubscribeOutcome::Unsubscribed);
    let sent = mailbox.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("To: leave@shop.com\r\n"));
    assert!(sent[0].contains("Subject: Remove me\r\n"));
}

#[tokio::test]
async fn test_unsubscribe_one_click_posts_to_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/u/42"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("List-Unsubscribe=One-Click"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut message = create_newsletter_message(
        "n1",
        "News <daily@news.org>",
        &format!("<{}/u/42>", server.uri()),
    );
    message.list_unsubscribe_post = Some("List-Unsubscribe=One-Click".to_string());
    let mailbox = Arc::new(FakeMailbox::with_messages(vec![message]));

    let outcome = service_allowing_http_one_click(mailbox.clone())
        .unsubscribe(&subscription_for("n1"))
        .await
        .unwrap();

    assert_eq!(outcome, UnsubscribeOutcome::Unsubscribed);
    assert!(mailbox.sent().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_http_one_click_is_manual_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let link = format!("{}/internal/admin", server.uri());
    let mut message =
        create_newsletter_message("n1", "News <daily@news.org>", &format!("<{}>", link));
    message.list_unsubscribe_post = Some("List-Unsubscribe=One-Click".to_string());
    let mailbox = Arc::new(FakeMailbox::with_messages(vec![message]));

    let outcome = service(mailbox)
        .unsubscribe(&subscription_for("n1"))
        .await
        .unwrap();

    assert_eq!(outcome, UnsubscribeOutcome::Manual { url: link });
}

#[tokio::test]
async fn test_unsubscribe_one_click_does_not_follow_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/u"))
        .respond_with(
            ResponseTemplate::new(307).insert_header("location", format!("{}/internal", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/internal"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut message =
        create_newsletter_message("n1", "News <daily@news.org>", &format!("<{}/u>", server.uri()));
    message.list_unsubscribe_post = Some("List-Unsubscribe=One-Click".to_string());
    let mailbox = Arc::new(FakeMailbox::with_messages(vec![message]));

    let result = service_allowing_http_one_click(mailbox)
        .unsubscribe(&subscription_for("n1"))
        .await;

    assert!(matches!(result, Err(GmailError::UnsubscribeError(_))));
}

#[tokio::test]
async fn test_unsubscribe_one_click_failure_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/u"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut message =
        create_newsletter_message("n1", "News <daily@news.org>", &format!("<{}/u>", server.uri()));
    message.list_unsubscribe_post = Some("List-Unsubscribe=One-Click".to_string());
    let mailbox = Arc::new(FakeMailbox::with_messages(vec![message]));

    let result = service_allowing_http_one_click(mailbox)
        .unsubscribe(&subscription_for("n1"))
        .await;

    assert!(matches!(result, Err(GmailError::UnsubscribeError(_))));
}

#[tokio::test]
async fn test_unsubscribe_plain_link_is_manual() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let link = format!("{}/preferences", server.uri());
    let mailbox = Arc::new(FakeMailbox::with_messages(vec![create_newsletter_message(
        "n1",
        "News <daily@news.org>",
        &format!("<{}>", link),
    )]));

    let outcome = service(mailbox)
        .unsubscribe(&subscription_for("n1"))
        .await
        .unwrap();

    assert_eq!(outcome, UnsubscribeOutcome::Manual { url: link });
}

#[tokio::test]
async fn test_unsubscribe_ignores_targets_from_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mailbox = Arc::new(FakeMailbox::with_messages(vec![create_test_message(
        "p1",
        "Mom <mom@family.net>",
        "Dinner",
    )]));
    let mut forged = subscription_for("p1");
    forged.unsubscribe_link = Some(format!("{}/internal", server.uri()));
    forged.unsubscribe_email = Some("mailto:victim@example.com".to_string());
    forged.one_click = true;

    let result = service(mailbox.clone()).unsubscribe(&forged).await;

    assert!(matches!(result, Err(GmailError::InvalidRequest(_))));
    assert!(mailbox.sent().is_empty());
}
