mod common;

use std::sync::Arc;

use http::StatusCode;
use serde_json::json;

use common::*;
use solmail::db::RecipientList;

const LAUNCH_REGISTER: &str = "/api/v1/launch-mails/register";
const NEWSLETTER_REGISTER: &str = "/api/v1/newsletter-mails/register";

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router(Arc::default(), Arc::default());

    let (status, body) = send(app, get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

mod launch_mails {
    use super::*;

    #[tokio::test]
    async fn register_stores_email_and_enqueues_launch_email() {
        let store = Arc::new(MemoryStore::default());
        let queue = Arc::new(MemoryQueue::default());
        let app = test_router(store.clone(), queue.clone());

        let (status, body) =
            send(app, register_request(LAUNCH_REGISTER, r#"{"email":"a@x.com"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "success", "statusCode": 200, "message": "Email added successfully"})
        );
        assert_eq!(store.emails(RecipientList::LaunchMails), vec!["a@x.com"]);

        let jobs = queue.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].recipient, "a@x.com");
        assert_eq!(jobs[0].subject, "Warrior Sol Is Officially Live!");
        assert_eq!(jobs[0].template_id, "launch-email.hbs");
        assert_eq!(jobs[0].template_data["frontendUrl"], json!("https://warriorsol.com"));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_enqueue() {
        let store = Arc::new(MemoryStore::default());
        let queue = Arc::new(MemoryQueue::default());
        let app = test_router(store.clone(), queue.clone());

        let body = r#"{"email":"dup@x.com"}"#;
        let (first, _) = send(app.clone(), register_request(LAUNCH_REGISTER, body)).await;
        let (second, response) = send(app, register_request(LAUNCH_REGISTER, body)).await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::BAD_REQUEST);
        assert_eq!(response["status"], json!("error"));
        assert_eq!(response["message"], json!("Email already exists"));
        assert_eq!(queue.jobs().len(), 1);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let queue = Arc::new(MemoryQueue::default());
        let app = test_router(store.clone(), queue.clone());

        let (status, body) =
            send(app, register_request(LAUNCH_REGISTER, r#"{"email":"not-an-email"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], json!(400));
        assert!(store.emails(RecipientList::LaunchMails).is_empty());
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let app = test_router(Arc::default(), Arc::default());

        let (status, body) = send(app, register_request(LAUNCH_REGISTER, "{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!("error"));
    }

    #[tokio::test]
    async fn broker_failure_after_insert_returns_500() {
        let store = Arc::new(MemoryStore::default());
        let app = test_router(store.clone(), Arc::new(MemoryQueue::down()));

        let (status, body) =
            send(app, register_request(LAUNCH_REGISTER, r#"{"email":"a@x.com"}"#)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], json!("Failed to add email"));
        assert_eq!(store.emails(RecipientList::LaunchMails), vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn database_failure_returns_500() {
        let queue = Arc::new(MemoryQueue::default());
        let app = test_router(Arc::new(MemoryStore::broken()), queue.clone());

        let (status, body) =
            send(app, register_request(LAUNCH_REGISTER, r#"{"email":"a@x.com"}"#)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], json!("Failed to add email"));
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn count_reports_registered_emails() {
        let store = Arc::new(MemoryStore::default());
        let app = test_router(store.clone(), Arc::default());

        for email in ["a@x.com", "b@x.com"] {
            let body = format!(r#"{{"email":"{}"}}"#, email);
            send(app.clone(), register_request(LAUNCH_REGISTER, &body)).await;
        }
        let (status, body) = send(app, get_request("/api/v1/launch-mails/count")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("success"));
        assert_eq!(body["data"], json!(2));
    }

    #[tokio::test]
    async fn count_failure_returns_500() {
        let app = test_router(Arc::new(MemoryStore::broken()), Arc::default());

        let (status, body) = send(app, get_request("/api/v1/launch-mails/count")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], json!("error"));
    }
}

mod newsletter_mails {
    use super::*;

    #[tokio::test]
    async fn register_enqueues_waitlist_confirmation() {
        let store = Arc::new(MemoryStore::default());
        let queue = Arc::new(MemoryQueue::default());
        let app = test_router(store.clone(), queue.clone());

        let (status, _) =
            send(app, register_request(NEWSLETTER_REGISTER, r#"{"email":" n@x.com "}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.emails(RecipientList::NewsletterMails), vec!["n@x.com"]);
        assert!(store.emails(RecipientList::LaunchMails).is_empty());

        let jobs = queue.jobs();
        assert_eq!(jobs[0].subject, "Welcome to the Warrior Sol Waitlist!");
        assert_eq!(jobs[0].template_id, "newsletter-confirmation.hbs");
    }

    #[tokio::test]
    async fn lists_are_independent() {
        let store = Arc::new(MemoryStore::default());
        let app = test_router(store.clone(), Arc::default());
        let body = r#"{"email":"both@x.com"}"#;

        let (launch, _) = send(app.clone(), register_request(LAUNCH_REGISTER, body)).await;
        let (newsletter, _) = send(app.clone(), register_request(NEWSLETTER_REGISTER, body)).await;
        let (_, count) = send(app, get_request("/api/v1/newsletter-mails/count")).await;

        assert_eq!(launch, StatusCode::OK);
        assert_eq!(newsletter, StatusCode::OK);
        assert_eq!(count["data"], json!(1));
    }
}
