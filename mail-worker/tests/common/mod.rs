#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use solmail::db::{Recipient, RecipientList, RecipientSource, SubscriberStore};
use solmail::error::{PublishError, StoreError};
use solmail::{create_router, AppState, Config, EmailJob, EmailQueue};

/// In-memory signup lists.
#[derive(Default)]
pub struct MemoryStore {
    lists: Mutex<HashMap<RecipientList, Vec<String>>>,
    pub broken: bool,
}

impl MemoryStore {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    pub fn emails(&self, list: RecipientList) -> Vec<String> {
        self.lists.lock().unwrap().get(&list).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl RecipientSource for MemoryStore {
    async fn list_recipients(&self, list: RecipientList) -> Result<Vec<Recipient>, StoreError> {
        Ok(self
            .emails(list)
            .into_iter()
            .map(|email| Recipient { email })
            .collect())
    }
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn add_subscriber(&self, list: RecipientList, email: &str) -> Result<bool, StoreError> {
        if self.broken {
            return Err(StoreError(sqlx::Error::PoolTimedOut));
        }
        let mut lists = self.lists.lock().unwrap();
        let entries = lists.entry(list).or_default();
        if entries.iter().any(|e| e == email) {
            return Ok(false);
        }
        entries.push(email.to_string());
        Ok(true)
    }

    async fn count_subscribers(&self, list: RecipientList) -> Result<i64, StoreError> {
        if self.broken {
            return Err(StoreError(sqlx::Error::PoolTimedOut));
        }
        Ok(self.emails(list).len() as i64)
    }
}

/// Records published jobs; optionally rejects every publish.
#[derive(Default)]
pub struct MemoryQueue {
    published: Mutex<Vec<EmailJob>>,
    pub down: bool,
}

impl MemoryQueue {
    pub fn down() -> Self {
        Self {
            down: true,
            ..Default::default()
        }
    }

    pub fn jobs(&self) -> Vec<EmailJob> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailQueue for MemoryQueue {
    async fn publish(&self, job: &EmailJob) -> Result<(), PublishError> {
        if self.down {
            return Err(PublishError::Nacked);
        }
        self.published.lock().unwrap().push(job.clone());
        Ok(())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::from_env();
    config.frontend_url = "https://warriorsol.com".to_string();
    config.brand_name = "Warrior Sol".to_string();
    config
}

pub fn test_router(store: Arc<MemoryStore>, queue: Arc<MemoryQueue>) -> axum::Router {
    create_router(AppState::new(test_config(), queue, store))
}

pub fn register_request(path: &str, body: &str) -> http::Request<Body> {
    http::Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(path: &str) -> http::Request<Body> {
    http::Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

/// Send `request` and return the status with the parsed JSON body.
pub async fn send(app: axum::Router, request: http::Request<Body>) -> (http::StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}
