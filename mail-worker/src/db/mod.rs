//! Database collaborators: mailing lists and durable dispatch latches.
//!
//! Only the queries the email pipeline needs live here. [`PgStore`] backs all
//! three traits with one Postgres pool; tests substitute in-memory fakes.

pub mod latches;
pub mod mailing_lists;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::error::StoreError;

pub use mailing_lists::Recipient;

/// A named recipient list backed by its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientList {
    /// Launch announcement signups
    LaunchMails,
    /// Waitlist / newsletter signups
    NewsletterMails,
}

impl RecipientList {
    pub fn table(self) -> &'static str {
        match self {
            RecipientList::LaunchMails => "launch_mails",
            RecipientList::NewsletterMails => "newsletter_mails",
        }
    }
}

/// Read side used by scheduled jobs.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn list_recipients(&self, list: RecipientList) -> Result<Vec<Recipient>, StoreError>;
}

/// Signup side used by the web handlers.
#[async_trait]
pub trait SubscriberStore: RecipientSource {
    /// Add `email` to `list`. Returns `false` when it was already present.
    async fn add_subscriber(&self, list: RecipientList, email: &str) -> Result<bool, StoreError>;

    async fn count_subscribers(&self, list: RecipientList) -> Result<i64, StoreError>;
}

/// Durable one-shot flags surviving process restarts.
#[async_trait]
pub trait LatchStore: Send + Sync {
    async fn is_set(&self, key: &str) -> Result<bool, StoreError>;

    /// Set the latch. Setting an already-set latch is a no-op.
    async fn set(&self, key: &str) -> Result<(), StoreError>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError(e.into()))?;

        info!("database_connected");

        Ok(Self { pool })
    }
}

#[async_trait]
impl RecipientSource for PgStore {
    async fn list_recipients(&self, list: RecipientList) -> Result<Vec<Recipient>, StoreError> {
        Ok(mailing_lists::list_recipients(&self.pool, list).await?)
    }
}

#[async_trait]
impl SubscriberStore for PgStore {
    async fn add_subscriber(&self, list: RecipientList, email: &str) -> Result<bool, StoreError> {
        Ok(mailing_lists::insert_subscriber(&self.pool, list, email).await?)
    }

    async fn count_subscribers(&self, list: RecipientList) -> Result<i64, StoreError> {
        Ok(mailing_lists::count_subscribers(&self.pool, list).await?)
    }
}

#[async_trait]
impl LatchStore for PgStore {
    async fn is_set(&self, key: &str) -> Result<bool, StoreError> {
        Ok(latches::is_set(&self.pool, key).await?)
    }

    async fn set(&self, key: &str) -> Result<(), StoreError> {
        Ok(latches::set(&self.pool, key).await?)
    }
}
