//! Solmail - asynchronous email dispatch.
//!
//! This library provides shared modules for the three solmail binaries:
//! - `solmail-web`: Signup endpoints that enqueue confirmation emails
//! - `solmail-scheduler`: Cron-triggered launch and newsletter batches
//! - `solmail-worker`: Queue consumer that renders and delivers emails
//!
//! ## Architecture
//!
//! ```text
//! Web / Scheduler → email_queue.v2 → Worker → template → SMTP
//!                       ↑   └─nack─→ email_queue.v2.retry (TTL)
//!                       └──────────────────┘
//! ```

pub mod config;
pub mod consumer;
pub mod db;
pub mod error;
pub mod mail;
pub mod processor;
pub mod queue;
pub mod schedule;
pub mod shutdown;
pub mod telemetry;
pub mod template;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use processor::{process_message, Disposition, ProcessorContext};
pub use queue::{enqueue_email, EmailJob, EmailQueue, Publisher, EMAIL_QUEUE};
pub use template::TemplateRenderer;
pub use web::{create_router, AppState};
