//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The [`EmailJob`] wire type and the queue names shared by all processes
//! - Connection and topology setup
//! - The per-call publisher used by business handlers and scheduled jobs
//!
//! ## Topology
//!
//! ```text
//! producer → email_queue.v2 → consumer ──nack──→ email_queue.v2.retry ──ttl──┐
//!                 ↑                     └─exhausted─→ email_queue.v2.dead      │
//!                 └─────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod publisher;
pub mod types;

pub use client::{connect, declare_topology, redact_url, BrokerConnection};
pub use publisher::{enqueue_email, EmailQueue, Publisher};
pub use types::{EmailJob, EMAIL_DEAD_QUEUE, EMAIL_QUEUE, EMAIL_RETRY_QUEUE, LEGACY_EMAIL_QUEUE};
