//! Smart inbox: a Gmail inbox manager behind a small HTTP API
//!
//! The service turns UI intents into sequences of Gmail REST calls made with
//! the signed-in user's access token:
//!
//! - list messages by category, with label ids mapped to names
//! - label one message and everything else from its sender, plus a standing filter
//! - archive, trash by id, trash by label, and trash stale mail by age
//! - find large messages and rank senders
//! - detect newsletters from List-Unsubscribe headers and unsubscribe
//!
//! # Architecture
//!
//! - [`server`]: axum routes, bearer extraction and the error-to-status mapping
//! - [`inbox`], [`analytics`], [`subscriptions`]: `InboxService` operations
//! - [`labels`], [`filters`], [`query`], [`headers`]: the building blocks those use
//! - [`client`]: the `GmailClient` trait, its google-gmail1 implementation,
//!   and pagination/batching helpers
//! - [`auth`]: per-token client construction over a shared HTTPS pool
//! - [`config`], [`error`], [`models`], [`cli`]: the usual plumbing

pub mod analytics;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod filters;
pub mod headers;
pub mod inbox;
pub mod labels;
pub mod models;
pub mod query;
pub mod server;
pub mod subscriptions;

pub use client::{GmailClient, ProductionGmailClient};
pub use config::Config;
pub use error::{GmailError, Result};
pub use inbox::InboxService;
pub use models::{Category, Email, EmailLabel, LargeEmail, SenderStat, Subscription};
pub use server::{router, AppState};
