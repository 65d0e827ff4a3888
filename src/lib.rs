//! gett - A client library and CLI for the Ge.tt file sharing service.
//!
//! This library provides functionality to:
//! - Authenticate with an API key and account credentials, renewing the
//!   session transparently once it expires
//! - Create, list, retitle and destroy shares
//! - Upload, inspect, download and destroy files inside shares
//!
//! # Example
//!
//! ```no_run
//! use gett::GettClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut client = GettClient::new()?;
//!     client.authenticate("api-key", "me@example.com", "password").await?;
//!
//!     let share = client.create_share(Some("Holiday")).await?;
//!     let file = client.upload_file("photo.jpg", Some(&share), None).await?;
//!     println!("{}", file);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod request;
pub mod url_parser;

// Re-exports for convenience
pub use auth::{Clock, SessionState, SystemClock};
pub use client::GettClient;
pub use config::ClientConfig;
pub use error::{GettError, Result};
pub use models::{FileInfo, ReadyState, ShareInfo, StorageInfo, UserInfo};
pub use url_parser::{extract_share_ref, ShareRef};
