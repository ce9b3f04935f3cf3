//! Directory client layer for azdir.
//!
//! Defines the [`DirectoryClient`] capability set the lifecycle coordinator
//! depends on, and provides:
//! - [`GraphDirectoryClient`]: a Microsoft Graph implementation over `reqwest`
//! - [`mock::MockDirectory`]: an in-memory, eventually-consistent directory
//!   for tests
//!
//! # Example
//!
//! ```no_run
//! use azdir_client::{DirectoryClient, Endpoint, GraphConfig, GraphDirectoryClient, RetryPolicy};
//! use azdir_types::ResourceIdentity;
//!
//! # async fn example() -> Result<(), azdir_client::ClientError> {
//! let applications = GraphDirectoryClient::new(
//!     "application",
//!     Endpoint::collection("applications"),
//!     GraphConfig::default(),
//! )?;
//! applications.set_token("eyJ0eXAi...").await;
//!
//! let app = applications
//!     .get(&ResourceIdentity::new("00000000-0000-0000-0000-000000000000"), RetryPolicy::Disabled)
//!     .await;
//! if let Err(e) = &app {
//!     if e.is_not_found() {
//!         println!("application is gone");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod graph;
pub mod mock;
mod query;

pub use client::{ApiResponse, Attributes, DirectoryClient, RemoteObject, RetryPolicy};
pub use error::{ClientError, ClientResult, STATUS_NOT_FOUND};
pub use graph::{
    Endpoint, GraphConfig, GraphDirectoryClient, MEMBER_ID_ATTRIBUTE, PARENT_ID_ATTRIBUTE,
};
pub use query::{escape_single_quote, Direction, OrderBy, Query};
