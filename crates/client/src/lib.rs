//! ActaLog API client
//!
//! A [`Gateway`] carries every request to the ActaLog backend and transparently
//! renews an expired access token, coordinating a single renewal across all
//! concurrently failing requests. A [`SessionStore`] owns who is logged in and
//! keeps its in-memory state and the persisted session record in step.
//!
//! ```no_run
//! use actalog_client::{Gateway, SessionStore};
//!
//! # async fn run() -> Result<(), actalog_client::ClientError> {
//! let gateway = Gateway::new("http://localhost:8080")?;
//! let session = SessionStore::init(gateway.clone()).await;
//! if session.login("ada@example.com", "correct horse", true).await {
//!     let profile = gateway.get_profile().await?;
//!     println!("Hello {}", profile.user.display_name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod navigator;
pub mod routes;
pub mod session;
pub mod storage;
pub mod types;

pub use config::ClientConfig;
pub use error::ClientError;
pub use gateway::{ApiRequest, Gateway, GatewayBuilder, SessionObserver};
pub use navigator::{LogNavigator, Navigator, RecordingNavigator};
pub use session::{Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionPersistence};
pub use types::User;
