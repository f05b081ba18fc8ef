//! Per-caller sessions for swagent
//!
//! A [`SessionRegistry`] keeps one [`SessionEntry`] per caller identity.
//! Each entry owns its own executor and call history on top of a shared,
//! read-only contract, and is evicted after a period of inactivity.
//!
//! ```no_run
//! use swagent_session::{ContractSource, SessionInit, SessionRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SessionRegistry::default();
//! let init = SessionInit::new(ContractSource::from_location("./api/openapi.yaml"))
//!     .with_base_url("https://api.example.com");
//!
//! let session = registry.get_or_create("alice", &init).await?;
//! let result = session.call("getUser", &serde_json::json!({"id": 42})).await?;
//! println!("HTTP {}", result.status);
//! # Ok(())
//! # }
//! ```

mod entry;
mod registry;
pub mod types;

pub use entry::{SessionCallError, SessionEntry};
pub use registry::SessionRegistry;
pub use types::{
    CallRecord, ContractSource, RegistryStats, SessionInfo, SessionInit, SessionSettings,
};
