//! Client-side authentication session lifecycle.
//!
//! The crate keeps a user session alive across its full arc: restore from
//! persisted credentials at startup, proactive access-token refresh while
//! the application runs, explicit login/logout, and propagation of session
//! changes to other application instances sharing the same credential
//! store.
//!
//! The [`SessionCoordinator`] is the single owner of session state. It is
//! generic over two seams:
//!
//! - [`CredentialStore`]: where tokens persist ([`FileCredentialStore`] for
//!   real profiles, [`MemoryCredentialStore`] for tests and ephemeral
//!   hosts).
//! - [`RefreshTransport`]: the token exchange endpoints
//!   ([`HttpRefreshTransport`] in production).
//!
//! Everything else observes the session through [`SessionView`] snapshots
//! (a `tokio::sync::watch` channel) and the [`SessionBus`] broadcast of
//! [`SessionSignal`]s.
//!
//! ```no_run
//! use sessionguard::{
//!     HttpRefreshTransport, FileCredentialStore, SessionBus, SessionCoordinator,
//!     SessionPolicy,
//! };
//!
//! # async fn start() -> anyhow::Result<()> {
//! let transport = HttpRefreshTransport::new("https://auth.example.org")?;
//! let store = FileCredentialStore::default_location()?;
//! let coordinator =
//!     SessionCoordinator::new(transport, store, SessionBus::new(), SessionPolicy::default());
//! coordinator.spawn_signal_listener();
//! coordinator.initialize().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod notifier;
pub mod store;
pub mod token;
pub mod transport;

pub use config::SessionPolicy;
pub use coordinator::{Clock, SessionCoordinator, SessionPhase, SessionView, SystemClock};
pub use error::SessionError;
pub use notifier::{SessionBus, SessionSignal, SignalKind};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoredCredentials};
pub use token::{Claims, Identity};
pub use transport::{HttpRefreshTransport, RefreshTransport, TokenGrant, TransportError};
