//! Ticket/token session correlation for CAS single sign-on.
//!
//! This module persists the binding between a CAS service ticket and the
//! session token the relying application issued for it, answers validity
//! lookups on every request, and lets a backchannel logout notification
//! (which carries only the ticket) invalidate the right token. Storage is
//! one file per key, split into a ticket index and the token records, with
//! a background pruning task.

pub mod cleanup;
pub mod codec;
pub mod error;
pub mod handler;
pub mod store;
pub mod types;

pub use cleanup::{spawn_prune_task, DEFAULT_PRUNE_INTERVAL_SECS};
pub use error::SessionError;
pub use handler::FileRecordHandler;
pub use store::{Invalidation, PruneStats, SessionStore};
pub use types::{token_from_set_cookie_headers, SessionToken};
