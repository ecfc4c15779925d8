//! Error taxonomy for the session correlation store.

use thiserror::Error;

/// Failures surfaced by the session store and its record handlers.
///
/// "Not found" is deliberately absent: an unknown ticket or token id is a
/// normal outcome (backchannel logout notifications routinely arrive for
/// tickets that were never stored or have already been pruned) and is modeled
/// as `Option::None`, the null token, or [`Invalidation::UnknownTicket`]
/// instead of an error.
///
/// [`Invalidation::UnknownTicket`]: super::store::Invalidation::UnknownTicket
#[derive(Debug, Error)]
pub enum SessionError {
    /// Backing storage could not be prepared. Fatal to startup; not
    /// recoverable at request time.
    #[error("failed to prepare session store storage")]
    Init(#[source] std::io::Error),

    /// A record write failed after initialization. Callers translate this
    /// into a generic user-facing authentication failure; the detail stays
    /// in the logs.
    #[error("failed to persist session record")]
    Persistence(#[source] std::io::Error),

    /// Stored bytes do not decode back into a record. Indicates storage
    /// corruption, not normal absence; read paths degrade to "not found"
    /// but log loudly.
    #[error("corrupt session record")]
    CorruptRecord(#[source] rmp_serde::decode::Error),

    /// An I/O failure while reading or listing records.
    #[error("session storage unavailable")]
    Storage(#[source] std::io::Error),
}
