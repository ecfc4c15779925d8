//! CAS session correlation store.
//!
//! Binds CAS service tickets to issued session tokens across two file-backed
//! maps under one root:
//!
//! - the ticket index (service ticket -> token id), hit only during
//!   backchannel logout
//! - the token records (token id -> record), hit on every incoming request
//!   and therefore kept to a single-file read
//!
//! The split is deliberate: a validity check carries no ticket context, so
//! the hot path must never touch the ticket index. Invalidation pays for the
//! extra hop instead.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::SessionError;
use super::handler::FileRecordHandler;
use super::types::SessionToken;

const TICKET_NAMESPACE: &str = "tickets";
const TOKEN_NAMESPACE: &str = "tokens";

/// Outcome of a backchannel invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// The ticket resolved to a stored token; the token's id is returned.
    Invalidated(String),
    /// The ticket (or the token it pointed at) is unknown. Logout
    /// notifications for stale tickets are expected traffic, so this is a
    /// normal outcome, not an error.
    UnknownTicket,
}

/// Counts from one pruning sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Token records removed because their expiry had passed.
    pub expired_tokens: usize,
    /// Ticket index entries removed because their token record is gone.
    pub dangling_tickets: usize,
}

impl PruneStats {
    /// Total entries removed by the sweep.
    pub fn total(&self) -> usize {
        self.expired_tokens + self.dangling_tickets
    }
}

/// The ticket <-> token correlation store. The only component the login and
/// logout flows talk to; it exclusively owns both underlying maps.
pub struct SessionStore {
    root: PathBuf,
    /// CAS service ticket -> token id. Only hit during backchannel logout.
    tickets: FileRecordHandler<String>,
    /// Token id -> token record. Hit on every request; must stay fast.
    tokens: FileRecordHandler<SessionToken>,
}

impl SessionStore {
    /// A store rooted at `root`. No I/O happens until
    /// [`prepare_for_work`](Self::prepare_for_work).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let tickets = FileRecordHandler::new(&root, TICKET_NAMESPACE);
        let tokens = FileRecordHandler::new(&root, TOKEN_NAMESPACE);
        Self {
            root,
            tickets,
            tokens,
        }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create both namespace directories. Idempotent; must succeed before
    /// any other operation is used.
    pub fn prepare_for_work(&self) -> Result<(), SessionError> {
        info!(path = %self.root.display(), "preparing CAS session store");
        self.tickets.prepare()?;
        self.tokens.prepare()?;
        Ok(())
    }

    /// Persist the correlation between a granting ticket and the issued
    /// token: the token record under its id, and the ticket index entry
    /// pointing at that id.
    ///
    /// The token record is written first so a crash between the two writes
    /// never leaves a ticket pointing at a token that was never stored. The
    /// converse (a token record no ticket points at) is unreachable via
    /// logout and gets collected by pruning.
    pub fn store(&self, ticket: &str, token: &SessionToken) -> Result<(), SessionError> {
        debug!(ticket, token_id = %token.id, "storing ticket correlation");
        self.tokens.store(&token.id, token)?;
        self.tickets.store(ticket, &token.id)?;
        Ok(())
    }

    /// Whether the presented token is still usable: an entry exists under
    /// its id, the validity flag is set, and the expiry has not passed. The
    /// null token is never valid. Touches only the token namespace.
    pub fn is_token_valid(&self, token: &SessionToken) -> Result<bool, SessionError> {
        if token.is_null() {
            return Ok(false);
        }
        let stored = match self.tokens.get(&token.id)? {
            Some(stored) => stored,
            None => {
                debug!(token_id = %token.id, "no record for token");
                return Ok(false);
            }
        };
        Ok(stored.valid && !stored.is_expired())
    }

    /// The stored record for the presented token's id, or the null token
    /// when there is none. "Not found" is never an error on this path.
    pub fn get_token_by_id(&self, token: &SessionToken) -> Result<SessionToken, SessionError> {
        if token.is_null() {
            return Ok(SessionToken::null());
        }
        Ok(self
            .tokens
            .get(&token.id)?
            .unwrap_or_else(SessionToken::null))
    }

    /// Invalidate the token a granting ticket was stored with, for
    /// backchannel single logout.
    ///
    /// Two hops: ticket -> token id via the ticket index, then token id ->
    /// record. An unknown ticket, or a ticket whose token record is gone,
    /// is a no-op reported as [`Invalidation::UnknownTicket`]. Otherwise an
    /// invalidated copy (same id, same expiry, `valid` cleared) replaces
    /// the stored record.
    pub fn invalidate_by_ticket(&self, ticket: &str) -> Result<Invalidation, SessionError> {
        debug!(ticket, "invalidating token by granting ticket");

        let token_id = match self.tickets.get(ticket)? {
            Some(token_id) => token_id,
            None => {
                debug!(ticket, "no correlation entry for ticket");
                return Ok(Invalidation::UnknownTicket);
            }
        };

        let token = match self.tokens.get(&token_id)? {
            Some(token) => token,
            None => {
                debug!(ticket, token_id = %token_id, "ticket points at a missing token record");
                return Ok(Invalidation::UnknownTicket);
            }
        };

        let invalidated = token.invalidated();
        self.tokens.replace(&invalidated.id, &invalidated)?;

        info!(ticket, token_id = %invalidated.id, "invalidated token via backchannel logout");
        Ok(Invalidation::Invalidated(invalidated.id))
    }

    /// Overwrite the stored record with one carrying a later expiry. Same
    /// id; the record is replaced wholesale.
    pub fn refresh_token(&self, token: &SessionToken) -> Result<(), SessionError> {
        debug!(token_id = %token.id, expires_at = %token.expires_at, "refreshing token");
        self.tokens.replace(&token.id, token)
    }

    /// Remove token records whose expiry has passed, then ticket index
    /// entries left pointing at a removed or missing record.
    ///
    /// Invalidated-but-unexpired records are kept: the validity check needs
    /// them to keep answering `false` until the expiry passes on its own.
    pub fn prune_expired_entries(&self) -> Result<PruneStats, SessionError> {
        let mut stats = PruneStats::default();
        let mut removed: HashSet<String> = HashSet::new();

        for (token_id, record) in self.tokens.entries()? {
            if record.is_expired() && self.tokens.remove(&token_id)? {
                stats.expired_tokens += 1;
                removed.insert(token_id);
            }
        }

        for (ticket, token_id) in self.tickets.entries()? {
            let dangling = removed.contains(&token_id) || self.tokens.get(&token_id)?.is_none();
            if dangling && self.tickets.remove(&ticket)? {
                stats.dangling_tickets += 1;
            }
        }

        debug!(
            expired_tokens = stats.expired_tokens,
            dangling_tickets = stats.dangling_tickets,
            "pruning sweep finished"
        );
        Ok(stats)
    }

    /// Number of token records currently stored (for observability).
    pub fn token_count(&self) -> Result<usize, SessionError> {
        Ok(self.tokens.entries()?.len())
    }
}
