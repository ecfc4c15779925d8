//! CAS single sign-on agent for a relying application.
//!
//! The authentication workflow for an unauthenticated user:
//!
//! 1. the host redirects the browser to the CAS login page
//!    ([`LoginHandler::login_url`])
//! 2. the user authenticates at the CAS server, which redirects back to the
//!    host's callback URL with a service ticket
//! 3. the host validates the ticket and issues its own session token; the
//!    callback handler correlates the granting ticket with that token in the
//!    [`SessionStore`] ([`LoginHandler::handle_callback`])
//! 4. every subsequent request checks the presented token against the store
//!    ([`SessionStore::is_token_valid`])
//! 5. when the user logs out at the CAS server, it POSTs a backchannel
//!    logout notification carrying the original ticket; the corresponding
//!    token is invalidated and cannot be reused
//!    ([`LogoutHandler::handle_backchannel`])
//!
//! Expired entries are collected by a background sweep
//! ([`session::spawn_prune_task`]).

pub mod cas;
pub mod config;
pub mod session;

pub use cas::{CasAssertion, HttpTicketValidator, LoginHandler, LogoutHandler, TicketValidator, UserIdentity};
pub use config::{CasConfig, CasConfigJson, CasProtocol};
pub use session::{Invalidation, SessionError, SessionStore, SessionToken};
