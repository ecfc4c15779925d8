//! CAS protocol flows: login callback, backchannel logout, ticket validation.

pub mod attributes;
pub mod login;
pub mod logout;
pub mod validator;

pub use attributes::AttributeSettings;
pub use login::{LoginHandler, UserIdentity};
pub use logout::LogoutHandler;
pub use validator::{CasAssertion, HttpTicketValidator, TicketValidator};
