//! CAS login flow: redirect URL construction and the validation callback.
//!
//! The browser choreography itself belongs to the host. This handler covers
//! the two moments the host hands over: building the redirect to the CAS
//! login page, and the callback where the granting ticket gets validated and
//! correlated with the session token the host just issued.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, error, info};

use crate::cas::attributes::AttributeSettings;
use crate::cas::validator::{CasAssertion, TicketValidator};
use crate::config::CasConfig;
use crate::session::{token_from_set_cookie_headers, SessionStore};

/// Message shown to the end user when storage fails; the real cause stays in
/// the logs.
const GENERIC_AUTH_FAILURE: &str =
    "an authentication problem occurred, please let your administrator know";

/// User identity assembled from a CAS assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub login: String,
    pub provider_login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub groups: HashSet<String>,
}

/// Handles the initial authentication use case.
pub struct LoginHandler {
    config: CasConfig,
    attributes: AttributeSettings,
    validator: Arc<dyn TicketValidator>,
    store: Arc<SessionStore>,
}

impl LoginHandler {
    pub fn new(
        config: CasConfig,
        validator: Arc<dyn TicketValidator>,
        store: Arc<SessionStore>,
    ) -> Self {
        let attributes = AttributeSettings::from_config(&config);
        Self {
            config,
            attributes,
            validator,
            store,
        }
    }

    /// CAS login page URL an unauthenticated browser is redirected to.
    pub fn login_url(&self) -> String {
        format!(
            "{}?service={}",
            self.config.cas_server_login_url(),
            urlencoding::encode(&self.config.service_url)
        )
    }

    /// Handle the CAS callback after a successful login at the server.
    ///
    /// `set_cookie_headers` are the `Set-Cookie` values of the response the
    /// host produced when it authenticated the user; the issued session token
    /// is extracted from there and correlated with the granting ticket. A
    /// blank ticket means the callback was not a CAS redirect at all and is
    /// ignored (`Ok(None)`).
    pub async fn handle_callback(
        &self,
        ticket: &str,
        set_cookie_headers: &[String],
    ) -> Result<Option<UserIdentity>> {
        let ticket = ticket.trim();
        if ticket.is_empty() {
            debug!("callback without a service ticket, nothing to do");
            return Ok(None);
        }

        debug!(ticket, "handling CAS login callback");
        let assertion = self
            .validator
            .validate(ticket, &self.config.service_url)
            .await?;

        let identity = self.identity_from_assertion(&assertion);

        let token =
            token_from_set_cookie_headers(set_cookie_headers, &self.config.session_cookie_name)?;

        debug!(ticket, token_id = %token.id, "storing granting ticket with issued token");
        if let Err(e) = self.store.store(ticket, &token) {
            error!(error = %e, token_id = %token.id, "could not persist ticket correlation");
            return Err(anyhow!(GENERIC_AUTH_FAILURE));
        }

        info!(user = %identity.login, "CAS login succeeded");
        Ok(Some(identity))
    }

    fn identity_from_assertion(&self, assertion: &CasAssertion) -> UserIdentity {
        UserIdentity {
            login: assertion.principal.clone(),
            provider_login: assertion.principal.clone(),
            name: self.attributes.display_name(&assertion.attributes),
            email: self.attributes.email(&assertion.attributes),
            groups: self.attributes.groups(&assertion.attributes),
        }
    }
}
