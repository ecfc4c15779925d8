//! Backchannel single logout and client-side logout support.
//!
//! The CAS server announces a logout by POSTing a `logoutRequest` form field
//! whose XML carries the original service ticket in `<samlp:SessionIndex>`.
//! Nothing in that notification identifies the session token directly; the
//! correlation store resolves the ticket to the token and invalidates it.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::cas::validator::element_text;
use crate::config::CasConfig;
use crate::session::{Invalidation, SessionError, SessionStore};

static LOGOUT_SCRIPT_TEMPLATE: &str = include_str!("../../assets/cas_logout.js");
const LOGOUT_URL_PLACEHOLDER: &str = "CAS_LOGOUT_URL";

/// Rendered logout script, built once per process. The script embeds
/// configuration values, and configuration changes require a restart, so the
/// cache only invalidates with the process.
static RENDERED_SCRIPT: OnceLock<String> = OnceLock::new();

/// Handles CAS-initiated logout and the logout hook served to browsers.
pub struct LogoutHandler {
    config: CasConfig,
    store: Arc<SessionStore>,
}

impl LogoutHandler {
    pub fn new(config: CasConfig, store: Arc<SessionStore>) -> Self {
        Self { config, store }
    }

    /// Handle a backchannel logout notification.
    ///
    /// `body` is the POST body as received: either
    /// `application/x-www-form-urlencoded` with a `logoutRequest` field, or
    /// the raw logout XML (older CAS servers send it bare). A body with no
    /// parsable session index is reported as [`Invalidation::UnknownTicket`]
    /// rather than an error; stray notifications are expected traffic.
    pub fn handle_backchannel(&self, body: &str) -> Result<Invalidation, SessionError> {
        let Some(ticket) = extract_logout_ticket(body) else {
            debug!("backchannel logout request carries no session index");
            return Ok(Invalidation::UnknownTicket);
        };
        self.store.invalidate_by_ticket(&ticket)
    }

    /// CAS server logout URL, with the service appended when post-logout
    /// redirect is enabled.
    pub fn logout_url(&self) -> String {
        let base = self.config.cas_server_logout_url();
        if self.config.logout_redirect {
            format!(
                "{}?service={}",
                base,
                urlencoding::encode(&self.config.service_url)
            )
        } else {
            base
        }
    }

    /// Client-side logout script with the CAS logout URL substituted in,
    /// for the host to inject into HTML responses.
    pub fn logout_script(&self) -> &'static str {
        RENDERED_SCRIPT
            .get_or_init(|| LOGOUT_SCRIPT_TEMPLATE.replace(LOGOUT_URL_PLACEHOLDER, &self.logout_url()))
    }
}

/// Pull the service ticket out of a backchannel logout body.
pub(crate) fn extract_logout_ticket(body: &str) -> Option<String> {
    let xml = if body.trim_start().starts_with('<') {
        body.to_string()
    } else {
        let value = body.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == "logoutRequest").then_some(value)
        })?;
        // form encoding: '+' is a space, then percent-decoding
        let value = value.replace('+', " ");
        urlencoding::decode(&value)
            .map(|decoded| decoded.into_owned())
            .unwrap_or(value)
    };

    element_text(&xml, "SessionIndex")
        .map(|ticket| ticket.trim().to_string())
        .filter(|ticket| !ticket.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionToken;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    const LOGOUT_XML: &str = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="LR-1-abc" Version="2.0" IssueInstant="2020-01-01T00:00:00Z">
    <saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">@NOT_USED@</saml:NameID>
    <samlp:SessionIndex>ST-1856339-aA5Yuvrxzpv8Tau1cYQ7</samlp:SessionIndex>
</samlp:LogoutRequest>"#;

    fn test_config() -> CasConfig {
        CasConfig {
            enabled: true,
            cas_server_url: "https://cas.example.com/cas".to_string(),
            service_url: "https://app.example.com".to_string(),
            ..CasConfig::default()
        }
    }

    fn test_handler() -> (LogoutHandler, Arc<SessionStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path().join("sessions")));
        store.prepare_for_work().unwrap();
        let handler = LogoutHandler::new(test_config(), Arc::clone(&store));
        (handler, store, dir)
    }

    #[test]
    fn test_extract_ticket_from_form_body() {
        let body = format!("logoutRequest={}", urlencoding::encode(LOGOUT_XML));
        assert_eq!(
            extract_logout_ticket(&body),
            Some("ST-1856339-aA5Yuvrxzpv8Tau1cYQ7".to_string())
        );
    }

    #[test]
    fn test_extract_ticket_from_plus_encoded_form_body() {
        let body = format!(
            "logoutRequest={}",
            urlencoding::encode(LOGOUT_XML).replace("%20", "+")
        );
        assert_eq!(
            extract_logout_ticket(&body),
            Some("ST-1856339-aA5Yuvrxzpv8Tau1cYQ7".to_string())
        );
    }

    #[test]
    fn test_extract_ticket_from_raw_xml_body() {
        assert_eq!(
            extract_logout_ticket(LOGOUT_XML),
            Some("ST-1856339-aA5Yuvrxzpv8Tau1cYQ7".to_string())
        );
    }

    #[test]
    fn test_bodies_without_a_ticket() {
        assert_eq!(extract_logout_ticket(""), None);
        assert_eq!(extract_logout_ticket("unrelated=field"), None);
        assert_eq!(
            extract_logout_ticket("logoutRequest=%3CLogoutRequest%3E%3C%2FLogoutRequest%3E"),
            None
        );
    }

    #[test]
    fn test_backchannel_invalidates_the_correlated_token() {
        let (handler, store, _dir) = test_handler();
        let token = SessionToken::new("J1", Utc::now() + Duration::hours(1));
        store
            .store("ST-1856339-aA5Yuvrxzpv8Tau1cYQ7", &token)
            .unwrap();

        let body = format!("logoutRequest={}", urlencoding::encode(LOGOUT_XML));
        let outcome = handler.handle_backchannel(&body).unwrap();

        assert_eq!(outcome, Invalidation::Invalidated("J1".to_string()));
        assert!(!store.is_token_valid(&token).unwrap());
    }

    #[test]
    fn test_backchannel_for_unknown_ticket_is_a_no_op() {
        let (handler, store, _dir) = test_handler();

        let body = format!("logoutRequest={}", urlencoding::encode(LOGOUT_XML));
        assert_eq!(
            handler.handle_backchannel(&body).unwrap(),
            Invalidation::UnknownTicket
        );
        assert_eq!(store.token_count().unwrap(), 0);
    }

    #[test]
    fn test_logout_url_redirect_toggle() {
        let (handler, _store, _dir) = test_handler();
        assert_eq!(
            handler.logout_url(),
            "https://cas.example.com/cas/logout?service=https%3A%2F%2Fapp.example.com"
        );

        let mut config = test_config();
        config.logout_redirect = false;
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path().join("sessions")));
        let handler = LogoutHandler::new(config, store);
        assert_eq!(handler.logout_url(), "https://cas.example.com/cas/logout");
    }

    #[test]
    fn test_logout_script_is_rendered_once() {
        let (handler, _store, _dir) = test_handler();

        let first = handler.logout_script();
        let second = handler.logout_script();

        // write-once cache: same rendered script, no placeholder left
        assert!(std::ptr::eq(first, second));
        assert!(first.contains("https://cas.example.com/cas/logout"));
        assert!(!first.contains("CAS_LOGOUT_URL"));
    }
}
