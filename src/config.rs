//! CAS agent configuration.

use serde::{Deserialize, Serialize};

/// CAS protocol revision spoken against the server's validation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasProtocol {
    /// CAS 2.0: `serviceValidate`, no attribute release guarantees.
    Cas2,
    /// CAS 3.0: `p3/serviceValidate` with attribute release.
    Cas3,
}

impl CasProtocol {
    /// Validation endpoint path for this protocol revision.
    pub fn validate_path(self) -> &'static str {
        match self {
            CasProtocol::Cas2 => "/serviceValidate",
            CasProtocol::Cas3 => "/p3/serviceValidate",
        }
    }
}

impl std::fmt::Display for CasProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CasProtocol::Cas2 => write!(f, "cas2"),
            CasProtocol::Cas3 => write!(f, "cas3"),
        }
    }
}

/// CAS single sign-on configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CasConfig {
    /// Enable CAS authentication.
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the CAS server (e.g. `https://cas.example.com/cas`).
    #[serde(default)]
    pub cas_server_url: String,

    /// Login path on the CAS server.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Logout path on the CAS server.
    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Redirect back to the service after CAS logout.
    #[serde(default = "default_true")]
    pub logout_redirect: bool,

    /// Protocol revision for ticket validation.
    #[serde(default = "default_protocol")]
    pub protocol: CasProtocol,

    /// The relying application's callback URL registered with CAS
    /// (`?service=` parameter of login, logout and validation requests).
    #[serde(default)]
    pub service_url: String,

    /// Comma-separated assertion attribute names whose values become the
    /// user's groups.
    #[serde(default)]
    pub roles_attributes: String,

    /// Assertion attribute carrying the user's display name.
    #[serde(default = "default_full_name_attribute")]
    pub full_name_attribute: String,

    /// Assertion attribute carrying the user's email address.
    #[serde(default = "default_email_attribute")]
    pub email_attribute: String,

    /// Skip TLS certificate validation when talking to the CAS server.
    /// Development only; logged loudly when set.
    #[serde(default)]
    pub disable_cert_validation: bool,

    /// Root directory of the session correlation store.
    #[serde(default = "default_session_store_path")]
    pub session_store_path: String,

    /// Interval between pruning sweeps, in seconds.
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    /// Name of the cookie carrying the host-issued session token.
    #[serde(default = "default_cookie_name")]
    pub session_cookie_name: String,
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_logout_path() -> String {
    "/logout".to_string()
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> CasProtocol {
    CasProtocol::Cas3
}

fn default_full_name_attribute() -> String {
    "displayName".to_string()
}

fn default_email_attribute() -> String {
    "mail".to_string()
}

fn default_session_store_path() -> String {
    "/var/lib/cas-auth-agent/sessions".to_string()
}

fn default_prune_interval() -> u64 {
    300 // 5 minutes
}

fn default_cookie_name() -> String {
    "JWT-SESSION".to_string()
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cas_server_url: String::new(),
            login_path: default_login_path(),
            logout_path: default_logout_path(),
            logout_redirect: true,
            protocol: default_protocol(),
            service_url: String::new(),
            roles_attributes: String::new(),
            full_name_attribute: default_full_name_attribute(),
            email_attribute: default_email_attribute(),
            disable_cert_validation: false,
            session_store_path: default_session_store_path(),
            prune_interval_secs: default_prune_interval(),
            session_cookie_name: default_cookie_name(),
        }
    }
}

/// Join a base URL and a path, normalizing the slash between them.
fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

impl CasConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        if self.cas_server_url.is_empty() {
            return Err("CAS cas_server_url is required".to_string());
        }

        if self.service_url.is_empty() {
            return Err("CAS service_url is required".to_string());
        }

        if self.prune_interval_secs == 0 {
            return Err("CAS prune_interval_secs must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Login URL on the CAS server (without the `service` parameter).
    pub fn cas_server_login_url(&self) -> String {
        join_url(&self.cas_server_url, &self.login_path)
    }

    /// Logout URL on the CAS server (without the `service` parameter).
    pub fn cas_server_logout_url(&self) -> String {
        join_url(&self.cas_server_url, &self.logout_path)
    }

    /// Ticket validation URL on the CAS server for the configured protocol.
    pub fn cas_server_validate_url(&self) -> String {
        join_url(&self.cas_server_url, self.protocol.validate_path())
    }
}

/// JSON configuration overlay for dynamic reconfiguration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct CasConfigJson {
    pub enabled: Option<bool>,
    pub cas_server_url: Option<String>,
    pub login_path: Option<String>,
    pub logout_path: Option<String>,
    pub logout_redirect: Option<bool>,
    pub protocol: Option<CasProtocol>,
    pub service_url: Option<String>,
    pub roles_attributes: Option<String>,
    pub full_name_attribute: Option<String>,
    pub email_attribute: Option<String>,
    pub disable_cert_validation: Option<bool>,
    pub session_store_path: Option<String>,
    pub prune_interval_secs: Option<u64>,
    pub session_cookie_name: Option<String>,
}

impl CasConfigJson {
    /// Merge the overlay into an existing config.
    pub fn apply_to(&self, config: &mut CasConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(ref url) = self.cas_server_url {
            config.cas_server_url = url.clone();
        }
        if let Some(ref path) = self.login_path {
            config.login_path = path.clone();
        }
        if let Some(ref path) = self.logout_path {
            config.logout_path = path.clone();
        }
        if let Some(redirect) = self.logout_redirect {
            config.logout_redirect = redirect;
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(ref url) = self.service_url {
            config.service_url = url.clone();
        }
        if let Some(ref attrs) = self.roles_attributes {
            config.roles_attributes = attrs.clone();
        }
        if let Some(ref attr) = self.full_name_attribute {
            config.full_name_attribute = attr.clone();
        }
        if let Some(ref attr) = self.email_attribute {
            config.email_attribute = attr.clone();
        }
        if let Some(disable) = self.disable_cert_validation {
            config.disable_cert_validation = disable;
        }
        if let Some(ref path) = self.session_store_path {
            config.session_store_path = path.clone();
        }
        if let Some(interval) = self.prune_interval_secs {
            config.prune_interval_secs = interval;
        }
        if let Some(ref name) = self.session_cookie_name {
            config.session_cookie_name = name.clone();
        }
    }
}
