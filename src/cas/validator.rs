//! CAS ticket validation against the server's `serviceValidate` endpoints.
//!
//! The validator exchanges a service ticket for an authentication assertion.
//! Only the CAS success envelope is interpreted (`<cas:user>` plus the
//! `<cas:attributes>` children); anything richer than that is the host's
//! business. The extraction is a plain scan that tolerates namespace
//! prefixes, which is all the fixed CAS envelope needs.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::CasConfig;

/// Authentication assertion returned by the CAS server for a valid ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasAssertion {
    /// The authenticated principal name.
    pub principal: String,
    /// Released attributes. CAS attributes are multi-valued.
    pub attributes: HashMap<String, Vec<String>>,
}

/// Exchanges a service ticket for an assertion. The login flow only ever
/// sees this trait, so hosts can substitute their own validation transport.
#[async_trait]
pub trait TicketValidator: Send + Sync {
    /// Validate `ticket` for `service_url`, returning the assertion or a
    /// validation error.
    async fn validate(&self, ticket: &str, service_url: &str) -> Result<CasAssertion>;
}

/// Ticket validator speaking HTTP(S) to a real CAS server.
pub struct HttpTicketValidator {
    client: reqwest::Client,
    validate_url: String,
}

impl HttpTicketValidator {
    pub fn new(config: &CasConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(10));
        if config.disable_cert_validation {
            warn!("TLS certificate validation is disabled; do not run this way in production");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().context("failed to create CAS HTTP client")?;

        Ok(Self {
            client,
            validate_url: config.cas_server_validate_url(),
        })
    }
}

#[async_trait]
impl TicketValidator for HttpTicketValidator {
    async fn validate(&self, ticket: &str, service_url: &str) -> Result<CasAssertion> {
        let url = format!(
            "{}?ticket={}&service={}",
            self.validate_url,
            urlencoding::encode(ticket),
            urlencoding::encode(service_url)
        );

        debug!(ticket, "validating service ticket against CAS server");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to reach CAS validation endpoint")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "CAS validation endpoint returned status {}",
                response.status()
            ));
        }

        let body = response
            .text()
            .await
            .context("failed to read CAS validation response")?;

        parse_validation_response(&body)
    }
}

/// Extract principal and attributes from a CAS 2.0/3.0 validation response.
pub(crate) fn parse_validation_response(body: &str) -> Result<CasAssertion> {
    if let Some(failure) = element_text(body, "authenticationFailure") {
        return Err(anyhow!("CAS rejected the ticket: {}", failure.trim()));
    }

    let principal = element_text(body, "user")
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .ok_or_else(|| anyhow!("CAS response carries no user element"))?;

    Ok(CasAssertion {
        principal,
        attributes: parse_attributes(body),
    })
}

/// Text content of the first element whose local name is `local`.
///
/// Tolerates a namespace prefix and attributes on the opening tag. Meant for
/// leaf elements only; nested content would be cut at the first closing tag.
pub(crate) fn element_text(xml: &str, local: &str) -> Option<String> {
    let (body_start, _) = find_element(xml, local)?;
    let body_start = body_start?;
    let end = xml[body_start..].find("</")?;
    Some(unescape(&xml[body_start..body_start + end]))
}

/// Locate the first element with the given local name. Returns the content
/// start offset (`None` for a self-closing tag) and the offset just past the
/// opening tag.
fn find_element(xml: &str, local: &str) -> Option<(Option<usize>, usize)> {
    let mut search = 0;
    while let Some(rel) = xml[search..].find('<') {
        let open = search + rel;
        search = open + 1;

        let rest = &xml[open + 1..];
        if rest.starts_with('/') || rest.starts_with('?') || rest.starts_with('!') {
            continue;
        }

        let name_end = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
        if local_name(&rest[..name_end]) != local {
            continue;
        }

        let gt = rest.find('>')?;
        let after_tag = open + 1 + gt + 1;
        if rest[..gt].ends_with('/') {
            return Some((None, after_tag));
        }
        return Some((Some(after_tag), after_tag));
    }
    None
}

/// Content between an element's opening tag and its matching closing tag.
fn element_block<'a>(xml: &'a str, local: &str) -> Option<&'a str> {
    let (body_start, _) = find_element(xml, local)?;
    let body_start = body_start?;

    let mut search = body_start;
    while let Some(rel) = xml[search..].find("</") {
        let close = search + rel;
        let name_start = close + 2;
        let name_end = name_start + xml[name_start..].find('>')?;
        if local_name(xml[name_start..name_end].trim()) == local {
            return Some(&xml[body_start..close]);
        }
        search = name_end;
    }
    None
}

/// All leaf children of the `<cas:attributes>` block as name -> values.
fn parse_attributes(xml: &str) -> HashMap<String, Vec<String>> {
    let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
    let Some(block) = element_block(xml, "attributes") else {
        return attributes;
    };

    let mut search = 0;
    while let Some(rel) = block[search..].find('<') {
        let open = search + rel;
        search = open + 1;

        let rest = &block[open + 1..];
        if rest.starts_with('/') {
            continue;
        }
        let Some(name_end) = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/') else {
            break;
        };
        let name = local_name(&rest[..name_end]).to_string();

        let Some(gt) = rest.find('>') else { break };
        if rest[..gt].ends_with('/') {
            search = open + 1 + gt + 1;
            continue;
        }

        let body_start = open + 1 + gt + 1;
        let Some(end_rel) = block[body_start..].find("</") else {
            break;
        };
        let value = unescape(block[body_start..body_start + end_rel].trim());
        attributes.entry(name).or_default().push(value);

        search = body_start + end_rel;
    }

    attributes
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Resolve the five predefined XML entities.
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
