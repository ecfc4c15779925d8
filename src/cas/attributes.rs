//! Assertion attribute extraction.
//!
//! Resolves user-facing identity fields (display name, email, groups) from a
//! CAS assertion's attribute map, driven by the configured attribute names.

use std::collections::{HashMap, HashSet};

use crate::config::CasConfig;

#[derive(Debug, Clone)]
pub struct AttributeSettings {
    roles_attributes: Vec<String>,
    full_name_attribute: String,
    email_attribute: String,
}

impl AttributeSettings {
    pub fn from_config(config: &CasConfig) -> Self {
        let roles_attributes = config
            .roles_attributes
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            roles_attributes,
            full_name_attribute: config.full_name_attribute.clone(),
            email_attribute: config.email_attribute.clone(),
        }
    }

    /// Group names collected from every configured roles attribute. Listed
    /// attributes that are absent from the assertion contribute nothing.
    pub fn groups(&self, attributes: &HashMap<String, Vec<String>>) -> HashSet<String> {
        let mut groups = HashSet::new();
        for name in &self.roles_attributes {
            if let Some(values) = attributes.get(name) {
                groups.extend(values.iter().cloned());
            }
        }
        groups
    }

    /// First value of the configured display-name attribute.
    pub fn display_name(&self, attributes: &HashMap<String, Vec<String>>) -> Option<String> {
        first_value(attributes, &self.full_name_attribute)
    }

    /// First value of the configured email attribute.
    pub fn email(&self, attributes: &HashMap<String, Vec<String>>) -> Option<String> {
        first_value(attributes, &self.email_attribute)
    }
}

fn first_value(attributes: &HashMap<String, Vec<String>>, name: &str) -> Option<String> {
    attributes
        .get(name)
        .and_then(|values| values.first())
        .filter(|value| !value.is_empty())
        .cloned()
}
