//! The per-scenario state bag every step reads and writes. One logical
//! thread of control per scenario, so plain maps with last-write-wins are
//! all the discipline needed.

use crate::{
    config::Config,
    credentials::CredentialsMap,
    errors::{HarnessError, Result},
    locks::LockRegistry,
    ocs::CreatedShare,
    response::StoredResponse,
};
use std::collections::HashMap;

#[derive(Debug)]
pub struct Scenario {
    pub credentials: CredentialsMap,
    last_response: Option<StoredResponse>,
    pub locks: LockRegistry,
    /// Space name to server-assigned drive id.
    spaces: HashMap<String, String>,
    /// Share key (sharer:path or link name) to created share.
    shares: HashMap<String, CreatedShare>,
    /// Tag name to server-assigned id.
    tags: HashMap<String, String>,
    pub notification_ids: Vec<String>,
    /// Users and groups this scenario created, for teardown.
    pub created_users: Vec<String>,
    pub created_groups: HashMap<String, String>,
    label: Option<String>,
}

impl Scenario {
    pub fn new(config: &Config) -> Self {
        Scenario {
            credentials: CredentialsMap::seeded_from(config),
            last_response: None,
            locks: LockRegistry::default(),
            spaces: HashMap::new(),
            shares: HashMap::new(),
            tags: HashMap::new(),
            notification_ids: Vec::new(),
            created_users: Vec::new(),
            created_groups: HashMap::new(),
            label: None,
        }
    }

    /// Back to the seeded state, ready for the next scenario.
    pub fn reset(&mut self, config: &Config) {
        *self = Scenario::new(config);
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn store_response(&mut self, response: StoredResponse) {
        self.last_response = Some(response);
    }

    pub fn last_response(&self) -> Result<&StoredResponse> {
        self.last_response
            .as_ref()
            .ok_or_else(|| HarnessError::MissingState("no request has been sent yet".to_owned()))
    }

    pub fn record_space(&mut self, name: &str, id: String) {
        self.spaces.insert(name.to_owned(), id);
    }

    pub fn space_id(&self, name: &str) -> Result<&str> {
        self.spaces.get(name).map(String::as_str).ok_or_else(|| {
            HarnessError::MissingState(format!("no space named `{name}` has been created"))
        })
    }

    pub fn space_names(&self) -> impl Iterator<Item = &String> {
        self.spaces.keys()
    }

    pub fn record_share(&mut self, key: &str, share: CreatedShare) {
        self.shares.insert(key.to_owned(), share);
    }

    pub fn share(&self, key: &str) -> Result<&CreatedShare> {
        self.shares.get(key).ok_or_else(|| {
            HarnessError::MissingState(format!("no share recorded under key `{key}`"))
        })
    }

    pub fn link_token(&self, key: &str) -> Result<&str> {
        self.share(key)?.token.as_deref().ok_or_else(|| {
            HarnessError::MissingState(format!("share `{key}` has no link token"))
        })
    }

    pub fn record_tag(&mut self, name: &str, id: String) {
        self.tags.insert(name.to_owned(), id);
    }

    pub fn tag_id(&self, name: &str) -> Result<&str> {
        self.tags.get(name).map(String::as_str).ok_or_else(|| {
            HarnessError::MissingState(format!("no tag named `{name}` has been registered"))
        })
    }

    /// Placeholder substitution in step arguments: `%base_url%`, credential
    /// placeholders like `%password:Alice%`, and stored ids
    /// (`%space_id:Marketing%`, `%share_id:key%`, `%link_token:key%`).
    pub fn sub(&self, text: &str, config: &Config) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('%') {
            let after = &rest[start + 1..];
            let Some(len) = after.find('%') else {
                break;
            };
            let placeholder = &after[..len];
            out.push_str(&rest[..start]);
            match placeholder {
                "base_url" => out.push_str(config.base_url()),
                "admin" => out.push_str(&config.admin_username),
                "admin_password" => out.push_str(&config.admin_password),
                "regular_user_password" => out.push_str(&config.regular_user_password),
                _ => {
                    if let Some(user) = placeholder.strip_prefix("username:") {
                        out.push_str(self.credentials.actual_username(user));
                    } else if let Some(user) = placeholder.strip_prefix("password:") {
                        out.push_str(self.credentials.password_for(user)?);
                    } else if let Some(name) = placeholder.strip_prefix("space_id:") {
                        out.push_str(self.space_id(name)?);
                    } else if let Some(key) = placeholder.strip_prefix("share_id:") {
                        out.push_str(&self.share(key)?.id);
                    } else if let Some(key) = placeholder.strip_prefix("link_token:") {
                        out.push_str(self.link_token(key)?);
                    } else if let Some(name) = placeholder.strip_prefix("tag_id:") {
                        out.push_str(self.tag_id(name)?);
                    } else {
                        // not a known placeholder, keep it verbatim
                        out.push('%');
                        out.push_str(placeholder);
                        out.push('%');
                    }
                }
            }
            rest = &after[len + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
