use crate::{
    config::Config,
    errors::{HarnessError, Result},
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub password: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Scenario-scoped credentials map: username to password/display name/email.
/// Seeded from the configuration, mutated when a test creates or edits a
/// user, discarded at scenario end. Last write wins.
#[derive(Debug, Clone)]
pub struct CredentialsMap {
    entries: HashMap<String, Credential>,
    replace_usernames: bool,
    replacements: HashMap<String, String>,
    default_password: String,
}

impl CredentialsMap {
    pub fn seeded_from(config: &Config) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            config.admin_username.clone(),
            Credential {
                password: config.admin_password.clone(),
                display_name: None,
                email: None,
            },
        );
        CredentialsMap {
            entries,
            replace_usernames: config.replace_usernames,
            replacements: config.username_replacements.clone(),
            default_password: config.regular_user_password.clone(),
        }
    }

    /// Map a well-known scenario username through the substitution table.
    /// Applied before lookups and before URL construction.
    pub fn actual_username<'a>(&'a self, username: &'a str) -> &'a str {
        if self.replace_usernames {
            if let Some(replacement) = self.replacements.get(username) {
                return replacement;
            }
        }
        username
    }

    pub fn upsert(&mut self, username: &str, credential: Credential) {
        let username = self.actual_username(username).to_owned();
        self.entries.insert(username, credential);
    }

    /// Register a user that was provisioned with the default password.
    pub fn register_default(&mut self, username: &str) {
        let password = self.default_password.clone();
        self.upsert(
            username,
            Credential {
                password,
                display_name: None,
                email: None,
            },
        );
    }

    pub fn set_password(&mut self, username: &str, password: &str) {
        let username = self.actual_username(username).to_owned();
        match self.entries.get_mut(&username) {
            Some(credential) => credential.password = password.to_owned(),
            None => {
                self.entries.insert(
                    username,
                    Credential {
                        password: password.to_owned(),
                        display_name: None,
                        email: None,
                    },
                );
            }
        }
    }

    pub fn credential_for(&self, username: &str) -> Result<&Credential> {
        let username = self.actual_username(username);
        self.entries.get(username).ok_or_else(|| {
            HarnessError::MissingState(format!("no credentials known for user `{username}`"))
        })
    }

    pub fn password_for(&self, username: &str) -> Result<&str> {
        Ok(self.credential_for(username)?.password.as_str())
    }

    pub fn default_password(&self) -> &str {
        &self.default_password
    }

    pub fn known_users(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}
