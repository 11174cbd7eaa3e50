use crate::errors::{HarnessError, Result};
use std::collections::HashMap;

/// Lock-token bookkeeping: (user, path) to the last token a LOCK call
/// returned. Tokens are overwritten on re-LOCK and never expire here; the
/// real lock timeout is the server's concern.
#[derive(Debug, Default, Clone)]
pub struct LockRegistry {
    tokens: HashMap<(String, String), String>,
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

impl LockRegistry {
    pub fn store(&mut self, user: &str, path: &str, token: String) {
        self.tokens
            .insert((user.to_owned(), normalize(path).to_owned()), token);
    }

    pub fn token_for(&self, user: &str, path: &str) -> Result<&str> {
        self.tokens
            .get(&(user.to_owned(), normalize(path).to_owned()))
            .map(String::as_str)
            .ok_or_else(|| {
                HarnessError::MissingState(format!(
                    "no stored lock token for user `{user}` on path `{path}`"
                ))
            })
    }

    pub fn forget(&mut self, user: &str, path: &str) {
        self.tokens
            .remove(&(user.to_owned(), normalize(path).to_owned()));
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
