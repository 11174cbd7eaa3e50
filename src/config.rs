use crate::{
    errors::{HarnessError, Result},
    utils::{is_default, string_trim},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn server_url() -> String {
    "http://localhost:8080".to_owned()
}

fn admin_username() -> String {
    "admin".to_owned()
}

fn admin_password() -> String {
    "admin".to_owned()
}

fn regular_user_password() -> String {
    "123456".to_owned()
}

fn timeout_seconds() -> u64 {
    30
}

/// LDAP parameters are forwarded to server provisioning steps as-is, the
/// harness never speaks the LDAP protocol itself.
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Clone)]
pub struct LdapSettings {
    #[serde(deserialize_with = "string_trim")]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "is_default")]
    pub base_dn: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub bind_dn: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub bind_password: String,
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct Config {
    #[serde(default = "server_url", deserialize_with = "string_trim")]
    pub server_url: String,
    #[serde(default = "admin_username", deserialize_with = "string_trim")]
    pub admin_username: String,
    #[serde(default = "admin_password", deserialize_with = "string_trim")]
    pub admin_password: String,
    /// Password given to every user the harness provisions, unless a step
    /// says otherwise.
    #[serde(default = "regular_user_password", deserialize_with = "string_trim")]
    pub regular_user_password: String,
    #[serde(default = "timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "is_default")]
    pub no_retry: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub replace_usernames: bool,
    /// Substitution table applied to well-known scenario usernames when
    /// `replace_usernames` is on.
    #[serde(default, skip_serializing_if = "is_default")]
    pub username_replacements: HashMap<String, String>,
    /// When on, every request carries the scenario label as `X-Request-Id`
    /// so server logs can be correlated with scenario lines.
    #[serde(default, skip_serializing_if = "is_default")]
    pub send_scenario_line_references: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub ldap: Option<LdapSettings>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub debug_mode: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub log_to_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: server_url(),
            admin_username: admin_username(),
            admin_password: admin_password(),
            regular_user_password: regular_user_password(),
            timeout_seconds: timeout_seconds(),
            no_retry: false,
            replace_usernames: false,
            username_replacements: HashMap::new(),
            send_scenario_line_references: false,
            ldap: None,
            debug_mode: false,
            log_to_file: false,
        }
    }
}

impl Config {
    pub async fn from_file(filepath: &str) -> Result<Self> {
        let data = tokio::fs::read_to_string(filepath).await?;
        let config = serde_yaml_ng::from_str::<Config>(&data)
            .map_err(|e| HarnessError::Config(format!("could not parse {filepath}: {e}")))?;
        Ok(config)
    }

    pub async fn to_file(&self, filepath: &str) -> Result<()> {
        let contents = serde_yaml_ng::to_string::<Config>(self)
            .map_err(|e| HarnessError::Config(e.to_string()))?;
        tokio::fs::write(filepath, contents).await?;
        Ok(())
    }

    /// Seed a configuration entirely from the environment, with the
    /// documented fallbacks when a variable is absent.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// File first when a path is given, then environment overrides on top.
    pub async fn load(filepath: Option<&str>) -> Result<Self> {
        let mut config = match filepath {
            Some(fp) => Config::from_file(fp).await?,
            None => Config::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("TEST_SERVER_URL") {
            self.server_url = v;
        }
        if let Ok(v) = std::env::var("ADMIN_USERNAME") {
            self.admin_username = v;
        }
        if let Ok(v) = std::env::var("ADMIN_PASSWORD") {
            self.admin_password = v;
        }
        if let Ok(v) = std::env::var("REGULAR_USER_PASSWORD") {
            self.regular_user_password = v;
        }
        if let Ok(v) = std::env::var("DAVIT_TIMEOUT_SECONDS") {
            if let Ok(v) = v.parse() {
                self.timeout_seconds = v;
            }
        }
        if let Ok(v) = std::env::var("DAVIT_NO_RETRY") {
            self.no_retry = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("REPLACE_USERNAMES") {
            self.replace_usernames = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("SEND_SCENARIO_LINE_REFERENCES") {
            self.send_scenario_line_references = v == "true" || v == "1";
        }
        if let Ok(host) = std::env::var("LDAP_HOST") {
            let mut ldap = self.ldap.take().unwrap_or_default();
            ldap.host = host;
            if let Ok(port) = std::env::var("LDAP_PORT") {
                ldap.port = port.parse().unwrap_or(389);
            }
            if let Ok(v) = std::env::var("LDAP_BASE_DN") {
                ldap.base_dn = v;
            }
            if let Ok(v) = std::env::var("LDAP_BIND_DN") {
                ldap.bind_dn = v;
            }
            if let Ok(v) = std::env::var("LDAP_BIND_PASSWORD") {
                ldap.bind_password = v;
            }
            self.ldap = Some(ldap);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(HarnessError::Config(format!(
                "server url `{}` is not an absolute http(s) url",
                self.server_url
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(HarnessError::Config(
                "request timeout must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}
