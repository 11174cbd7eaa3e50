//! The facade tying configuration, dispatcher and scenario state together.
//! Step definitions talk to this; everything below it is stateless request
//! building.

use crate::{
    config::Config,
    dav::{DavClient, DavTarget, LockArgs, public::PublicClient, xml},
    errors::Result,
    graph::GraphClient,
    http::{Auth, Dispatcher},
    ocs::{OcsClient, OcsFormat, OcsVersion},
    response::StoredResponse,
    scenario::Scenario,
    settings::SettingsClient,
};
use std::{sync::Arc, time::Duration};
use tracing::warn;

pub struct Harness {
    pub config: Arc<Config>,
    dispatcher: Arc<Dispatcher>,
    pub scenario: Scenario,
}

impl Harness {
    pub fn new(config: Config) -> Result<Self> {
        let dispatcher = Arc::new(Dispatcher::new(
            Duration::from_secs(config.timeout_seconds),
            !config.no_retry,
            config.send_scenario_line_references,
        )?);
        let scenario = Scenario::new(&config);
        Ok(Harness {
            config: Arc::new(config),
            dispatcher,
            scenario,
        })
    }

    /// Wipe scenario state and propagate the new scenario label to the
    /// dispatcher.
    pub fn begin_scenario(&mut self, label: Option<String>) {
        self.scenario.reset(&self.config);
        self.scenario.set_label(label.clone());
        self.dispatcher.set_scenario_label(label);
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    /// Basic credentials for a scenario username, after substitution.
    pub fn auth_for(&self, username: &str) -> Result<Auth> {
        let credential = self.scenario.credentials.credential_for(username)?;
        let actual = self.scenario.credentials.actual_username(username);
        Ok(Auth::basic(actual, &credential.password))
    }

    pub fn admin_auth(&self) -> Auth {
        Auth::basic(&self.config.admin_username, &self.config.admin_password)
    }

    pub fn dav(&self) -> DavClient {
        DavClient::new(self.dispatcher.clone(), self.base_url())
    }

    pub fn public(&self) -> PublicClient {
        PublicClient::new(self.dispatcher.clone(), self.base_url())
    }

    pub fn ocs(&self) -> OcsClient {
        OcsClient::new(self.dispatcher.clone(), self.base_url())
    }

    pub fn graph(&self) -> GraphClient {
        GraphClient::new(self.dispatcher.clone(), self.base_url())
    }

    pub fn settings(&self) -> SettingsClient {
        SettingsClient::new(self.dispatcher.clone(), self.base_url())
    }

    /// The DAV tree for a user's own files in the new convention.
    pub fn user_target(&self, username: &str) -> DavTarget {
        DavTarget::new_for(self.scenario.credentials.actual_username(username))
    }

    /// LOCK a path as a user and record the returned token so later steps
    /// can replay it. The response is stored like any other.
    pub async fn lock_and_record(
        &mut self,
        username: &str,
        target: &DavTarget,
        path: &str,
        args: &LockArgs,
    ) -> Result<()> {
        let auth = self.auth_for(username)?;
        let response = self.dav().lock(&auth, target, path, args).await?;
        if response.status.is_success() {
            if let Some(token) = xml::extract_lock_token(&response.body) {
                self.scenario.locks.store(username, path, token);
            }
        }
        self.scenario.store_response(response);
        Ok(())
    }

    /// UNLOCK with the stored token and forget it on success.
    pub async fn unlock_and_forget(
        &mut self,
        username: &str,
        target: &DavTarget,
        path: &str,
    ) -> Result<()> {
        let auth = self.auth_for(username)?;
        let token = self.scenario.locks.token_for(username, path)?.to_owned();
        let response = self.dav().unlock(&auth, target, path, &token).await?;
        if response.status.is_success() {
            self.scenario.locks.forget(username, path);
        }
        self.scenario.store_response(response);
        Ok(())
    }

    /// Run a request-builder future and park its response in the scenario.
    pub fn record(&mut self, response: StoredResponse) {
        self.scenario.store_response(response);
    }

    /// Provision a user over the Graph API, remembering it for teardown and
    /// seeding its credentials.
    pub async fn provision_user(&mut self, username: &str, password: Option<&str>) -> Result<StoredResponse> {
        let admin = self.admin_auth();
        let actual = self
            .scenario
            .credentials
            .actual_username(username)
            .to_owned();
        let password = password
            .unwrap_or_else(|| self.scenario.credentials.default_password())
            .to_owned();
        let response = self
            .graph()
            .create_user(&admin, &actual, &password, None, None)
            .await?;
        if response.status.is_success() {
            self.scenario.credentials.set_password(username, &password);
            self.scenario.created_users.push(username.to_owned());
        }
        Ok(response)
    }

    /// Best-effort cleanup of everything the scenario created. Individual
    /// failures are logged and skipped so one leftover cannot cascade.
    pub async fn teardown(&mut self) {
        let admin = self.admin_auth();
        let graph = self.graph();
        for username in std::mem::take(&mut self.scenario.created_users) {
            let actual = self
                .scenario
                .credentials
                .actual_username(&username)
                .to_owned();
            if let Err(err) = graph.delete_user(&admin, &actual).await {
                warn!("teardown: could not delete user `{actual}`: {err}");
            }
        }
        for (name, id) in std::mem::take(&mut self.scenario.created_groups) {
            if let Err(err) = graph.delete_group(&admin, &id).await {
                warn!("teardown: could not delete group `{name}`: {err}");
            }
        }
        let space_names: Vec<String> = self.scenario.space_names().cloned().collect();
        for name in space_names {
            let Ok(id) = self.scenario.space_id(&name).map(ToOwned::to_owned) else {
                continue;
            };
            if let Err(err) = graph.disable_drive(&admin, &id).await {
                warn!("teardown: could not disable space `{name}`: {err}");
                continue;
            }
            if let Err(err) = graph.purge_drive(&admin, &id).await {
                warn!("teardown: could not purge space `{name}`: {err}");
            }
        }
    }

    /// OCS helpers pinned to the most common call shape in step code.
    pub async fn ocs_delete_share(&self, id: &str) -> Result<StoredResponse> {
        self.ocs()
            .delete_share(&self.admin_auth(), OcsVersion::V2, OcsFormat::Json, id)
            .await
    }
}
