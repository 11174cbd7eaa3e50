//! Settings API client (`api/v0/settings`): roles and role assignments,
//! JSON POST endpoints throughout.

use crate::{
    errors::{HarnessError, Result},
    http::{Auth, Dispatcher},
    response::StoredResponse,
};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header::CONTENT_TYPE};
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Clone)]
pub struct SettingsClient {
    dispatcher: Arc<Dispatcher>,
    base_url: String,
}

impl SettingsClient {
    pub fn new(dispatcher: Arc<Dispatcher>, base_url: &str) -> Self {
        SettingsClient {
            dispatcher,
            base_url: base_url.to_owned(),
        }
    }

    async fn post(&self, auth: &Auth, route: &str, body: &Value) -> Result<StoredResponse> {
        let url = format!("{}/api/v0/settings/{route}", self.base_url);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.dispatcher
            .send(
                Method::POST,
                &url,
                auth,
                headers,
                Some(Bytes::from(body.to_string())),
            )
            .await
    }

    pub async fn roles_list(&self, auth: &Auth) -> Result<StoredResponse> {
        self.post(auth, "roles-list", &json!({})).await
    }

    pub async fn assignments_list(&self, auth: &Auth, account_uuid: &str) -> Result<StoredResponse> {
        self.post(auth, "assignments-list", &json!({ "account_uuid": account_uuid }))
            .await
    }

    pub async fn assignments_add(&self, auth: &Auth, account_uuid: &str, role_id: &str) -> Result<StoredResponse> {
        self.post(
            auth,
            "assignments-add",
            &json!({ "account_uuid": account_uuid, "role_id": role_id }),
        )
        .await
    }

    pub async fn assignments_remove(&self, auth: &Auth, assignment_id: &str) -> Result<StoredResponse> {
        self.post(auth, "assignments-remove", &json!({ "id": assignment_id }))
            .await
    }

    pub async fn values_list(&self, auth: &Auth, account_uuid: &str) -> Result<StoredResponse> {
        self.post(auth, "values-list", &json!({ "account_uuid": account_uuid }))
            .await
    }

    pub async fn values_save(&self, auth: &Auth, value: &Value) -> Result<StoredResponse> {
        self.post(auth, "values-save", &json!({ "value": value })).await
    }
}

/// Resolve a role id from a roles-list response by display name.
pub fn role_id_by_name(response: &StoredResponse, display_name: &str) -> Result<String> {
    let bundles = response
        .json()?
        .get("bundles")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            HarnessError::Assertion("roles-list response has no `bundles` array".to_owned())
        })?;
    bundles
        .iter()
        .find(|b| {
            b.get("displayName").and_then(|v| v.as_str()) == Some(display_name)
        })
        .and_then(|b| b.get("id").and_then(|v| v.as_str()))
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            HarnessError::Assertion(format!(
                "no role named `{display_name}` in the roles list"
            ))
        })
}
