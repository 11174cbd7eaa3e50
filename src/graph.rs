//! Graph API client (`graph/v1.0`): users, groups, drives (spaces),
//! permissions and tags, all JSON. Server-assigned ids are never guessed:
//! callers cache them from parsed creation responses.

use crate::{
    errors::{HarnessError, Result},
    http::{Auth, Dispatcher},
    response::StoredResponse,
    utils::encode_uri,
};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header::CONTENT_TYPE};
use serde_json::{Value, json};
use std::sync::Arc;

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

fn json_body(value: &Value) -> Bytes {
    Bytes::from(value.to_string())
}

#[derive(Clone)]
pub struct GraphClient {
    dispatcher: Arc<Dispatcher>,
    base_url: String,
}

impl GraphClient {
    pub fn new(dispatcher: Arc<Dispatcher>, base_url: &str) -> Self {
        GraphClient {
            dispatcher,
            base_url: base_url.to_owned(),
        }
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}/graph/v1.0/{route}", self.base_url)
    }

    async fn get(&self, auth: &Auth, route: &str) -> Result<StoredResponse> {
        self.dispatcher
            .send(Method::GET, &self.url(route), auth, HeaderMap::new(), None)
            .await
    }

    async fn post(&self, auth: &Auth, route: &str, body: &Value) -> Result<StoredResponse> {
        self.dispatcher
            .send(
                Method::POST,
                &self.url(route),
                auth,
                json_headers(),
                Some(json_body(body)),
            )
            .await
    }

    async fn patch(&self, auth: &Auth, route: &str, body: &Value) -> Result<StoredResponse> {
        self.dispatcher
            .send(
                Method::PATCH,
                &self.url(route),
                auth,
                json_headers(),
                Some(json_body(body)),
            )
            .await
    }

    async fn delete(&self, auth: &Auth, route: &str, headers: HeaderMap) -> Result<StoredResponse> {
        self.dispatcher
            .send(Method::DELETE, &self.url(route), auth, headers, None)
            .await
    }

    // ---- users ----

    pub async fn create_user(
        &self,
        auth: &Auth,
        username: &str,
        password: &str,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<StoredResponse> {
        let mut body = json!({
            "onPremisesSamAccountName": username,
            "displayName": display_name.unwrap_or(username),
            "passwordProfile": { "password": password },
        });
        if let Some(email) = email {
            body["mail"] = json!(email);
        }
        self.post(auth, "users", &body).await
    }

    pub async fn get_user(&self, auth: &Auth, username: &str) -> Result<StoredResponse> {
        self.get(auth, &format!("users/{}", encode_uri(username))).await
    }

    pub async fn patch_user(&self, auth: &Auth, username: &str, body: &Value) -> Result<StoredResponse> {
        self.patch(auth, &format!("users/{}", encode_uri(username)), body)
            .await
    }

    pub async fn delete_user(&self, auth: &Auth, username: &str) -> Result<StoredResponse> {
        self.delete(auth, &format!("users/{}", encode_uri(username)), HeaderMap::new())
            .await
    }

    pub async fn list_users(&self, auth: &Auth, search: Option<&str>) -> Result<StoredResponse> {
        let route = match search {
            Some(term) => format!("users?$search=%22{}%22", urlencoding::encode(term)),
            None => "users".to_owned(),
        };
        self.get(auth, &route).await
    }

    // ---- groups ----

    pub async fn create_group(&self, auth: &Auth, name: &str) -> Result<StoredResponse> {
        self.post(auth, "groups", &json!({ "displayName": name })).await
    }

    pub async fn get_group(&self, auth: &Auth, id: &str) -> Result<StoredResponse> {
        self.get(auth, &format!("groups/{}", encode_uri(id))).await
    }

    pub async fn delete_group(&self, auth: &Auth, id: &str) -> Result<StoredResponse> {
        self.delete(auth, &format!("groups/{}", encode_uri(id)), HeaderMap::new())
            .await
    }

    pub async fn add_group_member(&self, auth: &Auth, group_id: &str, user_id: &str) -> Result<StoredResponse> {
        let body = json!({
            "@odata.id": format!("{}/graph/v1.0/users/{}", self.base_url, user_id),
        });
        self.post(auth, &format!("groups/{}/members/$ref", encode_uri(group_id)), &body)
            .await
    }

    pub async fn remove_group_member(&self, auth: &Auth, group_id: &str, user_id: &str) -> Result<StoredResponse> {
        self.delete(
            auth,
            &format!(
                "groups/{}/members/{}/$ref",
                encode_uri(group_id),
                encode_uri(user_id)
            ),
            HeaderMap::new(),
        )
        .await
    }

    // ---- drives (spaces) ----

    pub async fn create_drive(&self, auth: &Auth, name: &str, quota_total: Option<u64>) -> Result<StoredResponse> {
        let mut body = json!({ "name": name });
        if let Some(total) = quota_total {
            body["quota"] = json!({ "total": total });
        }
        self.post(auth, "drives", &body).await
    }

    pub async fn my_drives(&self, auth: &Auth) -> Result<StoredResponse> {
        self.get(auth, "me/drives").await
    }

    pub async fn get_drive(&self, auth: &Auth, id: &str) -> Result<StoredResponse> {
        self.get(auth, &format!("drives/{}", encode_uri(id))).await
    }

    pub async fn patch_drive(&self, auth: &Auth, id: &str, body: &Value) -> Result<StoredResponse> {
        self.patch(auth, &format!("drives/{}", encode_uri(id)), body).await
    }

    /// Disabling a drive is a plain DELETE; the drive stays around until
    /// purged.
    pub async fn disable_drive(&self, auth: &Auth, id: &str) -> Result<StoredResponse> {
        self.delete(auth, &format!("drives/{}", encode_uri(id)), HeaderMap::new())
            .await
    }

    /// DELETE with the `Purge` header permanently removes a disabled drive.
    pub async fn purge_drive(&self, auth: &Auth, id: &str) -> Result<StoredResponse> {
        let mut headers = HeaderMap::new();
        headers.insert("Purge", HeaderValue::from_static("T"));
        self.delete(auth, &format!("drives/{}", encode_uri(id)), headers)
            .await
    }

    // ---- permissions ----

    pub async fn invite_to_item(
        &self,
        auth: &Auth,
        drive_id: &str,
        item_id: &str,
        recipient_object_ids: &[&str],
        roles: &[&str],
    ) -> Result<StoredResponse> {
        let recipients: Vec<Value> = recipient_object_ids
            .iter()
            .map(|id| json!({ "objectId": id }))
            .collect();
        let body = json!({ "recipients": recipients, "roles": roles });
        self.post(
            auth,
            &format!(
                "drives/{}/items/{}/invite",
                encode_uri(drive_id),
                encode_uri(item_id)
            ),
            &body,
        )
        .await
    }

    pub async fn list_permissions(&self, auth: &Auth, drive_id: &str, item_id: &str) -> Result<StoredResponse> {
        self.get(
            auth,
            &format!(
                "drives/{}/items/{}/permissions",
                encode_uri(drive_id),
                encode_uri(item_id)
            ),
        )
        .await
    }

    pub async fn delete_permission(
        &self,
        auth: &Auth,
        drive_id: &str,
        item_id: &str,
        permission_id: &str,
    ) -> Result<StoredResponse> {
        self.delete(
            auth,
            &format!(
                "drives/{}/items/{}/permissions/{}",
                encode_uri(drive_id),
                encode_uri(item_id),
                encode_uri(permission_id)
            ),
            HeaderMap::new(),
        )
        .await
    }

    // ---- tags ----

    pub async fn list_tags(&self, auth: &Auth) -> Result<StoredResponse> {
        self.get(auth, "extensions/org.libregraph/tags").await
    }

    pub async fn assign_tags(&self, auth: &Auth, resource_id: &str, tags: &[&str]) -> Result<StoredResponse> {
        let body = json!({ "resourceId": resource_id, "tags": tags });
        self.dispatcher
            .send(
                Method::PUT,
                &self.url("extensions/org.libregraph/tags"),
                auth,
                json_headers(),
                Some(json_body(&body)),
            )
            .await
    }

    pub async fn unassign_tags(&self, auth: &Auth, resource_id: &str, tags: &[&str]) -> Result<StoredResponse> {
        let body = json!({ "resourceId": resource_id, "tags": tags });
        self.dispatcher
            .send(
                Method::DELETE,
                &self.url("extensions/org.libregraph/tags"),
                auth,
                json_headers(),
                Some(json_body(&body)),
            )
            .await
    }
}

/// The `id` field of a Graph creation response.
pub fn extract_id(response: &StoredResponse) -> Result<String> {
    response
        .json()?
        .get("id")
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            HarnessError::Assertion("Graph creation response has no `id` field".to_owned())
        })
}

/// The webdav URL a drive advertises, used for `dav/spaces/{id}` calls.
pub fn extract_drive_webdav_url(response: &StoredResponse) -> Result<String> {
    response.json_path_string("root.webDavUrl")
}
