//! OCS API client: shares, capabilities, notifications, provisioning and
//! config, over `ocs/v{1,2}.php` with the XML envelope by default and JSON
//! behind `?format=json`. The v1 success statuscode is 100 where v2 uses
//! 200; the harness records what the server said and never remaps.

use crate::{
    errors::{HarnessError, Result},
    http::{Auth, Dispatcher},
    response::StoredResponse,
    utils::encode_uri,
};
use bytes::Bytes;
use http::{HeaderMap, Method, header::CONTENT_TYPE};
use quick_xml::{Reader, events::Event};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcsVersion {
    V1,
    V2,
}

impl OcsVersion {
    fn prefix(self) -> &'static str {
        match self {
            OcsVersion::V1 => "ocs/v1.php",
            OcsVersion::V2 => "ocs/v2.php",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcsFormat {
    #[default]
    Xml,
    Json,
}

/// The `<ocs><meta>` envelope fields every OCS response carries.
#[derive(Debug, Clone, PartialEq)]
pub struct OcsMeta {
    pub status: String,
    pub statuscode: i64,
    pub message: Option<String>,
}

/// What a share creation response yields: the server-assigned id, and the
/// link token for link shares.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedShare {
    pub id: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareType {
    User,
    Group,
    Link,
}

impl ShareType {
    fn code(self) -> &'static str {
        match self {
            ShareType::User => "0",
            ShareType::Group => "1",
            ShareType::Link => "3",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShareArgs {
    pub path: String,
    pub share_with: Option<String>,
    pub permissions: Option<u32>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub expire_date: Option<String>,
}

fn form_encode(pairs: &[(&str, &str)]) -> Bytes {
    let encoded = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Bytes::from(encoded)
}

fn form_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        http::HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers
}

#[derive(Clone)]
pub struct OcsClient {
    dispatcher: Arc<Dispatcher>,
    base_url: String,
}

impl OcsClient {
    pub fn new(dispatcher: Arc<Dispatcher>, base_url: &str) -> Self {
        OcsClient {
            dispatcher,
            base_url: base_url.to_owned(),
        }
    }

    pub fn url(&self, version: OcsVersion, route: &str, format: OcsFormat) -> String {
        let mut url = format!("{}/{}/{}", self.base_url, version.prefix(), route);
        if format == OcsFormat::Json {
            url.push_str(if route.contains('?') {
                "&format=json"
            } else {
                "?format=json"
            });
        }
        url
    }

    async fn get(&self, auth: &Auth, version: OcsVersion, route: &str, format: OcsFormat) -> Result<StoredResponse> {
        let url = self.url(version, route, format);
        self.dispatcher
            .send(Method::GET, &url, auth, HeaderMap::new(), None)
            .await
    }

    async fn post_form(
        &self,
        auth: &Auth,
        version: OcsVersion,
        route: &str,
        format: OcsFormat,
        pairs: &[(&str, &str)],
    ) -> Result<StoredResponse> {
        let url = self.url(version, route, format);
        self.dispatcher
            .send(Method::POST, &url, auth, form_headers(), Some(form_encode(pairs)))
            .await
    }

    async fn put_form(
        &self,
        auth: &Auth,
        version: OcsVersion,
        route: &str,
        format: OcsFormat,
        pairs: &[(&str, &str)],
    ) -> Result<StoredResponse> {
        let url = self.url(version, route, format);
        self.dispatcher
            .send(Method::PUT, &url, auth, form_headers(), Some(form_encode(pairs)))
            .await
    }

    async fn delete(&self, auth: &Auth, version: OcsVersion, route: &str, format: OcsFormat) -> Result<StoredResponse> {
        let url = self.url(version, route, format);
        self.dispatcher
            .send(Method::DELETE, &url, auth, HeaderMap::new(), None)
            .await
    }

    // ---- capabilities & config ----

    pub async fn capabilities(&self, auth: &Auth, version: OcsVersion, format: OcsFormat) -> Result<StoredResponse> {
        self.get(auth, version, "cloud/capabilities", format).await
    }

    pub async fn config(&self, auth: &Auth, version: OcsVersion, format: OcsFormat) -> Result<StoredResponse> {
        self.get(auth, version, "config", format).await
    }

    // ---- shares ----

    pub async fn create_share(
        &self,
        auth: &Auth,
        version: OcsVersion,
        format: OcsFormat,
        share_type: ShareType,
        args: &ShareArgs,
    ) -> Result<StoredResponse> {
        let mut pairs: Vec<(&str, &str)> =
            vec![("path", &args.path), ("shareType", share_type.code())];
        if let Some(v) = &args.share_with {
            pairs.push(("shareWith", v));
        }
        let permissions;
        if let Some(v) = args.permissions {
            permissions = v.to_string();
            pairs.push(("permissions", &permissions));
        }
        if let Some(v) = &args.password {
            pairs.push(("password", v));
        }
        if let Some(v) = &args.name {
            pairs.push(("name", v));
        }
        if let Some(v) = &args.expire_date {
            pairs.push(("expireDate", v));
        }
        self.post_form(
            auth,
            version,
            "apps/files_sharing/api/v1/shares",
            format,
            &pairs,
        )
        .await
    }

    pub async fn get_share(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, id: &str) -> Result<StoredResponse> {
        let route = format!("apps/files_sharing/api/v1/shares/{}", encode_uri(id));
        self.get(auth, version, &route, format).await
    }

    pub async fn list_shares(&self, auth: &Auth, version: OcsVersion, format: OcsFormat) -> Result<StoredResponse> {
        self.get(auth, version, "apps/files_sharing/api/v1/shares", format)
            .await
    }

    pub async fn update_share(
        &self,
        auth: &Auth,
        version: OcsVersion,
        format: OcsFormat,
        id: &str,
        pairs: &[(&str, &str)],
    ) -> Result<StoredResponse> {
        let route = format!("apps/files_sharing/api/v1/shares/{}", encode_uri(id));
        self.put_form(auth, version, &route, format, pairs).await
    }

    pub async fn delete_share(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, id: &str) -> Result<StoredResponse> {
        let route = format!("apps/files_sharing/api/v1/shares/{}", encode_uri(id));
        self.delete(auth, version, &route, format).await
    }

    pub async fn accept_pending_share(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, id: &str) -> Result<StoredResponse> {
        let route = format!("apps/files_sharing/api/v1/shares/pending/{}", encode_uri(id));
        self.post_form(auth, version, &route, format, &[]).await
    }

    pub async fn decline_pending_share(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, id: &str) -> Result<StoredResponse> {
        let route = format!("apps/files_sharing/api/v1/shares/pending/{}", encode_uri(id));
        self.delete(auth, version, &route, format).await
    }

    // ---- notifications ----

    pub async fn list_notifications(&self, auth: &Auth, version: OcsVersion, format: OcsFormat) -> Result<StoredResponse> {
        self.get(auth, version, "apps/notifications/api/v1/notifications", format)
            .await
    }

    pub async fn delete_notification(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, id: &str) -> Result<StoredResponse> {
        let route = format!("apps/notifications/api/v1/notifications/{}", encode_uri(id));
        self.delete(auth, version, &route, format).await
    }

    pub async fn delete_all_notifications(&self, auth: &Auth, version: OcsVersion, format: OcsFormat) -> Result<StoredResponse> {
        self.delete(auth, version, "apps/notifications/api/v1/notifications", format)
            .await
    }

    // ---- provisioning ----

    pub async fn create_user(
        &self,
        auth: &Auth,
        version: OcsVersion,
        format: OcsFormat,
        username: &str,
        password: &str,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<StoredResponse> {
        let mut pairs: Vec<(&str, &str)> = vec![("userid", username), ("password", password)];
        if let Some(v) = email {
            pairs.push(("email", v));
        }
        if let Some(v) = display_name {
            pairs.push(("displayname", v));
        }
        self.post_form(auth, version, "cloud/users", format, &pairs)
            .await
    }

    pub async fn get_user(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, username: &str) -> Result<StoredResponse> {
        let route = format!("cloud/users/{}", encode_uri(username));
        self.get(auth, version, &route, format).await
    }

    pub async fn edit_user(
        &self,
        auth: &Auth,
        version: OcsVersion,
        format: OcsFormat,
        username: &str,
        key: &str,
        value: &str,
    ) -> Result<StoredResponse> {
        let route = format!("cloud/users/{}", encode_uri(username));
        self.put_form(auth, version, &route, format, &[("key", key), ("value", value)])
            .await
    }

    pub async fn delete_user(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, username: &str) -> Result<StoredResponse> {
        let route = format!("cloud/users/{}", encode_uri(username));
        self.delete(auth, version, &route, format).await
    }

    pub async fn user_groups(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, username: &str) -> Result<StoredResponse> {
        let route = format!("cloud/users/{}/groups", encode_uri(username));
        self.get(auth, version, &route, format).await
    }

    pub async fn create_group(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, group: &str) -> Result<StoredResponse> {
        self.post_form(auth, version, "cloud/groups", format, &[("groupid", group)])
            .await
    }

    pub async fn delete_group(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, group: &str) -> Result<StoredResponse> {
        let route = format!("cloud/groups/{}", encode_uri(group));
        self.delete(auth, version, &route, format).await
    }

    pub async fn add_user_to_group(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, username: &str, group: &str) -> Result<StoredResponse> {
        let route = format!("cloud/users/{}/groups", encode_uri(username));
        self.post_form(auth, version, &route, format, &[("groupid", group)])
            .await
    }

    pub async fn remove_user_from_group(&self, auth: &Auth, version: OcsVersion, format: OcsFormat, username: &str, group: &str) -> Result<StoredResponse> {
        let route = format!("cloud/users/{}/groups", encode_uri(username));
        // DELETE with a form body, as the provisioning API expects
        let url = self.url(version, &route, format);
        self.dispatcher
            .send(
                Method::DELETE,
                &url,
                auth,
                form_headers(),
                Some(form_encode(&[("groupid", group)])),
            )
            .await
    }
}

/// Parse the OCS envelope meta from either representation: JSON when the
/// body parses as JSON, the XML envelope otherwise.
pub fn parse_meta(response: &StoredResponse) -> Result<OcsMeta> {
    if let Ok(json) = response.json() {
        let meta = json.get("ocs").and_then(|o| o.get("meta")).ok_or_else(|| {
            HarnessError::Assertion("JSON body has no `ocs.meta` envelope".to_owned())
        })?;
        return Ok(OcsMeta {
            status: meta
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned(),
            statuscode: meta.get("statuscode").and_then(|v| v.as_i64()).unwrap_or(-1),
            message: meta
                .get("message")
                .and_then(|v| v.as_str())
                .map(ToOwned::to_owned),
        });
    }
    parse_meta_xml(&response.body)
}

fn parse_meta_xml(body: &[u8]) -> Result<OcsMeta> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_meta = false;
    let mut field: Option<String> = None;
    let mut meta = OcsMeta {
        status: String::new(),
        statuscode: -1,
        message: None,
    };
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "meta" {
                    in_meta = true;
                } else if in_meta {
                    field = Some(name);
                }
            }
            Event::Text(t) => {
                if let Some(field) = field.as_deref() {
                    let text = t.unescape()?.into_owned();
                    match field {
                        "status" => meta.status = text,
                        "statuscode" => meta.statuscode = text.parse().unwrap_or(-1),
                        "message" => meta.message = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "meta" {
                    break;
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if meta.status.is_empty() && meta.statuscode == -1 {
        return Err(HarnessError::Assertion(
            "body has no OCS meta envelope".to_owned(),
        ));
    }
    Ok(meta)
}

/// Pull the server-assigned share id (and link token when present) out of a
/// share creation response, whichever envelope format it came in.
pub fn extract_created_share(response: &StoredResponse) -> Result<CreatedShare> {
    if let Ok(json) = response.json() {
        let data = json.get("ocs").and_then(|o| o.get("data")).ok_or_else(|| {
            HarnessError::Assertion("JSON body has no `ocs.data` envelope".to_owned())
        })?;
        let id = match data.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(HarnessError::Assertion(
                    "share creation response has no `id`".to_owned(),
                ));
            }
        };
        let token = data
            .get("token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned);
        return Ok(CreatedShare { id, token });
    }
    extract_created_share_xml(&response.body)
}

fn extract_created_share_xml(body: &[u8]) -> Result<CreatedShare> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_data = false;
    let mut field: Option<String> = None;
    let mut id: Option<String> = None;
    let mut token: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "data" {
                    in_data = true;
                } else if in_data {
                    field = Some(name);
                }
            }
            Event::Text(t) => {
                if let Some(f) = field.as_deref() {
                    let text = t.unescape()?.into_owned();
                    match f {
                        "id" if id.is_none() => id = Some(text),
                        "token" if token.is_none() && !text.is_empty() => token = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"data" {
                    break;
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    let id = id.ok_or_else(|| {
        HarnessError::Assertion("share creation response has no `id`".to_owned())
    })?;
    Ok(CreatedShare { id, token })
}

/// Dotted-path lookup into a JSON capabilities response,
/// e.g. `ocs.data.capabilities.files_sharing.api_enabled`.
pub fn capability(response: &StoredResponse, path: &str) -> Result<String> {
    response.json_path_string(path)
}
