//! An in-memory server double speaking just enough WebDAV, OCS, Graph and
//! Settings for the integration tests to run against without a real
//! deployment. State lives in one lock, every request is handled
//! synchronously after its body is buffered.

use crate::{
    dav::sha256_checksum,
    utils::{decode_uri, random_string},
};
use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, header};
use quick_xml::escape::escape;
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, HashMap},
    net::TcpListener,
    sync::{Arc, RwLock},
};
use uuid::Uuid;

fn decode_path(v: &str) -> String {
    decode_uri(v)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|| v.to_owned())
}

const MAX_BODY: usize = 64 * 1024 * 1024;
const MOCK_MTIME: &str = "Fri, 28 Aug 2026 12:00:00 GMT";
const PRODUCT_VERSION: &str = "10.11.0";

// Fixed role bundles, ids as a real deployment ships them.
const ROLES: [(&str, &str); 4] = [
    ("71881883-1768-46bd-a24d-a356a2afdf7f", "Admin"),
    ("d7beeea8-8ff4-406b-8fb6-ab2dd81e6b11", "Space Admin"),
    ("d502e5a2-eb20-43d9-9d78-9e332288fc7f", "User"),
    ("38071a68-456a-4553-846a-fa67bf5596cc", "Guest"),
];

pub async fn mock_ocis_server(listener: TcpListener) {
    let state = Arc::new(RwLock::new(MockState::new()));
    let app = Router::new().fallback(handle).with_state(state);

    listener
        .set_nonblocking(true)
        .expect("failed to set listener non-blocking");
    let listener =
        tokio::net::TcpListener::from_std(listener).expect("failed to build mock server");
    axum::serve(listener, app).await.unwrap();
}

type SharedState = Arc<RwLock<MockState>>;

#[derive(Debug, Clone)]
struct Resource {
    is_dir: bool,
    content: Bytes,
    file_id: String,
    favorite: bool,
    props: HashMap<String, String>,
}

impl Resource {
    fn dir() -> Self {
        Resource {
            is_dir: true,
            content: Bytes::new(),
            file_id: Uuid::new_v4().to_string(),
            favorite: false,
            props: HashMap::new(),
        }
    }

    fn file(content: Bytes) -> Self {
        Resource {
            is_dir: false,
            content,
            file_id: Uuid::new_v4().to_string(),
            favorite: false,
            props: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct MockUser {
    id: String,
    username: String,
    password: String,
    display_name: String,
    email: Option<String>,
    enabled: bool,
}

#[derive(Debug, Clone)]
struct MockGroup {
    id: String,
    name: String,
    members: Vec<String>,
}

#[derive(Debug, Clone)]
struct MockShare {
    id: u64,
    share_type: u32,
    path: String,
    owner: String,
    share_with: Option<String>,
    permissions: u32,
    token: Option<String>,
    password: Option<String>,
    name: Option<String>,
    expiration: Option<String>,
}

#[derive(Debug, Clone)]
struct MockDrive {
    id: String,
    name: String,
    quota_total: Option<u64>,
    disabled: bool,
}

#[derive(Debug, Clone)]
struct MockLock {
    token: String,
}

#[derive(Debug)]
struct MockState {
    files: BTreeMap<String, Resource>,
    locks: HashMap<String, MockLock>,
    chunks: HashMap<String, BTreeMap<usize, Bytes>>,
    uploads: HashMap<String, BTreeMap<String, Bytes>>,
    users: HashMap<String, MockUser>,
    groups: Vec<MockGroup>,
    shares: BTreeMap<u64, MockShare>,
    next_share_id: u64,
    drives: HashMap<String, MockDrive>,
    permissions: HashMap<String, Value>,
    tags: Vec<String>,
    resource_tags: HashMap<String, Vec<String>>,
    notifications: Vec<(String, String)>,
    assignments: HashMap<String, (String, String)>,
}

impl MockState {
    fn new() -> Self {
        let mut state = MockState {
            files: BTreeMap::new(),
            locks: HashMap::new(),
            chunks: HashMap::new(),
            uploads: HashMap::new(),
            users: HashMap::new(),
            groups: Vec::new(),
            shares: BTreeMap::new(),
            next_share_id: 1,
            drives: HashMap::new(),
            permissions: HashMap::new(),
            tags: Vec::new(),
            resource_tags: HashMap::new(),
            notifications: Vec::new(),
            assignments: HashMap::new(),
        };
        state.add_user("admin", "admin", None, None);
        state
    }

    fn add_user(
        &mut self,
        username: &str,
        password: &str,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> MockUser {
        let user = MockUser {
            id: Uuid::new_v4().to_string(),
            username: username.to_owned(),
            password: password.to_owned(),
            display_name: display_name.unwrap_or(username).to_owned(),
            email: email.map(ToOwned::to_owned),
            enabled: true,
        };
        self.users.insert(username.to_owned(), user.clone());
        self.files
            .insert(format!("user:{username}"), Resource::dir());
        user
    }

    fn remove_user(&mut self, username: &str) {
        self.users.remove(username);
        let prefix = format!("user:{username}");
        self.remove_subtree(&prefix);
        for group in &mut self.groups {
            group.members.retain(|m| m != username);
        }
    }

    fn user_by_key(&self, key: &str) -> Option<&MockUser> {
        self.users
            .get(key)
            .or_else(|| self.users.values().find(|u| u.id == key))
    }

    fn group_by_key(&self, key: &str) -> Option<&MockGroup> {
        self.groups.iter().find(|g| g.id == key || g.name == key)
    }

    fn remove_subtree(&mut self, key: &str) {
        let child_prefix = format!("{key}/");
        let doomed: Vec<String> = self
            .files
            .keys()
            .filter(|k| *k == key || k.starts_with(&child_prefix))
            .cloned()
            .collect();
        for k in doomed {
            self.files.remove(&k);
            self.locks.remove(&k);
        }
    }

    /// Direct children of a collection, (base name, resource key) pairs.
    fn children(&self, key: &str) -> Vec<(String, String)> {
        let prefix = format!("{key}/");
        self.files
            .keys()
            .filter(|k| k.starts_with(&prefix) && !k[prefix.len()..].contains('/'))
            .map(|k| (k[prefix.len()..].to_owned(), k.clone()))
            .collect()
    }

    fn lock_blocks(&self, key: &str, headers: &HeaderMap) -> bool {
        let Some(lock) = self.locks.get(key) else {
            return false;
        };
        for name in ["if", "lock-token"] {
            if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
                if value.contains(&lock.token) {
                    return false;
                }
            }
        }
        true
    }
}

// ---- request entry point ----

async fn handle(State(state): State<SharedState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY).await {
        Ok(body) => body,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };
    let path = decode_path(parts.uri.path());
    let query = parts.uri.query().unwrap_or("").to_owned();
    let mut state = state.write().unwrap();
    route(&mut state, &parts.method, &path, &query, &parts.headers, body)
}

fn route(
    state: &mut MockState,
    method: &Method,
    path: &str,
    query: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let public_access =
        path.starts_with("/public.php/webdav") || path.starts_with("/remote.php/dav/public-files/");
    let user = authenticate(state, headers);
    if !public_access && user.is_none() {
        return unauthorized();
    }

    if let Some(rest) = path.strip_prefix("/ocs/v1.php/") {
        let ctx = OcsCtx {
            v1: true,
            json: query.contains("format=json"),
        };
        return ocs(state, ctx, method, rest, headers, &body);
    }
    if let Some(rest) = path.strip_prefix("/ocs/v2.php/") {
        let ctx = OcsCtx {
            v1: false,
            json: query.contains("format=json"),
        };
        return ocs(state, ctx, method, rest, headers, &body);
    }
    if let Some(rest) = path.strip_prefix("/graph/v1.0/") {
        return graph(state, method, rest, query, headers, &body);
    }
    if let Some(rest) = path.strip_prefix("/api/v0/settings/") {
        return settings(state, method, rest, &body);
    }
    dav(state, method, path, headers, body, user.as_deref())
}

fn authenticate(state: &MockState, headers: &HeaderMap) -> Option<String> {
    let (username, password) = basic_credentials(headers)?;
    let user = state.users.get(&username)?;
    (user.password == password && user.enabled).then_some(username)
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = Base64::decode_vec(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, r#"Basic realm="davit""#)],
        "",
    )
        .into_response()
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

fn multistatus(content: &str) -> Response {
    xml_response(
        StatusCode::MULTI_STATUS,
        format!(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<D:multistatus xmlns:D="DAV:" xmlns:oc="http://owncloud.org/ns">
{content}
</D:multistatus>"#
        ),
    )
}

fn dav_not_found(path: &str) -> Response {
    xml_response(
        StatusCode::NOT_FOUND,
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<d:error xmlns:d="DAV:" xmlns:s="http://sabredav.org/ns">
<s:exception>Sabre\DAV\Exception\NotFound</s:exception>
<s:message>File with name {} could not be located</s:message>
</d:error>"#,
            escape(path)
        ),
    )
}

// ---- WebDAV ----

enum DavAddress {
    Files { root: String, rel: String },
    Uploads { session: String, member: String },
}

fn split_first(path: &str) -> (String, String) {
    match path.split_once('/') {
        Some((head, tail)) => (head.to_owned(), tail.trim_matches('/').to_owned()),
        None => (path.to_owned(), String::new()),
    }
}

fn parse_dav_address(
    state: &MockState,
    path: &str,
    headers: &HeaderMap,
    user: Option<&str>,
) -> std::result::Result<DavAddress, Response> {
    if let Some(rel) = path.strip_prefix("/remote.php/webdav") {
        let Some(user) = user else {
            return Err(unauthorized());
        };
        return Ok(DavAddress::Files {
            root: format!("user:{user}"),
            rel: rel.trim_matches('/').to_owned(),
        });
    }
    if let Some(rest) = path.strip_prefix("/remote.php/dav/files/") {
        let (username, rel) = split_first(rest.trim_matches('/'));
        return Ok(DavAddress::Files {
            root: format!("user:{username}"),
            rel,
        });
    }
    if let Some(rest) = path.strip_prefix("/remote.php/dav/spaces/") {
        let (space_id, rel) = split_first(rest.trim_matches('/'));
        return Ok(DavAddress::Files {
            root: format!("space:{space_id}"),
            rel,
        });
    }
    if let Some(rest) = path.strip_prefix("/remote.php/dav/uploads/") {
        let (username, rest) = split_first(rest.trim_matches('/'));
        let (upload_id, member) = split_first(&rest);
        return Ok(DavAddress::Uploads {
            session: format!("{username}|{upload_id}"),
            member,
        });
    }
    if let Some(rel) = path.strip_prefix("/public.php/webdav") {
        let token = basic_credentials(headers).map(|(u, _)| u).unwrap_or_default();
        return public_address(state, &token, rel, headers, true);
    }
    if let Some(rest) = path.strip_prefix("/remote.php/dav/public-files/") {
        let (token, rel) = split_first(rest.trim_matches('/'));
        let rel = format!("/{rel}");
        return public_address(state, &token, &rel, headers, false);
    }
    Err(StatusCode::NOT_FOUND.into_response())
}

fn public_address(
    state: &MockState,
    token: &str,
    rel: &str,
    headers: &HeaderMap,
    legacy: bool,
) -> std::result::Result<DavAddress, Response> {
    let Some(share) = state
        .shares
        .values()
        .find(|s| s.token.as_deref() == Some(token))
    else {
        return Err(dav_not_found(token));
    };
    if let Some(expected) = &share.password {
        let supplied = match basic_credentials(headers) {
            Some((_, password)) if legacy => Some(password),
            Some((username, password)) if username == "public" => Some(password),
            _ => None,
        };
        if supplied.as_deref() != Some(expected.as_str()) {
            return Err(unauthorized());
        }
    }
    let base = share.path.trim_matches('/');
    let rel = rel.trim_matches('/');
    let rel = match (base.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{base}/{rel}"),
    };
    Ok(DavAddress::Files {
        root: format!("user:{}", share.owner),
        rel,
    })
}

fn full_key(root: &str, rel: &str) -> String {
    if rel.is_empty() {
        root.to_owned()
    } else {
        format!("{root}/{rel}")
    }
}

fn parent_exists(state: &MockState, root: &str, rel: &str) -> bool {
    match rel.rsplit_once('/') {
        None => state.files.contains_key(root),
        Some((parent, _)) => state
            .files
            .get(&full_key(root, parent))
            .is_some_and(|r| r.is_dir),
    }
}

fn dav(
    state: &mut MockState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
    user: Option<&str>,
) -> Response {
    if method == Method::OPTIONS {
        return (
            StatusCode::OK,
            [
                ("DAV", "1, 2"),
                (
                    "Allow",
                    "OPTIONS, GET, HEAD, PUT, DELETE, MKCOL, COPY, MOVE, PROPFIND, PROPPATCH, LOCK, UNLOCK, REPORT",
                ),
            ],
            "",
        )
            .into_response();
    }

    let address = match parse_dav_address(state, path, headers, user) {
        Ok(address) => address,
        Err(response) => return response,
    };

    match address {
        DavAddress::Uploads { session, member } => {
            dav_uploads(state, method, &session, &member, headers, body, user)
        }
        DavAddress::Files { root, rel } => {
            dav_files(state, method, path, &root, &rel, headers, body, user)
        }
    }
}

#[expect(clippy::too_many_arguments, reason = "single dispatch point")]
fn dav_files(
    state: &mut MockState,
    method: &Method,
    path: &str,
    root: &str,
    rel: &str,
    headers: &HeaderMap,
    body: Bytes,
    user: Option<&str>,
) -> Response {
    let key = full_key(root, rel);
    match method.as_str() {
        "GET" | "HEAD" => match state.files.get(&key) {
            None => dav_not_found(rel),
            Some(res) if res.is_dir => StatusCode::OK.into_response(),
            Some(res) => {
                let content = if method == Method::HEAD {
                    Bytes::new()
                } else {
                    res.content.clone()
                };
                let mime = mime_guess::from_path(rel)
                    .first_raw()
                    .unwrap_or("application/octet-stream");
                (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE.as_str(), mime),
                        ("OC-FileId", res.file_id.as_str()),
                    ],
                    Body::from(content),
                )
                    .into_response()
            }
        },
        "PUT" => dav_put(state, root, rel, headers, body),
        "DELETE" => {
            if !state.files.contains_key(&key) {
                return dav_not_found(rel);
            }
            if state.lock_blocks(&key, headers) {
                return StatusCode::LOCKED.into_response();
            }
            state.remove_subtree(&key);
            StatusCode::NO_CONTENT.into_response()
        }
        "MKCOL" => {
            if state.files.contains_key(&key) {
                return StatusCode::METHOD_NOT_ALLOWED.into_response();
            }
            if !parent_exists(state, root, rel) {
                return StatusCode::CONFLICT.into_response();
            }
            state.files.insert(key, Resource::dir());
            StatusCode::CREATED.into_response()
        }
        "COPY" | "MOVE" => dav_copymove(state, method, root, rel, headers, user),
        "PROPFIND" => dav_propfind(state, path, &key, headers),
        "PROPPATCH" => dav_proppatch(state, path, &key, &body),
        "LOCK" => dav_lock(state, path, root, rel, headers, &body),
        "UNLOCK" => dav_unlock(state, &key, headers),
        "REPORT" => dav_report(state, path, root),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

fn parse_chunk_name(name: &str) -> Option<(String, String, usize, usize)> {
    let pos = name.rfind("-chunking-")?;
    let base = name[..pos].to_owned();
    let rest = &name[pos + "-chunking-".len()..];
    let mut parts = rest.split('-');
    let transfer_id = parts.next()?.to_owned();
    let count = parts.next()?.parse().ok()?;
    let index = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((base, transfer_id, count, index))
}

fn dav_put(
    state: &mut MockState,
    root: &str,
    rel: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(checksum) = headers.get("oc-checksum").and_then(|v| v.to_str().ok()) {
        if checksum.to_uppercase().starts_with("SHA256:")
            && !checksum.eq_ignore_ascii_case(&sha256_checksum(&body))
        {
            return (StatusCode::BAD_REQUEST, "checksum mismatch").into_response();
        }
    }

    // old-style chunked upload: buffer pieces, assemble when complete
    if headers.contains_key("oc-chunked") {
        let (dir, name) = match rel.rsplit_once('/') {
            Some((dir, name)) => (dir.to_owned(), name.to_owned()),
            None => (String::new(), rel.to_owned()),
        };
        if let Some((base, transfer_id, count, index)) = parse_chunk_name(&name) {
            let target_rel = if dir.is_empty() {
                base.clone()
            } else {
                format!("{dir}/{base}")
            };
            if !parent_exists(state, root, &target_rel) {
                return StatusCode::CONFLICT.into_response();
            }
            let session = format!("{root}|{target_rel}|{transfer_id}");
            let pieces = state.chunks.entry(session.clone()).or_default();
            pieces.insert(index, body);
            if pieces.len() == count {
                let mut assembled = Vec::new();
                for piece in pieces.values() {
                    assembled.extend_from_slice(piece);
                }
                state.chunks.remove(&session);
                let key = full_key(root, &target_rel);
                if state.lock_blocks(&key, headers) {
                    return StatusCode::LOCKED.into_response();
                }
                state.files.insert(key, Resource::file(Bytes::from(assembled)));
            }
            return StatusCode::CREATED.into_response();
        }
    }

    let key = full_key(root, rel);
    if state.lock_blocks(&key, headers) {
        return StatusCode::LOCKED.into_response();
    }
    if let Some(existing) = state.files.get(&key) {
        if existing.is_dir {
            return StatusCode::CONFLICT.into_response();
        }
        let file_id = existing.file_id.clone();
        let mut replacement = Resource::file(body);
        replacement.file_id = file_id.clone();
        state.files.insert(key, replacement);
        (StatusCode::NO_CONTENT, [("OC-FileId", file_id)], "").into_response()
    } else {
        if !parent_exists(state, root, rel) {
            return StatusCode::CONFLICT.into_response();
        }
        let resource = Resource::file(body);
        let file_id = resource.file_id.clone();
        state.files.insert(key, resource);
        (StatusCode::CREATED, [("OC-FileId", file_id)], "").into_response()
    }
}

fn destination_path(headers: &HeaderMap) -> Option<String> {
    let dest = headers.get("destination")?.to_str().ok()?;
    let path = match dest.find("://") {
        Some(pos) => {
            let after = &dest[pos + 3..];
            &after[after.find('/')?..]
        }
        None => dest,
    };
    Some(decode_path(path))
}

fn dav_copymove(
    state: &mut MockState,
    method: &Method,
    root: &str,
    rel: &str,
    headers: &HeaderMap,
    user: Option<&str>,
) -> Response {
    let source_key = full_key(root, rel);
    if !state.files.contains_key(&source_key) {
        return dav_not_found(rel);
    }
    let Some(dest_path) = destination_path(headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let (dest_root, dest_rel) = match parse_dav_address(state, &dest_path, headers, user) {
        Ok(DavAddress::Files { root, rel }) => (root, rel),
        _ => return StatusCode::BAD_GATEWAY.into_response(),
    };
    let dest_key = full_key(&dest_root, &dest_rel);
    if !parent_exists(state, &dest_root, &dest_rel) {
        return StatusCode::CONFLICT.into_response();
    }
    if method.as_str() == "MOVE"
        && (state.lock_blocks(&source_key, headers) || state.lock_blocks(&dest_key, headers))
    {
        return StatusCode::LOCKED.into_response();
    }
    let dest_existed = state.files.contains_key(&dest_key);
    if dest_existed {
        let overwrite = headers
            .get("overwrite")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("T");
        if overwrite.eq_ignore_ascii_case("F") {
            return StatusCode::PRECONDITION_FAILED.into_response();
        }
        state.remove_subtree(&dest_key);
    }
    let child_prefix = format!("{source_key}/");
    let moved: Vec<(String, Resource)> = state
        .files
        .iter()
        .filter(|(k, _)| *k == &source_key || k.starts_with(&child_prefix))
        .map(|(k, v)| {
            let suffix = &k[source_key.len()..];
            (format!("{dest_key}{suffix}"), v.clone())
        })
        .collect();
    if method.as_str() == "MOVE" {
        state.remove_subtree(&source_key);
    }
    for (k, v) in moved {
        state.files.insert(k, v);
    }
    if dest_existed {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::CREATED.into_response()
    }
}

fn resource_xml(href: &str, name: &str, res: &Resource) -> String {
    let displayname = escape(name);
    let mut extra = String::new();
    for (k, v) in &res.props {
        extra.push_str(&format!("<oc:{k}>{}</oc:{k}>\n", escape(v.as_str())));
    }
    if res.is_dir {
        format!(
            r#"<D:response>
<D:href>{}</D:href>
<D:propstat>
<D:prop>
<D:displayname>{}</D:displayname>
<D:getlastmodified>{}</D:getlastmodified>
<D:resourcetype><D:collection/></D:resourcetype>
<oc:fileid>{}</oc:fileid>
{}</D:prop>
<D:status>HTTP/1.1 200 OK</D:status>
</D:propstat>
</D:response>"#,
            href, displayname, MOCK_MTIME, res.file_id, extra
        )
    } else {
        format!(
            r#"<D:response>
<D:href>{}</D:href>
<D:propstat>
<D:prop>
<D:displayname>{}</D:displayname>
<D:getcontentlength>{}</D:getcontentlength>
<D:getlastmodified>{}</D:getlastmodified>
<D:resourcetype></D:resourcetype>
<oc:fileid>{}</oc:fileid>
<oc:favorite>{}</oc:favorite>
{}</D:prop>
<D:status>HTTP/1.1 200 OK</D:status>
</D:propstat>
</D:response>"#,
            href,
            displayname,
            res.content.len(),
            MOCK_MTIME,
            res.file_id,
            u8::from(res.favorite),
            extra
        )
    }
}

fn dav_propfind(state: &MockState, path: &str, key: &str, headers: &HeaderMap) -> Response {
    let Some(res) = state.files.get(key) else {
        return dav_not_found(path);
    };
    let depth = headers
        .get("depth")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("1");
    let base_name = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
    let mut output = resource_xml(path, base_name, res);
    if res.is_dir && depth != "0" {
        let base = path.trim_end_matches('/');
        for (name, child_key) in state.children(key) {
            if let Some(child) = state.files.get(&child_key) {
                output.push('\n');
                output.push_str(&resource_xml(&format!("{base}/{name}"), &name, child));
            }
        }
    }
    multistatus(&output)
}

fn parse_prop_updates(body: &[u8]) -> Vec<(String, String)> {
    let mut reader = quick_xml::Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut updates = Vec::new();
    let mut in_prop = false;
    let mut current: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "prop" {
                    in_prop = true;
                } else if in_prop && local != "propertyupdate" && local != "set" {
                    current = Some(local);
                }
            }
            Ok(quick_xml::events::Event::Text(t)) => {
                if let Some(name) = current.take() {
                    updates.push((name, t.unescape().unwrap_or_default().to_string()));
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "prop" {
                    in_prop = false;
                }
                if Some(&local) == current.as_ref() {
                    // empty property value
                    updates.push((local, String::new()));
                    current = None;
                }
            }
            Ok(quick_xml::events::Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    updates
}

fn dav_proppatch(state: &mut MockState, path: &str, key: &str, body: &[u8]) -> Response {
    if !state.files.contains_key(key) {
        return dav_not_found(path);
    }
    let updates = parse_prop_updates(body);
    let mut prop_names = String::new();
    if let Some(res) = state.files.get_mut(key) {
        for (name, value) in &updates {
            if name == "favorite" {
                res.favorite = value == "1";
            } else {
                res.props.insert(name.clone(), value.clone());
            }
            prop_names.push_str(&format!("<oc:{name}/>\n"));
        }
    }
    multistatus(&format!(
        r#"<D:response>
<D:href>{path}</D:href>
<D:propstat>
<D:prop>
{prop_names}</D:prop>
<D:status>HTTP/1.1 200 OK</D:status>
</D:propstat>
</D:response>"#
    ))
}

fn dav_lock(
    state: &mut MockState,
    path: &str,
    root: &str,
    rel: &str,
    headers: &HeaderMap,
    _body: &[u8],
) -> Response {
    let key = full_key(root, rel);
    let is_miss = !state.files.contains_key(&key);
    if !is_miss && state.lock_blocks(&key, headers) {
        return StatusCode::LOCKED.into_response();
    }
    if is_miss {
        if !parent_exists(state, root, rel) {
            return StatusCode::CONFLICT.into_response();
        }
        // lock-null resource
        state.files.insert(key.clone(), Resource::file(Bytes::new()));
    }
    let token = format!("opaquelocktoken:{}", Uuid::new_v4());
    state.locks.insert(key, MockLock { token: token.clone() });

    let status = if is_miss {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let lock_token_value = format!("<{token}>");
    (
        status,
        [
            (
                header::CONTENT_TYPE.as_str(),
                "application/xml; charset=utf-8",
            ),
            ("lock-token", lock_token_value.as_str()),
        ],
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<D:prop xmlns:D="DAV:"><D:lockdiscovery><D:activelock>
<D:locktoken><D:href>{token}</D:href></D:locktoken>
<D:lockroot><D:href>{path}</D:href></D:lockroot>
</D:activelock></D:lockdiscovery></D:prop>"#
        ),
    )
        .into_response()
}

fn dav_unlock(state: &mut MockState, key: &str, headers: &HeaderMap) -> Response {
    let supplied = headers
        .get("lock-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches(['<', '>']).to_owned());
    match (state.locks.get(key), supplied) {
        (Some(lock), Some(token)) if lock.token == token => {
            state.locks.remove(key);
            StatusCode::NO_CONTENT.into_response()
        }
        _ => StatusCode::CONFLICT.into_response(),
    }
}

fn dav_report(state: &MockState, path: &str, root: &str) -> Response {
    let prefix = format!("{root}/");
    let base = path.trim_end_matches('/');
    let mut output = String::new();
    for (key, res) in &state.files {
        if key.starts_with(&prefix) && res.favorite {
            let rel = &key[prefix.len()..];
            let name = rel.rsplit('/').next().unwrap_or(rel);
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&resource_xml(&format!("{base}/{rel}"), name, res));
        }
    }
    multistatus(&output)
}

fn dav_uploads(
    state: &mut MockState,
    method: &Method,
    session: &str,
    member: &str,
    headers: &HeaderMap,
    body: Bytes,
    user: Option<&str>,
) -> Response {
    match (method.as_str(), member) {
        ("MKCOL", "") => {
            state.uploads.insert(session.to_owned(), BTreeMap::new());
            StatusCode::CREATED.into_response()
        }
        ("DELETE", "") => match state.uploads.remove(session) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => dav_not_found(session),
        },
        ("PUT", name) if !name.is_empty() => match state.uploads.get_mut(session) {
            Some(pieces) => {
                pieces.insert(name.to_owned(), body);
                StatusCode::CREATED.into_response()
            }
            None => StatusCode::CONFLICT.into_response(),
        },
        ("MOVE", ".file") => {
            let Some(pieces) = state.uploads.remove(session) else {
                return StatusCode::CONFLICT.into_response();
            };
            let Some(dest_path) = destination_path(headers) else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            let (dest_root, dest_rel) =
                match parse_dav_address(state, &dest_path, headers, user) {
                    Ok(DavAddress::Files { root, rel }) => (root, rel),
                    _ => return StatusCode::BAD_GATEWAY.into_response(),
                };
            if !parent_exists(state, &dest_root, &dest_rel) {
                return StatusCode::CONFLICT.into_response();
            }
            // chunk names sort numerically, not lexically
            let mut ordered: Vec<(&String, &Bytes)> = pieces.iter().collect();
            ordered.sort_by_key(|(name, _)| name.parse::<u64>().unwrap_or(u64::MAX));
            let mut assembled = Vec::new();
            for (_, piece) in ordered {
                assembled.extend_from_slice(piece);
            }
            if let Some(expected) = headers
                .get("oc-total-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok())
            {
                if expected != assembled.len() {
                    return StatusCode::BAD_REQUEST.into_response();
                }
            }
            let dest_key = full_key(&dest_root, &dest_rel);
            let existed = state.files.contains_key(&dest_key);
            state
                .files
                .insert(dest_key, Resource::file(Bytes::from(assembled)));
            if existed {
                StatusCode::NO_CONTENT.into_response()
            } else {
                StatusCode::CREATED.into_response()
            }
        }
        ("PROPFIND", _) => multistatus(""),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

// ---- OCS ----

#[derive(Clone, Copy)]
struct OcsCtx {
    v1: bool,
    json: bool,
}

impl OcsCtx {
    fn ok_code(self) -> i64 {
        if self.v1 { 100 } else { 200 }
    }
}

fn ocs_ok(ctx: OcsCtx, data_json: Value, data_xml: &str) -> Response {
    ocs_envelope(ctx, StatusCode::OK, ctx.ok_code(), "OK", data_json, data_xml)
}

fn ocs_fail(ctx: OcsCtx, http: StatusCode, code: i64, message: &str) -> Response {
    ocs_envelope(ctx, http, code, message, Value::Null, "")
}

fn ocs_envelope(
    ctx: OcsCtx,
    http: StatusCode,
    code: i64,
    message: &str,
    data_json: Value,
    data_xml: &str,
) -> Response {
    // v1 wraps everything in HTTP 200, v2 reports the real status
    let status = if ctx.v1 { StatusCode::OK } else { http };
    let ok = code == ctx.ok_code();
    if ctx.json {
        json_response(
            status,
            json!({
                "ocs": {
                    "meta": {
                        "status": if ok { "ok" } else { "failure" },
                        "statuscode": code,
                        "message": message,
                    },
                    "data": data_json,
                }
            }),
        )
    } else {
        xml_response(
            status,
            format!(
                r#"<?xml version="1.0"?>
<ocs>
 <meta>
  <status>{}</status>
  <statuscode>{}</statuscode>
  <message>{}</message>
 </meta>
 <data>
{}
 </data>
</ocs>"#,
                if ok { "ok" } else { "failure" },
                code,
                escape(message),
                data_xml
            ),
        )
    }
}

fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    let body = String::from_utf8_lossy(body);
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .map(|v| v.into_owned())
                    .ok()
            };
            Some((decode(k)?, decode(v)?))
        })
        .collect()
}

fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn share_json(share: &MockShare) -> Value {
    json!({
        "id": share.id.to_string(),
        "share_type": share.share_type,
        "path": share.path,
        "uid_owner": share.owner,
        "share_with": share.share_with,
        "permissions": share.permissions,
        "token": share.token,
        "name": share.name,
        "expiration": share.expiration,
    })
}

fn share_xml(share: &MockShare) -> String {
    let mut out = format!(
        "<id>{}</id>\n<share_type>{}</share_type>\n<path>{}</path>\n<uid_owner>{}</uid_owner>\n<permissions>{}</permissions>\n",
        share.id,
        share.share_type,
        escape(share.path.as_str()),
        escape(share.owner.as_str()),
        share.permissions
    );
    if let Some(with) = &share.share_with {
        out.push_str(&format!("<share_with>{}</share_with>\n", escape(with.as_str())));
    }
    if let Some(token) = &share.token {
        out.push_str(&format!("<token>{token}</token>\n"));
    }
    out
}

fn ocs(
    state: &mut MockState,
    ctx: OcsCtx,
    method: &Method,
    route: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Response {
    let route = route.trim_end_matches('/');
    let owner = authenticate(state, headers).unwrap_or_default();

    match (method.as_str(), route) {
        ("GET", "cloud/capabilities") => {
            let data = json!({
                "capabilities": {
                    "core": { "webdav-root": "remote.php/webdav", "status": { "version": PRODUCT_VERSION } },
                    "files": { "bigfilechunking": true, "privateLinks": true, "favorites": true },
                    "dav": { "chunking": "1.0" },
                    "files_sharing": {
                        "api_enabled": true,
                        "public": { "enabled": true, "multiple": true }
                    }
                },
                "version": { "string": PRODUCT_VERSION, "edition": "Community", "product": "Infinite Scale" }
            });
            let xml = format!(
                "<capabilities>\n<files>\n<bigfilechunking>1</bigfilechunking>\n</files>\n<dav>\n<chunking>1.0</chunking>\n</dav>\n</capabilities>\n<version>\n<string>{PRODUCT_VERSION}</string>\n<product>Infinite Scale</product>\n</version>"
            );
            ocs_ok(ctx, data, &xml)
        }
        ("GET", "config") => {
            let data = json!({ "version": "1.7", "website": "ocis", "host": "localhost", "contact": "", "ssl": "false" });
            ocs_ok(
                ctx,
                data,
                "<version>1.7</version>\n<website>ocis</website>\n<host>localhost</host>",
            )
        }
        (_, route) if route.starts_with("apps/files_sharing/api/v1/shares") => {
            ocs_shares(state, ctx, method, route, &owner, body)
        }
        (_, route) if route.starts_with("apps/notifications/api/v1/notifications") => {
            ocs_notifications(state, ctx, method, route)
        }
        (_, route) if route.starts_with("cloud/") => {
            ocs_provisioning(state, ctx, method, route, body)
        }
        _ => ocs_fail(ctx, StatusCode::NOT_FOUND, 998, "Invalid query"),
    }
}

fn ocs_shares(
    state: &mut MockState,
    ctx: OcsCtx,
    method: &Method,
    route: &str,
    owner: &str,
    body: &Bytes,
) -> Response {
    let rest = route
        .strip_prefix("apps/files_sharing/api/v1/shares")
        .unwrap_or("")
        .trim_start_matches('/');

    match (method.as_str(), rest) {
        ("POST", "") => {
            let form = parse_form(body);
            let Some(share_type) = form_value(&form, "shareType").and_then(|v| v.parse().ok())
            else {
                return ocs_fail(ctx, StatusCode::BAD_REQUEST, 400, "shareType is required");
            };
            let Some(path) = form_value(&form, "path") else {
                return ocs_fail(ctx, StatusCode::BAD_REQUEST, 400, "path is required");
            };
            let path_key = full_key(&format!("user:{owner}"), path.trim_matches('/'));
            if !state.files.contains_key(&path_key) {
                return ocs_fail(ctx, StatusCode::NOT_FOUND, 404, "Wrong path, file/folder does not exist");
            }
            let share = MockShare {
                id: state.next_share_id,
                share_type,
                path: path.to_owned(),
                owner: owner.to_owned(),
                share_with: form_value(&form, "shareWith").map(ToOwned::to_owned),
                permissions: form_value(&form, "permissions")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
                token: (share_type == 3).then(|| random_string(15)),
                password: form_value(&form, "password").map(ToOwned::to_owned),
                name: form_value(&form, "name").map(ToOwned::to_owned),
                expiration: form_value(&form, "expireDate").map(ToOwned::to_owned),
            };
            state.next_share_id += 1;
            if share_type == 0 {
                if let Some(with) = &share.share_with {
                    state.notifications.push((
                        Uuid::new_v4().to_string(),
                        format!("{owner} shared {} with {with}", share.path),
                    ));
                }
            }
            let response = ocs_ok(ctx, share_json(&share), &share_xml(&share));
            state.shares.insert(share.id, share);
            response
        }
        ("GET", "") => {
            let shares: Vec<&MockShare> = state.shares.values().collect();
            let data = Value::Array(shares.iter().map(|s| share_json(s)).collect());
            let xml: String = shares
                .iter()
                .map(|s| format!("<element>\n{}</element>\n", share_xml(s)))
                .collect();
            ocs_ok(ctx, data, &xml)
        }
        (verb, rest) if rest.starts_with("pending/") => {
            let id = rest.trim_start_matches("pending/");
            let Ok(id) = id.parse::<u64>() else {
                return ocs_fail(ctx, StatusCode::BAD_REQUEST, 400, "invalid share id");
            };
            if !state.shares.contains_key(&id) {
                return ocs_fail(ctx, StatusCode::NOT_FOUND, 404, "Share not found");
            }
            match verb {
                // accept or decline, both acknowledged the same way
                "POST" | "DELETE" => ocs_ok(ctx, Value::Null, ""),
                _ => ocs_fail(ctx, StatusCode::METHOD_NOT_ALLOWED, 998, "Invalid query"),
            }
        }
        (verb, id) if !id.is_empty() => {
            let Ok(id) = id.parse::<u64>() else {
                return ocs_fail(ctx, StatusCode::BAD_REQUEST, 400, "invalid share id");
            };
            match verb {
                "GET" => match state.shares.get(&id) {
                    Some(share) => ocs_ok(ctx, share_json(share), &share_xml(share)),
                    None => ocs_fail(ctx, StatusCode::NOT_FOUND, 404, "Share not found"),
                },
                "PUT" => {
                    let form = parse_form(body);
                    match state.shares.get_mut(&id) {
                        Some(share) => {
                            if let Some(p) = form_value(&form, "permissions").and_then(|v| v.parse().ok()) {
                                share.permissions = p;
                            }
                            if let Some(p) = form_value(&form, "password") {
                                share.password = Some(p.to_owned());
                            }
                            if let Some(d) = form_value(&form, "expireDate") {
                                share.expiration = Some(d.to_owned());
                            }
                            let share = share.clone();
                            ocs_ok(ctx, share_json(&share), &share_xml(&share))
                        }
                        None => ocs_fail(ctx, StatusCode::NOT_FOUND, 404, "Share not found"),
                    }
                }
                "DELETE" => match state.shares.remove(&id) {
                    Some(_) => ocs_ok(ctx, Value::Null, ""),
                    None => ocs_fail(ctx, StatusCode::NOT_FOUND, 404, "Share not found"),
                },
                _ => ocs_fail(ctx, StatusCode::METHOD_NOT_ALLOWED, 998, "Invalid query"),
            }
        }
        _ => ocs_fail(ctx, StatusCode::NOT_FOUND, 998, "Invalid query"),
    }
}

fn ocs_notifications(state: &mut MockState, ctx: OcsCtx, method: &Method, route: &str) -> Response {
    let rest = route
        .strip_prefix("apps/notifications/api/v1/notifications")
        .unwrap_or("")
        .trim_start_matches('/');
    match (method.as_str(), rest) {
        ("GET", "") => {
            let data = Value::Array(
                state
                    .notifications
                    .iter()
                    .map(|(id, message)| json!({ "notification_id": id, "message": message }))
                    .collect(),
            );
            let xml: String = state
                .notifications
                .iter()
                .map(|(id, message)| {
                    format!(
                        "<element>\n<notification_id>{id}</notification_id>\n<message>{}</message>\n</element>\n",
                        escape(message.as_str())
                    )
                })
                .collect();
            ocs_ok(ctx, data, &xml)
        }
        ("DELETE", "") => {
            state.notifications.clear();
            ocs_ok(ctx, Value::Null, "")
        }
        ("DELETE", id) => {
            let before = state.notifications.len();
            state.notifications.retain(|(n, _)| n != id);
            if state.notifications.len() == before {
                ocs_fail(ctx, StatusCode::NOT_FOUND, 404, "Notification not found")
            } else {
                ocs_ok(ctx, Value::Null, "")
            }
        }
        _ => ocs_fail(ctx, StatusCode::NOT_FOUND, 998, "Invalid query"),
    }
}

fn user_ocs_json(user: &MockUser) -> Value {
    json!({
        "enabled": user.enabled,
        "userid": user.username,
        "displayname": user.display_name,
        "email": user.email,
    })
}

fn ocs_provisioning(
    state: &mut MockState,
    ctx: OcsCtx,
    method: &Method,
    route: &str,
    body: &Bytes,
) -> Response {
    let rest = route.strip_prefix("cloud/").unwrap_or("");
    let form = parse_form(body);

    match (method.as_str(), rest) {
        ("POST", "users") => {
            let (Some(userid), Some(password)) =
                (form_value(&form, "userid"), form_value(&form, "password"))
            else {
                return ocs_fail(ctx, StatusCode::BAD_REQUEST, 400, "userid and password are required");
            };
            if state.users.contains_key(userid) {
                return ocs_fail(ctx, StatusCode::CONFLICT, 102, "User already exists");
            }
            state.add_user(
                userid,
                password,
                form_value(&form, "displayname"),
                form_value(&form, "email"),
            );
            ocs_ok(ctx, Value::Null, "")
        }
        ("POST", "groups") => {
            let Some(groupid) = form_value(&form, "groupid") else {
                return ocs_fail(ctx, StatusCode::BAD_REQUEST, 400, "groupid is required");
            };
            if state.group_by_key(groupid).is_some() {
                return ocs_fail(ctx, StatusCode::CONFLICT, 102, "Group already exists");
            }
            state.groups.push(MockGroup {
                id: Uuid::new_v4().to_string(),
                name: groupid.to_owned(),
                members: Vec::new(),
            });
            ocs_ok(ctx, Value::Null, "")
        }
        (verb, rest) if rest.starts_with("users/") => {
            let rest = rest.trim_start_matches("users/");
            if let Some(username) = rest.strip_suffix("/groups") {
                let username = username.to_owned();
                return ocs_user_groups(state, ctx, verb, &username, &form);
            }
            let username = rest.to_owned();
            match verb {
                "GET" => match state.users.get(&username) {
                    Some(user) => {
                        let xml = format!(
                            "<enabled>{}</enabled>\n<displayname>{}</displayname>\n<email>{}</email>\n",
                            user.enabled,
                            escape(user.display_name.as_str()),
                            escape(user.email.as_deref().unwrap_or(""))
                        );
                        ocs_ok(ctx, user_ocs_json(user), &xml)
                    }
                    None => ocs_fail(ctx, StatusCode::NOT_FOUND, 998, "The requested user could not be found"),
                },
                "PUT" => {
                    let (Some(key), Some(value)) =
                        (form_value(&form, "key"), form_value(&form, "value"))
                    else {
                        return ocs_fail(ctx, StatusCode::BAD_REQUEST, 400, "key and value are required");
                    };
                    let Some(user) = state.users.get_mut(&username) else {
                        return ocs_fail(ctx, StatusCode::NOT_FOUND, 998, "The requested user could not be found");
                    };
                    match key {
                        "password" => user.password = value.to_owned(),
                        "displayname" => user.display_name = value.to_owned(),
                        "email" => user.email = Some(value.to_owned()),
                        _ => return ocs_fail(ctx, StatusCode::BAD_REQUEST, 103, "unknown key"),
                    }
                    ocs_ok(ctx, Value::Null, "")
                }
                "DELETE" => {
                    if !state.users.contains_key(&username) {
                        return ocs_fail(ctx, StatusCode::NOT_FOUND, 998, "The requested user could not be found");
                    }
                    state.remove_user(&username);
                    ocs_ok(ctx, Value::Null, "")
                }
                _ => ocs_fail(ctx, StatusCode::METHOD_NOT_ALLOWED, 998, "Invalid query"),
            }
        }
        ("DELETE", rest) if rest.starts_with("groups/") => {
            let name = rest.trim_start_matches("groups/").to_owned();
            let before = state.groups.len();
            state.groups.retain(|g| g.name != name);
            if state.groups.len() == before {
                ocs_fail(ctx, StatusCode::NOT_FOUND, 101, "The requested group could not be found")
            } else {
                ocs_ok(ctx, Value::Null, "")
            }
        }
        _ => ocs_fail(ctx, StatusCode::NOT_FOUND, 998, "Invalid query"),
    }
}

fn ocs_user_groups(
    state: &mut MockState,
    ctx: OcsCtx,
    verb: &str,
    username: &str,
    form: &[(String, String)],
) -> Response {
    if !state.users.contains_key(username) {
        return ocs_fail(ctx, StatusCode::NOT_FOUND, 998, "The requested user could not be found");
    }
    match verb {
        "GET" => {
            let groups: Vec<&str> = state
                .groups
                .iter()
                .filter(|g| g.members.iter().any(|m| m == username))
                .map(|g| g.name.as_str())
                .collect();
            let data = json!({ "groups": groups });
            let xml: String = groups
                .iter()
                .map(|g| format!("<element>{}</element>\n", escape(*g)))
                .collect();
            ocs_ok(ctx, data, &format!("<groups>\n{xml}</groups>"))
        }
        "POST" | "DELETE" => {
            let Some(groupid) = form_value(form, "groupid") else {
                return ocs_fail(ctx, StatusCode::BAD_REQUEST, 101, "groupid is required");
            };
            let Some(group) = state.groups.iter_mut().find(|g| g.name == groupid) else {
                return ocs_fail(ctx, StatusCode::NOT_FOUND, 102, "The requested group could not be found");
            };
            if verb == "POST" {
                if !group.members.iter().any(|m| m == username) {
                    group.members.push(username.to_owned());
                }
            } else {
                group.members.retain(|m| m != username);
            }
            ocs_ok(ctx, Value::Null, "")
        }
        _ => ocs_fail(ctx, StatusCode::METHOD_NOT_ALLOWED, 998, "Invalid query"),
    }
}

// ---- Graph ----

fn graph_error(status: StatusCode, code: &str, message: &str) -> Response {
    json_response(
        status,
        json!({ "error": { "code": code, "message": message } }),
    )
}

fn graph_user_json(user: &MockUser) -> Value {
    json!({
        "id": user.id,
        "displayName": user.display_name,
        "mail": user.email,
        "onPremisesSamAccountName": user.username,
        "accountEnabled": user.enabled,
    })
}

fn graph_drive_json(drive: &MockDrive, host: &str) -> Value {
    json!({
        "id": drive.id,
        "name": drive.name,
        "driveType": "project",
        "quota": { "total": drive.quota_total },
        "root": {
            "id": format!("{}!root", drive.id),
            "webDavUrl": format!("http://{host}/remote.php/dav/spaces/{}", drive.id),
        },
    })
}

fn graph(
    state: &mut MockState,
    method: &Method,
    route: &str,
    query: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Response {
    let route = route.trim_end_matches('/');
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let payload: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

    match (method.as_str(), route) {
        ("POST", "users") => {
            let Some(username) = payload
                .get("onPremisesSamAccountName")
                .and_then(|v| v.as_str())
            else {
                return graph_error(StatusCode::BAD_REQUEST, "invalidRequest", "onPremisesSamAccountName is required");
            };
            if state.users.contains_key(username) {
                return graph_error(StatusCode::CONFLICT, "nameAlreadyExists", "a user with that name already exists");
            }
            let password = payload
                .get("passwordProfile")
                .and_then(|p| p.get("password"))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let user = state.add_user(
                username,
                password,
                payload.get("displayName").and_then(|v| v.as_str()),
                payload.get("mail").and_then(|v| v.as_str()),
            );
            json_response(StatusCode::CREATED, graph_user_json(&user))
        }
        ("GET", "users") => {
            let search = query
                .split('&')
                .find_map(|p| p.strip_prefix("$search="))
                .map(|s| decode_path(s).trim_matches('"').to_owned());
            let users: Vec<Value> = state
                .users
                .values()
                .filter(|u| {
                    search
                        .as_deref()
                        .is_none_or(|s| u.username.contains(s) || u.display_name.contains(s))
                })
                .map(graph_user_json)
                .collect();
            json_response(StatusCode::OK, json!({ "value": users }))
        }
        ("POST", "groups") => {
            let Some(name) = payload.get("displayName").and_then(|v| v.as_str()) else {
                return graph_error(StatusCode::BAD_REQUEST, "invalidRequest", "displayName is required");
            };
            if state.group_by_key(name).is_some() {
                return graph_error(StatusCode::CONFLICT, "nameAlreadyExists", "a group with that name already exists");
            }
            let group = MockGroup {
                id: Uuid::new_v4().to_string(),
                name: name.to_owned(),
                members: Vec::new(),
            };
            let response = json_response(
                StatusCode::CREATED,
                json!({ "id": group.id, "displayName": group.name }),
            );
            state.groups.push(group);
            response
        }
        ("GET", "me/drives") => {
            let drives: Vec<Value> = state
                .drives
                .values()
                .filter(|d| !d.disabled)
                .map(|d| graph_drive_json(d, host))
                .collect();
            json_response(StatusCode::OK, json!({ "value": drives }))
        }
        ("POST", "drives") => {
            let Some(name) = payload.get("name").and_then(|v| v.as_str()) else {
                return graph_error(StatusCode::BAD_REQUEST, "invalidRequest", "name is required");
            };
            let drive = MockDrive {
                id: Uuid::new_v4().to_string(),
                name: name.to_owned(),
                quota_total: payload
                    .get("quota")
                    .and_then(|q| q.get("total"))
                    .and_then(|v| v.as_u64()),
                disabled: false,
            };
            state
                .files
                .insert(format!("space:{}", drive.id), Resource::dir());
            let response = json_response(StatusCode::CREATED, graph_drive_json(&drive, host));
            state.drives.insert(drive.id.clone(), drive);
            response
        }
        ("GET", "extensions/org.libregraph/tags") => {
            json_response(StatusCode::OK, json!({ "value": state.tags }))
        }
        ("PUT" | "DELETE", "extensions/org.libregraph/tags") => {
            let Some(resource_id) = payload.get("resourceId").and_then(|v| v.as_str()) else {
                return graph_error(StatusCode::BAD_REQUEST, "invalidRequest", "resourceId is required");
            };
            if !state.files.values().any(|r| r.file_id == resource_id) {
                return graph_error(StatusCode::NOT_FOUND, "itemNotFound", "resource not found");
            }
            let tags: Vec<String> = payload
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|t| t.as_str().map(ToOwned::to_owned))
                        .collect()
                })
                .unwrap_or_default();
            let assigned = state.resource_tags.entry(resource_id.to_owned()).or_default();
            if method == Method::PUT {
                for tag in tags {
                    if !assigned.contains(&tag) {
                        assigned.push(tag.clone());
                    }
                    if !state.tags.contains(&tag) {
                        state.tags.push(tag);
                    }
                }
            } else {
                assigned.retain(|t| !tags.contains(t));
            }
            StatusCode::OK.into_response()
        }
        _ => graph_routes_with_id(state, method, route, host, headers, &payload),
    }
}

fn graph_routes_with_id(
    state: &mut MockState,
    method: &Method,
    route: &str,
    host: &str,
    headers: &HeaderMap,
    payload: &Value,
) -> Response {
    if let Some(rest) = route.strip_prefix("users/") {
        return graph_user_routes(state, method, rest, payload);
    }
    if let Some(rest) = route.strip_prefix("groups/") {
        return graph_group_routes(state, method, rest, payload);
    }
    if let Some(rest) = route.strip_prefix("drives/") {
        return graph_drive_routes(state, method, rest, host, headers, payload);
    }
    graph_error(StatusCode::NOT_FOUND, "itemNotFound", "unknown route")
}

fn graph_user_routes(
    state: &mut MockState,
    method: &Method,
    key: &str,
    payload: &Value,
) -> Response {
    let Some(user) = state.user_by_key(key).cloned() else {
        return graph_error(StatusCode::NOT_FOUND, "itemNotFound", "user not found");
    };
    match method.as_str() {
        "GET" => json_response(StatusCode::OK, graph_user_json(&user)),
        "PATCH" => {
            let username = user.username.clone();
            if let Some(stored) = state.users.get_mut(&username) {
                if let Some(name) = payload.get("displayName").and_then(|v| v.as_str()) {
                    stored.display_name = name.to_owned();
                }
                if let Some(mail) = payload.get("mail").and_then(|v| v.as_str()) {
                    stored.email = Some(mail.to_owned());
                }
                if let Some(enabled) = payload.get("accountEnabled").and_then(|v| v.as_bool()) {
                    stored.enabled = enabled;
                }
                if let Some(password) = payload
                    .get("passwordProfile")
                    .and_then(|p| p.get("password"))
                    .and_then(|v| v.as_str())
                {
                    stored.password = password.to_owned();
                }
                let updated = stored.clone();
                json_response(StatusCode::OK, graph_user_json(&updated))
            } else {
                graph_error(StatusCode::NOT_FOUND, "itemNotFound", "user not found")
            }
        }
        "DELETE" => {
            state.remove_user(&user.username);
            StatusCode::NO_CONTENT.into_response()
        }
        _ => graph_error(StatusCode::METHOD_NOT_ALLOWED, "invalidRequest", "unsupported method"),
    }
}

fn graph_group_routes(
    state: &mut MockState,
    method: &Method,
    rest: &str,
    payload: &Value,
) -> Response {
    // membership routes first: {id}/members/$ref and {id}/members/{uid}/$ref
    if let Some((group_key, tail)) = rest.split_once("/members/") {
        let Some(group_id) = state.group_by_key(group_key).map(|g| g.id.clone()) else {
            return graph_error(StatusCode::NOT_FOUND, "itemNotFound", "group not found");
        };
        if tail == "$ref" && method == Method::POST {
            let Some(user_key) = payload
                .get("@odata.id")
                .and_then(|v| v.as_str())
                .and_then(|v| v.rsplit('/').next())
            else {
                return graph_error(StatusCode::BAD_REQUEST, "invalidRequest", "@odata.id is required");
            };
            let Some(username) = state.user_by_key(user_key).map(|u| u.username.clone()) else {
                return graph_error(StatusCode::NOT_FOUND, "itemNotFound", "user not found");
            };
            if let Some(group) = state.groups.iter_mut().find(|g| g.id == group_id) {
                if !group.members.contains(&username) {
                    group.members.push(username);
                }
            }
            return StatusCode::NO_CONTENT.into_response();
        }
        if let Some(user_key) = tail.strip_suffix("/$ref") {
            if method == Method::DELETE {
                let Some(username) = state.user_by_key(user_key).map(|u| u.username.clone())
                else {
                    return graph_error(StatusCode::NOT_FOUND, "itemNotFound", "user not found");
                };
                if let Some(group) = state.groups.iter_mut().find(|g| g.id == group_id) {
                    group.members.retain(|m| m != &username);
                }
                return StatusCode::NO_CONTENT.into_response();
            }
        }
        return graph_error(StatusCode::METHOD_NOT_ALLOWED, "invalidRequest", "unsupported method");
    }

    let Some(group) = state.group_by_key(rest).cloned() else {
        return graph_error(StatusCode::NOT_FOUND, "itemNotFound", "group not found");
    };
    match method.as_str() {
        "GET" => {
            let members: Vec<Value> = group
                .members
                .iter()
                .filter_map(|m| state.users.get(m))
                .map(graph_user_json)
                .collect();
            json_response(
                StatusCode::OK,
                json!({ "id": group.id, "displayName": group.name, "members": members }),
            )
        }
        "DELETE" => {
            state.groups.retain(|g| g.id != group.id);
            StatusCode::NO_CONTENT.into_response()
        }
        _ => graph_error(StatusCode::METHOD_NOT_ALLOWED, "invalidRequest", "unsupported method"),
    }
}

fn graph_drive_routes(
    state: &mut MockState,
    method: &Method,
    rest: &str,
    host: &str,
    headers: &HeaderMap,
    payload: &Value,
) -> Response {
    // item routes: {drive}/items/{item}/invite | permissions[/{id}]
    if let Some((drive_id, tail)) = rest.split_once("/items/") {
        if !state.drives.contains_key(drive_id) {
            return graph_error(StatusCode::NOT_FOUND, "itemNotFound", "drive not found");
        }
        if let Some(_item) = tail.strip_suffix("/invite") {
            if method == Method::POST {
                let permission_id = Uuid::new_v4().to_string();
                let value = json!({
                    "id": permission_id,
                    "roles": payload.get("roles").cloned().unwrap_or_default(),
                    "grantedToV2": payload.get("recipients").cloned().unwrap_or_default(),
                });
                state.permissions.insert(permission_id, value.clone());
                return json_response(StatusCode::OK, json!({ "value": [value] }));
            }
        }
        if tail.ends_with("/permissions") && method == Method::GET {
            let values: Vec<&Value> = state.permissions.values().collect();
            return json_response(StatusCode::OK, json!({ "value": values }));
        }
        if let Some((_, permission_id)) = tail.rsplit_once("/permissions/") {
            if method == Method::DELETE {
                return match state.permissions.remove(permission_id) {
                    Some(_) => StatusCode::NO_CONTENT.into_response(),
                    None => graph_error(StatusCode::NOT_FOUND, "itemNotFound", "permission not found"),
                };
            }
        }
        return graph_error(StatusCode::METHOD_NOT_ALLOWED, "invalidRequest", "unsupported method");
    }

    let drive_id = rest.to_owned();
    let Some(drive) = state.drives.get(&drive_id).cloned() else {
        return graph_error(StatusCode::NOT_FOUND, "itemNotFound", "drive not found");
    };
    match method.as_str() {
        "GET" => json_response(StatusCode::OK, graph_drive_json(&drive, host)),
        "PATCH" => {
            if let Some(stored) = state.drives.get_mut(&drive_id) {
                if let Some(name) = payload.get("name").and_then(|v| v.as_str()) {
                    stored.name = name.to_owned();
                }
                if let Some(total) = payload
                    .get("quota")
                    .and_then(|q| q.get("total"))
                    .and_then(|v| v.as_u64())
                {
                    stored.quota_total = Some(total);
                }
                let updated = stored.clone();
                json_response(StatusCode::OK, graph_drive_json(&updated, host))
            } else {
                graph_error(StatusCode::NOT_FOUND, "itemNotFound", "drive not found")
            }
        }
        "DELETE" => {
            // a plain DELETE disables, DELETE with `Purge` removes for good
            if headers.contains_key("purge") {
                if !drive.disabled {
                    return graph_error(
                        StatusCode::BAD_REQUEST,
                        "invalidRequest",
                        "only disabled drives can be purged",
                    );
                }
                state.drives.remove(&drive_id);
                state.remove_subtree(&format!("space:{drive_id}"));
            } else if let Some(stored) = state.drives.get_mut(&drive_id) {
                stored.disabled = true;
            }
            StatusCode::NO_CONTENT.into_response()
        }
        _ => graph_error(StatusCode::METHOD_NOT_ALLOWED, "invalidRequest", "unsupported method"),
    }
}

// ---- Settings ----

fn settings(state: &mut MockState, method: &Method, route: &str, body: &Bytes) -> Response {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let payload: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    match route.trim_end_matches('/') {
        "roles-list" => {
            let bundles: Vec<Value> = ROLES
                .iter()
                .map(|(id, name)| json!({ "id": id, "displayName": name, "type": "TYPE_ROLE" }))
                .collect();
            json_response(StatusCode::CREATED, json!({ "bundles": bundles }))
        }
        "assignments-list" => {
            let account = payload
                .get("account_uuid")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let assignments: Vec<Value> = state
                .assignments
                .iter()
                .filter(|(_, (a, _))| a == account)
                .map(|(id, (account, role))| {
                    json!({ "id": id, "accountUuid": account, "roleId": role })
                })
                .collect();
            json_response(StatusCode::CREATED, json!({ "assignments": assignments }))
        }
        "assignments-add" => {
            let (Some(account), Some(role)) = (
                payload.get("account_uuid").and_then(|v| v.as_str()),
                payload.get("role_id").and_then(|v| v.as_str()),
            ) else {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "account_uuid and role_id are required" }),
                );
            };
            if !ROLES.iter().any(|(id, _)| *id == role) {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "unknown role id" }),
                );
            }
            // one role per account
            state.assignments.retain(|_, (a, _)| a != account);
            let id = Uuid::new_v4().to_string();
            state
                .assignments
                .insert(id.clone(), (account.to_owned(), role.to_owned()));
            json_response(
                StatusCode::CREATED,
                json!({ "assignment": { "id": id, "accountUuid": account, "roleId": role } }),
            )
        }
        "assignments-remove" => {
            let Some(id) = payload.get("id").and_then(|v| v.as_str()) else {
                return json_response(StatusCode::BAD_REQUEST, json!({ "error": "id is required" }));
            };
            state.assignments.remove(id);
            json_response(StatusCode::CREATED, json!({}))
        }
        "values-list" => json_response(StatusCode::CREATED, json!({ "values": [] })),
        "values-save" => json_response(
            StatusCode::CREATED,
            json!({ "value": payload.get("value").cloned().unwrap_or_default() }),
        ),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
