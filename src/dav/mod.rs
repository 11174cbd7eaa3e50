pub mod chunking;
pub mod headers;
pub mod public;
pub mod xml;

use crate::{
    dav::headers::{
        Depth, Destination, IfToken, LockTimeout, LockToken, OcChecksum, OcMtime, OcTotalLength,
        Overwrite,
    },
    errors::Result,
    http::{Auth, Dispatcher},
    response::StoredResponse,
    utils::encode_uri,
};
use ::headers::{ContentType, HeaderMapExt};
use bytes::Bytes;
use http::{HeaderMap, Method};
use sha2::{Digest, Sha256};
use std::{path::Path, sync::Arc};

/// Which URL prefix convention the server expects for WebDAV operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavPathVersion {
    Old,
    New,
    Spaces,
}

/// Some server features only answer on the new `remote.php/dav` tree.
pub fn version_for_feature(feature: &str) -> DavPathVersion {
    match feature {
        "systemtags" | "file_versions" | "chunking-v2" => DavPathVersion::New,
        "spaces" => DavPathVersion::Spaces,
        _ => DavPathVersion::Old,
    }
}

/// A DAV path version bound to the context it needs (the acting username
/// for the new tree, the drive id for the spaces tree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DavTarget {
    Old,
    New { username: String },
    Spaces { space_id: String },
}

impl DavTarget {
    pub fn new_for(username: &str) -> Self {
        DavTarget::New {
            username: username.to_owned(),
        }
    }

    pub fn spaces(space_id: &str) -> Self {
        DavTarget::Spaces {
            space_id: space_id.to_owned(),
        }
    }

    pub fn version(&self) -> DavPathVersion {
        match self {
            DavTarget::Old => DavPathVersion::Old,
            DavTarget::New { .. } => DavPathVersion::New,
            DavTarget::Spaces { .. } => DavPathVersion::Spaces,
        }
    }

    fn root(&self) -> String {
        match self {
            DavTarget::Old => "remote.php/webdav".to_owned(),
            DavTarget::New { username } => {
                format!("remote.php/dav/files/{}", encode_uri(username))
            }
            DavTarget::Spaces { space_id } => {
                format!("remote.php/dav/spaces/{}", encode_uri(space_id))
            }
        }
    }
}

pub fn dav_url(base_url: &str, target: &DavTarget, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("{base_url}/{}", target.root())
    } else {
        format!("{base_url}/{}/{}", target.root(), encode_uri(path))
    }
}

pub fn uploads_url(base_url: &str, username: &str, upload_id: &str, member: &str) -> String {
    let root = format!(
        "{base_url}/remote.php/dav/uploads/{}/{}",
        encode_uri(username),
        encode_uri(upload_id)
    );
    if member.is_empty() {
        root
    } else {
        format!("{root}/{}", encode_uri(member))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    Exclusive,
    Shared,
}

impl LockScope {
    fn tag(self) -> &'static str {
        match self {
            LockScope::Exclusive => "exclusive",
            LockScope::Shared => "shared",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockArgs {
    pub scope: LockScope,
    pub owner: String,
    pub timeout: Option<LockTimeout>,
    pub depth: Option<Depth>,
}

impl Default for LockArgs {
    fn default() -> Self {
        LockArgs {
            scope: LockScope::Exclusive,
            owner: "davit".to_owned(),
            timeout: None,
            depth: None,
        }
    }
}

/// Extra headers a PUT may carry.
#[derive(Debug, Default, Clone)]
pub struct PutOptions {
    pub mtime: Option<i64>,
    pub total_length: Option<u64>,
    pub chunked: bool,
    pub checksum: Option<String>,
    pub lock_token: Option<String>,
}

impl PutOptions {
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(mtime) = self.mtime {
            headers.typed_insert(OcMtime(mtime));
        }
        if let Some(total) = self.total_length {
            headers.typed_insert(OcTotalLength(total));
        }
        if self.chunked {
            headers.typed_insert(headers::OcChunked);
        }
        if let Some(checksum) = &self.checksum {
            headers.typed_insert(OcChecksum(checksum.clone()));
        }
        if let Some(token) = &self.lock_token {
            headers.typed_insert(IfToken(token.clone()));
        }
        headers
    }
}

/// `OC-Checksum` value for a payload, `SHA256:<hex>`.
pub fn sha256_checksum(data: &[u8]) -> String {
    format!("SHA256:{:x}", Sha256::digest(data))
}

fn method(name: &str) -> Method {
    Method::from_bytes(name.as_bytes()).expect("webdav method name should be valid")
}

/// WebDAV request builders. Every operation sends through the shared
/// dispatcher and returns the response unchanged for the caller to assert
/// on.
#[derive(Clone)]
pub struct DavClient {
    dispatcher: Arc<Dispatcher>,
    base_url: String,
}

impl DavClient {
    pub fn new(dispatcher: Arc<Dispatcher>, base_url: &str) -> Self {
        DavClient {
            dispatcher,
            base_url: base_url.to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, target: &DavTarget, path: &str) -> String {
        dav_url(&self.base_url, target, path)
    }

    pub async fn options(&self, auth: &Auth) -> Result<StoredResponse> {
        let url = self.url(&DavTarget::Old, "");
        self.dispatcher
            .send(Method::OPTIONS, &url, auth, HeaderMap::new(), None)
            .await
    }

    pub async fn propfind(
        &self,
        auth: &Auth,
        target: &DavTarget,
        path: &str,
        depth: Depth,
        props: &[&str],
    ) -> Result<StoredResponse> {
        let url = self.url(target, path);
        let mut headers = HeaderMap::new();
        headers.typed_insert(depth);
        headers.typed_insert(ContentType::xml());
        let body = Bytes::from(xml::propfind_body(props));
        self.dispatcher
            .send(method("PROPFIND"), &url, auth, headers, Some(body))
            .await
    }

    pub async fn proppatch(
        &self,
        auth: &Auth,
        target: &DavTarget,
        path: &str,
        set: &[(&str, &str)],
    ) -> Result<StoredResponse> {
        let url = self.url(target, path);
        let mut headers = HeaderMap::new();
        headers.typed_insert(ContentType::xml());
        let body = Bytes::from(xml::proppatch_body(set));
        self.dispatcher
            .send(method("PROPPATCH"), &url, auth, headers, Some(body))
            .await
    }

    pub async fn mkcol(&self, auth: &Auth, target: &DavTarget, path: &str) -> Result<StoredResponse> {
        let url = self.url(target, path);
        self.dispatcher
            .send(method("MKCOL"), &url, auth, HeaderMap::new(), None)
            .await
    }

    pub async fn get(&self, auth: &Auth, target: &DavTarget, path: &str) -> Result<StoredResponse> {
        let url = self.url(target, path);
        self.dispatcher
            .send(Method::GET, &url, auth, HeaderMap::new(), None)
            .await
    }

    pub async fn put(
        &self,
        auth: &Auth,
        target: &DavTarget,
        path: &str,
        content: Bytes,
        options: &PutOptions,
    ) -> Result<StoredResponse> {
        let url = self.url(target, path);
        self.dispatcher
            .send(Method::PUT, &url, auth, options.headers(), Some(content))
            .await
    }

    /// PUT streaming the body from a local file.
    pub async fn put_file(
        &self,
        auth: &Auth,
        target: &DavTarget,
        path: &str,
        filepath: &Path,
        options: &PutOptions,
    ) -> Result<StoredResponse> {
        let url = self.url(target, path);
        self.dispatcher
            .send_file(Method::PUT, &url, auth, options.headers(), filepath)
            .await
    }

    pub async fn delete(
        &self,
        auth: &Auth,
        target: &DavTarget,
        path: &str,
        lock_token: Option<&str>,
    ) -> Result<StoredResponse> {
        let url = self.url(target, path);
        let mut headers = HeaderMap::new();
        if let Some(token) = lock_token {
            headers.typed_insert(IfToken(token.to_owned()));
        }
        self.dispatcher
            .send(Method::DELETE, &url, auth, headers, None)
            .await
    }

    pub async fn copy(
        &self,
        auth: &Auth,
        target: &DavTarget,
        from: &str,
        dest_target: &DavTarget,
        to: &str,
        overwrite: Option<bool>,
    ) -> Result<StoredResponse> {
        self.copymove("COPY", auth, target, from, dest_target, to, overwrite, None)
            .await
    }

    pub async fn r#move(
        &self,
        auth: &Auth,
        target: &DavTarget,
        from: &str,
        dest_target: &DavTarget,
        to: &str,
        overwrite: Option<bool>,
        lock_token: Option<&str>,
    ) -> Result<StoredResponse> {
        self.copymove("MOVE", auth, target, from, dest_target, to, overwrite, lock_token)
            .await
    }

    #[expect(clippy::too_many_arguments, reason = "thin builder over one request")]
    async fn copymove(
        &self,
        verb: &str,
        auth: &Auth,
        target: &DavTarget,
        from: &str,
        dest_target: &DavTarget,
        to: &str,
        overwrite: Option<bool>,
        lock_token: Option<&str>,
    ) -> Result<StoredResponse> {
        let url = self.url(target, from);
        let mut headers = HeaderMap::new();
        headers.typed_insert(Destination(self.url(dest_target, to)));
        if let Some(overwrite) = overwrite {
            headers.typed_insert(Overwrite(overwrite));
        }
        if let Some(token) = lock_token {
            headers.typed_insert(IfToken(token.to_owned()));
        }
        self.dispatcher
            .send(method(verb), &url, auth, headers, None)
            .await
    }

    pub async fn lock(
        &self,
        auth: &Auth,
        target: &DavTarget,
        path: &str,
        args: &LockArgs,
    ) -> Result<StoredResponse> {
        let url = self.url(target, path);
        let mut headers = HeaderMap::new();
        headers.typed_insert(ContentType::xml());
        if let Some(timeout) = &args.timeout {
            headers.typed_insert(timeout.clone());
        }
        if let Some(depth) = args.depth {
            headers.typed_insert(depth);
        }
        let body = Bytes::from(xml::lockinfo_body(args.scope.tag(), &args.owner));
        self.dispatcher
            .send(method("LOCK"), &url, auth, headers, Some(body))
            .await
    }

    pub async fn unlock(
        &self,
        auth: &Auth,
        target: &DavTarget,
        path: &str,
        token: &str,
    ) -> Result<StoredResponse> {
        let url = self.url(target, path);
        let mut headers = HeaderMap::new();
        headers.typed_insert(LockToken(token.to_owned()));
        self.dispatcher
            .send(method("UNLOCK"), &url, auth, headers, None)
            .await
    }

    /// REPORT listing the favorited files of a user (new DAV tree only).
    pub async fn report_favorites(&self, auth: &Auth, username: &str) -> Result<StoredResponse> {
        let url = self.url(&DavTarget::new_for(username), "");
        let mut headers = HeaderMap::new();
        headers.typed_insert(ContentType::xml());
        let body = Bytes::from(xml::favorites_report_body());
        self.dispatcher
            .send(method("REPORT"), &url, auth, headers, Some(body))
            .await
    }

    pub(crate) fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}
