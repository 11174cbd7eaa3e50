//! WebDAV access to public link shares. Two conventions exist: the legacy
//! `public.php/webdav` endpoint authenticating with the link token as Basic
//! username, and the new `remote.php/dav/public-files/{token}` tree.

use crate::{
    dav::headers::Destination,
    errors::Result,
    http::{Auth, Dispatcher},
    response::StoredResponse,
    utils::encode_uri,
};
use ::headers::HeaderMapExt;
use bytes::Bytes;
use http::{HeaderMap, Method};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicEndpoint {
    Legacy,
    New,
}

#[derive(Clone)]
pub struct PublicClient {
    dispatcher: Arc<Dispatcher>,
    base_url: String,
}

impl PublicClient {
    pub fn new(dispatcher: Arc<Dispatcher>, base_url: &str) -> Self {
        PublicClient {
            dispatcher,
            base_url: base_url.to_owned(),
        }
    }

    pub fn url(&self, endpoint: PublicEndpoint, token: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        let root = match endpoint {
            PublicEndpoint::Legacy => format!("{}/public.php/webdav", self.base_url),
            PublicEndpoint::New => format!(
                "{}/remote.php/dav/public-files/{}",
                self.base_url,
                encode_uri(token)
            ),
        };
        if path.is_empty() {
            root
        } else {
            format!("{root}/{}", encode_uri(path))
        }
    }

    /// Credentials for a link: the legacy endpoint takes the token as the
    /// Basic username (password empty unless the link has one), the new
    /// endpoint takes the fixed `public` username with the link password.
    pub fn auth(&self, endpoint: PublicEndpoint, token: &str, password: Option<&str>) -> Auth {
        match endpoint {
            PublicEndpoint::Legacy => Auth::basic(token, password.unwrap_or("")),
            PublicEndpoint::New => match password {
                Some(password) => Auth::basic("public", password),
                None => Auth::None,
            },
        }
    }

    pub async fn get(
        &self,
        endpoint: PublicEndpoint,
        token: &str,
        password: Option<&str>,
        path: &str,
    ) -> Result<StoredResponse> {
        let url = self.url(endpoint, token, path);
        let auth = self.auth(endpoint, token, password);
        self.dispatcher
            .send(Method::GET, &url, &auth, HeaderMap::new(), None)
            .await
    }

    pub async fn put(
        &self,
        endpoint: PublicEndpoint,
        token: &str,
        password: Option<&str>,
        path: &str,
        content: Bytes,
    ) -> Result<StoredResponse> {
        let url = self.url(endpoint, token, path);
        let auth = self.auth(endpoint, token, password);
        self.dispatcher
            .send(Method::PUT, &url, &auth, HeaderMap::new(), Some(content))
            .await
    }

    pub async fn delete(
        &self,
        endpoint: PublicEndpoint,
        token: &str,
        password: Option<&str>,
        path: &str,
    ) -> Result<StoredResponse> {
        let url = self.url(endpoint, token, path);
        let auth = self.auth(endpoint, token, password);
        self.dispatcher
            .send(Method::DELETE, &url, &auth, HeaderMap::new(), None)
            .await
    }

    pub async fn mkcol(
        &self,
        endpoint: PublicEndpoint,
        token: &str,
        password: Option<&str>,
        path: &str,
    ) -> Result<StoredResponse> {
        let url = self.url(endpoint, token, path);
        let auth = self.auth(endpoint, token, password);
        self.dispatcher
            .send(
                Method::from_bytes(b"MKCOL").expect("MKCOL is a valid method"),
                &url,
                &auth,
                HeaderMap::new(),
                None,
            )
            .await
    }

    pub async fn propfind(
        &self,
        endpoint: PublicEndpoint,
        token: &str,
        password: Option<&str>,
        path: &str,
        depth: super::headers::Depth,
    ) -> Result<StoredResponse> {
        let url = self.url(endpoint, token, path);
        let auth = self.auth(endpoint, token, password);
        let mut headers = HeaderMap::new();
        headers.typed_insert(depth);
        let body = Bytes::from(super::xml::allprop_body());
        self.dispatcher
            .send(
                Method::from_bytes(b"PROPFIND").expect("PROPFIND is a valid method"),
                &url,
                &auth,
                headers,
                Some(body),
            )
            .await
    }

    pub async fn r#move(
        &self,
        endpoint: PublicEndpoint,
        token: &str,
        password: Option<&str>,
        from: &str,
        to: &str,
    ) -> Result<StoredResponse> {
        let url = self.url(endpoint, token, from);
        let auth = self.auth(endpoint, token, password);
        let mut headers = HeaderMap::new();
        headers.typed_insert(Destination(self.url(endpoint, token, to)));
        self.dispatcher
            .send(
                Method::from_bytes(b"MOVE").expect("MOVE is a valid method"),
                &url,
                &auth,
                headers,
                None,
            )
            .await
    }
}
