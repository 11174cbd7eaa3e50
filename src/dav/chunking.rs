//! The two historical chunked-upload conventions. Chunks go out strictly
//! sequentially in the order given by the caller, with no retries and no
//! partial-failure recovery: the final PUT/MOVE response is the operation
//! result and the caller asserts on it.

use crate::{
    dav::{DavClient, DavTarget, PutOptions, headers::OcMtime, uploads_url},
    errors::{HarnessError, Result},
    http::Auth,
    response::StoredResponse,
};
use ::headers::HeaderMapExt;
use bytes::Bytes;
use http::{HeaderMap, Method};
use rand::Rng;

/// Split a payload into `count` roughly-equal chunks. Convenience for tests
/// that do not pin chunk boundaries themselves.
pub fn split_into_chunks(data: &[u8], count: usize) -> Vec<Bytes> {
    let count = count.max(1);
    let chunk_size = data.len().div_ceil(count);
    if chunk_size == 0 {
        return vec![Bytes::new()];
    }
    data.chunks(chunk_size).map(Bytes::copy_from_slice).collect()
}

/// Tests traditionally pin the transfer id to 42; everyone else gets a
/// random one.
pub fn random_transfer_id() -> u64 {
    rand::rng().random_range(1..=u64::MAX)
}

impl DavClient {
    /// Old (v1) chunking: each chunk `i` of `n` goes to
    /// `remote.php/webdav/{file}-chunking-{transfer_id}-{n}-{i}` with
    /// `OC-Chunked: 1` and `OC-Total-Length`. The last chunk's response is
    /// returned.
    pub async fn upload_chunked_v1(
        &self,
        auth: &Auth,
        file: &str,
        chunks: &[Bytes],
        transfer_id: u64,
    ) -> Result<StoredResponse> {
        let total: u64 = chunks.iter().map(|c| c.len() as u64).sum();
        let count = chunks.len();
        let mut last = None;
        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_path = format!("{file}-chunking-{transfer_id}-{count}-{index}");
            let options = PutOptions {
                chunked: true,
                total_length: Some(total),
                ..Default::default()
            };
            last = Some(
                self.put(auth, &DavTarget::Old, &chunk_path, chunk.clone(), &options)
                    .await?,
            );
        }
        last.ok_or_else(|| {
            HarnessError::Assertion("a chunked upload needs at least one chunk".to_owned())
        })
    }

    /// New (v2) chunking: MKCOL an upload collection, PUT the numbered chunk
    /// files into it, then MOVE the special `.file` member onto the
    /// destination. The MOVE response is returned.
    pub async fn upload_chunked_v2(
        &self,
        auth: &Auth,
        username: &str,
        destination: &str,
        chunks: &[(String, Bytes)],
        upload_id: &str,
        mtime: Option<i64>,
    ) -> Result<StoredResponse> {
        let collection_url = uploads_url(self.base_url(), username, upload_id, "");
        self.dispatcher()
            .send(
                Method::from_bytes(b"MKCOL").expect("MKCOL is a valid method"),
                &collection_url,
                auth,
                HeaderMap::new(),
                None,
            )
            .await?;

        let total: u64 = chunks.iter().map(|(_, c)| c.len() as u64).sum();
        for (name, chunk) in chunks {
            let chunk_url = uploads_url(self.base_url(), username, upload_id, name);
            self.dispatcher()
                .send(
                    Method::PUT,
                    &chunk_url,
                    auth,
                    HeaderMap::new(),
                    Some(chunk.clone()),
                )
                .await?;
        }

        let source_url = uploads_url(self.base_url(), username, upload_id, ".file");
        let mut headers = HeaderMap::new();
        headers.typed_insert(super::headers::Destination(
            self.url(&DavTarget::new_for(username), destination),
        ));
        headers.typed_insert(super::headers::OcTotalLength(total));
        if let Some(mtime) = mtime {
            headers.typed_insert(OcMtime(mtime));
        }
        self.dispatcher()
            .send(
                Method::from_bytes(b"MOVE").expect("MOVE is a valid method"),
                &source_url,
                auth,
                headers,
                None,
            )
            .await
    }
}
