use crate::{
    dav::xml::{self, ResponseBlock},
    errors::{HarnessError, Result},
    utils::decode_uri,
};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::{borrow::Cow, sync::OnceLock, time::Duration};

/// The single "last response" slot content: status, headers, body bytes and
/// elapsed time, overwritten by every request. Parsed views are cached on
/// first access so several assertion steps can re-read the same body.
#[derive(Debug)]
pub struct StoredResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub elapsed: Duration,
    json: OnceLock<Value>,
}

impl StoredResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, elapsed: Duration) -> Self {
        StoredResponse {
            status,
            headers,
            body,
            elapsed,
            json: OnceLock::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_string(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json(&self) -> Result<&Value> {
        if let Some(value) = self.json.get() {
            return Ok(value);
        }
        let value: Value = serde_json::from_slice(&self.body)?;
        Ok(self.json.get_or_init(|| value))
    }

    /// Dotted-path extraction, e.g. `ocs.meta.statuscode` or `value.0.id`.
    /// Numeric segments index into arrays.
    pub fn json_path(&self, path: &str) -> Result<&Value> {
        let mut current = self.json()?;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| {
                HarnessError::Assertion(format!(
                    "JSON path `{path}` not found in response body (stuck at `{segment}`)"
                ))
            })?;
        }
        Ok(current)
    }

    pub fn json_path_string(&self, path: &str) -> Result<String> {
        let value = self.json_path(path)?;
        Ok(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn multistatus(&self) -> Result<Vec<ResponseBlock>> {
        xml::parse_multistatus(&self.body)
    }

    pub fn assert_status(&self, expected: u16) -> Result<()> {
        if self.status.as_u16() != expected {
            return Err(HarnessError::Assertion(format!(
                "expected status {expected} but got {} (body: {})",
                self.status.as_u16(),
                truncate(&self.body_string())
            )));
        }
        Ok(())
    }

    pub fn assert_status_in(&self, expected: &[u16]) -> Result<()> {
        if !expected.contains(&self.status.as_u16()) {
            return Err(HarnessError::Assertion(format!(
                "expected status in {expected:?} but got {} (body: {})",
                self.status.as_u16(),
                truncate(&self.body_string())
            )));
        }
        Ok(())
    }

    pub fn assert_header(&self, name: &str, expected: &str) -> Result<()> {
        match self.header(name) {
            Some(value) if value == expected => Ok(()),
            Some(value) => Err(HarnessError::Assertion(format!(
                "expected header `{name}: {expected}` but got `{value}`"
            ))),
            None => Err(HarnessError::Assertion(format!(
                "expected header `{name}: {expected}` but the header is absent"
            ))),
        }
    }

    pub fn assert_body_contains(&self, needle: &str) -> Result<()> {
        if !self.body_string().contains(needle) {
            return Err(HarnessError::Assertion(format!(
                "expected body to contain `{needle}` (body: {})",
                truncate(&self.body_string())
            )));
        }
        Ok(())
    }

    pub fn assert_json_path_eq(&self, path: &str, expected: &str) -> Result<()> {
        let actual = self.json_path_string(path)?;
        if actual != expected {
            return Err(HarnessError::Assertion(format!(
                "expected `{expected}` at JSON path `{path}` but got `{actual}`"
            )));
        }
        Ok(())
    }

    pub fn assert_href_present(&self, href: &str) -> Result<()> {
        let blocks = self.multistatus()?;
        if !blocks.iter().any(|b| href_matches(&b.href, href)) {
            return Err(HarnessError::Assertion(format!(
                "expected multistatus to contain href `{href}`, found: {:?}",
                blocks.iter().map(|b| b.href.as_str()).collect::<Vec<_>>()
            )));
        }
        Ok(())
    }

    pub fn assert_href_absent(&self, href: &str) -> Result<()> {
        let blocks = self.multistatus()?;
        if blocks.iter().any(|b| href_matches(&b.href, href)) {
            return Err(HarnessError::Assertion(format!(
                "expected multistatus not to contain href `{href}`"
            )));
        }
        Ok(())
    }

    /// Property value equality for one href of a multistatus body.
    pub fn assert_prop_value(&self, href: &str, prop: &str, expected: &str) -> Result<()> {
        let blocks = self.multistatus()?;
        let block = blocks
            .iter()
            .find(|b| href_matches(&b.href, href))
            .ok_or_else(|| {
                HarnessError::Assertion(format!("no multistatus response for href `{href}`"))
            })?;
        for propstat in &block.propstats {
            if let Some(actual) = propstat.props.get(prop) {
                if actual == expected {
                    return Ok(());
                }
                return Err(HarnessError::Assertion(format!(
                    "expected prop `{prop}` of `{href}` to be `{expected}` but got `{actual}`"
                )));
            }
        }
        Err(HarnessError::Assertion(format!(
            "prop `{prop}` not found for href `{href}`"
        )))
    }

    pub fn assert_propstat_status(&self, href: &str, status_line: &str) -> Result<()> {
        let blocks = self.multistatus()?;
        let block = blocks
            .iter()
            .find(|b| href_matches(&b.href, href))
            .ok_or_else(|| {
                HarnessError::Assertion(format!("no multistatus response for href `{href}`"))
            })?;
        if !block.propstats.iter().any(|p| p.status == status_line) {
            return Err(HarnessError::Assertion(format!(
                "expected propstat status `{status_line}` for href `{href}`, found: {:?}",
                block
                    .propstats
                    .iter()
                    .map(|p| p.status.as_str())
                    .collect::<Vec<_>>()
            )));
        }
        Ok(())
    }
}

/// Href comparison is percent-decoding aware and tolerant of the DAV path
/// prefix: the expected value may be the bare resource path.
fn href_matches(href: &str, expected: &str) -> bool {
    let href = decode_uri(href).unwrap_or_else(|| Cow::Borrowed(href));
    let expected = decode_uri(expected).unwrap_or_else(|| Cow::Borrowed(expected));
    let href = href.trim_end_matches('/');
    let expected = expected.trim_end_matches('/');
    href == expected || href.ends_with(&format!("/{}", expected.trim_start_matches('/')))
}

fn truncate(body: &str) -> &str {
    body.get(..256).unwrap_or(body)
}
