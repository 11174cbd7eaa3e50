//! Typed headers for the WebDAV and ownCloud header families the harness
//! sends and asserts on.

use headers::Header;
use http::header::{HeaderName, HeaderValue};

static DEPTH: HeaderName = HeaderName::from_static("depth");
static OVERWRITE: HeaderName = HeaderName::from_static("overwrite");
static DESTINATION: HeaderName = HeaderName::from_static("destination");
static LOCK_TOKEN: HeaderName = HeaderName::from_static("lock-token");
static IF: HeaderName = HeaderName::from_static("if");
static TIMEOUT: HeaderName = HeaderName::from_static("timeout");
static OC_MTIME: HeaderName = HeaderName::from_static("x-oc-mtime");
static OC_TOTAL_LENGTH: HeaderName = HeaderName::from_static("oc-total-length");
static OC_CHUNKED: HeaderName = HeaderName::from_static("oc-chunked");
static OC_CHECKSUM: HeaderName = HeaderName::from_static("oc-checksum");

// helper.
fn one<'i, I>(values: &mut I) -> Result<&'i HeaderValue, headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let v = values.next().ok_or_else(invalid)?;
    if values.next().is_some() {
        Err(invalid())
    } else {
        Ok(v)
    }
}

// helper
fn invalid() -> headers::Error {
    headers::Error::invalid()
}

fn str_value(value: &HeaderValue) -> Result<&str, headers::Error> {
    value.to_str().map_err(|_| invalid())
}

/// Depth: header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Header for Depth {
    fn name() -> &'static HeaderName {
        &DEPTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?;
        match value.as_bytes() {
            b"0" => Ok(Depth::Zero),
            b"1" => Ok(Depth::One),
            b"infinity" | b"Infinity" => Ok(Depth::Infinity),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = match *self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "Infinity",
        };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overwrite(pub bool);

impl Header for Overwrite {
    fn name() -> &'static HeaderName {
        &OVERWRITE
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let line = one(values)?;
        match line.as_bytes() {
            b"F" => Ok(Overwrite(false)),
            b"T" => Ok(Overwrite(true)),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = match self.0 {
            true => "T",
            false => "F",
        };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

/// Destination: header, carried as the full target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination(pub String);

impl Header for Destination {
    fn name() -> &'static HeaderName {
        &DESTINATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        Ok(Destination(str_value(one(values)?)?.to_owned()))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

/// Lock-Token: header. The angle brackets around the token are part of the
/// wire format, not of the stored token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(pub String);

impl Header for LockToken {
    fn name() -> &'static HeaderName {
        &LOCK_TOKEN
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = str_value(one(values)?)?;
        let token = value
            .strip_prefix('<')
            .and_then(|v| v.strip_suffix('>'))
            .ok_or_else(invalid)?;
        Ok(LockToken(token.to_owned()))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&format!("<{}>", self.0)) {
            values.extend(std::iter::once(value));
        }
    }
}

/// If: header carrying a single lock token condition, `(<token>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfToken(pub String);

impl Header for IfToken {
    fn name() -> &'static HeaderName {
        &IF
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = str_value(one(values)?)?;
        let token = value
            .strip_prefix("(<")
            .and_then(|v| v.strip_suffix(">)"))
            .ok_or_else(invalid)?;
        Ok(IfToken(token.to_owned()))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&format!("(<{}>)", self.0)) {
            values.extend(std::iter::once(value));
        }
    }
}

/// Timeout: header on LOCK requests, `Second-N` or `Infinite`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockTimeout {
    Seconds(u64),
    Infinite,
}

impl Header for LockTimeout {
    fn name() -> &'static HeaderName {
        &TIMEOUT
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = str_value(one(values)?)?;
        if value == "Infinite" {
            return Ok(LockTimeout::Infinite);
        }
        let seconds = value
            .strip_prefix("Second-")
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        Ok(LockTimeout::Seconds(seconds))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = match self {
            LockTimeout::Seconds(s) => format!("Second-{s}"),
            LockTimeout::Infinite => "Infinite".to_owned(),
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            values.extend(std::iter::once(value));
        }
    }
}

/// X-OC-Mtime: header, the client-supplied modification time (unix seconds).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OcMtime(pub i64);

impl Header for OcMtime {
    fn name() -> &'static HeaderName {
        &OC_MTIME
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = str_value(one(values)?)?;
        value.parse().map(OcMtime).map_err(|_| invalid())
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&self.0.to_string()) {
            values.extend(std::iter::once(value));
        }
    }
}

/// OC-Total-Length: header, the announced final size of a chunked upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OcTotalLength(pub u64);

impl Header for OcTotalLength {
    fn name() -> &'static HeaderName {
        &OC_TOTAL_LENGTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = str_value(one(values)?)?;
        value.parse().map(OcTotalLength).map_err(|_| invalid())
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&self.0.to_string()) {
            values.extend(std::iter::once(value));
        }
    }
}

/// OC-Chunked: marker header of the old (v1) chunking convention.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OcChunked;

impl Header for OcChunked {
    fn name() -> &'static HeaderName {
        &OC_CHUNKED
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        match one(values)?.as_bytes() {
            b"1" => Ok(OcChunked),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        values.extend(std::iter::once(HeaderValue::from_static("1")));
    }
}

/// OC-Checksum: header, e.g. `SHA256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcChecksum(pub String);

impl Header for OcChecksum {
    fn name() -> &'static HeaderName {
        &OC_CHECKSUM
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        Ok(OcChecksum(str_value(one(values)?)?.to_owned()))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}
