//! Parsing of DAV multistatus/lock bodies and building of the small XML
//! request bodies WebDAV operations carry. Parsing flattens properties to
//! local-name to text, which is all the assertion steps ever compare.

use crate::errors::Result;
use quick_xml::{Reader, escape::escape, events::Event};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PropstatBlock {
    /// Status line kept verbatim, e.g. `HTTP/1.1 200 OK`.
    pub status: String,
    pub props: HashMap<String, String>,
    pub is_collection: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResponseBlock {
    pub href: String,
    pub propstats: Vec<PropstatBlock>,
}

impl ResponseBlock {
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.propstats
            .iter()
            .find_map(|p| p.props.get(name))
            .map(String::as_str)
    }

    pub fn is_collection(&self) -> bool {
        self.propstats.iter().any(|p| p.is_collection)
    }
}

/// Parse a `DAV:multistatus` body. An empty multistatus (no responses) is
/// valid and yields an empty vector.
pub fn parse_multistatus(body: &[u8]) -> Result<Vec<ResponseBlock>> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut blocks: Vec<ResponseBlock> = Vec::new();
    let mut current: Option<ResponseBlock> = None;
    let mut propstat: Option<PropstatBlock> = None;
    let mut in_prop = false;
    let mut current_prop: Option<(String, String)> = None;
    let mut in_href = false;
    let mut in_status = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "response" => current = Some(ResponseBlock::default()),
                    "propstat" if current.is_some() => propstat = Some(PropstatBlock::default()),
                    "prop" if propstat.is_some() => in_prop = true,
                    "href" if current.is_some() && propstat.is_none() => in_href = true,
                    "status" if propstat.is_some() => in_status = true,
                    "collection" if in_prop => {
                        if let Some(p) = propstat.as_mut() {
                            p.is_collection = true;
                        }
                    }
                    _ if in_prop && current_prop.is_none() => {
                        current_prop = Some((name, String::new()));
                    }
                    // nested elements below a property keep accumulating
                    // into the same value
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if in_prop {
                    if name == "collection" {
                        if let Some(p) = propstat.as_mut() {
                            p.is_collection = true;
                        }
                    } else if current_prop.is_none() {
                        if let Some(p) = propstat.as_mut() {
                            p.props.insert(name, String::new());
                        }
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                if in_href {
                    if let Some(c) = current.as_mut() {
                        c.href.push_str(&text);
                    }
                } else if in_status {
                    if let Some(p) = propstat.as_mut() {
                        p.status.push_str(&text);
                    }
                } else if let Some((_, value)) = current_prop.as_mut() {
                    value.push_str(&text);
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "response" => {
                        if let Some(c) = current.take() {
                            blocks.push(c);
                        }
                    }
                    "propstat" => {
                        if let (Some(c), Some(p)) = (current.as_mut(), propstat.take()) {
                            c.propstats.push(p);
                        }
                    }
                    "prop" => in_prop = false,
                    "href" => in_href = false,
                    "status" => in_status = false,
                    _ => {
                        if let Some((prop_name, _)) = current_prop.as_ref() {
                            if *prop_name == name {
                                let (prop_name, value) = current_prop.take().unwrap();
                                if let Some(p) = propstat.as_mut() {
                                    p.props.insert(prop_name, value);
                                }
                            }
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(blocks)
}

/// Pull the lock token out of a LOCK response body
/// (`prop/lockdiscovery/activelock/locktoken/href`).
pub fn extract_lock_token(body: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_locktoken = false;
    let mut in_href = false;
    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"locktoken" => in_locktoken = true,
                b"href" if in_locktoken => in_href = true,
                _ => {}
            },
            Event::Text(t) if in_href => {
                return t.unescape().ok().map(|v| v.into_owned());
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"locktoken" => in_locktoken = false,
                b"href" => in_href = false,
                _ => {}
            },
            Event::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Server exception message from a `d:error` body (`s:message`).
pub fn extract_exception_message(body: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_message = false;
    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) if e.local_name().as_ref() == b"message" => in_message = true,
            Event::Text(t) if in_message => {
                return t.unescape().ok().map(|v| v.into_owned());
            }
            Event::End(e) if e.local_name().as_ref() == b"message" => in_message = false,
            Event::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// PROPFIND body for an explicit property list. Names without a namespace
/// prefix get the `d:` (DAV:) prefix.
pub fn propfind_body(props: &[&str]) -> String {
    if props.is_empty() {
        return allprop_body();
    }
    let props = props
        .iter()
        .map(|p| {
            let name = if p.contains(':') {
                (*p).to_owned()
            } else {
                format!("d:{p}")
            };
            format!("<{name}/>")
        })
        .collect::<String>();
    format!(
        r#"<?xml version="1.0"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
<d:prop>{props}</d:prop>
</d:propfind>"#
    )
}

pub fn allprop_body() -> String {
    r#"<?xml version="1.0"?>
<d:propfind xmlns:d="DAV:"><d:allprop/></d:propfind>"#
        .to_owned()
}

pub fn lockinfo_body(scope_tag: &str, owner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<d:lockinfo xmlns:d="DAV:">
<d:lockscope><d:{scope_tag}/></d:lockscope>
<d:locktype><d:write/></d:locktype>
<d:owner><d:href>{}</d:href></d:owner>
</d:lockinfo>"#,
        escape(owner)
    )
}

pub fn proppatch_body(set: &[(&str, &str)]) -> String {
    let props = set
        .iter()
        .map(|(name, value)| {
            let name = if name.contains(':') {
                (*name).to_owned()
            } else {
                format!("oc:{name}")
            };
            format!("<{name}>{}</{}>", escape(*value), name)
        })
        .collect::<String>();
    format!(
        r#"<?xml version="1.0"?>
<d:propertyupdate xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
<d:set><d:prop>{props}</d:prop></d:set>
</d:propertyupdate>"#
    )
}

/// REPORT body selecting favorited files.
pub fn favorites_report_body() -> String {
    r#"<?xml version="1.0"?>
<oc:filter-files xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
<oc:filter-rules><oc:favorite>1</oc:favorite></oc:filter-rules>
</oc:filter-files>"#
        .to_owned()
}
