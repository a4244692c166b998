/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::{NodeRecord, ResolveError};

const LIST_NODES_OP: &str = "list-nodes";

/// Encode the list nodes request, delimiter included.
pub(super) fn encode_request(reference: &str) -> Vec<u8> {
    let s = format!(
        "<request op=\"{LIST_NODES_OP}\" reference=\"{}\"/>",
        quick_xml::escape::escape(reference)
    );
    let mut buf = s.into_bytes();
    buf.push(b'\0');
    buf
}

fn is_true(s: &str) -> bool {
    matches!(
        s.to_lowercase().as_str(),
        "true" | "on" | "yes" | "y" | "1"
    )
}

/// One `<nodes>` response document addressed to our request.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct NodesFragment {
    pub(super) is_final: bool,
    pub(super) rc: i32,
    pub(super) nodes: Vec<NodeRecord>,
}

impl NodesFragment {
    fn new() -> Self {
        NodesFragment {
            is_final: false,
            rc: 0,
            nodes: Vec::new(),
        }
    }

    /// Parse one response message.
    ///
    /// Documents whose root carries no reference, or another one, are not
    /// validated any further and yield `None`.
    pub(super) fn parse(msg: &[u8], reference: &str) -> Result<Option<Self>, ResolveError> {
        let s = std::str::from_utf8(msg).map_err(ResolveError::parse)?;
        let mut reader = Reader::from_str(s);
        reader.config_mut().trim_text(true);

        let mut fragment = NodesFragment::new();
        let mut depth = 0usize;
        loop {
            match reader.read_event().map_err(ResolveError::parse)? {
                Event::Start(e) => {
                    if depth == 0 {
                        if root_reference(&e).as_deref() != Some(reference) {
                            return Ok(None);
                        }
                        fragment.set_root(&e)?;
                    } else if depth == 1 && e.name().as_ref() == b"node" {
                        fragment.nodes.push(parse_node(&e)?);
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        if root_reference(&e).as_deref() != Some(reference) {
                            return Ok(None);
                        }
                        fragment.set_root(&e)?;
                        return Ok(Some(fragment));
                    } else if depth == 1 && e.name().as_ref() == b"node" {
                        fragment.nodes.push(parse_node(&e)?);
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(Some(fragment));
                    }
                }
                Event::Eof => {
                    return if depth > 0 {
                        Err(ResolveError::ParseError(
                            "unterminated nodes document".to_string(),
                        ))
                    } else {
                        Err(ResolveError::ParseError("no root element".to_string()))
                    };
                }
                _ => {}
            }
        }
    }

    fn set_root(&mut self, e: &BytesStart) -> Result<(), ResolveError> {
        if e.name().as_ref() != b"nodes" {
            return Err(ResolveError::ParseError(format!(
                "unexpected root element {}",
                String::from_utf8_lossy(e.name().as_ref())
            )));
        }
        for attr in e.attributes() {
            let attr = attr.map_err(ResolveError::parse)?;
            match attr.key.as_ref() {
                b"final" => {
                    let value = attr.unescape_value().map_err(ResolveError::parse)?;
                    self.is_final = is_true(&value);
                }
                b"rc" => {
                    let value = attr.unescape_value().map_err(ResolveError::parse)?;
                    self.rc = i32::from_str(value.trim())
                        .map_err(|_| ResolveError::ParseError(format!("invalid rc {value}")))?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn root_reference(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"reference")
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn parse_node(e: &BytesStart) -> Result<NodeRecord, ResolveError> {
    let mut id = None;
    let mut uname = None;
    for attr in e.attributes() {
        let attr = attr.map_err(ResolveError::parse)?;
        match attr.key.as_ref() {
            b"id" => id = Some(attr.unescape_value().map_err(ResolveError::parse)?.into_owned()),
            b"uname" => {
                uname = Some(attr.unescape_value().map_err(ResolveError::parse)?.into_owned())
            }
            _ => {}
        }
    }
    match (id, uname) {
        (Some(id), Some(uname)) if !id.is_empty() => Ok(NodeRecord::new(id, uname)),
        _ => Err(ResolveError::ParseError(
            "node element without id or uname".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request() {
        let buf = encode_request("g3nodes-1-2");
        assert_eq!(
            buf,
            b"<request op=\"list-nodes\" reference=\"g3nodes-1-2\"/>\0"
        );

        let buf = encode_request("a\"<b");
        assert_eq!(
            buf,
            b"<request op=\"list-nodes\" reference=\"a&quot;&lt;b\"/>\0"
        );
    }

    #[test]
    fn parse_fragment() {
        let msg = br#"<nodes reference="r-1" final="yes">
            <node id="1" uname="alpha" state="member"/>
            <node id="2" uname="beta"><extra/></node>
            <other id="3" uname="gamma"/>
        </nodes>"#;
        let fragment = NodesFragment::parse(msg, "r-1").unwrap().unwrap();
        assert!(fragment.is_final);
        assert_eq!(fragment.rc, 0);
        assert_eq!(
            fragment.nodes,
            vec![
                NodeRecord::new("1".to_string(), "alpha".to_string()),
                NodeRecord::new("2".to_string(), "beta".to_string()),
            ]
        );
    }

    #[test]
    fn parse_empty_root() {
        let fragment = NodesFragment::parse(br#"<nodes reference="r-2" rc="-6"/>"#, "r-2")
            .unwrap()
            .unwrap();
        assert!(!fragment.is_final);
        assert_eq!(fragment.rc, -6);
        assert!(fragment.nodes.is_empty());

        let fragment =
            NodesFragment::parse(b"<?xml version=\"1.0\"?><nodes reference=\"r-3\"/>", "r-3")
                .unwrap();
        assert!(fragment.is_some());
    }

    #[test]
    fn parse_other_reference() {
        let msg = br#"<nodes reference="r-9" rc="x"><node id="9"/></nodes>"#;
        assert_eq!(NodesFragment::parse(msg, "r-1"), Ok(None));
        assert_eq!(
            NodesFragment::parse(b"<nodes><node id=\"1\"/>", "r-1"),
            Ok(None)
        );
        assert_eq!(
            NodesFragment::parse(b"<nodes final=\"true\"/>", "r-1"),
            Ok(None)
        );
    }

    #[test]
    fn parse_err() {
        let p = |msg: &[u8]| NodesFragment::parse(msg, "r-1");
        assert!(p(b"").is_err());
        assert!(p(b"<request reference=\"r-1\"/>").is_err());
        assert!(p(b"<nodes reference=\"r-1\"><node id=\"1\"/></nodes>").is_err());
        assert!(p(b"<nodes reference=\"r-1\"><node id=\"1\" uname=\"a\"/>").is_err());
        assert!(p(b"<nodes reference=\"r-1\" rc=\"x\"/>").is_err());
        assert!(p(b"<nodes reference=\"r-1\"></node>").is_err());
        assert!(p(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn true_values() {
        for s in ["true", "TRUE", "on", "yes", "y", "1"] {
            assert!(is_true(s));
        }
        for s in ["false", "0", "", "no"] {
            assert!(!is_true(s));
        }
    }
}
