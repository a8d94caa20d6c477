// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Streaming XML walker shared by the TCX and GPX decoders.

use super::DecodeError;
use crate::models::FileType;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Position in the document: element names from the root down,
/// namespace prefixes removed.
pub(crate) struct Element<'a> {
    path: &'a [String],
    attributes: &'a [(String, String)],
}

impl Element<'_> {
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// True when the innermost elements match `suffix`.
    pub fn ends_with(&self, suffix: &[&str]) -> bool {
        self.path.len() >= suffix.len()
            && self.path[self.path.len() - suffix.len()..]
                .iter()
                .zip(suffix)
                .all(|(a, b)| a == b)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub(crate) enum XmlNode<'a> {
    Open(Element<'a>),
    Text(Element<'a>, &'a str),
    Close(Element<'a>),
}

/// Walk every element of `bytes`, rejecting documents whose root element
/// is not `expected_root`.
pub(crate) fn walk<F>(
    bytes: &[u8],
    file_type: FileType,
    expected_root: &str,
    mut visit: F,
) -> Result<(), DecodeError>
where
    F: FnMut(XmlNode<'_>) -> Result<(), DecodeError>,
{
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut saw_root = false;
    let no_attributes: Vec<(String, String)> = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|_| {
            DecodeError::malformed(
                file_type,
                format!("XML syntax error near byte {}", reader.buffer_position()),
            )
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = local_name(e);
                if path.is_empty() {
                    if saw_root || name != expected_root {
                        return Err(DecodeError::not_supported(
                            file_type,
                            format!("expected <{}> root element", expected_root),
                        ));
                    }
                    saw_root = true;
                }
                let attributes = read_attributes(e, file_type)?;
                path.push(name);
                visit(XmlNode::Open(Element {
                    path: &path,
                    attributes: &attributes,
                }))?;
                if matches!(event, Event::Empty(_)) {
                    visit(XmlNode::Close(Element {
                        path: &path,
                        attributes: &attributes,
                    }))?;
                    path.pop();
                }
            }
            Event::End(_) => {
                visit(XmlNode::Close(Element {
                    path: &path,
                    attributes: &no_attributes,
                }))?;
                path.pop();
            }
            Event::Text(ref t) => {
                if !path.is_empty() {
                    let text = t.unescape().map_err(|_| {
                        DecodeError::malformed(file_type, "invalid character reference")
                    })?;
                    visit(XmlNode::Text(
                        Element {
                            path: &path,
                            attributes: &no_attributes,
                        },
                        &text,
                    ))?;
                }
            }
            Event::CData(ref c) => {
                if !path.is_empty() {
                    let text = String::from_utf8_lossy(c);
                    visit(XmlNode::Text(
                        Element {
                            path: &path,
                            attributes: &no_attributes,
                        },
                        text.trim(),
                    ))?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(DecodeError::not_supported(
            file_type,
            format!("expected <{}> root element", expected_root),
        ));
    }
    if !path.is_empty() {
        return Err(DecodeError::malformed(file_type, "unexpected end of document"));
    }
    Ok(())
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn read_attributes(
    e: &BytesStart<'_>,
    file_type: FileType,
) -> Result<Vec<(String, String)>, DecodeError> {
    e.attributes()
        .map(|attr| {
            let attr =
                attr.map_err(|_| DecodeError::malformed(file_type, "invalid attribute"))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|_| DecodeError::malformed(file_type, "invalid attribute value"))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

/// Parse an XML timestamp (RFC 3339, with or without offset).
pub(crate) fn parse_timestamp(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let text = text.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    // Some devices omit the zone designator; treat those as UTC.
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
