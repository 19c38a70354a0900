//! XML output formatter backed by `quick-xml`.
//!
//! Objects become nested elements named after their keys, array items repeat
//! the enclosing element name, scalars become text and `null` becomes an empty
//! element. Keys that are not valid XML names (`items[0].Name`, `""`) are
//! rewritten with `_` in place of the offending characters.

use std::borrow::Cow;

use bytes::Bytes;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::Value;

use super::formatter::{FormatError, OutputFormatter, WriteContext};
use super::media_type::MediaType;

/// `application/xml`, `text/xml` and `application/*+xml`.
pub struct XmlFormatter {
    supported: Vec<MediaType>,
}

impl Default for XmlFormatter {
    fn default() -> Self {
        Self {
            supported: ["application/xml", "text/xml", "application/*+xml"]
                .iter()
                .filter_map(|raw| MediaType::parse(raw))
                .collect(),
        }
    }
}

impl OutputFormatter for XmlFormatter {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn supported_media_types(&self) -> &[MediaType] {
        &self.supported
    }

    fn can_write_value(&self, _value: &Value) -> bool {
        true
    }

    fn write(&self, ctx: &WriteContext<'_>) -> Result<Bytes, FormatError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_err)?;

        let mut root = BytesStart::new(ctx.root_element);
        if let Some(ns) = ctx.namespace {
            root.push_attribute(("xmlns", ns));
        }
        write_content(&mut writer, root, ctx.root_element, ctx.value)?;

        Ok(Bytes::from(writer.into_inner()))
    }
}

#[allow(clippy::needless_pass_by_value)] // used as a `map_err` adapter
fn xml_err<E: std::fmt::Display>(e: E) -> FormatError {
    FormatError::Xml(e.to_string())
}

/// `key` as an XML element name.
fn element_name(key: &str) -> Cow<'_, str> {
    let is_name_char = |c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.');
    let starts_well = key
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    if starts_well && key.chars().all(is_name_char) {
        return Cow::Borrowed(key);
    }

    let mut name = String::with_capacity(key.len() + 1);
    if !starts_well {
        name.push('_');
    }
    name.extend(key.chars().map(|c| if is_name_char(c) { c } else { '_' }));
    Cow::Owned(name)
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), FormatError> {
    if let Value::Array(items) = value {
        for item in items {
            write_element(writer, name, item)?;
        }
        return Ok(());
    }
    write_content(writer, BytesStart::new(name), name, value)
}

fn write_content(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    name: &str,
    value: &Value,
) -> Result<(), FormatError> {
    let text = match value {
        Value::Null => {
            return writer.write_event(Event::Empty(start)).map_err(xml_err);
        }
        Value::Object(map) => {
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            for (key, child) in map {
                write_element(writer, &element_name(key), child)?;
            }
            return writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_err);
        }
        Value::Array(items) => {
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            for item in items {
                write_element(writer, "item", item)?;
            }
            return writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_err);
        }
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
    };

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)
}
