//! Small quick-xml helpers shared by the part parsers.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesRef, BytesStart, BytesText};

use crate::common::Result;

pub(crate) fn reader<R: BufRead>(input: R) -> Reader<R> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(false);
    reader
}

#[inline]
pub(crate) fn attr_val(attr: &Attribute<'_>) -> String {
    let raw = String::from_utf8_lossy(attr.value.as_ref());
    quick_xml::escape::unescape(&raw)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.into_owned())
}

/// Value of the attribute whose local name is `key`.
pub(crate) fn attr(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr_val(&attr)));
        }
    }
    Ok(None)
}

#[inline]
pub(crate) fn push_text(out: &mut String, text: &BytesText<'_>) {
    let raw = String::from_utf8_lossy(text);
    match quick_xml::escape::unescape(&raw) {
        Ok(value) => out.push_str(&value),
        Err(_) => out.push_str(&raw),
    }
}

/// Append the character an entity reference stands for.
pub(crate) fn push_entity(out: &mut String, entity: &BytesRef<'_>) {
    if let Ok(Some(ch)) = entity.resolve_char_ref() {
        out.push(ch);
        return;
    }
    let name = String::from_utf8_lossy(entity);
    match quick_xml::escape::resolve_predefined_entity(&name) {
        Some(value) => out.push_str(value),
        None => {
            out.push('&');
            out.push_str(&name);
            out.push(';');
        },
    }
}

/// Parse a 1-based OOXML boolean attribute.
pub(crate) fn is_true(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Resolve a relationship target against the directory of its source part.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in target.split('/') {
        match part {
            "." | "" => {},
            ".." => {
                segments.pop();
            },
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relationships part path of a source part (`xl/worksheets/sheet1.xml` ->
/// `xl/worksheets/_rels/sheet1.xml.rels`).
pub(crate) fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

pub(crate) fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map_or("", |(dir, _)| dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl/worksheets", "../comments1.xml"), "xl/comments1.xml");
        assert_eq!(resolve_target("xl", "/xl/styles.xml"), "xl/styles.xml");
    }

    #[test]
    fn test_rels_path() {
        assert_eq!(
            rels_path("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
        assert_eq!(parent_dir("xl/workbook.xml"), "xl");
    }
}
