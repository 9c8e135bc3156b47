//! Placeholder compilation of template cells.

use memchr::{memchr, memchr3};

use crate::model::CellValue;
use crate::write::WriteBackend;

/// A `{...}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Placeholder {
    /// `{name}`
    Scalar(String),
    /// `{.field}`, `{prefix.field}`, `{prefix.}` and their trailing-dot forms
    List {
        prefix: Option<String>,
        field: Option<String>,
    },
}

/// What a list placeholder takes from one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListBinding<'a> {
    Element,
    Field(&'a str),
}

impl Placeholder {
    fn parse(inner: &str) -> Option<Self> {
        let inner = inner.trim();
        if inner.is_empty() {
            return None;
        }
        if !inner.contains('.') {
            return Some(Placeholder::Scalar(inner.to_string()));
        }
        let body = match inner.strip_suffix('.') {
            Some(body) if !body.ends_with('.') => body,
            Some(_) => return None,
            None => inner,
        };
        let (prefix, field) = match body.split_once('.') {
            Some((prefix, field)) => (prefix, Some(field)),
            None => (body, None),
        };
        Some(Placeholder::List {
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            field: field.filter(|f| !f.is_empty()).map(str::to_string),
        })
    }

    /// How this token binds to elements of the list named `list`, if at all.
    ///
    /// In an unnamed list, `{x.}` reads field `x` of each element.
    pub(crate) fn list_binding(&self, list: Option<&str>) -> Option<ListBinding<'_>> {
        let Placeholder::List { prefix, field } = self else {
            return None;
        };
        let bound = || field.as_deref().map_or(ListBinding::Element, ListBinding::Field);
        match (prefix.as_deref(), list) {
            (Some(prefix), Some(name)) if prefix == name => Some(bound()),
            (None, None) => Some(bound()),
            (Some(prefix), None) if field.is_none() => Some(ListBinding::Field(prefix)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Placeholder { token: Placeholder, raw: String },
}

/// A template cell holding at least one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TemplateCell {
    pub row: u32,
    pub col: u32,
    pub segments: Vec<Segment>,
}

impl TemplateCell {
    pub(crate) fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder { .. }))
    }

    pub(crate) fn binds_list(&self, list: Option<&str>) -> bool {
        self.segments.iter().any(|s| match s {
            Segment::Placeholder { token, .. } => token.list_binding(list).is_some(),
            Segment::Literal(_) => false,
        })
    }
}

fn push_literal(segments: &mut Vec<Segment>, literal: &mut String) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

/// Split cell text into literals and placeholders; `None` when the text holds
/// no placeholder. `\{` and `\}` stand for literal braces.
pub(crate) fn parse_cell(text: &str) -> Option<Vec<Segment>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while let Some(offset) = memchr3(b'{', b'}', b'\\', &bytes[pos..]) {
        let at = pos + offset;
        literal.push_str(&text[pos..at]);
        match bytes[at] {
            b'\\' => match bytes.get(at + 1) {
                Some(&brace) if brace == b'{' || brace == b'}' => {
                    literal.push(char::from(brace));
                    pos = at + 2;
                },
                _ => {
                    literal.push('\\');
                    pos = at + 1;
                },
            },
            b'}' => {
                literal.push('}');
                pos = at + 1;
            },
            _ => {
                let rest = &bytes[at + 1..];
                let close = memchr(b'}', rest).filter(|len| memchr(b'{', &rest[..*len]).is_none());
                let Some(len) = close else {
                    literal.push('{');
                    pos = at + 1;
                    continue;
                };
                let end = at + 1 + len;
                match Placeholder::parse(&text[at + 1..end]) {
                    Some(token) => {
                        push_literal(&mut segments, &mut literal);
                        segments.push(Segment::Placeholder {
                            token,
                            raw: text[at..=end].to_string(),
                        });
                    },
                    None => literal.push_str(&text[at..=end]),
                }
                pos = end + 1;
            },
        }
    }
    literal.push_str(&text[pos..]);
    push_literal(&mut segments, &mut literal);

    segments
        .iter()
        .any(|s| matches!(s, Segment::Placeholder { .. }))
        .then_some(segments)
}

/// Scan every text cell of a sheet once.
pub(crate) fn compile<B: WriteBackend + ?Sized>(backend: &B, sheet: usize) -> Vec<TemplateCell> {
    backend
        .cells(sheet)
        .into_iter()
        .filter_map(|(row, col)| {
            let cell = backend.cell(sheet, row, col)?;
            let text = match &cell.value {
                CellValue::String(s) | CellValue::DirectString(s) => s,
                _ => return None,
            };
            let segments = parse_cell(text)?;
            Some(TemplateCell { row, col, segments })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(name: &str) -> Placeholder {
        Placeholder::Scalar(name.to_string())
    }

    fn list(prefix: Option<&str>, field: Option<&str>) -> Placeholder {
        Placeholder::List {
            prefix: prefix.map(str::to_string),
            field: field.map(str::to_string),
        }
    }

    #[test]
    fn test_placeholder_grammar() {
        assert_eq!(Placeholder::parse("name"), Some(scalar("name")));
        assert_eq!(Placeholder::parse(" name "), Some(scalar("name")));
        assert_eq!(Placeholder::parse(".price"), Some(list(None, Some("price"))));
        assert_eq!(Placeholder::parse("item.price"), Some(list(Some("item"), Some("price"))));
        assert_eq!(Placeholder::parse("item.price."), Some(list(Some("item"), Some("price"))));
        assert_eq!(Placeholder::parse("list."), Some(list(Some("list"), None)));
        assert_eq!(Placeholder::parse("."), Some(list(None, None)));
        assert_eq!(Placeholder::parse(""), None);
        assert_eq!(Placeholder::parse("a.."), None);
    }

    #[test]
    fn test_list_binding() {
        let element = list(Some("list"), None);
        assert_eq!(element.list_binding(Some("list")), Some(ListBinding::Element));
        assert_eq!(element.list_binding(Some("other")), None);
        assert_eq!(element.list_binding(None), Some(ListBinding::Field("list")));

        let field = list(None, Some("price"));
        assert_eq!(field.list_binding(None), Some(ListBinding::Field("price")));
        assert_eq!(field.list_binding(Some("list")), None);
        assert_eq!(scalar("x").list_binding(None), None);
    }

    #[test]
    fn test_parse_cell_segments() {
        let segments = parse_cell("Total: {total} units").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("Total: ".to_string()),
                Segment::Placeholder {
                    token: scalar("total"),
                    raw: "{total}".to_string()
                },
                Segment::Literal(" units".to_string()),
            ]
        );
        assert!(parse_cell("no placeholders").is_none());
        assert!(parse_cell("{}").is_none());
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        assert!(parse_cell(r"\{name\}").is_none());
        let segments = parse_cell(r"\{x\} = {x}").unwrap();
        assert_eq!(segments[0], Segment::Literal("{x} = ".to_string()));
        assert!(matches!(&segments[1], Segment::Placeholder { token, .. } if *token == scalar("x")));
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(parse_cell("{open").is_none());
        let segments = parse_cell("{a {b}").unwrap();
        assert_eq!(segments[0], Segment::Literal("{a ".to_string()));
        assert_eq!(segments.len(), 2);
    }
}
