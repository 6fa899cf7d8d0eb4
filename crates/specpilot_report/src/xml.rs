//! Minimal element tree built from `quick-xml` events.
//!
//! Reports are small, so building a tree first keeps the JUnit interpretation free of reader state.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::ReportParseError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated text and CDATA content, trimmed by the reader.
    pub text: String,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Parse a whole document into its root element.
///
/// ## Errors
/// - [`ReportParseError::Xml`] for syntax errors, mismatched or unclosed tags, and multiple roots.
/// - [`ReportParseError::Empty`] when the input holds no element at all.
pub fn parse_document(input: &str) -> Result<Element, ReportParseError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from(&start)?),
            Ok(Event::Empty(start)) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ReportParseError::Xml("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| ReportParseError::Xml(e.to_string()))?;
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(String::from_utf8_lossy(&data).trim());
                }
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions and doctypes carry no report data.
            Ok(_) => {}
            Err(e) => {
                return Err(ReportParseError::Xml(format!(
                    "{} at byte {}",
                    e,
                    reader.buffer_position()
                )));
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(ReportParseError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or(ReportParseError::Empty)
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, ReportParseError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ReportParseError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ReportParseError::Xml(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), ReportParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(ReportParseError::Xml(format!(
            "multiple root elements (second is <{}>)",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_nested_tree() {
        let doc = parse_document(r#"<?xml version="1.0"?><a x="1"><b/><c>hi</c><b y="2"/></a>"#).unwrap();
        assert_eq!(doc.name, "a");
        assert_eq!(doc.attr("x"), Some("1"));
        assert_eq!(doc.children.len(), 3);
        assert_eq!(doc.child("c").map(|c| c.text.as_str()), Some("hi"));
        assert_eq!(doc.children_named("b").count(), 2);
    }

    #[test]
    fn test_unescapes_text_and_attributes() {
        let doc = parse_document(r#"<a msg="x &lt; y">1 &amp; 2</a>"#).unwrap();
        assert_eq!(doc.attr("msg"), Some("x < y"));
        assert_eq!(doc.text, "1 & 2");
    }

    #[test]
    fn test_cdata_becomes_text() {
        let doc = parse_document("<a><![CDATA[ <raw> ]]></a>").unwrap();
        assert_eq!(doc.text, "<raw>");
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        assert!(matches!(parse_document("<a><b></a>"), Err(ReportParseError::Xml(_))));
    }

    #[test]
    fn test_unclosed_root_rejected() {
        assert!(matches!(parse_document("<a><b/>"), Err(ReportParseError::Xml(_))));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_document(""), Err(ReportParseError::Empty));
        assert_eq!(parse_document("<?xml version=\"1.0\"?>"), Err(ReportParseError::Empty));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        assert!(matches!(parse_document("<a/><b/>"), Err(ReportParseError::Xml(_))));
    }
}
