use std::borrow::Cow;

use ego_tree::{NodeMut, NodeRef};
use scraper::{ElementRef, Html, Node};
use tracing::{debug, warn};

use crate::error::{TableError, TableResult};
use crate::markup::{parse_document, ParsedDocument};

/// Anything a table can be extracted from
#[derive(Debug, Clone)]
pub enum HtmlSource<'a> {
    /// Raw markup, parsed leniently or strictly
    Markup(Cow<'a, str>),
    /// An already parsed document, used as-is
    Document(&'a Html),
    /// A single element, imported into a fresh document
    Element(ElementRef<'a>),
}

impl<'a> From<&'a str> for HtmlSource<'a> {
    fn from(markup: &'a str) -> Self {
        HtmlSource::Markup(Cow::Borrowed(markup))
    }
}

impl<'a> From<&'a String> for HtmlSource<'a> {
    fn from(markup: &'a String) -> Self {
        HtmlSource::Markup(Cow::Borrowed(markup.as_str()))
    }
}

impl From<String> for HtmlSource<'_> {
    fn from(markup: String) -> Self {
        HtmlSource::Markup(Cow::Owned(markup))
    }
}

impl<'a> From<&'a [u8]> for HtmlSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        HtmlSource::Markup(String::from_utf8_lossy(bytes))
    }
}

impl From<Vec<u8>> for HtmlSource<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(markup) => HtmlSource::Markup(Cow::Owned(markup)),
            Err(e) => HtmlSource::Markup(Cow::Owned(
                String::from_utf8_lossy(e.as_bytes()).into_owned(),
            )),
        }
    }
}

impl<'a> From<&'a Html> for HtmlSource<'a> {
    fn from(document: &'a Html) -> Self {
        HtmlSource::Document(document)
    }
}

impl<'a> From<ElementRef<'a>> for HtmlSource<'a> {
    fn from(element: ElementRef<'a>) -> Self {
        HtmlSource::Element(element)
    }
}

/// A navigable document, borrowed from the caller or built for one parse call
pub(crate) enum LoadedDocument<'a> {
    Borrowed(&'a Html),
    Owned(Html),
}

impl LoadedDocument<'_> {
    pub(crate) fn html(&self) -> &Html {
        match self {
            LoadedDocument::Borrowed(html) => html,
            LoadedDocument::Owned(html) => html,
        }
    }
}

/// Turn a source into a document; `origin` names the source in diagnostics
pub(crate) fn load<'a>(source: HtmlSource<'a>, origin: &str, strict: bool) -> TableResult<LoadedDocument<'a>> {
    match source {
        HtmlSource::Document(html) => Ok(LoadedDocument::Borrowed(html)),
        HtmlSource::Element(element) => Ok(LoadedDocument::Owned(import_element(element))),
        HtmlSource::Markup(markup) => {
            let ParsedDocument { html, diagnostics } = parse_document(&markup, origin);
            debug!(origin, bytes = markup.len(), diagnostics = diagnostics.len(), "Parsed markup");

            if diagnostics.is_empty() {
                return Ok(LoadedDocument::Owned(html));
            }
            if strict {
                return Err(TableError::MalformedMarkup { diagnostics });
            }

            warn!(origin, count = diagnostics.len(), "Ignoring markup errors");
            Ok(LoadedDocument::Owned(html))
        }
    }
}

/// Copy `element` and its subtree under the root of a new document
pub(crate) fn import_element(element: ElementRef<'_>) -> Html {
    let mut html = Html::new_document();
    let mut root = html.tree.root_mut();
    let mut imported = root.append(Node::Element(element.value().clone()));
    import_children(&mut imported, *element);
    html
}

fn import_children(target: &mut NodeMut<'_, Node>, source: NodeRef<'_, Node>) {
    for child in source.children() {
        let mut copied = target.append(child.value().clone());
        import_children(&mut copied, child);
    }
}

/// Concatenated text of every descendant text node
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_lenient_load_keeps_broken_markup() {
        let loaded = load("df<body></p>sghfd".into(), "<markup>", false).unwrap();
        assert!(!loaded.html().errors.is_empty());
        assert_eq!(loaded.html().root_element().text().collect::<String>(), "dfsghfd");
    }

    #[test]
    fn test_strict_load_reports_diagnostics() {
        let error = match load("df<body></p>sghfd".into(), "broken.html", true) {
            Err(e) => e,
            Ok(_) => panic!("strict parsing should fail"),
        };

        match error {
            TableError::MalformedMarkup { diagnostics } => {
                assert!(!diagnostics.is_empty());
                assert!(diagnostics.iter().all(|d| d.origin == "broken.html"));
                assert!(diagnostics.iter().all(|d| d.line == Some(1)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_load_accepts_clean_document() {
        let markup = "<!DOCTYPE html><html><head><title>t</title></head><body><table><tbody><tr><td>1</td></tr></tbody></table></body></html>";
        assert!(load(markup.into(), "<markup>", true).is_ok());
    }

    #[test]
    fn test_borrowed_document_is_not_reparsed() {
        let html = Html::parse_document("<table><tr><td>x</td></tr></table>");
        let loaded = load((&html).into(), "<document>", true).unwrap();
        assert!(std::ptr::eq(loaded.html(), &html));
    }

    #[test]
    fn test_import_element_copies_subtree() {
        let html = Html::parse_document("<div><p>I know <b>who</b> you are</p></div>");
        let selector = Selector::parse("p").unwrap();
        let p = html.select(&selector).next().unwrap();

        let imported = import_element(p);
        let root_element = imported.tree.root().first_child().and_then(ElementRef::wrap).unwrap();
        assert_eq!(root_element.value().name(), "p");
        assert_eq!(text_content(root_element), "I know who you are");
    }

    #[test]
    fn test_bytes_are_decoded_lossily() {
        let source: HtmlSource<'_> = b"<td>caf\xe9</td>".to_vec().into();
        match source {
            HtmlSource::Markup(markup) => assert!(markup.starts_with("<td>caf")),
            _ => panic!("bytes should become markup"),
        }
    }
}
