//! Markup parsing on top of html5ever, feeding a scraper tree.
//!
//! Two things the stock `Html::parse_document` loses are kept here:
//!
//! - the line each parse error was reported on;
//! - whether a `<tbody>` came from the markup or was inserted by the tree
//!   builder around bare `<tr>` children of a table. Inserted bodies are
//!   unwrapped after parsing, so those rows stay direct children of
//!   `<table>`.

use std::borrow::Cow;

use ego_tree::NodeId;
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts, TokenizerResult,
};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeBuilder, TreeBuilderOpts, TreeSink};
use html5ever::{Attribute, ExpandedName, QualName};
use scraper::Html;
use tracing::trace;

use crate::error::Diagnostic;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed document and the diagnostics recorded while building it
#[derive(Debug)]
pub struct ParsedDocument {
    pub html: Html,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a complete document; `origin` names the source in diagnostics
pub fn parse_document(markup: &str, origin: &str) -> ParsedDocument {
    let builder = TreeBuilder::new(TableSink::new(origin), TreeBuilderOpts::default());
    let mut tokenizer = Tokenizer::new(StartTagTap { builder }, TokenizerOpts::default());

    let mut input = BufferQueue::new();
    input.push_back(StrTendril::from_slice(markup));
    while let TokenizerResult::Script(_) = tokenizer.feed(&mut input) {}
    tokenizer.end();

    tokenizer.sink.builder.sink.finish().into_document()
}

/// Tells the sink whether the token being built from is a `<tbody>` start tag
struct StartTagTap {
    builder: TreeBuilder<NodeId, TableSink>,
}

impl TokenSink for StartTagTap {
    type Handle = NodeId;

    fn process_token(&mut self, token: Token, line_number: u64) -> TokenSinkResult<NodeId> {
        self.builder.sink.tbody_tag = matches!(
            &token,
            Token::TagToken(tag) if tag.kind == TagKind::StartTag && &*tag.name == "tbody"
        );
        self.builder.process_token(token, line_number)
    }

    fn end(&mut self) {
        self.builder.end();
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        self.builder.adjusted_current_node_present_but_not_in_html_namespace()
    }
}

/// Scraper's tree sink plus line tracking and implicit body bookkeeping
struct TableSink {
    html: Html,
    origin: String,
    line: u64,
    diagnostics: Vec<Diagnostic>,
    tbody_tag: bool,
    implicit_bodies: Vec<NodeId>,
}

impl TableSink {
    fn new(origin: &str) -> Self {
        Self {
            html: Html::new_document(),
            origin: origin.to_string(),
            line: 1,
            diagnostics: Vec::new(),
            tbody_tag: false,
            implicit_bodies: Vec::new(),
        }
    }

    fn into_document(mut self) -> ParsedDocument {
        for id in std::mem::take(&mut self.implicit_bodies) {
            unwrap_node(&mut self.html, id);
        }

        ParsedDocument {
            html: self.html,
            diagnostics: self.diagnostics,
        }
    }
}

/// Move the children of `id` in front of it, then detach it
fn unwrap_node(html: &mut Html, id: NodeId) {
    let children: Vec<NodeId> = match html.tree.get(id) {
        Some(node) if node.parent().is_some() => node.children().map(|child| child.id()).collect(),
        _ => return,
    };

    if let Some(mut node) = html.tree.get_mut(id) {
        for child in children {
            node.insert_id_before(child);
        }
        node.detach();
    }
}

impl TreeSink for TableSink {
    type Output = Self;
    type Handle = NodeId;

    fn finish(self) -> Self {
        self
    }

    fn parse_error(&mut self, msg: Cow<'static, str>) {
        self.diagnostics.push(Diagnostic {
            message: msg.to_string(),
            origin: self.origin.clone(),
            line: Some(self.line as usize),
        });
        self.html.parse_error(msg);
    }

    fn set_current_line(&mut self, line_number: u64) {
        self.line = line_number;
    }

    fn get_document(&mut self) -> NodeId {
        self.html.get_document()
    }

    fn elem_name<'a>(&'a self, target: &'a NodeId) -> ExpandedName<'a> {
        self.html.elem_name(target)
    }

    fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>, flags: ElementFlags) -> NodeId {
        let implicit_body = !self.tbody_tag && &*name.local == "tbody" && &*name.ns == HTML_NAMESPACE;
        let id = self.html.create_element(name, attrs, flags);
        if implicit_body {
            trace!(line = self.line, "Implicit table body");
            self.implicit_bodies.push(id);
        }
        id
    }

    fn create_comment(&mut self, text: StrTendril) -> NodeId {
        self.html.create_comment(text)
    }

    fn create_pi(&mut self, target: StrTendril, data: StrTendril) -> NodeId {
        self.html.create_pi(target, data)
    }

    fn append(&mut self, parent: &NodeId, child: NodeOrText<NodeId>) {
        self.html.append(parent, child)
    }

    fn append_based_on_parent_node(&mut self, element: &NodeId, prev_element: &NodeId, child: NodeOrText<NodeId>) {
        self.html.append_based_on_parent_node(element, prev_element, child)
    }

    fn append_doctype_to_document(&mut self, name: StrTendril, public_id: StrTendril, system_id: StrTendril) {
        self.html.append_doctype_to_document(name, public_id, system_id)
    }

    fn get_template_contents(&mut self, target: &NodeId) -> NodeId {
        self.html.get_template_contents(target)
    }

    fn same_node(&self, x: &NodeId, y: &NodeId) -> bool {
        self.html.same_node(x, y)
    }

    fn set_quirks_mode(&mut self, mode: QuirksMode) {
        self.html.set_quirks_mode(mode)
    }

    fn append_before_sibling(&mut self, sibling: &NodeId, new_node: NodeOrText<NodeId>) {
        self.html.append_before_sibling(sibling, new_node)
    }

    fn add_attrs_if_missing(&mut self, target: &NodeId, attrs: Vec<Attribute>) {
        self.html.add_attrs_if_missing(target, attrs)
    }

    fn remove_from_parent(&mut self, target: &NodeId) {
        self.html.remove_from_parent(target)
    }

    fn reparent_children(&mut self, node: &NodeId, new_parent: &NodeId) {
        self.html.reparent_children(node, new_parent)
    }
}
