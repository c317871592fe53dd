//! Path expressions over a parsed HTML tree.
//!
//! A deliberately small, XPath-shaped language:
//!
//! ```text
//! //table                     every table in the tree
//! //table[@id="prices"]       tables whose id attribute equals `prices`
//! (//table)[2]                the second table in document order
//! thead/tr                    rows of the `thead` children of the context
//! /html/body/table[1]         first table child of the body
//! //td[@colspan]              cells carrying a colspan attribute
//! ```
//!
//! `/` selects children, `//` selects descendants. A leading step without a
//! slash is relative to the context node, as is a leading `/` (queries never
//! escape the node they are evaluated against). `[n]` is 1-based and applies
//! to the matches of each parent; `(path)[n]` applies to the whole result.

use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Node};

use crate::error::{TableError, TableResult};

/// A parsed path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    source: String,
    steps: Vec<Step>,
    position: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    HasAttribute(String),
    AttributeEquals(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    name: NameTest,
    predicates: Vec<Predicate>,
}

impl Query {
    /// Parse an expression, failing with `InvalidSelector` on syntax errors
    pub fn parse(expression: &str) -> TableResult<Self> {
        let mut cursor = Cursor::new(expression);
        cursor.skip_ws();

        let (steps, position) = if cursor.eat('(') {
            let steps = cursor.path()?;
            cursor.expect(')')?;
            cursor.expect('[')?;
            let position = cursor.position_number()?;
            cursor.expect(']')?;
            (steps, Some(position))
        } else {
            (cursor.path()?, None)
        };

        cursor.skip_ws();
        if let Some(c) = cursor.peek() {
            return Err(cursor.error(format!("unexpected `{}`", c)));
        }

        Ok(Self {
            source: expression.trim().to_string(),
            steps,
            position,
        })
    }

    /// `(//table)[position + 1]`: the table at a zero-based position
    pub fn nth_table(position: usize) -> Self {
        Self {
            source: format!("(//table)[{}]", position + 1),
            steps: vec![Step {
                axis: Axis::Descendant,
                name: NameTest::Tag("table".to_string()),
                predicates: Vec::new(),
            }],
            position: Some(position + 1),
        }
    }

    /// The expression this query was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All matching elements below `context`, in document order
    pub fn select<'a>(&self, context: NodeRef<'a, Node>) -> Vec<ElementRef<'a>> {
        let order = document_order(context);
        let mut current = vec![context];

        for step in &self.steps {
            let mut seen: HashSet<NodeId> = HashSet::new();
            let mut next = Vec::new();

            for node in &current {
                let parents: Vec<NodeRef<'a, Node>> = match step.axis {
                    Axis::Child => vec![*node],
                    Axis::Descendant => node.descendants().collect(),
                };

                for parent in parents {
                    for matched in step.apply(parent) {
                        if seen.insert(matched.id()) {
                            next.push(matched);
                        }
                    }
                }
            }

            next.sort_by_key(|node| order.get(&node.id()).copied().unwrap_or(usize::MAX));
            current = next;
        }

        let elements = current.into_iter().filter_map(ElementRef::wrap);
        match self.position {
            Some(position) => elements.skip(position - 1).take(1).collect(),
            None => elements.collect(),
        }
    }

    /// The n-th (0-based) match below `context`
    pub fn nth<'a>(&self, context: NodeRef<'a, Node>, n: usize) -> Option<ElementRef<'a>> {
        self.select(context).into_iter().nth(n)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl Step {
    fn apply<'a>(&self, parent: NodeRef<'a, Node>) -> Vec<NodeRef<'a, Node>> {
        let mut matched: Vec<NodeRef<'a, Node>> = parent
            .children()
            .filter(|child| self.name_matches(child))
            .collect();

        for predicate in &self.predicates {
            matched = match predicate {
                Predicate::Position(n) => matched.into_iter().skip(n - 1).take(1).collect(),
                Predicate::HasAttribute(name) => matched
                    .into_iter()
                    .filter(|node| attribute(node, name).is_some())
                    .collect(),
                Predicate::AttributeEquals(name, value) => matched
                    .into_iter()
                    .filter(|node| attribute(node, name) == Some(value.as_str()))
                    .collect(),
            };
        }

        matched
    }

    fn name_matches(&self, node: &NodeRef<'_, Node>) -> bool {
        match (node.value(), &self.name) {
            (Node::Element(_), NameTest::Any) => true,
            (Node::Element(element), NameTest::Tag(tag)) => element.name().eq_ignore_ascii_case(tag),
            _ => false,
        }
    }
}

fn attribute<'a>(node: &NodeRef<'a, Node>, name: &str) -> Option<&'a str> {
    match node.value() {
        Node::Element(element) => element.attr(name),
        _ => None,
    }
}

fn document_order(context: NodeRef<'_, Node>) -> HashMap<NodeId, usize> {
    let root = context.ancestors().last().unwrap_or(context);
    root.descendants()
        .enumerate()
        .map(|(index, node)| (node.id(), index))
        .collect()
}

struct Cursor<'s> {
    input: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    fn new(input: &'s str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, expected: &str) -> bool {
        if self.input[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> TableResult<()> {
        self.skip_ws();
        if self.eat(expected) {
            self.skip_ws();
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", expected)))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, reason: String) -> TableError {
        TableError::invalid_selector(self.input, format!("{} at offset {}", reason, self.pos))
    }

    fn path(&mut self) -> TableResult<Vec<Step>> {
        self.skip_ws();
        // `.` names the context node itself
        if self.input[self.pos..].starts_with("./") {
            self.bump();
        }

        let mut steps = Vec::new();
        let first_axis = if self.eat_str("//") {
            Axis::Descendant
        } else {
            self.eat('/');
            Axis::Child
        };
        steps.push(self.step(first_axis)?);

        loop {
            let axis = if self.eat_str("//") {
                Axis::Descendant
            } else if self.eat('/') {
                Axis::Child
            } else {
                break;
            };
            steps.push(self.step(axis)?);
        }

        Ok(steps)
    }

    fn step(&mut self, axis: Axis) -> TableResult<Step> {
        let name = if self.eat('*') {
            NameTest::Any
        } else {
            NameTest::Tag(self.name()?.to_ascii_lowercase())
        };

        let mut predicates = Vec::new();
        while self.eat('[') {
            self.skip_ws();
            let predicate = if self.eat('@') {
                let attribute = self.name()?;
                self.skip_ws();
                if self.eat('=') {
                    self.skip_ws();
                    Predicate::AttributeEquals(attribute, self.quoted()?)
                } else {
                    Predicate::HasAttribute(attribute)
                }
            } else {
                Predicate::Position(self.position_number()?)
            };
            self.expect(']')?;
            predicates.push(predicate);
        }

        Ok(Step {
            axis,
            name,
            predicates,
        })
    }

    fn name(&mut self) -> TableResult<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
        {
            self.bump();
        }

        if start == self.pos {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a name, found `{}`", c)),
                None => self.error("expected a name, found end of expression".to_string()),
            });
        }

        Ok(self.input[start..self.pos].to_string())
    }

    fn quoted(&mut self) -> TableResult<String> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted value".to_string())),
        };
        self.bump();

        let start = self.pos;
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(self.input[start..self.pos - 1].to_string()),
                Some(_) => continue,
                None => return Err(self.error("unterminated string".to_string())),
            }
        }
    }

    fn position_number(&mut self) -> TableResult<usize> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }

        let digits = &self.input[start..self.pos];
        match digits.parse::<usize>() {
            Ok(0) => Err(self.error("positions start at 1".to_string())),
            Ok(n) => Ok(n),
            Err(_) => Err(self.error("expected a position or an attribute test".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const HTML: &str = r#"<!DOCTYPE html><html><body>
        <table id="first"><tr><td>a</td></tr></table>
        <div><table id="nested" class="x"><tr><td>b</td></tr></table></div>
        <table id="third"><tr><td colspan="2">c</td><td>d</td></tr></table>
    </body></html>"#;

    fn ids(document: &Html, expression: &str) -> Vec<String> {
        Query::parse(expression)
            .unwrap()
            .select(document.tree.root())
            .iter()
            .map(|e| e.value().attr("id").unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn test_descendant_tables_in_document_order() {
        let document = Html::parse_document(HTML);
        assert_eq!(ids(&document, "//table"), ["first", "nested", "third"]);
    }

    #[test]
    fn test_attribute_predicates() {
        let document = Html::parse_document(HTML);
        assert_eq!(ids(&document, r#"//table[@id="third"]"#), ["third"]);
        assert_eq!(ids(&document, "//table[@id='nested']"), ["nested"]);
        assert_eq!(ids(&document, "//table[@class]"), ["nested"]);
        assert!(ids(&document, r#"//table[@id="missing"]"#).is_empty());
    }

    #[test]
    fn test_grouped_position_counts_whole_result() {
        let document = Html::parse_document(HTML);
        assert_eq!(ids(&document, "(//table)[2]"), ["nested"]);
        assert!(ids(&document, "(//table)[4]").is_empty());
    }

    #[test]
    fn test_step_position_counts_per_parent() {
        let document = Html::parse_document(HTML);
        // every table is the first table child of its own parent
        assert_eq!(ids(&document, "//table[1]"), ["first", "nested"]);
        assert_eq!(ids(&document, "/html/body/table[2]"), ["third"]);
    }

    #[test]
    fn test_relative_steps_from_an_element() {
        let document = Html::parse_document(HTML);
        let table = Query::parse(r#"//table[@id="third"]"#)
            .unwrap()
            .nth(document.tree.root(), 0)
            .unwrap();

        let cells = Query::parse("tbody/tr/td").unwrap().select(*table);
        assert_eq!(cells.len(), 2);
        let spanned = Query::parse(".//td[@colspan]").unwrap().select(*table);
        assert_eq!(spanned.len(), 1);
    }

    #[test]
    fn test_wildcard_and_case_insensitive_names() {
        let document = Html::parse_document(HTML);
        assert_eq!(ids(&document, "//TABLE"), ["first", "nested", "third"]);
        assert_eq!(Query::parse("//div/*").unwrap().select(document.tree.root()).len(), 1);
    }

    #[test]
    fn test_syntax_errors() {
        for expression in ["", "//", "//table[", "//table[0]", "//table[@id=foo]", "(//table", "//table]", "//table[@id=\"x]"] {
            let error = Query::parse(expression).unwrap_err();
            assert!(
                matches!(error, TableError::InvalidSelector { .. }),
                "{} should be rejected",
                expression
            );
        }
    }

    #[test]
    fn test_nth_table_matches_parsed_form() {
        assert_eq!(Query::nth_table(2), Query::parse("(//table)[3]").unwrap());
    }

    #[test]
    fn test_display_is_the_source() {
        let query = Query::parse(" (//table)[3] ").unwrap();
        assert_eq!(query.to_string(), "(//table)[3]");
        assert_eq!(query.as_str(), "(//table)[3]");
    }
}
