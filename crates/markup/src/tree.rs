//! Tag-tree builder.
//!
//! Tokens are appended to a flat working list while a stack records the
//! position of every open start tag. An end tag closes the most recent
//! unmatched start tag of the same resolved name and splices everything
//! after it into that element's children. Start tags skipped over on the
//! way become elements without an end tag or children.

use crate::error::{Location, ParseError};
use crate::namespace::{NamespaceScope, QName};
use crate::token::{Token, TokenKind, Tokenizer};

/// A non-element node; `text` is the verbatim source.
#[derive(Debug, Clone, PartialEq)]
pub struct Markup {
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(Markup),
    Comment(Markup),
    CData(Markup),
    Declaration(Markup),
    ProcessingInstruction(Markup),
    Element(Element),
}

impl Node {
    /// Appends the verbatim source of this node to `out`.
    pub fn write_source(&self, out: &mut String) {
        match self {
            Node::Text(m)
            | Node::Comment(m)
            | Node::CData(m)
            | Node::Declaration(m)
            | Node::ProcessingInstruction(m) => out.push_str(&m.text),
            Node::Element(el) => el.write_source(out),
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QName,
    /// The name as written, including any prefix.
    pub raw_name: String,
    /// Whitespace preceding the attribute.
    pub leading: String,
    pub equals: Option<String>,
    /// The value as written, without quotes and still escaped.
    pub value: Option<String>,
    pub quote: Option<char>,
    pub location: Location,
}

impl Attribute {
    /// The attribute as it appears in the tag, leading whitespace included.
    pub fn source_text(&self) -> String {
        let mut out = format!("{}{}", self.leading, self.raw_name);
        if let Some(value) = &self.value {
            out.push_str(self.equals.as_deref().unwrap_or("="));
            match self.quote {
                Some(q) => {
                    out.push(q);
                    out.push_str(value);
                    out.push(q);
                }
                None => out.push_str(value),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartTag {
    pub name: QName,
    pub raw_name: String,
    pub attributes: Vec<Attribute>,
    /// `>`, `/>` or ` />` as written.
    pub close: String,
    pub text: String,
    pub self_closing: bool,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndTag {
    pub name: QName,
    pub raw_name: String,
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub start: StartTag,
    pub end: Option<EndTag>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn name(&self) -> &QName {
        &self.start.name
    }

    pub fn location(&self) -> &Location {
        &self.start.location
    }

    pub fn write_source(&self, out: &mut String) {
        out.push_str(&self.start.text);
        for child in &self.children {
            child.write_source(out);
        }
        if let Some(end) = &self.end {
            out.push_str(&end.text);
        }
    }

    pub fn source_text(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub filename: Option<String>,
}

impl Document {
    pub fn source_text(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_source(&mut out);
        }
        out
    }
}

fn resolve(scope: &NamespaceScope, name: &Token<'_>) -> Result<QName, ParseError> {
    scope.resolve(name.text()).map_err(|prefix| {
        ParseError::new(
            format!("undefined namespace prefix '{}'", prefix),
            name.location(),
            name.text(),
        )
    })
}

/// Resolves the tag name and attributes of a start or empty tag.
///
/// Returns the tag together with the scope it opens.
fn start_tag(
    token: &Token<'_>,
    parent: &NamespaceScope,
) -> Result<(StartTag, NamespaceScope), ParseError> {
    let name = token
        .tag_name()
        .ok_or_else(|| ParseError::new("malformed tag", token.location(), token.text()))?;
    let raw_attributes = token.attributes();
    let scope = parent.child(raw_attributes.iter().map(|a| {
        (a.name.text(), a.value.map(|v| v.text()).unwrap_or(""))
    }));

    let attributes = raw_attributes
        .iter()
        .map(|raw| {
            Ok(Attribute {
                name: resolve(&scope, &raw.name)?,
                raw_name: raw.name.text().to_string(),
                leading: raw.leading.clone(),
                equals: raw.equals.clone(),
                value: raw.value.map(|v| v.text().to_string()),
                quote: raw.quote,
                location: raw.name.location(),
            })
        })
        .collect::<Result<Vec<_>, ParseError>>()?;

    let tag = StartTag {
        name: resolve(&scope, &name)?,
        raw_name: name.text().to_string(),
        attributes,
        close: token.tag_close().to_string(),
        text: token.text().to_string(),
        self_closing: token.kind() == TokenKind::EmptyTag,
        location: token.location(),
    };
    Ok((tag, scope))
}

enum Entry {
    Node(Node),
    Open(StartTag),
}

impl Entry {
    fn into_node(self) -> Node {
        match self {
            Entry::Node(node) => node,
            Entry::Open(start) => {
                log::debug!("Element <{}> at {} has no end tag", start.raw_name, start.location);
                Node::Element(Element {
                    start,
                    end: None,
                    children: Vec::new(),
                })
            }
        }
    }
}

/// Builds a tree from the token stream of `source`.
pub fn parse(source: &str, filename: Option<&str>) -> Result<Document, ParseError> {
    build(Tokenizer::new(source, filename), filename)
}

/// Treats `source` as a single text node.
pub fn parse_text(source: &str, filename: Option<&str>) -> Document {
    let nodes = Tokenizer::text_only(source, filename)
        .map(|t| {
            Node::Text(Markup {
                text: t.text().to_string(),
                location: t.location(),
            })
        })
        .collect();
    Document {
        nodes,
        filename: filename.map(str::to_string),
    }
}

fn build<'a>(
    tokens: impl Iterator<Item = Token<'a>>,
    filename: Option<&str>,
) -> Result<Document, ParseError> {
    let mut entries: Vec<Entry> = Vec::new();
    let mut open: Vec<(QName, usize)> = Vec::new();
    let mut scopes: Vec<NamespaceScope> = vec![NamespaceScope::root()];

    for token in tokens {
        let markup = || Markup {
            text: token.text().to_string(),
            location: token.location(),
        };
        match token.kind() {
            TokenKind::StartTag => {
                let parent = scopes.last().cloned().unwrap_or_default();
                let (start, scope) = start_tag(&token, &parent)?;
                scopes.push(scope);
                open.push((start.name.clone(), entries.len()));
                entries.push(Entry::Open(start));
            }
            TokenKind::EmptyTag => {
                let parent = scopes.last().cloned().unwrap_or_default();
                let (start, _) = start_tag(&token, &parent)?;
                entries.push(Entry::Node(Node::Element(Element {
                    start,
                    end: None,
                    children: Vec::new(),
                })));
            }
            TokenKind::EndTag => {
                let unexpected =
                    || ParseError::new("unexpected end tag", token.location(), token.text());
                if scopes.len() <= 1 {
                    return Err(unexpected());
                }
                let closing_scope = scopes.pop().unwrap_or_default();
                let raw_name = token.tag_name().ok_or_else(unexpected)?;
                let name = resolve(&closing_scope, &raw_name)?;

                let position = loop {
                    match open.pop() {
                        Some((open_name, position)) if open_name == name => break position,
                        Some(_) => continue,
                        None => return Err(unexpected()),
                    }
                };

                let children = entries
                    .split_off(position + 1)
                    .into_iter()
                    .map(Entry::into_node)
                    .collect();
                let Some(Entry::Open(start)) = entries.pop() else {
                    return Err(unexpected());
                };
                entries.push(Entry::Node(Node::Element(Element {
                    start,
                    end: Some(EndTag {
                        name,
                        raw_name: raw_name.text().to_string(),
                        text: token.text().to_string(),
                        location: token.location(),
                    }),
                    children,
                })));
                scopes.truncate(open.len() + 1);
            }
            TokenKind::Error => {
                return Err(ParseError::new(
                    "malformed markup",
                    token.location(),
                    token.text(),
                ));
            }
            TokenKind::Text => entries.push(Entry::Node(Node::Text(markup()))),
            TokenKind::Comment => entries.push(Entry::Node(Node::Comment(markup()))),
            TokenKind::CData => entries.push(Entry::Node(Node::CData(markup()))),
            TokenKind::Declaration | TokenKind::XmlDeclaration => {
                entries.push(Entry::Node(Node::Declaration(markup())))
            }
            TokenKind::ProcessingInstruction => {
                entries.push(Entry::Node(Node::ProcessingInstruction(markup())))
            }
        }
    }

    Ok(Document {
        nodes: entries.into_iter().map(Entry::into_node).collect(),
        filename: filename.map(str::to_string),
    })
}

/// An attribute found by [`scan_attributes`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedAttribute {
    pub element: QName,
    pub name: QName,
    pub raw_name: String,
    pub value: Option<String>,
    pub location: Location,
}

/// Resolves every start-tag attribute without building a tree.
///
/// Used where only directive values matter, such as collecting imports.
pub fn scan_attributes(
    source: &str,
    filename: Option<&str>,
) -> Result<Vec<ScannedAttribute>, ParseError> {
    let mut scopes: Vec<NamespaceScope> = vec![NamespaceScope::root()];
    let mut found = Vec::new();

    for token in Tokenizer::new(source, filename) {
        match token.kind() {
            TokenKind::StartTag | TokenKind::EmptyTag => {
                let parent = scopes.last().cloned().unwrap_or_default();
                let (start, scope) = start_tag(&token, &parent)?;
                found.extend(start.attributes.into_iter().map(|a| ScannedAttribute {
                    element: start.name.clone(),
                    name: a.name,
                    raw_name: a.raw_name,
                    value: a.value,
                    location: a.location,
                }));
                if token.kind() == TokenKind::StartTag {
                    scopes.push(scope);
                }
            }
            TokenKind::EndTag if scopes.len() > 1 => {
                scopes.pop();
            }
            _ => {}
        }
    }
    Ok(found)
}
