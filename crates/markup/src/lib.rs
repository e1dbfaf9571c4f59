//! Markup front end for talc templates.
//!
//! - [`Tokenizer`]: lazy token stream built from a fixed regular grammar
//! - [`NamespaceScope`]: per-element prefix bindings
//! - [`parse`]: tag-tree builder with lenient end-tag matching

pub mod error;
pub mod namespace;
pub mod token;
pub mod tree;

pub use error::{Location, ParseError};
pub use namespace::{
    METAL_NS, NamespaceScope, QName, TAL_NS, XML_NS, XMLNS_NS, split_qualified,
};
pub use token::{RawAttribute, Token, TokenKind, Tokenizer};
pub use tree::{
    Attribute, Document, Element, EndTag, Markup, Node, ScannedAttribute, StartTag, parse,
    parse_text, scan_attributes,
};
