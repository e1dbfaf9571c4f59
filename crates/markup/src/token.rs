//! Markup tokenizer.
//!
//! The grammar is assembled from small regular sub-patterns (names, quoted
//! values, attributes) into one anchored alternation that is matched at the
//! current position. Everything between markup is text, so the tokens cover
//! the input without gaps or overlaps.

use crate::error::{Location, advance};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

pub(crate) const NAME: &str = r"[A-Za-z_:][-A-Za-z0-9_:.]*";
const QUOTED_VALUE: &str = r#""[^"]*"|'[^']*'"#;
const UNQUOTED_VALUE: &str = r#"[^\s"'<>=`/]+"#;
const COMMENT: &str = r"<!--(?s:.*?)-->";
const CDATA: &str = r"<!\[CDATA\[(?s:.*?)\]\]>";
const DECLARATION: &str = r"<![^>]*>";
const PROCESSING_INSTRUCTION: &str = r"<\?(?s:.*?)\?>";

fn attribute_pattern() -> String {
    format!(r"\s+{NAME}(?:\s*=\s*(?:{QUOTED_VALUE}|{UNQUOTED_VALUE}))?")
}

fn start_tag_pattern() -> String {
    format!(r"<{NAME}(?:{})*\s*/?>", attribute_pattern())
}

fn end_tag_pattern() -> String {
    format!(r"</{NAME}\s*>")
}

static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "^(?:{COMMENT}|{CDATA}|{DECLARATION}|{PROCESSING_INSTRUCTION}|{}|{})",
        end_tag_pattern(),
        start_tag_pattern()
    ))
    .expect("BUG: invalid MARKUP_RE regex literal")
});

/// Markup-looking: `<` followed by a name start, `/`, `!` or `?`.
static MARKUP_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<[A-Za-z_:/!?]").expect("BUG: invalid MARKUP_START_RE regex literal")
});

static TAG_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^</?({NAME})")).expect("BUG: invalid TAG_NAME_RE regex literal")
});

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(\s+)({NAME})(?:(\s*=\s*)(?:"([^"]*)"|'([^']*)'|({UNQUOTED_VALUE})))?"#
    ))
    .expect("BUG: invalid ATTRIBUTE_RE regex literal")
});

/// Classification of a token by its literal prefix and suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Comment,
    CData,
    Declaration,
    XmlDeclaration,
    ProcessingInstruction,
    StartTag,
    EndTag,
    EmptyTag,
    /// Markup-looking text that matches no production.
    Error,
}

impl TokenKind {
    /// Classifies a matched markup string.
    pub fn classify(text: &str) -> TokenKind {
        if text.starts_with("<!--") {
            TokenKind::Comment
        } else if text.starts_with("<![CDATA[") {
            TokenKind::CData
        } else if text.starts_with("<!") {
            TokenKind::Declaration
        } else if text
            .strip_prefix("<?xml")
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '?'))
        {
            TokenKind::XmlDeclaration
        } else if text.starts_with("<?") {
            TokenKind::ProcessingInstruction
        } else if text.starts_with("</") {
            TokenKind::EndTag
        } else if text.ends_with("/>") {
            TokenKind::EmptyTag
        } else if text.ends_with('>') {
            TokenKind::StartTag
        } else {
            TokenKind::Text
        }
    }
}

/// An immutable slice of a template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    offset: usize,
    /// 1-based line and column of `offset`.
    line: usize,
    column: usize,
    source: &'a str,
    filename: Option<&'a str>,
}

impl<'a> Token<'a> {
    fn new(
        kind: TokenKind,
        source: &'a str,
        range: Range<usize>,
        (line, column): (usize, usize),
        filename: Option<&'a str>,
    ) -> Self {
        Token {
            kind,
            text: &source[range.start..range.end],
            offset: range.start,
            line,
            column,
            source,
            filename,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Absolute byte offset in the originating source.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn filename(&self) -> Option<&'a str> {
        self.filename
    }

    /// A sub-slice of this token; the result keeps its absolute offset.
    ///
    /// The range is relative to this token and must fall on char boundaries.
    pub fn slice(&self, range: Range<usize>) -> Token<'a> {
        let start = self.offset + range.start;
        let end = self.offset + range.end.min(self.text.len());
        let (line, column) = advance(self.line, self.column, &self.text[..range.start]);
        Token {
            kind: TokenKind::Text,
            text: &self.source[start..end],
            offset: start,
            line,
            column,
            source: self.source,
            filename: self.filename,
        }
    }

    pub fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
            offset: self.offset,
            filename: self.filename.map(str::to_string),
        }
    }

    /// The qualified tag name of a start, end or empty tag.
    pub fn tag_name(&self) -> Option<Token<'a>> {
        let caps = TAG_NAME_RE.captures(self.text)?;
        let name = caps.get(1)?;
        Some(self.slice(name.range()))
    }

    /// Attributes of a start or empty tag, in source order.
    pub fn attributes(&self) -> Vec<RawAttribute<'a>> {
        let Some(name) = self.tag_name() else {
            return Vec::new();
        };
        let start = name.offset - self.offset + name.text.len();
        let body = &self.text[start..];
        ATTRIBUTE_RE
            .captures_iter(body)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let leading = caps.get(1)?;
                let attr_name = caps.get(2)?;
                let (value, quote) = if let Some(v) = caps.get(4) {
                    (Some(v), Some('"'))
                } else if let Some(v) = caps.get(5) {
                    (Some(v), Some('\''))
                } else {
                    (caps.get(6), None)
                };
                let shift = |r: Range<usize>| (r.start + start)..(r.end + start);
                Some(RawAttribute {
                    token: self.slice(shift(whole.range())),
                    leading: leading.as_str().to_string(),
                    name: self.slice(shift(attr_name.range())),
                    equals: caps.get(3).map(|m| m.as_str().to_string()),
                    value: value.map(|v| self.slice(shift(v.range()))),
                    quote,
                })
            })
            .collect()
    }

    /// The trailing `>`, `/>` or ` />` of a tag, with any whitespace before it.
    pub fn tag_close(&self) -> &'a str {
        let trimmed = self.text.trim_end_matches('>');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let end = trimmed.trim_end().len();
        &self.text[end..]
    }
}

/// One attribute as it appears in a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute<'a> {
    /// The whole attribute including leading whitespace.
    pub token: Token<'a>,
    pub leading: String,
    pub name: Token<'a>,
    /// The `=` with surrounding whitespace, if a value is present.
    pub equals: Option<String>,
    /// The raw (still escaped) value.
    pub value: Option<Token<'a>>,
    pub quote: Option<char>,
}

/// Lazy token stream over a source text.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    source: &'a str,
    filename: Option<&'a str>,
    position: usize,
    line: usize,
    column: usize,
    text_only: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str, filename: Option<&'a str>) -> Self {
        Tokenizer {
            source,
            filename,
            position: 0,
            line: 1,
            column: 1,
            text_only: false,
        }
    }

    /// Yields the whole input as a single text token.
    pub fn text_only(source: &'a str, filename: Option<&'a str>) -> Self {
        Tokenizer {
            text_only: true,
            ..Tokenizer::new(source, filename)
        }
    }

    fn next_text_end(&self, from: usize) -> usize {
        self.source[from..]
            .find('<')
            .map(|i| from + i)
            .unwrap_or(self.source.len())
    }

    fn emit(&mut self, kind: TokenKind, range: Range<usize>) -> Token<'a> {
        let token = Token::new(
            kind,
            self.source,
            range.clone(),
            (self.line, self.column),
            self.filename,
        );
        (self.line, self.column) = advance(self.line, self.column, &self.source[range.clone()]);
        self.position = range.end;
        token
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let start = self.position;
        if start >= self.source.len() {
            return None;
        }
        if self.text_only {
            return Some(self.emit(TokenKind::Text, start..self.source.len()));
        }

        let rest = &self.source[start..];
        let (kind, end) = if !rest.starts_with('<') {
            (TokenKind::Text, self.next_text_end(start))
        } else if let Some(m) = MARKUP_RE.find(rest) {
            (TokenKind::classify(m.as_str()), start + m.end())
        } else if MARKUP_START_RE.is_match(rest) {
            // Malformed markup runs to the next `>` or the next `<`.
            let close = rest.find('>').map(|i| start + i + 1);
            let next_open = self.next_text_end(start + 1);
            let end = close.map(|c| c.min(next_open)).unwrap_or(next_open);
            (TokenKind::Error, end)
        } else {
            (TokenKind::Text, self.next_text_end(start + 1))
        };

        Some(self.emit(kind, start..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, &str)> {
        Tokenizer::new(source, None)
            .map(|t| (t.kind(), t.text()))
            .collect()
    }

    #[test]
    fn test_tokenize_simple_document() {
        let tokens = kinds(r#"<html link="">Hello</html>"#);
        assert_eq!(
            tokens,
            vec![
                (TokenKind::StartTag, r#"<html link="">"#),
                (TokenKind::Text, "Hello"),
                (TokenKind::EndTag, "</html>"),
            ]
        );
    }

    #[test]
    fn test_tokens_cover_input_without_gaps() {
        let source = "<?xml version=\"1.0\"?>\n<!DOCTYPE html>\n<!-- c -->\
            <p a='1' b=2 c>x<![CDATA[<y>]]><br/><?pi data?></p> tail";
        let mut expected_offset = 0;
        let mut rebuilt = String::new();
        for token in Tokenizer::new(source, None) {
            assert_eq!(token.offset(), expected_offset);
            expected_offset += token.text().len();
            rebuilt.push_str(token.text());
        }
        assert_eq!(rebuilt, source);
    }

    #[test]
    fn test_classification() {
        let tokens = kinds("<?xml version=\"1.0\"?><!DOCTYPE x><!-- a --><![CDATA[b]]><?php c ?><br /><a></a>");
        let k: Vec<TokenKind> = tokens.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            k,
            vec![
                TokenKind::XmlDeclaration,
                TokenKind::Declaration,
                TokenKind::Comment,
                TokenKind::CData,
                TokenKind::ProcessingInstruction,
                TokenKind::EmptyTag,
                TokenKind::StartTag,
                TokenKind::EndTag,
            ]
        );
    }

    #[test]
    fn test_comment_may_contain_markup() {
        let tokens = kinds("<!-- <b>not a tag</b> -->after");
        assert_eq!(tokens[0], (TokenKind::Comment, "<!-- <b>not a tag</b> -->"));
        assert_eq!(tokens[1], (TokenKind::Text, "after"));
    }

    #[test]
    fn test_malformed_markup_is_error_token() {
        let tokens = kinds("<p a=\"unterminated>text");
        assert_eq!(tokens[0].0, TokenKind::Error);
    }

    #[test]
    fn test_stray_less_than_is_text() {
        let tokens = kinds("1 < 2 <b>x</b>");
        assert_eq!(tokens[0], (TokenKind::Text, "1 "));
        assert_eq!(tokens[1], (TokenKind::Text, "< 2 "));
        assert_eq!(tokens[2].0, TokenKind::StartTag);
    }

    #[test]
    fn test_text_only_mode() {
        let tokens: Vec<_> = Tokenizer::text_only("<b>${x}</b>", None).collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind(), TokenKind::Text);
        assert_eq!(tokens[0].text(), "<b>${x}</b>");
    }

    #[test]
    fn test_slice_preserves_offset() {
        let source = "abc<tag x='1'>";
        let token = Tokenizer::new(source, Some("t.pt")).nth(1).unwrap();
        assert_eq!(token.offset(), 3);
        let name = token.tag_name().unwrap();
        assert_eq!(name.text(), "tag");
        assert_eq!(name.offset(), 4);
        assert_eq!(name.filename(), Some("t.pt"));
        assert_eq!(name.location().column, 5);
    }

    #[test]
    fn test_attributes_and_tag_close() {
        let source = r#"<a href="x" tal:content='y' checked data-n=3 />"#;
        let token = Tokenizer::new(source, None).next().unwrap();
        assert_eq!(token.kind(), TokenKind::EmptyTag);
        let attrs = token.attributes();
        let names: Vec<&str> = attrs.iter().map(|a| a.name.text()).collect();
        assert_eq!(names, vec!["href", "tal:content", "checked", "data-n"]);
        assert_eq!(attrs[0].quote, Some('"'));
        assert_eq!(attrs[1].quote, Some('\''));
        assert_eq!(attrs[1].value.unwrap().text(), "y");
        assert!(attrs[2].value.is_none());
        assert_eq!(attrs[3].value.unwrap().text(), "3");
        assert_eq!(attrs[3].quote, None);
        assert_eq!(token.tag_close(), " />");
    }

    #[test]
    fn test_locations_track_lines_and_columns() {
        let source = "<a>\n  <b>\n</a>";
        let tokens: Vec<_> = Tokenizer::new(source, Some("page.pt")).collect();
        let b = tokens[2].location();
        assert_eq!((b.line, b.column, b.offset), (2, 3, 6));
        assert_eq!(b.to_string(), "page.pt, line 2, column 3");
        let end = tokens[4].location();
        assert_eq!((end.line, end.column), (3, 1));
    }

    #[test]
    fn test_locations_deep_in_a_large_source() {
        let mut source = String::new();
        for i in 0..20_000 {
            source.push_str(&format!("<p id=\"{i}\">é{i}</p>\n"));
        }
        source.push_str("ünï <last  name='x'/>");

        let last = Tokenizer::new(&source, None).last().unwrap();
        assert_eq!(last.text(), "<last  name='x'/>");
        let loc = last.location();
        assert_eq!((loc.line, loc.column), (20_001, 5));
        assert_eq!(loc.offset, source.len() - last.text().len());

        let name = last.attributes()[0].name.location();
        assert_eq!((name.line, name.column), (20_001, 12));
    }

    #[test]
    fn test_text_only_token_starts_at_origin() {
        let token = Tokenizer::text_only("x\ny", None).next().unwrap();
        assert_eq!((token.location().line, token.location().column), (1, 1));
    }
}
