//! A `nom`-based parser for TALES expressions.
use crate::ast::{Expression, Literal, Path, StringPart};
use crate::error::TalesError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, satisfy},
    combinator::{all_consuming, map, recognize},
    multi::many0,
    sequence::{pair, preceded},
};

// --- Main Public Parsers ---

/// Parses one expression, including `|` alternatives and type prefixes.
pub fn parse_expression(input: &str) -> Result<Expression, TalesError> {
    let mut alternatives = Vec::new();
    let mut rest = input.trim();
    loop {
        if let Some((prefix, body)) = type_prefix(rest) {
            // Typed expressions consume the remainder, pipes included.
            alternatives.push(prefixed(input, prefix, body)?);
            break;
        }
        match rest.split_once('|') {
            Some((head, tail)) => {
                alternatives.push(simple(input, head.trim())?);
                rest = tail.trim();
            }
            None => {
                alternatives.push(simple(input, rest)?);
                break;
            }
        }
    }
    if alternatives.len() == 1 {
        Ok(alternatives.remove(0))
    } else {
        Ok(Expression::Alternatives(alternatives))
    }
}

/// Splits a directive argument list on `;`. `;;` stands for a literal
/// semicolon; entries are trimmed and empty entries dropped.
pub fn split_arguments(input: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != ';' {
            current.push(c);
        } else if chars.peek() == Some(&';') {
            chars.next();
            current.push(';');
        } else {
            entries.push(std::mem::take(&mut current));
        }
    }
    entries.push(current);
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Parses the body of a `string:` expression.
pub fn parse_string_template(input: &str) -> Result<Vec<StringPart>, TalesError> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    let flush = |text: &mut String, parts: &mut Vec<StringPart>| {
        if !text.is_empty() {
            parts.push(StringPart::Text(std::mem::take(text)));
        }
    };

    while let Some(pos) = rest.find('$') {
        text.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(stripped) = after.strip_prefix('$') {
            text.push('$');
            rest = stripped;
        } else if let Some(inner) = after.strip_prefix('{') {
            let end = matching_brace(inner)
                .ok_or_else(|| TalesError::syntax(input, "unterminated '${' interpolation"))?;
            flush(&mut text, &mut parts);
            parts.push(StringPart::Interpolation(parse_expression(&inner[..end])?));
            rest = &inner[end + 1..];
        } else if let Ok((remaining, path)) = interpolated_path(after) {
            flush(&mut text, &mut parts);
            parts.push(StringPart::Interpolation(Expression::Path(path)));
            rest = remaining;
        } else {
            text.push('$');
            rest = after;
        }
    }
    text.push_str(rest);
    flush(&mut text, &mut parts);
    Ok(parts)
}

// --- Prefix Dispatch ---

fn type_prefix(text: &str) -> Option<(&str, &str)> {
    let (prefix, body) = text.split_once(':')?;
    let is_prefix = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c == '-' || c == '_');
    is_prefix.then_some((prefix, body))
}

fn prefixed(input: &str, prefix: &str, body: &str) -> Result<Expression, TalesError> {
    match prefix {
        "string" => Ok(Expression::String(parse_string_template(body)?)),
        "host" => {
            let code = body.trim();
            if code.is_empty() {
                return Err(TalesError::syntax(input, "empty host expression"));
            }
            Ok(Expression::Host(code.to_string()))
        }
        "not" => Ok(Expression::Not(Box::new(parse_expression(body)?))),
        "exists" => body
            .split('|')
            .map(|p| parse_path(input, p.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map(Expression::Exists),
        "path" => parse_expression(body),
        other => Err(TalesError::syntax(
            input,
            format!("unknown expression type '{}'", other),
        )),
    }
}

fn simple(input: &str, text: &str) -> Result<Expression, TalesError> {
    match text {
        "" => Err(TalesError::syntax(input, "empty expression")),
        "nothing" | "null" => Ok(Expression::Nothing),
        "default" => Ok(Expression::Default),
        _ => match literal(text) {
            Some(lit) => Ok(Expression::Literal(lit)),
            None => parse_path(input, text).map(Expression::Path),
        },
    }
}

fn literal(text: &str) -> Option<Literal> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Literal::Int(i));
    }
    text.parse::<f64>().ok().map(Literal::Float)
}

fn parse_path(input: &str, text: &str) -> Result<Path, TalesError> {
    match all_consuming(path).parse(text) {
        Ok((_, path)) => Ok(path),
        Err(_) => Err(TalesError::syntax(input, format!("invalid path '{}'", text))),
    }
}

/// Position of the `}` closing an interpolation, honouring nested braces.
fn matching_brace(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

// --- Path Combinators ---

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn segment(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-').parse(input)
}

fn to_path((root, segments): (&str, Vec<&str>)) -> Path {
    Path::new(root, segments.into_iter().map(str::to_string).collect())
}

/// `name/member.member`: both separators are accepted.
fn path(input: &str) -> IResult<&str, Path> {
    map(
        pair(identifier, many0(preceded(alt((char('/'), char('.'))), segment))),
        to_path,
    )
    .parse(input)
}

/// `$name/member` inside strings only takes `/` so trailing punctuation stays text.
fn interpolated_path(input: &str) -> IResult<&str, Path> {
    map(pair(identifier, many0(preceded(char('/'), segment))), to_path).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_expr(root: &str, segments: &[&str]) -> Expression {
        Expression::Path(Path::new(
            root,
            segments.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn test_parse_paths_with_both_separators() {
        assert_eq!(parse_expression("item/title").unwrap(), path_expr("item", &["title"]));
        assert_eq!(parse_expression(" item.rows.0 ").unwrap(), path_expr("item", &["rows", "0"]));
    }

    #[test]
    fn test_parse_sentinels_and_literals() {
        assert_eq!(parse_expression("nothing").unwrap(), Expression::Nothing);
        assert_eq!(parse_expression("null").unwrap(), Expression::Nothing);
        assert_eq!(parse_expression("default").unwrap(), Expression::Default);
        assert_eq!(parse_expression("42").unwrap(), Expression::Literal(Literal::Int(42)));
        assert_eq!(parse_expression("-1.5").unwrap(), Expression::Literal(Literal::Float(-1.5)));
    }

    #[test]
    fn test_parse_alternatives() {
        let expr = parse_expression("a/b | c | string:x|y").unwrap();
        assert_eq!(
            expr,
            Expression::Alternatives(vec![
                path_expr("a", &["b"]),
                path_expr("c", &[]),
                Expression::String(vec![StringPart::Text("x|y".into())]),
            ])
        );
    }

    #[test]
    fn test_parse_string_interpolation() {
        let parts = parse_string_template("Count=${count};$$ $user/name.").unwrap();
        assert_eq!(
            parts,
            vec![
                StringPart::Text("Count=".into()),
                StringPart::Interpolation(path_expr("count", &[])),
                StringPart::Text(";$ ".into()),
                StringPart::Interpolation(path_expr("user", &["name"])),
                StringPart::Text(".".into()),
            ]
        );
    }

    #[test]
    fn test_parse_string_interpolation_is_reentrant() {
        let parts = parse_string_template("${string:[${inner}]}").unwrap();
        assert_eq!(
            parts,
            vec![StringPart::Interpolation(Expression::String(vec![
                StringPart::Text("[".into()),
                StringPart::Interpolation(path_expr("inner", &[])),
                StringPart::Text("]".into()),
            ]))]
        );
    }

    #[test]
    fn test_unterminated_interpolation_is_error() {
        assert!(parse_string_template("${oops").is_err());
    }

    #[test]
    fn test_lone_dollar_is_text() {
        let parts = parse_string_template("costs 5$ now").unwrap();
        assert_eq!(parts, vec![StringPart::Text("costs 5$ now".into())]);
    }

    #[test]
    fn test_parse_prefixed_expressions() {
        assert_eq!(
            parse_expression("not: exists: a | b").unwrap(),
            Expression::Not(Box::new(Expression::Exists(vec![
                Path::new("a", vec![]),
                Path::new("b", vec![]),
            ])))
        );
        assert_eq!(
            parse_expression("host: count - 1").unwrap(),
            Expression::Host("count - 1".into())
        );
        assert_eq!(parse_expression("path: a/b").unwrap(), path_expr("a", &["b"]));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_expression("").is_err());
        assert!(parse_expression("a |").is_err());
        assert!(parse_expression("a b").is_err());
        let err = parse_expression("python: 1 + 1").unwrap_err();
        assert!(err.message.contains("unknown expression type 'python'"));
    }

    #[test]
    fn test_split_arguments() {
        assert_eq!(
            split_arguments(" a x ; b y;;z ;; "),
            vec!["a x".to_string(), "b y;z ;".to_string()]
        );
        assert_eq!(split_arguments("href default;class null;new test").len(), 3);
        assert!(split_arguments(" ; ").is_empty());
    }
}
