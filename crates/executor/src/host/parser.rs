//! A `nom`-based parser for `host:` expressions.
//!
//! Precedence from loosest to tightest: `or`, `and`, `not`, comparisons
//! (including `in` / `not in`), `+ -`, `* / // %`, unary minus, then
//! member access, indexing and calls.
use super::HostError;
use super::ast::{BinaryOp, HostExpr, UnaryOp};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, terminated},
};
use talc_tales::Value;

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "True", "False", "None", "true", "false", "null",
];

// --- Main Public Parser ---

pub fn parse_host(code: &str) -> Result<HostExpr, HostError> {
    match all_consuming(ws(or_expr)).parse(code) {
        Ok((_, expr)) => Ok(expr),
        Err(e) => Err(HostError::Syntax {
            code: code.to_string(),
            message: e.to_string(),
        }),
    }
}

// --- Operators ---

/// Parses `operand (operator operand)*`, folding to the left.
fn fold_binary<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, HostExpr>,
    operator: fn(&'a str) -> IResult<&'a str, BinaryOp>,
) -> IResult<&'a str, HostExpr> {
    let (mut input, mut lhs) = operand(input)?;
    loop {
        match operator(input) {
            Ok((rest, op)) => {
                let (rest, rhs) = operand(rest)?;
                lhs = HostExpr::Binary(op, Box::new(lhs), Box::new(rhs));
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, lhs)),
            Err(e) => return Err(e),
        }
    }
}

fn or_expr(input: &str) -> IResult<&str, HostExpr> {
    fold_binary(input, and_expr, |i| {
        value(BinaryOp::Or, ws(keyword("or"))).parse(i)
    })
}

fn and_expr(input: &str) -> IResult<&str, HostExpr> {
    fold_binary(input, not_expr, |i| {
        value(BinaryOp::And, ws(keyword("and"))).parse(i)
    })
}

fn not_expr(input: &str) -> IResult<&str, HostExpr> {
    alt((
        map(preceded(ws(keyword("not")), not_expr), |e| {
            HostExpr::Unary(UnaryOp::Not, Box::new(e))
        }),
        comparison,
    ))
    .parse(input)
}

fn comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    ws(alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
        value(
            BinaryOp::NotIn,
            pair(keyword("not"), preceded(multispace1, keyword("in"))),
        ),
        value(BinaryOp::In, keyword("in")),
    )))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, HostExpr> {
    let (input, lhs) = additive(input)?;
    match comparison_op(input) {
        Ok((rest, op)) => {
            let (rest, rhs) = additive(rest)?;
            Ok((rest, HostExpr::Binary(op, Box::new(lhs), Box::new(rhs))))
        }
        Err(nom::Err::Error(_)) => Ok((input, lhs)),
        Err(e) => Err(e),
    }
}

fn additive(input: &str) -> IResult<&str, HostExpr> {
    fold_binary(input, term, |i| {
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        )))
        .parse(i)
    })
}

fn term(input: &str) -> IResult<&str, HostExpr> {
    fold_binary(input, unary, |i| {
        ws(alt((
            value(BinaryOp::FloorDiv, tag("//")),
            value(BinaryOp::Mul, tag("*")),
            value(BinaryOp::Div, tag("/")),
            value(BinaryOp::Mod, tag("%")),
        )))
        .parse(i)
    })
}

fn unary(input: &str) -> IResult<&str, HostExpr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| {
            HostExpr::Unary(UnaryOp::Neg, Box::new(e))
        }),
        postfix,
    ))
    .parse(input)
}

// --- Postfix: member, index, call ---

enum Suffix {
    Member(String),
    Index(HostExpr),
    Call(Vec<HostExpr>),
}

fn suffix(input: &str) -> IResult<&str, Suffix> {
    alt((
        map(preceded(ws(char('.')), identifier), |name| {
            Suffix::Member(name.to_string())
        }),
        map(delimited(ws(char('[')), or_expr, ws(char(']'))), Suffix::Index),
        map(arguments, Suffix::Call),
    ))
    .parse(input)
}

fn arguments(input: &str) -> IResult<&str, Vec<HostExpr>> {
    delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), or_expr),
        ws(char(')')),
    )
    .parse(input)
}

fn postfix(input: &str) -> IResult<&str, HostExpr> {
    let (mut input, mut expr) = ws(primary).parse(input)?;
    loop {
        let (rest, next) = match suffix(input) {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(_)) => return Ok((input, expr)),
            Err(e) => return Err(e),
        };
        expr = match (next, expr) {
            (Suffix::Member(name), target) => HostExpr::Member(Box::new(target), name),
            (Suffix::Index(index), target) => HostExpr::Index(Box::new(target), Box::new(index)),
            (Suffix::Call(args), HostExpr::Name(function)) => HostExpr::Call { function, args },
            (Suffix::Call(args), HostExpr::Member(target, function)) => {
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(*target);
                all.extend(args);
                HostExpr::Call {
                    function,
                    args: all,
                }
            }
            (Suffix::Call(_), _) => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Verify,
                )));
            }
        };
        input = rest;
    }
}

// --- Primaries ---

fn primary(input: &str) -> IResult<&str, HostExpr> {
    alt((
        map(number, HostExpr::Literal),
        map(string_literal, |s| HostExpr::Literal(Value::Str(s.to_string()))),
        map(constant, HostExpr::Literal),
        map(list, HostExpr::List),
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        map(name, |n| HostExpr::Name(n.to_string())),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |text: &str| {
            if text.contains('.') {
                text.parse::<f64>().map(Value::Float).map_err(|_| ())
            } else {
                text.parse::<i64>().map(Value::Int).map_err(|_| ())
            }
        },
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
    ))
    .parse(input)
}

fn constant(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Bool(true), alt((keyword("True"), keyword("true")))),
        value(Value::Bool(false), alt((keyword("False"), keyword("false")))),
        value(Value::Nothing, alt((keyword("None"), keyword("null")))),
    ))
    .parse(input)
}

fn list(input: &str) -> IResult<&str, Vec<HostExpr>> {
    delimited(
        char('['),
        separated_list0(ws(char(',')), or_expr),
        ws(char(']')),
    )
    .parse(input)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_identifier_char),
    ))
    .parse(input)
}

fn name(input: &str) -> IResult<&str, &str> {
    verify(identifier, |n: &str| !KEYWORDS.contains(&n)).parse(input)
}

fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(satisfy(is_identifier_char)))
}

/// A combinator that takes a parser `inner` and produces a parser that consumes surrounding whitespace.
fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}
