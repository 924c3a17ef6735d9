// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SQL-like filter engine (C8, §4.7).
//!
//! Compiles expressions of the shape `field op value [and|or …]` into a
//! predicate over a [`Context`]. The grammar honors normal precedence
//! (`and` binds tighter than `or`), parenthesized groups, and a small
//! set of operators including MQTT-wildcard-aware `like` on the `topic`
//! field. The compiled form never throws on a type mismatch: an
//! ill-typed clause simply evaluates to `false` (§4.7, §7).

use crate::error::FilterError;
use crate::message::Context;

/// A comparison operator recognized by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `like`
    Like,
    /// `not like`
    NotLike,
    /// `in`
    In,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Like => "like",
            Op::NotLike => "not like",
            Op::In => "in",
        }
    }
}

/// A literal value on the right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A quoted string literal.
    Str(String),
    /// A numeric literal.
    Num(f64),
    /// `true`/`false`.
    Bool(bool),
    /// A parenthesized, comma-separated list (right-hand side of `in`).
    List(Vec<FilterValue>),
}

impl FilterValue {
    fn to_sql(&self) -> String {
        match self {
            FilterValue::Str(s) => format!("'{}'", s.replace('\'', "\\'")),
            FilterValue::Num(n) => {
                if n.fract() == 0.0 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(FilterValue::to_sql).collect();
                format!("({})", rendered.join(", "))
            }
        }
    }
}

/// One `field op value` atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// The dotted/indexed field path (resolved against [`Context::resolve`]).
    pub field: String,
    /// The comparison operator.
    pub op: Op,
    /// The right-hand-side literal.
    pub value: FilterValue,
}

impl Predicate {
    fn to_sql(&self) -> String {
        format!("{} {} {}", self.field, self.op.as_sql(), self.value.to_sql())
    }

    fn eval(&self, ctx: &Context) -> bool {
        let resolved = ctx.resolve(&resolve_field_alias(&self.field));
        match self.op {
            Op::Eq => values_equal(&resolved, &self.value),
            Op::Ne => !values_equal(&resolved, &self.value),
            Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                compare_numeric(&resolved, &self.value, self.op).unwrap_or(false)
            }
            Op::Like => self.eval_like(&resolved),
            Op::NotLike => !plain_like(&resolved, &self.value),
            Op::In => eval_in(&resolved, &self.value),
        }
    }

    fn eval_like(&self, resolved: &serde_json::Value) -> bool {
        if self.field == "topic" {
            if let FilterValue::Str(pattern) = &self.value {
                if pattern.contains('+') || pattern.contains('#') {
                    return resolved
                        .as_str()
                        .is_some_and(|topic| crate::topic::matches(pattern, topic));
                }
            }
        }
        plain_like(resolved, &self.value)
    }
}

/// `message` is kept as a legacy-shorthand alias for the `message_raw`
/// context field (§6 "grep/contains" conversion predates the `message_raw`
/// field name).
fn resolve_field_alias(field: &str) -> String {
    if field == "message" {
        "message_raw".to_string()
    } else {
        field.to_string()
    }
}

fn plain_like(resolved: &serde_json::Value, value: &FilterValue) -> bool {
    let FilterValue::Str(pattern) = value else {
        return false;
    };
    let Some(text) = value_as_str(resolved) else {
        return false;
    };
    sql_like(&text, pattern)
}

fn value_as_number(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn value_as_str(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_bool(v: &serde_json::Value) -> Option<bool> {
    match v {
        serde_json::Value::Bool(b) => Some(*b),
        _ => None,
    }
}

fn values_equal(a: &serde_json::Value, b: &FilterValue) -> bool {
    if a.is_null() {
        return false;
    }
    match b {
        FilterValue::Bool(expected) => value_as_bool(a) == Some(*expected),
        FilterValue::Num(expected) => {
            value_as_number(a).is_some_and(|actual| (actual - expected).abs() < f64::EPSILON)
        }
        FilterValue::Str(expected) => value_as_str(a).is_some_and(|actual| &actual == expected),
        FilterValue::List(_) => false,
    }
}

fn compare_numeric(a: &serde_json::Value, b: &FilterValue, op: Op) -> Option<bool> {
    let av = value_as_number(a)?;
    let bv = match b {
        FilterValue::Num(n) => *n,
        FilterValue::Str(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    Some(match op {
        Op::Lt => av < bv,
        Op::Le => av <= bv,
        Op::Gt => av > bv,
        Op::Ge => av >= bv,
        _ => unreachable!("compare_numeric only called for ordering operators"),
    })
}

fn eval_in(a: &serde_json::Value, b: &FilterValue) -> bool {
    match b {
        FilterValue::List(items) => items.iter().any(|item| values_equal(a, item)),
        _ => false,
    }
}

/// Matches `text` against a SQL-`LIKE` pattern (`%` = any substring,
/// `_` = any single char), case-sensitive, anchored to the full string.
fn sql_like(text: &str, pattern: &str) -> bool {
    sql_like_bytes(text.as_bytes(), pattern.as_bytes())
}

fn sql_like_bytes(text: &[u8], pattern: &[u8]) -> bool {
    match (text.first(), pattern.first()) {
        (_, Some(b'%')) => {
            sql_like_bytes(text, &pattern[1..])
                || (!text.is_empty() && sql_like_bytes(&text[1..], pattern))
        }
        (Some(_), Some(b'_')) => sql_like_bytes(&text[1..], &pattern[1..]),
        (Some(t), Some(p)) if t == p => sql_like_bytes(&text[1..], &pattern[1..]),
        (None, None) => true,
        _ => false,
    }
}

/// How a clause combines with the clauses already compiled into a
/// [`FilterExpression`] (§3 "clauses each tagged `BASE|AND|OR`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    /// The first clause in the expression.
    Base,
    /// Conjunction with the existing expression.
    And,
    /// Disjunction with the existing expression.
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum ExprNode {
    Predicate(Predicate),
    And(Box<ExprNode>, Box<ExprNode>),
    Or(Box<ExprNode>, Box<ExprNode>),
}

impl ExprNode {
    fn eval(&self, ctx: &Context) -> bool {
        match self {
            ExprNode::Predicate(p) => p.eval(ctx),
            ExprNode::And(l, r) => l.eval(ctx) && r.eval(ctx),
            ExprNode::Or(l, r) => l.eval(ctx) || r.eval(ctx),
        }
    }

    fn to_sql(&self) -> String {
        match self {
            ExprNode::Predicate(p) => p.to_sql(),
            ExprNode::And(l, r) => format!("{} and {}", render_and_operand(l), render_and_operand(r)),
            ExprNode::Or(l, r) => format!("{} or {}", l.to_sql(), r.to_sql()),
        }
    }
}

fn render_and_operand(node: &ExprNode) -> String {
    match node {
        ExprNode::Or(..) => format!("({})", node.to_sql()),
        _ => node.to_sql(),
    }
}

/// A compiled, immutable filter expression (§3 `FilterExpression`, §4.7).
#[derive(Debug, Clone, Default)]
pub struct FilterExpression {
    root: Option<ExprNode>,
    clauses: Vec<(Joiner, String)>,
}

impl FilterExpression {
    /// An expression with no clauses; [`FilterExpression::matches`]
    /// returns `false` against every context until a clause is added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `source` as a single top-level expression (honoring
    /// `and`/`or` precedence and parentheses) and returns it as a
    /// one-clause [`FilterExpression`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] on a syntax error.
    pub fn parse(source: &str) -> Result<Self, FilterError> {
        let node = parse_source(source)?;
        Ok(Self {
            root: Some(node),
            clauses: vec![(Joiner::Base, source.to_string())],
        })
    }

    /// Parses `text` and appends it to the expression under `joiner`.
    /// The very first clause is always tagged [`Joiner::Base`]
    /// regardless of the `joiner` argument.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] on a syntax error in `text`.
    pub fn add_clause(&mut self, text: &str, joiner: Joiner) -> Result<(), FilterError> {
        let node = parse_source(text)?;
        let effective_joiner = if self.root.is_none() { Joiner::Base } else { joiner };
        self.root = Some(match self.root.take() {
            None => node,
            Some(existing) => match effective_joiner {
                Joiner::Or => ExprNode::Or(Box::new(existing), Box::new(node)),
                Joiner::And | Joiner::Base => ExprNode::And(Box::new(existing), Box::new(node)),
            },
        });
        self.clauses.push((effective_joiner, text.to_string()));
        Ok(())
    }

    /// Discards all clauses.
    pub fn clear(&mut self) {
        self.root = None;
        self.clauses.clear();
    }

    /// The source text of each clause as originally supplied, tagged by
    /// how it joins the expression (for a `filter show` style renderer).
    #[must_use]
    pub fn clauses(&self) -> &[(Joiner, String)] {
        &self.clauses
    }

    /// Renders a canonical, re-parseable SQL-like string.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.root.as_ref().map(ExprNode::to_sql).unwrap_or_default()
    }

    /// Evaluates the compiled expression against `ctx`. An expression
    /// with no clauses matches nothing.
    #[must_use]
    pub fn matches(&self, ctx: &Context) -> bool {
        self.root.as_ref().is_some_and(|node| node.eval(ctx))
    }
}

/// Converts the CLI's legacy `field:pattern` shorthand into the SQL-like
/// grammar (§4.7, §6). Passed through unchanged if it already looks like
/// a compiled expression (contains ` like ` or ` = `).
#[must_use]
pub fn convert_legacy_shorthand(input: &str) -> String {
    if input.contains(" like ") || input.contains(" = ") {
        return input.to_string();
    }
    input
        .split_whitespace()
        .map(convert_shorthand_token)
        .collect::<Vec<_>>()
        .join(" and ")
}

fn convert_shorthand_token(token: &str) -> String {
    let Some((field, rest)) = token.split_once(':') else {
        return token.to_string();
    };
    match field {
        "qos" => format!("qos = {rest}"),
        "grep" | "contains" => format!("message like '%{rest}%'"),
        _ => format!("{field} like '{rest}'"),
    }
}

// --- Tokenizer and recursive-descent parser -------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Bool(bool),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
    Like,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FilterError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'(' => {
                tokens.push((i, Token::LParen));
                i += 1;
            }
            b')' => {
                tokens.push((i, Token::RParen));
                i += 1;
            }
            b',' => {
                tokens.push((i, Token::Comma));
                i += 1;
            }
            b'\'' | b'"' => {
                let quote = c;
                let start = i;
                i += 1;
                let mut s = String::new();
                loop {
                    if i >= bytes.len() {
                        return Err(FilterError::new(start, "unterminated string literal"));
                    }
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        s.push(bytes[i + 1] as char);
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        i += 1;
                        break;
                    }
                    s.push(bytes[i] as char);
                    i += 1;
                }
                tokens.push((start, Token::Str(s)));
            }
            b'=' => {
                tokens.push((i, Token::Eq));
                i += 1;
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push((i, Token::Ne));
                i += 2;
            }
            b'<' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push((i, Token::Le));
                i += 2;
            }
            b'<' => {
                tokens.push((i, Token::Lt));
                i += 1;
            }
            b'>' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push((i, Token::Ge));
                i += 2;
            }
            b'>' => {
                tokens.push((i, Token::Gt));
                i += 1;
            }
            b'-' | b'0'..=b'9' => {
                let start = i;
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &source[start..i];
                let num = text
                    .parse::<f64>()
                    .map_err(|_| FilterError::new(start, format!("invalid number literal '{text}'")))?;
                tokens.push((start, Token::Num(num)));
            }
            _ if is_ident_start(c) => {
                let start = i;
                i += 1;
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                let word = &source[start..i];
                tokens.push((start, keyword_or_ident(word)));
            }
            other => {
                return Err(FilterError::new(
                    i,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        }
    }
    Ok(tokens)
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || c == b'[' || c == b']'
}

fn keyword_or_ident(word: &str) -> Token {
    match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "like" => Token::Like,
        "in" => Token::In,
        "true" => Token::Bool(true),
        "false" => Token::Bool(false),
        _ => Token::Ident(word.to_string()),
    }
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<(usize, Token)>, source: &'a str) -> Self {
        Self { tokens, pos: 0, source }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn current_pos(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.source.len(), |(p, _)| *p)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), FilterError> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            _ => Err(FilterError::new(self.current_pos(), format!("expected {what}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<ExprNode, FilterError> {
        let mut node = self.parse_term()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_term()?;
            node = ExprNode::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_term(&mut self) -> Result<ExprNode, FilterError> {
        let mut node = self.parse_clause()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_clause()?;
            node = ExprNode::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_clause(&mut self) -> Result<ExprNode, FilterError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.advance();
            let inner = self.parse_expr()?;
            self.expect(&Token::RParen, "')'")?;
            Ok(inner)
        } else {
            self.parse_predicate()
        }
    }

    fn parse_predicate(&mut self) -> Result<ExprNode, FilterError> {
        let field = match self.advance() {
            Some(Token::Ident(name)) => name,
            _ => return Err(FilterError::new(self.current_pos(), "expected field name")),
        };
        let op = self.parse_op()?;
        let value = self.parse_value()?;
        Ok(ExprNode::Predicate(Predicate { field, op, value }))
    }

    fn parse_op(&mut self) -> Result<Op, FilterError> {
        match self.advance() {
            Some(Token::Eq) => Ok(Op::Eq),
            Some(Token::Ne) => Ok(Op::Ne),
            Some(Token::Lt) => Ok(Op::Lt),
            Some(Token::Le) => Ok(Op::Le),
            Some(Token::Gt) => Ok(Op::Gt),
            Some(Token::Ge) => Ok(Op::Ge),
            Some(Token::Like) => Ok(Op::Like),
            Some(Token::In) => Ok(Op::In),
            Some(Token::Not) => {
                self.expect(&Token::Like, "'like' after 'not'")?;
                Ok(Op::NotLike)
            }
            _ => Err(FilterError::new(self.current_pos(), "expected a comparison operator")),
        }
    }

    fn parse_value(&mut self) -> Result<FilterValue, FilterError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.advance();
            let mut items = vec![self.parse_scalar()?];
            while matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
                items.push(self.parse_scalar()?);
            }
            self.expect(&Token::RParen, "')'")?;
            Ok(FilterValue::List(items))
        } else {
            self.parse_scalar()
        }
    }

    fn parse_scalar(&mut self) -> Result<FilterValue, FilterError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(FilterValue::Str(s)),
            Some(Token::Num(n)) => Ok(FilterValue::Num(n)),
            Some(Token::Bool(b)) => Ok(FilterValue::Bool(b)),
            _ => Err(FilterError::new(self.current_pos(), "expected a value")),
        }
    }
}

fn parse_source(source: &str) -> Result<ExprNode, FilterError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(FilterError::new(0, "empty expression"));
    }
    let mut parser = Parser::new(tokens, source);
    let node = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(FilterError::new(parser.current_pos(), "unexpected trailing input"));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Direction, Message, MessageType, Qos};

    fn ctx_for(topic: &str, body: &str) -> Context {
        Message::builder(MessageType::Publish, Direction::Incoming)
            .topic(topic)
            .payload(body.as_bytes().to_vec())
            .build()
            .context()
    }

    #[test]
    fn simple_eq_predicate() {
        let filter = FilterExpression::parse("qos = 1").unwrap();
        let ctx = Message::builder(MessageType::Publish, Direction::Incoming)
            .qos(Qos::AtLeastOnce)
            .build()
            .context();
        assert!(filter.matches(&ctx));
    }

    #[test]
    fn and_or_precedence() {
        let filter = FilterExpression::parse("qos = 9 and qos = 9 or topic = 'a/b'").unwrap();
        let ctx = ctx_for("a/b", "{}");
        assert!(filter.matches(&ctx));
    }

    #[test]
    fn parentheses_override_precedence() {
        let filter = FilterExpression::parse("(qos = 1 or qos = 2) and topic = 'a/b'").unwrap();
        let ctx = Message::builder(MessageType::Publish, Direction::Incoming)
            .topic("a/b")
            .qos(Qos::AtLeastOnce)
            .build()
            .context();
        assert!(filter.matches(&ctx));
    }

    #[test]
    fn payload_json_path_comparison() {
        let filter = FilterExpression::parse("payload.temperature > 30").unwrap();
        assert!(filter.matches(&ctx_for("sensors/r1/temp", r#"{"temperature":32}"#)));
        assert!(!filter.matches(&ctx_for("sensors/r1/temp", r#"{"temperature":25}"#)));
    }

    #[test]
    fn topic_like_dispatches_to_wildcard_matcher() {
        let filter = FilterExpression::parse("topic like 'sensors/+/temp'").unwrap();
        assert!(filter.matches(&ctx_for("sensors/r1/temp", "{}")));
        assert!(!filter.matches(&ctx_for("sensors/r1/humidity", "{}")));
    }

    #[test]
    fn plain_like_uses_sql_wildcards() {
        let filter = FilterExpression::parse("topic like 'sensors/%'").unwrap();
        assert!(filter.matches(&ctx_for("sensors/anything/here", "{}")));
    }

    #[test]
    fn in_operator_matches_membership() {
        let filter = FilterExpression::parse("qos in (0, 2)").unwrap();
        let ctx = Message::builder(MessageType::Publish, Direction::Incoming)
            .qos(Qos::ExactlyOnce)
            .build()
            .context();
        assert!(filter.matches(&ctx));
    }

    #[test]
    fn missing_field_compares_unequal_except_to_null() {
        let filter_eq = FilterExpression::parse("payload.missing = 'x'").unwrap();
        let filter_ne = FilterExpression::parse("payload.missing != 'x'").unwrap();
        let ctx = ctx_for("a/b", "{}");
        assert!(!filter_eq.matches(&ctx));
        assert!(filter_ne.matches(&ctx));
    }

    #[test]
    fn to_sql_round_trips_semantically() {
        let original = FilterExpression::parse("(qos = 1 or qos = 2) and topic = 'a/b'").unwrap();
        let reparsed = FilterExpression::parse(&original.to_sql()).unwrap();
        let ctx = Message::builder(MessageType::Publish, Direction::Incoming)
            .topic("a/b")
            .qos(Qos::AtLeastOnce)
            .build()
            .context();
        assert_eq!(original.matches(&ctx), reparsed.matches(&ctx));
    }

    #[test]
    fn add_clause_joins_with_and_or_or() {
        let mut filter = FilterExpression::new();
        filter.add_clause("qos = 0", Joiner::Base).unwrap();
        filter.add_clause("qos = 2", Joiner::Or).unwrap();
        let ctx = Message::builder(MessageType::Publish, Direction::Incoming)
            .qos(Qos::ExactlyOnce)
            .build()
            .context();
        assert!(filter.matches(&ctx));
    }

    #[test]
    fn clear_empties_the_expression() {
        let mut filter = FilterExpression::parse("qos = 1").unwrap();
        filter.clear();
        assert_eq!(filter.to_sql(), "");
        assert!(!filter.matches(&ctx_for("a/b", "{}")));
    }

    #[test]
    fn legacy_shorthand_conversion() {
        let converted = convert_legacy_shorthand("topic:sensors/# qos:1");
        assert_eq!(converted, "topic like 'sensors/#' and qos = 1");
    }

    #[test]
    fn legacy_shorthand_grep_and_contains() {
        assert_eq!(
            convert_legacy_shorthand("grep:hello"),
            "message like '%hello%'"
        );
        assert_eq!(
            convert_legacy_shorthand("contains:world"),
            "message like '%world%'"
        );
    }

    #[test]
    fn legacy_shorthand_passthrough_when_already_compiled() {
        let input = "topic like 'a/#' and qos = 1";
        assert_eq!(convert_legacy_shorthand(input), input);
    }

    #[test]
    fn unterminated_string_is_a_parse_error() {
        assert!(FilterExpression::parse("topic = 'a").is_err());
    }

    #[test]
    fn unknown_operator_is_a_parse_error() {
        assert!(FilterExpression::parse("topic ?? 'a'").is_err());
    }
}
