//! Guard predicates (`if:` expressions)
//!
//! Only the structure the plan needs is interpreted: the status functions
//! `success()`, `failure()`, `always()` and `cancelled()`, combined with
//! `!`, `&&`, `||` and parentheses. Anything else, such as
//! `github.ref == 'refs/heads/main'`, is kept as an opaque operand and
//! resolved by whoever walks the plan.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at offset {offset})")]
pub struct GuardSyntaxError {
    pub message: String,
    pub offset: usize,
}

/// Status functions understood by the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCheck {
    Success,
    Failure,
    Always,
    Cancelled,
}

impl StatusCheck {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "success" => Some(StatusCheck::Success),
            "failure" => Some(StatusCheck::Failure),
            "always" => Some(StatusCheck::Always),
            "cancelled" => Some(StatusCheck::Cancelled),
            _ => None,
        }
    }
}

/// Parsed guard expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardExpr {
    Status(StatusCheck),
    /// Uninterpreted operand, stored in normalised spacing
    Opaque(String),
    Not(Box<GuardExpr>),
    And(Box<GuardExpr>, Box<GuardExpr>),
    Or(Box<GuardExpr>, Box<GuardExpr>),
}

/// What the walker knows when it evaluates a guard
pub trait GuardInputs {
    /// Some earlier step (or needed job) failed
    fn failed(&self) -> bool;
    /// The run was cancelled
    fn cancelled(&self) -> bool;
    /// Value of an opaque operand
    fn resolve(&self, expression: &str) -> bool;
}

impl GuardExpr {
    fn mentions_status(&self) -> bool {
        match self {
            GuardExpr::Status(_) => true,
            GuardExpr::Opaque(_) => false,
            GuardExpr::Not(inner) => inner.mentions_status(),
            GuardExpr::And(a, b) | GuardExpr::Or(a, b) => a.mentions_status() || b.mentions_status(),
        }
    }

    fn eval(&self, inputs: &dyn GuardInputs) -> bool {
        match self {
            GuardExpr::Status(StatusCheck::Success) => !inputs.failed() && !inputs.cancelled(),
            GuardExpr::Status(StatusCheck::Failure) => inputs.failed(),
            GuardExpr::Status(StatusCheck::Always) => true,
            GuardExpr::Status(StatusCheck::Cancelled) => inputs.cancelled(),
            GuardExpr::Opaque(expr) => inputs.resolve(expr),
            GuardExpr::Not(inner) => !inner.eval(inputs),
            GuardExpr::And(a, b) => a.eval(inputs) && b.eval(inputs),
            GuardExpr::Or(a, b) => a.eval(inputs) || b.eval(inputs),
        }
    }

    fn write(&self, out: &mut String, parent: u8) {
        // precedence: or = 1, and = 2, not = 3
        match self {
            GuardExpr::Status(check) => {
                let name = match check {
                    StatusCheck::Success => "success()",
                    StatusCheck::Failure => "failure()",
                    StatusCheck::Always => "always()",
                    StatusCheck::Cancelled => "cancelled()",
                };
                out.push_str(name);
            }
            GuardExpr::Opaque(expr) => {
                if parent > 0 && expr.contains(' ') {
                    out.push('(');
                    out.push_str(expr);
                    out.push(')');
                } else {
                    out.push_str(expr);
                }
            }
            GuardExpr::Not(inner) => {
                out.push('!');
                inner.write(out, 3);
            }
            GuardExpr::And(a, b) | GuardExpr::Or(a, b) => {
                let (prec, op) = if matches!(self, GuardExpr::And(..)) {
                    (2, " && ")
                } else {
                    (1, " || ")
                };
                if parent > prec {
                    out.push('(');
                }
                a.write(out, prec);
                out.push_str(op);
                b.write(out, prec);
                if parent > prec {
                    out.push(')');
                }
            }
        }
    }
}

/// Which prior outcome lets a guarded step run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardTrigger {
    /// Runs only if everything before succeeded (the default)
    OnSuccess,
    /// Runs only if something before failed
    OnFailure,
    /// Runs regardless of prior outcome
    Always,
    /// Depends on values only known at run time
    Conditional,
}

/// A compiled guard predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    expr: Option<GuardExpr>,
}

impl Default for Guard {
    fn default() -> Self {
        Self::success()
    }
}

impl Guard {
    /// The implicit guard of a step without `if:`
    pub fn success() -> Self {
        Self { expr: None }
    }

    /// Parse an `if:` expression, with or without a `${{ }}` wrapper
    pub fn parse(source: &str) -> Result<Self, GuardSyntaxError> {
        let body = strip_wrapper(source);
        let tokens = tokenize(body)?;
        if tokens.is_empty() {
            return Err(GuardSyntaxError {
                message: "expression is empty".to_string(),
                offset: 0,
            });
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some((token, offset)) = parser.tokens.get(parser.pos) {
            return Err(GuardSyntaxError {
                message: format!("unexpected `{}`", token),
                offset: *offset,
            });
        }
        Ok(Self { expr: Some(expr) })
    }

    pub fn expr(&self) -> Option<&GuardExpr> {
        self.expr.as_ref()
    }

    /// Evaluate the guard. An expression without any status function is
    /// implicitly `success() && <expr>`.
    pub fn evaluate(&self, inputs: &dyn GuardInputs) -> bool {
        match &self.expr {
            None => GuardExpr::Status(StatusCheck::Success).eval(inputs),
            Some(expr) if !expr.mentions_status() => {
                GuardExpr::Status(StatusCheck::Success).eval(inputs) && expr.eval(inputs)
            }
            Some(expr) => expr.eval(inputs),
        }
    }

    /// Classify the guard by which prior outcome it reacts to
    pub fn trigger(&self) -> GuardTrigger {
        match &self.expr {
            None => GuardTrigger::OnSuccess,
            Some(GuardExpr::Status(StatusCheck::Success)) => GuardTrigger::OnSuccess,
            Some(GuardExpr::Status(StatusCheck::Failure)) => GuardTrigger::OnFailure,
            Some(GuardExpr::Status(StatusCheck::Always)) => GuardTrigger::Always,
            Some(_) => GuardTrigger::Conditional,
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            None => f.write_str("success()"),
            Some(expr) => {
                let mut out = String::new();
                expr.write(&mut out, 0);
                f.write_str(&out)
            }
        }
    }
}

impl Serialize for Guard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn strip_wrapper(source: &str) -> &str {
    let trimmed = source.trim();
    trimmed
        .strip_prefix("${{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    /// Identifier, literal, dotted path or comparison operator
    Atom(String),
    /// Quoted string literal, quotes included
    Str(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Not => f.write_str("!"),
            Token::And => f.write_str("&&"),
            Token::Or => f.write_str("||"),
            Token::Atom(text) | Token::Str(text) => f.write_str(text),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, GuardSyntaxError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::LParen, offset));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, offset));
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push((Token::Atom("!=".to_string()), offset));
                i += 2;
            }
            '!' => {
                tokens.push((Token::Not, offset));
                i += 1;
            }
            '&' | '|' => {
                if next != Some(c) {
                    return Err(GuardSyntaxError {
                        message: format!("expected `{}{}`", c, c),
                        offset,
                    });
                }
                let token = if c == '&' { Token::And } else { Token::Or };
                tokens.push((token, offset));
                i += 2;
            }
            '\'' => {
                let mut literal = String::from('\'');
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    let ch = chars[j].1;
                    literal.push(ch);
                    j += 1;
                    if ch == '\'' {
                        // '' is an escaped quote
                        if chars.get(j).map(|(_, c)| *c) == Some('\'') {
                            literal.push('\'');
                            j += 1;
                            continue;
                        }
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(GuardSyntaxError {
                        message: "unterminated string literal".to_string(),
                        offset,
                    });
                }
                tokens.push((Token::Str(literal), offset));
                i = j;
            }
            _ => {
                let mut atom = String::new();
                let mut j = i;
                while j < chars.len() {
                    let ch = chars[j].1;
                    let next = chars.get(j + 1).map(|(_, c)| *c);
                    let stops = ch.is_whitespace()
                        || matches!(ch, '(' | ')' | '\'' | '&' | '|')
                        || (ch == '!' && next != Some('='));
                    if stops {
                        break;
                    }
                    atom.push(ch);
                    j += 1;
                }
                tokens.push((Token::Atom(atom), offset));
                i = j;
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, o)| *o)
            .unwrap_or(0)
    }

    fn error(&self, message: &str) -> GuardSyntaxError {
        GuardSyntaxError {
            message: message.to_string(),
            offset: self.offset(),
        }
    }

    fn parse_or(&mut self) -> Result<GuardExpr, GuardSyntaxError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = GuardExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<GuardExpr, GuardSyntaxError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = GuardExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<GuardExpr, GuardSyntaxError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(GuardExpr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<GuardExpr, GuardSyntaxError> {
        match self.peek() {
            None => Err(self.error("expected an operand")),
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(self.error("expected `)`"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Atom(name)) => {
                let is_call = self.tokens.get(self.pos + 1).map(|(t, _)| t) == Some(&Token::LParen);
                let is_empty_call =
                    is_call && self.tokens.get(self.pos + 2).map(|(t, _)| t) == Some(&Token::RParen);
                match StatusCheck::from_name(name) {
                    Some(check) if is_empty_call => {
                        self.pos += 3;
                        Ok(GuardExpr::Status(check))
                    }
                    Some(_) if is_call => Err(self.error("status functions take no arguments")),
                    _ => self.parse_opaque(),
                }
            }
            Some(Token::Str(_)) => self.parse_opaque(),
            Some(_) => Err(self.error("expected an operand")),
        }
    }

    /// Consume tokens up to the next top-level `&&`, `||` or unmatched `)`
    fn parse_opaque(&mut self) -> Result<GuardExpr, GuardSyntaxError> {
        let mut parts: Vec<String> = Vec::new();
        let mut depth = 0usize;

        while let Some(token) = self.peek() {
            match token {
                Token::And | Token::Or if depth == 0 => break,
                Token::RParen if depth == 0 => break,
                Token::LParen => {
                    depth += 1;
                    parts.push("(".to_string());
                }
                Token::RParen => {
                    depth -= 1;
                    parts.push(")".to_string());
                }
                Token::Not => parts.push("!".to_string()),
                Token::And => parts.push("&&".to_string()),
                Token::Or => parts.push("||".to_string()),
                Token::Atom(a) | Token::Str(a) => parts.push(a.clone()),
            }
            self.pos += 1;
        }

        if depth > 0 {
            return Err(self.error("expected `)`"));
        }
        if parts.is_empty() {
            return Err(self.error("expected an operand"));
        }
        Ok(GuardExpr::Opaque(join_parts(&parts)))
    }
}

fn join_parts(parts: &[String]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        let glue = i > 0
            && part != ")"
            && part != ","
            && parts[i - 1] != "("
            && parts[i - 1] != "!"
            && !(part == "(" && !is_operator(&parts[i - 1]));
        if glue {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}

fn is_operator(part: &str) -> bool {
    matches!(part, "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||")
}
