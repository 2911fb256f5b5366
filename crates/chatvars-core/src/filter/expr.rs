//! Filter expressions over message fields.
//!
//! Expressions look like `is_user == false && name != "Narrator"` or
//! `!is_system && extra.model == "gpt"`. Field paths are dotted; a path
//! that does not resolve evaluates to `null`.

use futures::future::{self, BoxFuture};
use serde_json::Value;

use super::{is_truthy, FilterOutcome, FilterScope, MessageFilter};
use crate::error::{Result, VariableError};

/// Deepest `!` / parenthesis nesting a filter may use
const MAX_NESTING: usize = 64;

/// Longest filter, in tokens. Bounds the depth of `&&` / `||` chains.
const MAX_TOKENS: usize = 512;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(Vec<String>),
    Literal(Value),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(format!("expected '{c}{c}' at position {i}"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            '=' => {
                if chars.get(i + 1) != Some(&'=') {
                    return Err(format!("expected '==' at position {i}"));
                }
                tokens.push(Token::Op(CompareOp::Eq));
                i += 2;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::NotEq));
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' | '>' => {
                let with_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, with_eq) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::LtEq,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::GtEq,
                };
                tokens.push(Token::Op(op));
                i += if with_eq { 2 } else { 1 };
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".into()),
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                text.push(escaped);
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(Value::String(text)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number: f64 = text
                    .parse()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                let literal = serde_json::Number::from_f64(number)
                    .map(Value::Number)
                    .ok_or_else(|| format!("invalid number '{text}'"))?;
                tokens.push(Token::Literal(literal));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" => Token::Literal(Value::Null),
                    _ => {
                        let segments: Vec<String> = word.split('.').map(str::to_string).collect();
                        if segments.iter().any(|s| s.is_empty()) {
                            return Err(format!("invalid field path '{word}'"));
                        }
                        Token::Path(segments)
                    }
                };
                tokens.push(token);
            }
            other => return Err(format!("unexpected character '{other}' at position {i}")),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Path(Vec<String>),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Truthy(Operand),
    Compare(Operand, CompareOp, Operand),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> std::result::Result<T, String>,
    ) -> std::result::Result<T, String> {
        if self.depth >= MAX_NESTING {
            return Err(format!("expression nests deeper than {MAX_NESTING} levels"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> std::result::Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> std::result::Result<Expr, String> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.nested(Self::parse_or)?;
            if self.next() != Some(Token::RParen) {
                return Err("expected ')'".into());
            }
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let right = self.parse_operand()?;
            return Ok(Expr::Compare(left, op, right));
        }
        Ok(Expr::Truthy(left))
    }

    fn parse_operand(&mut self) -> std::result::Result<Operand, String> {
        match self.next() {
            Some(Token::Path(segments)) => Ok(Operand::Path(segments)),
            Some(Token::Literal(value)) => Ok(Operand::Literal(value)),
            Some(other) => Err(format!("expected a field or literal, found {other:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn lookup(scope: &FilterScope, path: &[String]) -> Value {
    let Some((first, rest)) = path.split_first() else {
        return Value::Null;
    };
    let mut current = match scope.get(first) {
        Some(value) => value,
        None => return Value::Null,
    };
    for segment in rest {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(left), as_number(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s.trim() == b.to_string()
        }
        _ => left == right,
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    match op {
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::NotEq => !loose_eq(left, right),
        ordering => {
            let order = match (as_number(left), as_number(right)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => match (left, right) {
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => None,
                },
            };
            let Some(order) = order else {
                return false;
            };
            match ordering {
                CompareOp::Lt => order.is_lt(),
                CompareOp::LtEq => order.is_le(),
                CompareOp::Gt => order.is_gt(),
                _ => order.is_ge(),
            }
        }
    }
}

impl Operand {
    fn value(&self, scope: &FilterScope) -> Value {
        match self {
            Operand::Path(path) => lookup(scope, path),
            Operand::Literal(value) => value.clone(),
        }
    }
}

impl Expr {
    fn eval(&self, scope: &FilterScope) -> bool {
        match self {
            Expr::Truthy(operand) => is_truthy(&operand.value(scope)),
            Expr::Compare(left, op, right) => compare(&left.value(scope), *op, &right.value(scope)),
            Expr::Not(inner) => !inner.eval(scope),
            Expr::And(left, right) => left.eval(scope) && right.eval(scope),
            Expr::Or(left, right) => left.eval(scope) || right.eval(scope),
        }
    }
}

/// Filter parsed from a textual expression
#[derive(Debug, Clone)]
pub struct ExpressionFilter {
    source: String,
    expr: Expr,
}

impl ExpressionFilter {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source).map_err(VariableError::Filter)?;
        if tokens.is_empty() {
            return Err(VariableError::Filter("empty filter expression".into()));
        }
        if tokens.len() > MAX_TOKENS {
            return Err(VariableError::Filter(format!(
                "filter expression is longer than {MAX_TOKENS} tokens"
            )));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or().map_err(VariableError::Filter)?;
        if let Some(extra) = parser.peek() {
            return Err(VariableError::Filter(format!(
                "unexpected {extra:?} after end of expression"
            )));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, scope: &FilterScope) -> bool {
        self.expr.eval(scope)
    }
}

impl MessageFilter for ExpressionFilter {
    fn evaluate<'a>(&'a self, scope: FilterScope) -> BoxFuture<'a, Result<FilterOutcome>> {
        let keep = self.matches(&scope);
        Box::pin(future::ready(Ok(FilterOutcome::new(Value::Bool(keep)))))
    }
}
