//! # Amount Expressions
//!
//! Integer arithmetic over named contract parameters, e.g. `Price*2` or
//! `(Nominal - Fee) / 4`.
//!
//! ```text
//!   expr   := term (('+' | '-') term)*
//!   term   := factor (('*' | '/') factor)*
//!   factor := number | name | '(' expr ')' | '-' factor
//! ```
//!
//! Division truncates toward zero. Every operation is checked.

use ledger_types::{Amount, Balance, DvpParameter};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("Syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown parameter `{0}`")]
    UnknownParameter(String),

    #[error("Parameter `{0}` has no value")]
    Unset(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Number(Balance),
    Name(String),
    Neg(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    root: Node,
}

struct Parser<'s> {
    src: &'s [u8],
    pos: usize,
}

impl<'s> Parser<'s> {
    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            position: self.pos,
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(b'+') => Op::Add,
                Some(b'-') => Op::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(b'*') => Op::Mul,
                Some(b'/') => Op::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.factor()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn factor(&mut self) -> Result<Node, ExpressionError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if self.peek() != Some(b')') {
                    return Err(self.error("expected `)`"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(b'-') => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.factor()?)))
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.src[start..self.pos])
                    .map_err(|_| self.error("invalid number"))?;
                text.parse::<Balance>()
                    .map(Node::Number)
                    .map_err(|_| ExpressionError::Overflow)
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                let start = self.pos;
                while self.pos < self.src.len()
                    && (self.src[self.pos].is_ascii_alphanumeric() || self.src[self.pos] == b'_')
                {
                    self.pos += 1;
                }
                let name = std::str::from_utf8(&self.src[start..self.pos])
                    .map_err(|_| self.error("invalid name"))?;
                Ok(Node::Name(name.to_string()))
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let mut parser = Parser {
            src: source.as_bytes(),
            pos: 0,
        };
        let root = parser.expr()?;
        if parser.peek().is_some() {
            return Err(parser.error("trailing input"));
        }
        Ok(Self { root })
    }

    /// Every parameter name the expression reads.
    pub fn variables(&self) -> BTreeSet<String> {
        fn walk(node: &Node, out: &mut BTreeSet<String>) {
            match node {
                Node::Number(_) => {}
                Node::Name(n) => {
                    out.insert(n.clone());
                }
                Node::Neg(inner) => walk(inner, out),
                Node::Binary(_, l, r) => {
                    walk(l, out);
                    walk(r, out);
                }
            }
        }
        let mut out = BTreeSet::new();
        walk(&self.root, &mut out);
        out
    }

    pub fn evaluate(
        &self,
        lookup: &dyn Fn(&str) -> Result<Balance, ExpressionError>,
    ) -> Result<Balance, ExpressionError> {
        fn eval(
            node: &Node,
            lookup: &dyn Fn(&str) -> Result<Balance, ExpressionError>,
        ) -> Result<Balance, ExpressionError> {
            match node {
                Node::Number(v) => Ok(*v),
                Node::Name(n) => lookup(n),
                Node::Neg(inner) => eval(inner, lookup)?
                    .checked_neg()
                    .ok_or(ExpressionError::Overflow),
                Node::Binary(op, l, r) => {
                    let (a, b) = (eval(l, lookup)?, eval(r, lookup)?);
                    match op {
                        Op::Add => a.checked_add(b).ok_or(ExpressionError::Overflow),
                        Op::Sub => a.checked_sub(b).ok_or(ExpressionError::Overflow),
                        Op::Mul => a.checked_mul(b).ok_or(ExpressionError::Overflow),
                        Op::Div => {
                            if b == 0 {
                                return Err(ExpressionError::DivisionByZero);
                            }
                            a.checked_div(b).ok_or(ExpressionError::Overflow)
                        }
                    }
                }
            }
        }
        eval(&self.root, lookup)
    }
}

/// Value of a pay or receive amount against a contract's parameters.
pub fn amount_value(
    amount: &Amount,
    parameters: &BTreeMap<String, DvpParameter>,
) -> Result<Balance, ExpressionError> {
    match amount {
        Amount::Fixed(v) => Ok(*v),
        Amount::Expr(source) => {
            let lookup = |name: &str| -> Result<Balance, ExpressionError> {
                let param = parameters
                    .get(name)
                    .ok_or_else(|| ExpressionError::UnknownParameter(name.to_string()))?;
                param
                    .value
                    .ok_or_else(|| ExpressionError::Unset(name.to_string()))
            };
            Expression::parse(source)?.evaluate(&lookup)
        }
    }
}
