//! A small recursive-descent parser and evaluator for derived-value
//! expressions: `expr ::= literal | ref | binop | ternary | call`.
//!
//! Grammar (highest to lowest precedence):
//!   primary    := literal | ref | '(' expr ')' | call | unary
//!   unary      := ('!' | '-') unary | primary
//!   multiplic. := unary (('*' | '/') unary)*
//!   additive   := multiplic. (('+' | '-') multiplic.)*
//!   relational := additive (('<' | '<=' | '>' | '>=' | 'startsWith' | 'endsWith' | 'contains') additive)*
//!   equality   := relational (('==' | '!=') relational)*
//!   and        := equality ('&&' equality)*
//!   or         := and ('||' and)*
//!   ternary    := or ('?' expr ':' expr)?

use payment_core_types::CoreError;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ref(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StartsWith,
    EndsWith,
    Contains,
    And,
    Or,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

/// Parse `src` into an [`Expr`] tree.
pub fn parse(src: &str) -> Result<Expr> {
    let mut p = Parser { src, pos: 0 };
    let e = p.parse_ternary()?;
    p.skip_ws();
    if p.pos != p.src.len() {
        return Err(syntax_err(src, p.pos, "trailing input"));
    }
    Ok(e)
}

fn syntax_err(expr: &str, pos: usize, reason: &str) -> Error {
    Error::ExpressionSyntax {
        expr: expr.to_string(),
        pos,
        reason: reason.to_string(),
    }
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while self.src[self.pos..].starts_with(|c: char| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn starts_with(&self, tok: &str) -> bool {
        self.rest().starts_with(tok)
    }

    fn consume(&mut self, tok: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(tok) {
            self.pos += tok.len();
            true
        } else {
            false
        }
    }

    /// Like `consume`, but only matches `tok` when it is not immediately
    /// followed by another identifier character, so `truest` doesn't parse
    /// as the keyword `true` plus a stray `st`.
    fn consume_keyword(&mut self, tok: &str) -> bool {
        self.skip_ws();
        if !self.rest().starts_with(tok) {
            return false;
        }
        let after = &self.rest()[tok.len()..];
        if after.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
        self.pos += tok.len();
        true
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let cond = self.parse_or()?;
        self.skip_ws();
        if self.consume("?") {
            let then_branch = self.parse_ternary()?;
            self.skip_ws();
            if !self.consume(":") {
                return Err(syntax_err(self.src, self.pos, "expected ':' in ternary"));
            }
            let else_branch = self.parse_ternary()?;
            return Ok(Expr::Ternary(
                Box::new(cond),
                Box::new(then_branch),
                Box::new(else_branch),
            ));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.consume("||") {
                let rhs = self.parse_and()?;
                lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        loop {
            self.skip_ws();
            if self.consume("&&") {
                let rhs = self.parse_equality()?;
                lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            self.skip_ws();
            let op = if self.consume("==") {
                BinOp::Eq
            } else if self.consume("!=") {
                BinOp::Ne
            } else {
                break;
            };
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            self.skip_ws();
            let op = if self.consume("<=") {
                BinOp::Le
            } else if self.consume(">=") {
                BinOp::Ge
            } else if self.consume("<") {
                BinOp::Lt
            } else if self.consume(">") {
                BinOp::Gt
            } else if self.consume_keyword("startsWith") {
                BinOp::StartsWith
            } else if self.consume_keyword("endsWith") {
                BinOp::EndsWith
            } else if self.consume_keyword("contains") {
                BinOp::Contains
            } else {
                break;
            };
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            self.skip_ws();
            let op = if self.consume("+") {
                BinOp::Add
            } else if self.consume("-") {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            self.skip_ws();
            let op = if self.consume("*") {
                BinOp::Mul
            } else if self.consume("/") {
                BinOp::Div
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.consume("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.consume("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.consume("(") {
            let e = self.parse_ternary()?;
            self.skip_ws();
            if !self.consume(")") {
                return Err(syntax_err(self.src, self.pos, "expected ')'"));
            }
            return Ok(e);
        }
        if self.rest().starts_with('"') || self.rest().starts_with('\'') {
            return self.parse_string_literal();
        }
        if self.rest().starts_with(|c: char| c.is_ascii_digit()) {
            return self.parse_number_literal();
        }
        if self.consume_keyword("true") {
            return Ok(Expr::Literal(Value::Bool(true)));
        }
        if self.consume_keyword("false") {
            return Ok(Expr::Literal(Value::Bool(false)));
        }
        if self.consume_keyword("null") {
            return Ok(Expr::Literal(Value::Null));
        }
        self.parse_ident_or_call()
    }

    fn parse_string_literal(&mut self) -> Result<Expr> {
        let quote = self.rest().chars().next().unwrap();
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.src.len() && self.src.as_bytes()[self.pos] != quote as u8 {
            self.pos += 1;
        }
        if self.pos >= self.src.len() {
            return Err(syntax_err(self.src, start, "unterminated string literal"));
        }
        let s = self.src[start..self.pos].to_string();
        self.pos += 1;
        Ok(Expr::Literal(Value::String(s)))
    }

    fn parse_number_literal(&mut self) -> Result<Expr> {
        let start = self.pos;
        while matches!(self.src.as_bytes().get(self.pos), Some(b) if b.is_ascii_digit() || *b == b'.')
        {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];
        let num: f64 = text
            .parse()
            .map_err(|_| syntax_err(self.src, start, "invalid number literal"))?;
        Ok(Expr::Literal(
            serde_json::Number::from_f64(num)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        ))
    }

    fn parse_ident_or_call(&mut self) -> Result<Expr> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src.as_bytes()[self.pos].is_ascii_alphanumeric()
                || matches!(self.src.as_bytes()[self.pos], b'_' | b'.' | b'[' | b']'))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(syntax_err(self.src, self.pos, "expected identifier, literal or '('"));
        }
        let ident = &self.src[start..self.pos];
        self.skip_ws();
        if self.consume("(") {
            let mut args = Vec::new();
            self.skip_ws();
            if !self.starts_with(")") {
                loop {
                    args.push(self.parse_ternary()?);
                    self.skip_ws();
                    if self.consume(",") {
                        continue;
                    }
                    break;
                }
            }
            if !self.consume(")") {
                return Err(syntax_err(self.src, self.pos, "expected ')' closing call"));
            }
            return Ok(Expr::Call(ident.to_string(), args));
        }
        Ok(Expr::Ref(ident.to_string()))
    }
}

/// Evaluate `expr` against `source`, the payload fields it may reference.
pub fn eval(expr: &Expr, source: &Value) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ref(path) => Ok(crate::path::get(source, path).cloned().unwrap_or(Value::Null)),
        Expr::Unary(op, inner) => eval_unary(*op, &eval(inner, source)?),
        Expr::Binary(op, lhs, rhs) => {
            // Short-circuit boolean operators without evaluating the other side.
            if *op == BinOp::And {
                let l = eval(lhs, source)?;
                if !truthy(&l) {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(truthy(&eval(rhs, source)?)));
            }
            if *op == BinOp::Or {
                let l = eval(lhs, source)?;
                if truthy(&l) {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(truthy(&eval(rhs, source)?)));
            }
            eval_binary(*op, &eval(lhs, source)?, &eval(rhs, source)?)
        }
        Expr::Ternary(cond, then_b, else_b) => {
            if truthy(&eval(cond, source)?) {
                eval(then_b, source)
            } else {
                eval(else_b, source)
            }
        }
        Expr::Call(name, args) => {
            let values: std::result::Result<Vec<Value>, Error> =
                args.iter().map(|a| eval(a, source)).collect();
            eval_call(name, &values?)
        }
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_f64(v: &Value) -> Result<f64> {
    v.as_f64().ok_or_else(|| {
        Error::Core(CoreError::TypeCoercionError(format!(
            "expected a number, got {}",
            v
        )))
    })
}

fn eval_unary(op: UnaryOp, v: &Value) -> Result<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!truthy(v))),
        UnaryOp::Neg => Ok(Value::from(-as_f64(v)?)),
    }
}

fn eval_binary(op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    Ok(match op {
        BinOp::Add => match (l, r) {
            (Value::String(a), _) => Value::String(format!("{}{}", a, to_display(r))),
            (_, Value::String(b)) => Value::String(format!("{}{}", to_display(l), b)),
            _ => Value::from(as_f64(l)? + as_f64(r)?),
        },
        BinOp::Sub => Value::from(as_f64(l)? - as_f64(r)?),
        BinOp::Mul => Value::from(as_f64(l)? * as_f64(r)?),
        BinOp::Div => {
            let divisor = as_f64(r)?;
            if divisor == 0.0 {
                return Err(Error::Core(CoreError::ExpressionEvalError(
                    "division by zero".to_string(),
                )));
            }
            Value::from(as_f64(l)? / divisor)
        }
        // Numeric literals always parse as f64, so a source field stored as
        // a JSON integer (e.g. 1000) must still compare equal to it; only
        // fall back to structural equality once both sides agree they
        // aren't numbers.
        BinOp::Eq => Value::Bool(values_equal(l, r)),
        BinOp::Ne => Value::Bool(!values_equal(l, r)),
        BinOp::Lt => Value::Bool(as_f64(l)? < as_f64(r)?),
        BinOp::Le => Value::Bool(as_f64(l)? <= as_f64(r)?),
        BinOp::Gt => Value::Bool(as_f64(l)? > as_f64(r)?),
        BinOp::Ge => Value::Bool(as_f64(l)? >= as_f64(r)?),
        BinOp::StartsWith => Value::Bool(to_display(l).starts_with(&to_display(r))),
        BinOp::EndsWith => Value::Bool(to_display(l).ends_with(&to_display(r))),
        BinOp::Contains => Value::Bool(to_display(l).contains(&to_display(r))),
        BinOp::And | BinOp::Or => unreachable!("handled by short-circuit path in eval()"),
    })
}

fn values_equal(l: &Value, r: &Value) -> bool {
    if let (Some(lf), Some(rf)) = (l.as_f64(), r.as_f64()) {
        return lf == rf;
    }
    l == r
}

fn to_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn eval_call(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "concat" => Ok(Value::String(args.iter().map(to_display).collect())),
        "upper" => Ok(Value::String(string_arg(args, 0)?.to_uppercase())),
        "lower" => Ok(Value::String(string_arg(args, 0)?.to_lowercase())),
        "trim" => Ok(Value::String(string_arg(args, 0)?.trim().to_string())),
        "len" => Ok(Value::from(match args.first() {
            Some(Value::String(s)) => s.chars().count() as f64,
            Some(Value::Array(a)) => a.len() as f64,
            _ => 0.0,
        })),
        "coalesce" => Ok(args
            .iter()
            .find(|v| !matches!(v, Value::Null))
            .cloned()
            .unwrap_or(Value::Null)),
        "abs" => Ok(Value::from(as_f64(args.first().unwrap_or(&Value::Null))?.abs())),
        other => Err(Error::Core(CoreError::ExpressionEvalError(format!(
            "unknown function `{}`",
            other
        )))),
    }
}

fn string_arg(args: &[Value], idx: usize) -> Result<String> {
    Ok(to_display(args.get(idx).ok_or_else(|| {
        Error::Core(CoreError::ExpressionEvalError(format!(
            "missing argument {}",
            idx
        )))
    })?))
}
