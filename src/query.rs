//! Query filter: a small pandas-`query` style language compiled to polars.
//!
//! ```text
//! BETX > 100 and S < 2500
//! abs(DX) >= 0.1 or KEYWORD == "MONITOR"
//! not isnull(K1L) && `my col` != 'x'
//! ```
//!
//! Text is tokenized, parsed into an untyped tree, then checked against the
//! table schema into a typed [`Predicate`]. Only a checked predicate is
//! compiled to a polars [`Expr`].

use crate::tfs::TfsTable;
use polars::prelude::*;
use std::fmt;
use std::ops::{Add, Div, Mul, Rem, Sub};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },
    #[error("unknown column '{name}' (available: {available})")]
    UnknownColumn { name: String, available: String },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("expression does not evaluate to true/false: {0}")]
    NotBoolean(String),
    #[error("query failed: {0}")]
    Engine(String),
}

impl From<PolarsError> for QueryError {
    fn from(err: PolarsError) -> Self {
        QueryError::Engine(err.to_string())
    }
}

/// Rows of a table that satisfy a query. Always a fresh frame.
#[derive(Debug, Clone)]
pub struct FilteredView {
    pub data: DataFrame,
    pub index: Option<String>,
    pub query: String,
}

impl FilteredView {
    pub fn unfiltered(table: &TfsTable) -> Self {
        Self {
            data: table.data.clone(),
            index: table.index().map(str::to_string),
            query: String::new(),
        }
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

/// A checked operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Column(String),
    Number(f64),
    Str(String),
    Bool(bool),
    Neg(Box<Value>),
    Abs(Box<Value>),
    Arith(ArithOp, Box<Value>, Box<Value>),
}

/// A checked boolean expression over one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    /// A boolean column used directly as a condition.
    Column(String),
    Compare(CmpOp, Value, Value),
    IsNull(Value),
    NotNull(Value),
    IsNan(Value),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Column(c) => write!(f, "{}", c),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Neg(v) => write!(f, "-{}", v),
            Value::Abs(v) => write!(f, "abs({})", v),
            Value::Arith(op, l, r) => write!(f, "({} {} {})", l, op.symbol(), r),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Const(b) => write!(f, "{}", b),
            Predicate::Column(c) => write!(f, "{}", c),
            Predicate::Compare(op, l, r) => write!(f, "{} {} {}", l, op.symbol(), r),
            Predicate::IsNull(v) => write!(f, "isnull({})", v),
            Predicate::NotNull(v) => write!(f, "notnull({})", v),
            Predicate::IsNan(v) => write!(f, "isnan({})", v),
            Predicate::Not(p) => write!(f, "not ({})", p),
            Predicate::And(l, r) => write!(f, "({}) and ({})", l, r),
            Predicate::Or(l, r) => write!(f, "({}) or ({})", l, r),
        }
    }
}

impl Value {
    pub fn to_expr(&self) -> Expr {
        match self {
            Value::Column(c) => col(c.as_str()),
            Value::Number(n) => lit(*n),
            Value::Str(s) => lit(s.clone()),
            Value::Bool(b) => lit(*b),
            Value::Neg(v) => lit(0.0).sub(v.to_expr()),
            Value::Abs(v) => v.to_expr().abs(),
            Value::Arith(op, l, r) => {
                let (l, r) = (l.to_expr(), r.to_expr());
                match op {
                    ArithOp::Add => l.add(r),
                    ArithOp::Sub => l.sub(r),
                    ArithOp::Mul => l.mul(r),
                    ArithOp::Div => l.div(r),
                    ArithOp::Rem => l.rem(r),
                }
            }
        }
    }
}

impl Predicate {
    pub fn to_expr(&self) -> Expr {
        match self {
            Predicate::Const(b) => lit(*b),
            Predicate::Column(c) => col(c.as_str()),
            Predicate::Compare(op, l, r) => {
                let (l, r) = (l.to_expr(), r.to_expr());
                match op {
                    CmpOp::Eq => l.eq(r),
                    CmpOp::Ne => l.neq(r),
                    CmpOp::Lt => l.lt(r),
                    CmpOp::Le => l.lt_eq(r),
                    CmpOp::Gt => l.gt(r),
                    CmpOp::Ge => l.gt_eq(r),
                }
            }
            Predicate::IsNull(v) => v.to_expr().is_null(),
            Predicate::NotNull(v) => v.to_expr().is_not_null(),
            Predicate::IsNan(v) => v.to_expr().cast(DataType::Float64).is_nan(),
            Predicate::Not(p) => p.to_expr().not(),
            Predicate::And(l, r) => l.to_expr().and(r.to_expr()),
            Predicate::Or(l, r) => l.to_expr().or(r.to_expr()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokenizer

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
}

/// Deepest expression tree a query may build.
pub const MAX_DEPTH: usize = 128;

fn syntax(message: impl Into<String>, position: usize) -> QueryError {
    QueryError::Syntax {
        message: message.into(),
        position,
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push((Token::LParen, pos));
                chars.next();
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                chars.next();
            }
            '"' | '\'' | '`' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == '\\' && quote != '`' {
                        match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, other)) => text.push(other),
                            None => break,
                        }
                    } else if c == quote {
                        closed = true;
                        break;
                    } else {
                        text.push(c);
                    }
                }
                if !closed {
                    return Err(syntax("unterminated quote", pos));
                }
                let token = if quote == '`' {
                    Token::Ident(text)
                } else {
                    Token::Str(text)
                };
                tokens.push((token, pos));
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let (op, double) = match (c, next) {
                    ('=', Some('=')) => ("==", true),
                    ('=', _) => ("==", false),
                    ('!', Some('=')) => ("!=", true),
                    ('!', _) => ("not", false),
                    ('<', Some('=')) => ("<=", true),
                    ('<', Some('>')) => ("!=", true),
                    ('<', _) => ("<", false),
                    ('>', Some('=')) => (">=", true),
                    ('>', _) => (">", false),
                    ('&', Some('&')) => ("and", true),
                    ('&', _) => ("and", false),
                    ('|', Some('|')) => ("or", true),
                    _ => ("or", false),
                };
                if double {
                    chars.next();
                }
                tokens.push((Token::Op(op), pos));
            }
            '~' => {
                tokens.push((Token::Op("not"), pos));
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' => {
                let op = match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    _ => "%",
                };
                tokens.push((Token::Op(op), pos));
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut text = String::new();
                while let Some(&(_, nc)) = chars.peek() {
                    let exponent_sign =
                        (nc == '+' || nc == '-') && text.ends_with(['e', 'E']);
                    if nc.is_ascii_digit() || nc == '.' || nc == 'e' || nc == 'E' || exponent_sign
                    {
                        text.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = text
                    .parse::<f64>()
                    .map_err(|_| syntax(format!("invalid number '{}'", text), pos))?;
                tokens.push((Token::Number(n), pos));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, nc)) = chars.peek() {
                    if nc.is_alphanumeric() || nc == '_' {
                        ident.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match ident.as_str() {
                    "and" => Token::Op("and"),
                    "or" => Token::Op("or"),
                    "not" => Token::Op("not"),
                    _ => Token::Ident(ident),
                };
                tokens.push((token, pos));
            }
            other => return Err(syntax(format!("unexpected character '{}'", other), pos)),
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Abs,
    IsNull,
    NotNull,
}

#[derive(Debug, Clone, PartialEq)]
enum Ast {
    Number(f64),
    Str(String),
    Bool(bool),
    Column(String),
    Neg(Box<Ast>),
    Not(Box<Ast>),
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Compare(CmpOp, Box<Ast>, Box<Ast>),
    Arith(ArithOp, Box<Ast>, Box<Ast>),
    Call(Func, Box<Ast>),
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
    /// Depth of the tree built so far along the current path.
    depth: usize,
}

impl Parser {
    /// Claim `levels` more tree depth, failing once the query nests past [`MAX_DEPTH`].
    fn descend(&mut self, levels: usize) -> Result<(), QueryError> {
        self.depth += levels;
        if self.depth > MAX_DEPTH {
            return Err(syntax("expression nested too deeply", self.position()));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(self.end)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_rparen(&mut self) -> Result<(), QueryError> {
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            Ok(())
        } else {
            Err(syntax("expected ')'", self.position()))
        }
    }

    // Each binary link of a left-leaning chain deepens the tree by one, so
    // chains claim depth as they grow and release it when done.

    fn or(&mut self) -> Result<Ast, QueryError> {
        let mut left = self.and()?;
        let mut links = 0;
        while self.eat_op("or") {
            self.descend(1)?;
            links += 1;
            let right = self.and()?;
            left = Ast::Or(Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn and(&mut self) -> Result<Ast, QueryError> {
        let mut left = self.not()?;
        let mut links = 0;
        while self.eat_op("and") {
            self.descend(1)?;
            links += 1;
            let right = self.not()?;
            left = Ast::And(Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn not(&mut self) -> Result<Ast, QueryError> {
        if self.eat_op("not") {
            self.descend(1)?;
            let inner = self.not()?;
            self.depth -= 1;
            return Ok(Ast::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison_op(&self) -> Option<CmpOp> {
        match self.peek() {
            Some(Token::Op("==")) => Some(CmpOp::Eq),
            Some(Token::Op("!=")) => Some(CmpOp::Ne),
            Some(Token::Op("<")) => Some(CmpOp::Lt),
            Some(Token::Op("<=")) => Some(CmpOp::Le),
            Some(Token::Op(">")) => Some(CmpOp::Gt),
            Some(Token::Op(">=")) => Some(CmpOp::Ge),
            _ => None,
        }
    }

    /// `a < b <= c` reads as `a < b and b <= c`.
    fn comparison(&mut self) -> Result<Ast, QueryError> {
        let mut left = self.sum()?;
        let mut chain: Option<Ast> = None;
        let mut links = 0;
        while let Some(op) = self.comparison_op() {
            self.pos += 1;
            self.descend(2)?;
            links += 2;
            let right = self.sum()?;
            let compare = Ast::Compare(op, Box::new(left), Box::new(right.clone()));
            chain = Some(match chain {
                Some(prev) => Ast::And(Box::new(prev), Box::new(compare)),
                None => compare,
            });
            left = right;
        }
        self.depth -= links;
        Ok(chain.unwrap_or(left))
    }

    fn sum(&mut self) -> Result<Ast, QueryError> {
        let mut left = self.product()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => ArithOp::Add,
                Some(Token::Op("-")) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend(1)?;
            links += 1;
            let right = self.product()?;
            left = Ast::Arith(op, Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn product(&mut self) -> Result<Ast, QueryError> {
        let mut left = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => ArithOp::Mul,
                Some(Token::Op("/")) => ArithOp::Div,
                Some(Token::Op("%")) => ArithOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.descend(1)?;
            links += 1;
            let right = self.unary()?;
            left = Ast::Arith(op, Box::new(left), Box::new(right));
        }
        self.depth -= links;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Ast, QueryError> {
        if self.eat_op("-") {
            self.descend(1)?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Ast::Neg(Box::new(inner)));
        }
        if self.eat_op("+") {
            self.descend(1)?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Ast, QueryError> {
        let position = self.position();
        let Some((token, _)) = self.tokens.get(self.pos).cloned() else {
            return Err(syntax("unexpected end of expression", position));
        };
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(Ast::Number(n)),
            Token::Str(s) => Ok(Ast::Str(s)),
            Token::LParen => {
                self.descend(1)?;
                let inner = self.or()?;
                self.expect_rparen()?;
                self.depth -= 1;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    let func = match name.as_str() {
                        "abs" => Func::Abs,
                        "isnull" | "isna" => Func::IsNull,
                        "notnull" | "notna" => Func::NotNull,
                        other => {
                            return Err(syntax(format!("unknown function '{}'", other), position))
                        }
                    };
                    self.pos += 1;
                    self.descend(1)?;
                    let arg = self.or()?;
                    self.expect_rparen()?;
                    self.depth -= 1;
                    return Ok(Ast::Call(func, Box::new(arg)));
                }
                match name.as_str() {
                    "true" | "True" => Ok(Ast::Bool(true)),
                    "false" | "False" => Ok(Ast::Bool(false)),
                    _ => Ok(Ast::Column(name)),
                }
            }
            Token::RParen => Err(syntax("unexpected ')'", position)),
            Token::Op(op) => Err(syntax(format!("unexpected '{}'", op), position)),
        }
    }
}

fn parse(input: &str) -> Result<Ast, QueryError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let ast = parser.or()?;
    if parser.pos < parser.tokens.len() {
        return Err(syntax("unexpected trailing input", parser.position()));
    }
    Ok(ast)
}

// ---------------------------------------------------------------------------
// Type checking

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Numeric,
    Str,
    Bool,
    Other,
}

impl Kind {
    fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => Kind::Bool,
            DataType::String => Kind::Str,
            d if d.is_numeric() => Kind::Numeric,
            _ => Kind::Other,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::Numeric => "number",
            Kind::Str => "string",
            Kind::Bool => "boolean",
            Kind::Other => "unsupported type",
        }
    }
}

struct Checker<'a> {
    schema: &'a Schema,
}

impl Checker<'_> {
    fn column_kind(&self, name: &str) -> Result<Kind, QueryError> {
        self.schema
            .get(name)
            .map(Kind::of)
            .ok_or_else(|| QueryError::UnknownColumn {
                name: name.to_string(),
                available: self
                    .schema
                    .iter_names()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    fn numeric(&self, ast: &Ast, context: &str) -> Result<Value, QueryError> {
        let (value, kind) = self.value(ast)?;
        if kind != Kind::Numeric {
            return Err(QueryError::TypeMismatch(format!(
                "{} needs a number, got {} ({})",
                context,
                kind.name(),
                value
            )));
        }
        Ok(value)
    }

    fn value(&self, ast: &Ast) -> Result<(Value, Kind), QueryError> {
        match ast {
            Ast::Number(n) => Ok((Value::Number(*n), Kind::Numeric)),
            Ast::Str(s) => Ok((Value::Str(s.clone()), Kind::Str)),
            Ast::Bool(b) => Ok((Value::Bool(*b), Kind::Bool)),
            Ast::Column(c) => Ok((Value::Column(c.clone()), self.column_kind(c)?)),
            Ast::Neg(inner) => Ok((
                Value::Neg(Box::new(self.numeric(inner, "negation")?)),
                Kind::Numeric,
            )),
            Ast::Call(Func::Abs, inner) => Ok((
                Value::Abs(Box::new(self.numeric(inner, "abs()")?)),
                Kind::Numeric,
            )),
            Ast::Arith(op, l, r) => {
                let context = format!("operator '{}'", op.symbol());
                let l = self.numeric(l, &context)?;
                let r = self.numeric(r, &context)?;
                Ok((Value::Arith(*op, Box::new(l), Box::new(r)), Kind::Numeric))
            }
            Ast::Compare(..) | Ast::And(..) | Ast::Or(..) | Ast::Not(..) | Ast::Call(..) => {
                Err(QueryError::TypeMismatch(
                    "a condition cannot be used as a value".to_string(),
                ))
            }
        }
    }

    fn predicate(&self, ast: &Ast) -> Result<Predicate, QueryError> {
        match ast {
            Ast::And(l, r) => Ok(Predicate::And(
                Box::new(self.predicate(l)?),
                Box::new(self.predicate(r)?),
            )),
            Ast::Or(l, r) => Ok(Predicate::Or(
                Box::new(self.predicate(l)?),
                Box::new(self.predicate(r)?),
            )),
            Ast::Not(inner) => Ok(Predicate::Not(Box::new(self.predicate(inner)?))),
            Ast::Bool(b) => Ok(Predicate::Const(*b)),
            // NaN counts as missing in numeric columns, TFS writers emit nan for gaps
            Ast::Call(Func::IsNull, inner) => match self.value(inner)? {
                (v, Kind::Numeric) => Ok(Predicate::Or(
                    Box::new(Predicate::IsNull(v.clone())),
                    Box::new(Predicate::IsNan(v)),
                )),
                (v, _) => Ok(Predicate::IsNull(v)),
            },
            Ast::Call(Func::NotNull, inner) => match self.value(inner)? {
                (v, Kind::Numeric) => Ok(Predicate::And(
                    Box::new(Predicate::NotNull(v.clone())),
                    Box::new(Predicate::Not(Box::new(Predicate::IsNan(v)))),
                )),
                (v, _) => Ok(Predicate::NotNull(v)),
            },
            Ast::Compare(op, l, r) => {
                let (lv, lk) = self.value(l)?;
                let (rv, rk) = self.value(r)?;
                if lk != rk || lk == Kind::Other {
                    return Err(QueryError::TypeMismatch(format!(
                        "cannot compare {} ({}) with {} ({})",
                        lk.name(),
                        lv,
                        rk.name(),
                        rv
                    )));
                }
                if lk == Kind::Bool && !matches!(op, CmpOp::Eq | CmpOp::Ne) {
                    return Err(QueryError::TypeMismatch(format!(
                        "booleans only support == and !=, got '{}'",
                        op.symbol()
                    )));
                }
                Ok(Predicate::Compare(*op, lv, rv))
            }
            Ast::Column(c) => match self.column_kind(c)? {
                Kind::Bool => Ok(Predicate::Column(c.clone())),
                kind => Err(QueryError::NotBoolean(format!(
                    "column '{}' holds {} values",
                    c,
                    kind.name()
                ))),
            },
            other => {
                let (value, kind) = self.value(other)?;
                Err(QueryError::NotBoolean(format!("{} is a {}", value, kind.name())))
            }
        }
    }
}

/// Parse and type-check `expression` against `schema`. Blank text gives `None`.
pub fn compile(expression: &str, schema: &Schema) -> Result<Option<Predicate>, QueryError> {
    if expression.trim().is_empty() {
        return Ok(None);
    }
    let ast = parse(expression)?;
    Checker { schema }.predicate(&ast).map(Some)
}

/// Rows of `table` for which `expression` holds. Blank text keeps every row.
pub fn filter(table: &TfsTable, expression: &str) -> Result<FilteredView, QueryError> {
    let Some(predicate) = compile(expression, table.data.schema())? else {
        return Ok(FilteredView::unfiltered(table));
    };
    debug!(query = %expression, predicate = %predicate, "applying query");
    let data = table
        .data
        .clone()
        .lazy()
        .filter(predicate.to_expr())
        .collect()?;
    Ok(FilteredView {
        data,
        index: table.index().map(str::to_string),
        query: expression.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfs::{Headers, TfsTable};

    fn table() -> TfsTable {
        let df = df!(
            "NAME" => ["IP1", "MQ.1", "BPM", "IP5"],
            "S" => [0.0, 12.5, 20.0, 40.0],
            "BETX" => [0.55, 101.2, f64::NAN, 0.55],
            "N" => [1i64, 2, 3, 4],
            "ON" => [true, false, true, false],
        )
        .unwrap();
        TfsTable::new(Headers::new(), df)
    }

    fn names(view: &FilteredView) -> Vec<String> {
        view.data
            .column("NAME")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn blank_query_is_identity() {
        let t = table();
        let view = filter(&t, "   ").unwrap();
        assert!(view.data.equals_missing(&t.data));
        assert_eq!(view.query, "");
    }

    #[test]
    fn numeric_comparison() {
        let view = filter(&table(), "S > 10").unwrap();
        assert_eq!(names(&view), vec!["MQ.1", "BPM", "IP5"]);
    }

    #[test]
    fn boolean_connectives_and_precedence() {
        let view = filter(&table(), "S > 10 and N < 4 or NAME == 'IP1'").unwrap();
        assert_eq!(names(&view), vec!["IP1", "MQ.1", "BPM"]);
        let view = filter(&table(), "not (S > 10) && ON").unwrap();
        assert_eq!(names(&view), vec!["IP1"]);
    }

    #[test]
    fn arithmetic_and_functions() {
        let view = filter(&table(), "abs(S - 20) <= 7.5 * 1").unwrap();
        assert_eq!(names(&view), vec!["MQ.1", "BPM"]);
        let view = filter(&table(), "N % 2 == 0").unwrap();
        assert_eq!(names(&view), vec!["MQ.1", "IP5"]);
        let view = filter(&table(), "-S < -15").unwrap();
        assert_eq!(names(&view), vec!["BPM", "IP5"]);
    }

    #[test]
    fn scientific_notation_numbers() {
        let view = filter(&table(), "S >= 1.25e1").unwrap();
        assert_eq!(names(&view), vec!["MQ.1", "BPM", "IP5"]);
    }

    #[test]
    fn isnull_treats_nan_as_missing() {
        let view = filter(&table(), "isnull(BETX)").unwrap();
        assert_eq!(names(&view), vec!["BPM"]);
        let view = filter(&table(), "notnull(BETX)").unwrap();
        assert_eq!(view.height(), 3);
    }

    #[test]
    fn notnull_on_strings_keeps_present_values() {
        let view = filter(&table(), "notnull(NAME)").unwrap();
        assert_eq!(view.height(), 4);
    }

    #[test]
    fn boolean_column_alone_is_a_predicate() {
        let view = filter(&table(), "ON == true").unwrap();
        assert_eq!(names(&view), vec!["IP1", "BPM"]);
        let view = filter(&table(), "ON").unwrap();
        assert_eq!(view.height(), 2);
    }

    #[test]
    fn unknown_column() {
        let err = filter(&table(), "BETY > 1").unwrap_err();
        assert!(matches!(err, QueryError::UnknownColumn { ref name, .. } if name == "BETY"));
    }

    #[test]
    fn type_mismatch() {
        assert!(matches!(
            filter(&table(), "NAME > 5"),
            Err(QueryError::TypeMismatch(_))
        ));
        assert!(matches!(
            filter(&table(), "ON < true"),
            Err(QueryError::TypeMismatch(_))
        ));
    }

    #[test]
    fn not_boolean() {
        assert!(matches!(filter(&table(), "S + 1"), Err(QueryError::NotBoolean(_))));
        assert!(matches!(filter(&table(), "S"), Err(QueryError::NotBoolean(_))));
    }

    #[test]
    fn syntax_errors_carry_position() {
        match filter(&table(), "S > ") {
            Err(QueryError::Syntax { position, .. }) => assert_eq!(position, 4),
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(matches!(
            filter(&table(), "(S > 1"),
            Err(QueryError::Syntax { .. })
        ));
        assert!(matches!(
            filter(&table(), "S > 1 S"),
            Err(QueryError::Syntax { .. })
        ));
        assert!(matches!(
            filter(&table(), "NAME == \"IP1"),
            Err(QueryError::Syntax { position: 8, .. })
        ));
    }

    #[test]
    fn backticks_name_columns() {
        let df = df!("my col" => [1i64, 2, 3]).unwrap();
        let t = TfsTable::new(Headers::new(), df);
        let view = filter(&t, "`my col` >= 2").unwrap();
        assert_eq!(view.height(), 2);
    }

    #[test]
    fn filter_does_not_touch_input() {
        let t = table();
        let before = t.data.clone();
        filter(&t, "S > 10").unwrap();
        assert!(t.data.equals_missing(&before));
    }

    #[test]
    fn chained_comparisons_mean_and() {
        let view = filter(&table(), "10 < S <= 20").unwrap();
        assert_eq!(names(&view), vec!["MQ.1", "BPM"]);
        let view = filter(&table(), "1 <= N < 3").unwrap();
        assert_eq!(names(&view), vec!["IP1", "MQ.1"]);
    }

    fn nested_too_deeply(query: &str) -> bool {
        matches!(
            filter(&table(), query),
            Err(QueryError::Syntax { ref message, .. }) if message.contains("nested too deeply")
        )
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        assert!(nested_too_deeply(&format!("{}S > 1", "not ".repeat(1_000))));
        assert!(nested_too_deeply(&format!(
            "{}S > 1{}",
            "(".repeat(3_000),
            ")".repeat(3_000)
        )));
        assert!(nested_too_deeply(&format!("{}S", "-".repeat(5_000))));
        assert!(nested_too_deeply(&format!("abs({}S > 1", "abs(".repeat(500))));
        let long_chain = vec!["S > 1"; 2_000].join(" or ");
        assert!(nested_too_deeply(&long_chain));
    }

    #[test]
    fn moderate_nesting_still_runs() {
        let query = format!("{}S > 10{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(filter(&table(), &query).unwrap().height(), 3);
        let query = format!("{}(S > 10)", "not not ".repeat(10));
        assert_eq!(filter(&table(), &query).unwrap().height(), 3);
        let names_query = vec!["NAME == 'IP1'"; 40].join(" or ");
        assert_eq!(filter(&table(), &names_query).unwrap().height(), 1);
    }
}
