use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{map, recognize},
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair},
    IResult,
};

use crate::frame::{Frame, FrameError, Value};

/// A derived-column expression over frame columns: column references,
/// numeric literals, and the four arithmetic operators.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Col(String),
    Lit(f64),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Col(name.into())
    }

    /// Display form, used for derived-column names and auto axis labels.
    pub fn name(&self) -> String {
        match self {
            Expr::Col(c) => c.clone(),
            Expr::Lit(v) => format!("{}", v),
            Expr::Add(a, b) => format!("{} + {}", a.name(), b.name()),
            Expr::Sub(a, b) => format!("{} - {}", a.name(), b.name()),
            Expr::Mul(a, b) => format!("{} * {}", a.name(), b.name()),
            Expr::Div(a, b) => format!("{} / {}", a.name(), b.name()),
        }
    }

    /// Evaluate against a frame, one value per row. Arithmetic on a string
    /// cell is an upstream expression error; nulls propagate.
    pub fn eval(&self, frame: &Frame) -> Result<Vec<Value>, FrameError> {
        match self {
            Expr::Col(name) => frame.column(name),
            Expr::Lit(v) => Ok(vec![Value::Num(*v); frame.n_rows()]),
            Expr::Add(a, b) => eval_binary(a, b, frame, "+", |x, y| x + y),
            Expr::Sub(a, b) => eval_binary(a, b, frame, "-", |x, y| x - y),
            Expr::Mul(a, b) => eval_binary(a, b, frame, "*", |x, y| x * y),
            Expr::Div(a, b) => eval_binary(a, b, frame, "/", |x, y| x / y),
        }
    }
}

fn eval_binary(
    a: &Expr,
    b: &Expr,
    frame: &Frame,
    op: &str,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Vec<Value>, FrameError> {
    let lhs = a.eval(frame)?;
    let rhs = b.eval(frame)?;
    lhs.iter()
        .zip(rhs.iter())
        .map(|(l, r)| match (l, r) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Num(x), Value::Num(y)) => Ok(Value::Num(f(*x, *y))),
            _ => Err(FrameError::Expr(format!(
                "cannot apply `{}` to non-numeric values in `{} {} {}`",
                op,
                a.name(),
                op,
                b.name()
            ))),
        })
        .collect()
}

/// Parse a complete expression string, requiring all input to be consumed.
pub fn parse_expr(input: &str) -> Result<Expr, FrameError> {
    match expr(input) {
        Ok((rest, parsed)) if rest.trim().is_empty() => Ok(parsed),
        Ok((rest, _)) => Err(FrameError::Expr(format!(
            "trailing input after expression: {:?}",
            rest
        ))),
        Err(e) => Err(FrameError::Expr(format!(
            "failed to parse {:?}: {}",
            input, e
        ))),
    }
}

/// Consume surrounding whitespace
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Column identifier: [a-zA-Z_][a-zA-Z0-9_]*
fn identifier(input: &str) -> IResult<&str, String> {
    let (input, ident) = recognize(take_while1(|c: char| c.is_alphanumeric() || c == '_'))(input)?;
    if let Some(first) = ident.chars().next() {
        if !first.is_alphabetic() && first != '_' {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Alpha,
            )));
        }
    }
    Ok((input, ident.to_string()))
}

fn factor(input: &str) -> IResult<&str, Expr> {
    alt((
        delimited(ws(char('(')), expr, ws(char(')'))),
        map(ws(double_literal), Expr::Lit),
        map(ws(identifier), Expr::Col),
    ))(input)
}

// `double` would happily eat a bare identifier prefix like "e" or "inf",
// so only accept literals that start with a digit, dot, or sign.
fn double_literal(input: &str) -> IResult<&str, f64> {
    match input.chars().next() {
        Some(c) if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' => double(input),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(ws(alt((char('*'), char('/')))), factor))(input)?;
    Ok((input, fold_ops(first, rest)))
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(ws(alt((char('+'), char('-')))), term))(input)?;
    Ok((input, fold_ops(first, rest)))
}

fn fold_ops(first: Expr, rest: Vec<(char, Expr)>) -> Expr {
    rest.into_iter().fold(first, |acc, (op, rhs)| match op {
        '+' => Expr::Add(Box::new(acc), Box::new(rhs)),
        '-' => Expr::Sub(Box::new(acc), Box::new(rhs)),
        '*' => Expr::Mul(Box::new(acc), Box::new(rhs)),
        _ => Expr::Div(Box::new(acc), Box::new(rhs)),
    })
}
