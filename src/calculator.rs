//! Incremental calculator driven one gesture at a time.
//!
//! Digits build the current number; an operator commits it to the
//! expression; `calculate` evaluates with the usual precedence.

use std::fmt;

use thiserror::Error;

/// Longest number the user can build.
pub const MAX_DIGITS: usize = 12;

const ERROR_TEXT: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            _ => None,
        }
    }

    fn binds_tighter(&self) -> bool {
        matches!(self, Operator::Mul | Operator::Div)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("nothing to calculate")]
    Empty,
    #[error("division by zero")]
    DivisionByZero,
    #[error("malformed expression: {0}")]
    Malformed(String),
    #[error("result out of range")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Op(Operator),
}

#[derive(Debug, Clone, Default, PartialEq)]
enum Outcome {
    #[default]
    Nothing,
    Value(String),
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct Calculator {
    current: String,
    tokens: Vec<Token>,
    result: Outcome,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// False once the current number already holds [`MAX_DIGITS`] digits.
    pub fn add_digit(&mut self, digit: u8) -> bool {
        if digit > 9 || self.current.len() >= MAX_DIGITS {
            return false;
        }
        // typing after "=" starts a fresh number
        self.result = Outcome::Nothing;
        self.current.push(char::from(b'0' + digit));
        true
    }

    /// Commits the current number (or the previous result) followed by `op`.
    pub fn add_operation(&mut self, op: Operator) -> bool {
        if self.current.is_empty() {
            let Outcome::Value(prev) = std::mem::take(&mut self.result) else {
                return false;
            };
            self.tokens = vec![Token::Number(prev), Token::Op(op)];
            return true;
        }
        let number = std::mem::take(&mut self.current);
        self.tokens.push(Token::Number(number));
        self.tokens.push(Token::Op(op));
        true
    }

    /// Evaluates the pending expression. On success the formatted value
    /// becomes the display; on failure the display reads "Error". An empty
    /// calculator is left untouched.
    pub fn calculate(&mut self) -> Result<String, CalcError> {
        if !self.current.is_empty() {
            let number = std::mem::take(&mut self.current);
            self.tokens.push(Token::Number(number));
        }
        if self.tokens.is_empty() {
            return Err(CalcError::Empty);
        }

        let tokens = std::mem::take(&mut self.tokens);
        match evaluate(&tokens).map(format_value) {
            Ok(text) => {
                self.result = Outcome::Value(text.clone());
                Ok(text)
            }
            Err(e) => {
                self.result = Outcome::Error;
                Err(e)
            }
        }
    }

    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    /// Drops the last digit; with no number in progress, drops the trailing
    /// operator and reopens the number before it for editing.
    pub fn backspace(&mut self) {
        if self.current.pop().is_some() {
            return;
        }
        if let Some(Token::Op(_)) = self.tokens.last() {
            self.tokens.pop();
            if let Some(Token::Number(n)) = self.tokens.pop() {
                self.current = n;
            }
        }
    }

    pub fn display(&self) -> &str {
        match &self.result {
            Outcome::Value(v) => v.as_str(),
            Outcome::Error => ERROR_TEXT,
            Outcome::Nothing if !self.current.is_empty() => self.current.as_str(),
            Outcome::Nothing => "0",
        }
    }

    /// Expression so far, including the number being typed, e.g. "5 + 3 * 2".
    pub fn expression(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Number(n) => out.push_str(n),
                Token::Op(op) => {
                    out.push(' ');
                    out.push(op.symbol());
                    out.push(' ');
                }
            }
        }
        out.push_str(&self.current);
        out
    }
}

/// Left-associative, `*` and `/` before `+` and `-`. Tokens must alternate
/// number, operator, number, ... and end on a number.
fn evaluate(tokens: &[Token]) -> Result<f64, CalcError> {
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut term: Option<f64> = None;
    let mut pending: Option<Operator> = None;

    for (i, token) in tokens.iter().enumerate() {
        match (token, i % 2) {
            (Token::Number(text), 0) => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| CalcError::Malformed(format!("bad number {text:?}")))?;
                term = Some(match (term, pending) {
                    (Some(t), Some(Operator::Mul)) => t * value,
                    (Some(_), Some(Operator::Div)) if value == 0.0 => {
                        return Err(CalcError::DivisionByZero);
                    }
                    (Some(t), Some(Operator::Div)) => t / value,
                    _ => value,
                });
            }
            (Token::Op(op), 1) => {
                if !op.binds_tighter() {
                    sum += sign * term.unwrap_or_default();
                    sign = if *op == Operator::Sub { -1.0 } else { 1.0 };
                    term = None;
                }
                pending = Some(*op);
            }
            _ => return Err(CalcError::Malformed(format!("unexpected token at {i}"))),
        }
    }
    if tokens.len() % 2 == 0 {
        return Err(CalcError::Malformed("ends with an operator".into()));
    }

    let total = sum + sign * term.unwrap_or_default();
    if total.is_finite() {
        Ok(total)
    } else {
        Err(CalcError::Overflow)
    }
}

/// Integral values print without a decimal point; others keep at most six
/// decimals with trailing zeros removed.
fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        // also folds -0 into "0"
        return format!("{:.0}", v + 0.0);
    }
    let fixed = format!("{v:.6}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
