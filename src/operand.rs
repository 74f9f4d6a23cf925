//! Classification of operand text: numbers, symbols, literals, typed data,
//! arithmetic expressions, registers and addressing prefixes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AsmError, Result};
use crate::token::Nixbpe;

pub fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// A required decimal parameter (START address, RESW/RESB counts).
pub fn parse_decimal(s: Option<&str>) -> Result<u32> {
    match s {
        Some(s) if is_number(s) => s
            .parse::<u32>()
            .map_err(|_| AsmError::syntax(format!("number out of range: {s}"))),
        _ => Err(AsmError::syntax(
            "a number must be entered for this parameter",
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralKind {
    /// `C'...'`, one byte per character.
    Char,
    /// `X'...'`, one byte per two hex digits.
    Hex,
}

impl LiteralKind {
    pub fn tag(self) -> char {
        match self {
            LiteralKind::Char => 'C',
            LiteralKind::Hex => 'X',
        }
    }

    /// Bytes occupied by `body`. A dangling hex digit does not count.
    pub fn byte_len(self, body: &str) -> u32 {
        match self {
            LiteralKind::Char => body.len() as u32,
            LiteralKind::Hex => (body.len() / 2) as u32,
        }
    }
}

/// Split `C'...'` / `X'...'` into its kind and body.
pub fn data_form(s: &str) -> Option<(LiteralKind, &str)> {
    let kind = match s.as_bytes().first()? {
        b'C' | b'c' => LiteralKind::Char,
        b'X' | b'x' => LiteralKind::Hex,
        _ => return None,
    };
    let body = s[1..].strip_prefix('\'')?.strip_suffix('\'')?;
    Some((kind, body))
}

/// Upper-case hex of the bytes a typed data form stands for.
pub fn form_to_hex(kind: LiteralKind, body: &str) -> Result<String> {
    match kind {
        LiteralKind::Char => Ok(body.bytes().map(|b| format!("{b:02X}")).collect()),
        LiteralKind::Hex => {
            if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(AsmError::syntax(format!("invalid hex data: X'{body}'")));
            }
            Ok(body.to_ascii_uppercase())
        }
    }
}

pub fn is_literal(s: &str) -> bool {
    s.starts_with('=')
}

/// `=C'EOF'` -> `(Char, "EOF")`.
pub fn parse_literal(s: &str) -> Result<(LiteralKind, &str)> {
    s.strip_prefix('=')
        .and_then(data_form)
        .ok_or_else(|| AsmError::syntax(format!("malformed literal: {s}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(ArithOp::Add),
            '-' => Some(ArithOp::Sub),
            '*' => Some(ArithOp::Mul),
            '/' => Some(ArithOp::Div),
            _ => None,
        }
    }

    pub fn apply(self, lhs: i64, rhs: i64) -> Result<i64> {
        let value = match self {
            ArithOp::Add => lhs.checked_add(rhs),
            ArithOp::Sub => lhs.checked_sub(rhs),
            ArithOp::Mul => lhs.checked_mul(rhs),
            ArithOp::Div if rhs == 0 => return Err(AsmError::syntax("division by zero")),
            ArithOp::Div => lhs.checked_div(rhs),
        };
        value.ok_or_else(|| AsmError::syntax("expression overflow"))
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            ArithOp::Add => '+',
            ArithOp::Sub => '-',
            ArithOp::Mul => '*',
            ArithOp::Div => '/',
        };
        write!(f, "{c}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term<'a> {
    Symbol(&'a str),
    Number(i64),
}

pub fn is_arithmetic(s: &str) -> bool {
    s.chars().any(|c| ArithOp::from_char(c).is_some())
}

/// Split an expression into `(operator, term)` pairs, evaluated left to right
/// with no precedence. The first term gets `Add` unless the text leads with an operator.
pub fn expression(s: &str) -> Result<Vec<(ArithOp, Term<'_>)>> {
    let mut out = Vec::new();
    let mut pending = ArithOp::Add;
    let mut start = 0;
    let bad = || AsmError::syntax(format!("malformed expression: {s}"));
    for (i, c) in s.char_indices() {
        let Some(next) = ArithOp::from_char(c) else { continue };
        let text = &s[start..i];
        if !(text.is_empty() && i == 0) {
            out.push((pending, term(text).ok_or_else(bad)?));
        }
        pending = next;
        start = i + 1;
    }
    out.push((pending, term(&s[start..]).ok_or_else(bad)?));
    Ok(out)
}

fn term(text: &str) -> Option<Term<'_>> {
    if is_number(text) {
        text.parse().ok().map(Term::Number)
    } else if is_symbol(text) {
        Some(Term::Symbol(text))
    } else {
        None
    }
}

/// SIC/XE register numbers for format-2 operands.
pub fn register(s: &str) -> Result<u8> {
    match s {
        "A" => Ok(0),
        "X" => Ok(1),
        "L" => Ok(2),
        "B" => Ok(3),
        "S" => Ok(4),
        "T" => Ok(5),
        "F" => Ok(6),
        "PC" => Ok(8),
        "SW" => Ok(9),
        _ => Err(AsmError::syntax(format!("unknown register: {s}"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    Immediate,
    Indirect,
    Simple,
}

impl Addressing {
    pub fn of(operand: &str) -> Self {
        if operand.starts_with('#') {
            Addressing::Immediate
        } else if operand.starts_with('@') {
            Addressing::Indirect
        } else {
            Addressing::Simple
        }
    }

    pub fn flags(self) -> Nixbpe {
        match self {
            Addressing::Immediate => Nixbpe::I,
            Addressing::Indirect => Nixbpe::N,
            Addressing::Simple => Nixbpe::N | Nixbpe::I,
        }
    }
}
