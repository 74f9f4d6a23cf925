//! Per-section stores consulted by the passes.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{AsmError, Result};
use crate::operand::{form_to_hex, LiteralKind};

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    locations: HashMap<String, u32>,
}

impl SymbolTable {
    /// Insert or overwrite; returns the previous location if the name was already defined.
    pub fn put(&mut self, name: &str, location: u32) -> Option<u32> {
        self.locations.insert(name.to_string(), location)
    }

    pub fn find(&self, name: &str) -> Option<u32> {
        self.locations.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub text: String,
    pub kind: LiteralKind,
    /// `None` until the next LTORG/END pools it.
    pub location: Option<u32>,
}

impl Literal {
    pub fn byte_len(&self) -> u32 {
        self.kind.byte_len(&self.text)
    }

    /// Pooled bytes as hex; a dangling hex digit is dropped.
    pub fn render(&self) -> Result<String> {
        let mut hex = form_to_hex(self.kind, &self.text)?;
        hex.truncate(self.byte_len() as usize * 2);
        Ok(hex)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "={}'{}'", self.kind.tag(), self.text)
    }
}

/// Literals in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct LiteralTable {
    literals: Vec<Literal>,
}

impl LiteralTable {
    pub fn find(&self, kind: LiteralKind, text: &str) -> Option<usize> {
        self.literals
            .iter()
            .position(|l| l.kind == kind && l.text == text)
    }

    /// Register a literal unless it is already known; returns its index either way.
    pub fn insert(&mut self, kind: LiteralKind, text: &str, location: Option<u32>) -> usize {
        if let Some(i) = self.find(kind, text) {
            return i;
        }
        self.literals.push(Literal {
            text: text.to_string(),
            kind,
            location,
        });
        self.literals.len() - 1
    }

    pub fn resolve(&mut self, index: usize, location: u32) {
        if let Some(l) = self.literals.get_mut(index) {
            l.location = Some(location);
        }
    }

    /// Place every unassigned literal starting at `location`. Returns the indices
    /// placed and the location just past the pool.
    pub fn pool(&mut self, mut location: u32) -> (Range<usize>, u32) {
        let first = self
            .literals
            .iter()
            .position(|l| l.location.is_none())
            .unwrap_or(self.literals.len());
        for l in &mut self.literals[first..] {
            l.location = Some(location);
            location += l.byte_len();
        }
        (first..self.literals.len(), location)
    }

    pub fn get(&self, index: usize) -> Option<&Literal> {
        self.literals.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.literals.iter()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Hex bytes of the literals in `range`, concatenated.
    pub fn render(&self, range: Range<usize>) -> Result<String> {
        let mut out = String::new();
        for l in self.literals.get(range).unwrap_or(&[]) {
            out.push_str(&l.render()?);
        }
        Ok(out)
    }
}

const DEFS_PER_RECORD: usize = 6;
const REFS_PER_RECORD: usize = 12;

/// Names this section exports (EXTDEF) and imports (EXTREF).
#[derive(Debug, Clone, Default)]
pub struct ExtTable {
    pub defs: Vec<String>,
    pub refs: Vec<String>,
}

impl ExtTable {
    pub fn add_defs(&mut self, names: &[String]) {
        self.defs.extend(names.iter().filter(|n| !n.is_empty()).cloned());
    }

    pub fn add_refs(&mut self, names: &[String]) {
        self.refs.extend(names.iter().filter(|n| !n.is_empty()).cloned());
    }

    pub fn is_import(&self, name: &str) -> bool {
        self.refs.iter().any(|r| r == name)
    }

    /// `D` records: each exported name with its section-relative location.
    pub fn define_records(&self, symtab: &SymbolTable) -> Result<String> {
        let mut out = String::new();
        for chunk in self.defs.chunks(DEFS_PER_RECORD) {
            out.push('D');
            for name in chunk {
                let loc = symtab
                    .find(name)
                    .ok_or_else(|| AsmError::SymbolNotFound { name: name.clone() })?;
                out.push_str(&format!("{name:<6}{loc:06X}"));
            }
            out.push('\n');
        }
        Ok(out)
    }

    /// `R` records: imported names.
    pub fn refer_records(&self) -> String {
        let mut out = String::new();
        for chunk in self.refs.chunks(REFS_PER_RECORD) {
            out.push('R');
            for name in chunk {
                out.push_str(&format!("{name:<6}"));
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    Plus,
    Minus,
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Plus => write!(f, "+"),
            Sign::Minus => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub location: u32,
    /// Length of the patched field in half-bytes.
    pub half_bytes: u8,
    pub sign: Sign,
    pub symbol: String,
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "M{:06X}{:02X}{}{}",
            self.location, self.half_bytes, self.sign, self.symbol
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModTable {
    entries: Vec<Modification>,
}

impl ModTable {
    pub fn add(&mut self, location: u32, half_bytes: u8, sign: Sign, symbol: &str) {
        self.entries.push(Modification {
            location,
            half_bytes,
            sign,
            symbol: symbol.to_string(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Modification> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Header data for one object program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub program_name: String,
    pub start_address: u32,
    pub program_length: u32,
    /// Opened with START rather than CSECT.
    pub is_main: bool,
}
