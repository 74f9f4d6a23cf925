use std::fmt;
use std::ops::Range;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{AsmError, Result};
use crate::instructions::Instruction;

pub const MAX_OPERAND: usize = 3;

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nixbpe: u8 {
const N = 32; // indirect
const I = 16; // immediate
const X = 8; // indexed
const B = 4; // base-relative
const P = 2; // PC-relative
const E = 1; // extended (format 4)
}
}

impl Default for Nixbpe {
    fn default() -> Self {
        Self::empty()
    }
}

/// One source line, split into fields and carried through both passes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Token {
    /// 1-based source line, 0 when the token did not come from a source text.
    pub line: usize,
    pub location: u32,
    pub label: Option<String>,
    pub operator: String,
    /// `None` when the operand field is blank.
    pub operands: Option<Vec<String>>,
    pub comment: Option<String>,
    pub nixbpe: Nixbpe,
    pub object_code: Option<String>,
    pub byte_size: usize,
    #[serde(skip)]
    pub instr: Option<Instruction>,
    /// Literal table entries placed by this LTORG/END.
    pub pooled: Option<Range<usize>>,
}

impl Token {
    /// Split a tab-delimited `label\toperator\toperands\tcomment` line.
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields: Vec<&str> = line.split('\t').collect();
        while fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }

        let label = fields
            .first()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let operator = match fields.get(1) {
            Some(op) if !op.trim().is_empty() => op.trim().to_string(),
            _ => return Err(AsmError::syntax("operator is required")),
        };
        let operands = match fields.get(2) {
            Some(f) if !f.is_empty() => {
                let mut list: Vec<String> = f.split(',').map(str::to_string).collect();
                while list.last().is_some_and(|s| s.is_empty()) {
                    list.pop();
                }
                if list.len() > MAX_OPERAND {
                    return Err(AsmError::syntax(format!(
                        "at most {MAX_OPERAND} operands are allowed"
                    )));
                }
                Some(list)
            }
            _ => None,
        };
        let comment = fields.get(3).map(|s| s.to_string());

        Ok(Self {
            label,
            operator,
            operands,
            comment,
            ..Self::default()
        })
    }

    /// Check the operator against its directory entry and keep the entry.
    pub fn validate(&mut self, instr: Option<Instruction>) -> Result<()> {
        let Some(instr) = instr else {
            return Err(AsmError::syntax(format!(
                "instruction does not exist: {}",
                self.operator
            )));
        };
        if self.operand_count() < instr.min_operands {
            return Err(AsmError::syntax(format!(
                "the minimum number of parameters is {}",
                instr.min_operands
            )));
        }
        self.instr = Some(instr);
        Ok(())
    }

    pub fn instruction(&self) -> Result<&Instruction> {
        self.instr
            .as_ref()
            .ok_or_else(|| AsmError::syntax(format!("unvalidated operator: {}", self.operator)))
    }

    pub fn operand(&self, i: usize) -> Option<&str> {
        self.operands.as_ref()?.get(i).map(String::as_str)
    }

    pub fn operand_count(&self) -> usize {
        self.operands.as_ref().map_or(0, Vec::len)
    }

    pub fn operand_list(&self) -> &[String] {
        self.operands.as_deref().unwrap_or(&[])
    }

    pub fn set_flag(&mut self, flag: Nixbpe, on: bool) {
        self.nixbpe.set(flag, on);
    }

    pub fn flag(&self, flags: Nixbpe) -> Nixbpe {
        self.nixbpe & flags
    }

    pub fn set_object_code(&mut self, code: String) {
        self.byte_size = code.len() / 2;
        self.object_code = Some(code);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X}\t{}\t{}\t{}\t{}",
            self.location,
            self.label.as_deref().unwrap_or(""),
            self.operator,
            self.operand_list().join(","),
            self.object_code.as_deref().unwrap_or("")
        )
    }
}
