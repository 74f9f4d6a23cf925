use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What a mnemonic means to the two passes. Resolved once, when a line is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Machine,
    Start,
    Csect,
    Extdef,
    Extref,
    Resw,
    Resb,
    Equ,
    Ltorg,
    End,
    Byte,
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub mnemonic: String,
    /// Encoded size in bytes; for directives, the amount the location counter advances by.
    pub format: u8,
    /// `None` for directives.
    pub opcode: Option<u8>,
    #[serde(default)]
    pub min_operands: usize,
    pub kind: OpKind,
}

impl Instruction {
    pub fn opens_section(&self) -> bool {
        matches!(self.kind, OpKind::Start | OpKind::Csect)
    }

    pub fn is_directive(&self) -> bool {
        self.opcode.is_none()
    }
}

pub trait InstructionSet {
    fn lookup(&self, mnemonic: &str) -> Option<Instruction>;
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub mnemonic: &'static str,
    pub format: u8,
    pub opcode: Option<u8>,
    pub min_operands: u8,
    pub kind: OpKind,
}

const fn op(mnemonic: &'static str, format: u8, opcode: u8, min_operands: u8) -> InstrDesc {
    InstrDesc {
        mnemonic,
        format,
        opcode: Some(opcode),
        min_operands,
        kind: OpKind::Machine,
    }
}

const fn dir(mnemonic: &'static str, format: u8, min_operands: u8, kind: OpKind) -> InstrDesc {
    InstrDesc {
        mnemonic,
        format,
        opcode: None,
        min_operands,
        kind,
    }
}

/// SIC/XE machine instructions and assembler directives.
pub const TABLE: &[InstrDesc] = &[
    op("ADD", 3, 0x18, 1),
    op("ADDF", 3, 0x58, 1),
    op("ADDR", 2, 0x90, 2),
    op("AND", 3, 0x40, 1),
    op("CLEAR", 2, 0xB4, 1),
    op("COMP", 3, 0x28, 1),
    op("COMPF", 3, 0x88, 1),
    op("COMPR", 2, 0xA0, 2),
    op("DIV", 3, 0x24, 1),
    op("DIVF", 3, 0x64, 1),
    op("DIVR", 2, 0x9C, 2),
    op("FIX", 1, 0xC4, 0),
    op("FLOAT", 1, 0xC0, 0),
    op("HIO", 1, 0xF4, 0),
    op("J", 3, 0x3C, 1),
    op("JEQ", 3, 0x30, 1),
    op("JGT", 3, 0x34, 1),
    op("JLT", 3, 0x38, 1),
    op("JSUB", 3, 0x48, 1),
    op("LDA", 3, 0x00, 1),
    op("LDB", 3, 0x68, 1),
    op("LDCH", 3, 0x50, 1),
    op("LDF", 3, 0x70, 1),
    op("LDL", 3, 0x08, 1),
    op("LDS", 3, 0x6C, 1),
    op("LDT", 3, 0x74, 1),
    op("LDX", 3, 0x04, 1),
    op("LPS", 3, 0xD0, 1),
    op("MUL", 3, 0x20, 1),
    op("MULF", 3, 0x60, 1),
    op("MULR", 2, 0x98, 2),
    op("NORM", 1, 0xC8, 0),
    op("OR", 3, 0x44, 1),
    op("RD", 3, 0xD8, 1),
    op("RMO", 2, 0xAC, 2),
    op("RSUB", 3, 0x4C, 0),
    op("SHIFTL", 2, 0xA4, 2),
    op("SHIFTR", 2, 0xA8, 2),
    op("SIO", 1, 0xF0, 0),
    op("SSK", 3, 0xEC, 1),
    op("STA", 3, 0x0C, 1),
    op("STB", 3, 0x78, 1),
    op("STCH", 3, 0x54, 1),
    op("STF", 3, 0x80, 1),
    op("STI", 3, 0xD4, 1),
    op("STL", 3, 0x14, 1),
    op("STS", 3, 0x7C, 1),
    op("STSW", 3, 0xE8, 1),
    op("STT", 3, 0x84, 1),
    op("STX", 3, 0x10, 1),
    op("SUB", 3, 0x1C, 1),
    op("SUBF", 3, 0x5C, 1),
    op("SUBR", 2, 0x94, 2),
    op("SVC", 2, 0xB0, 1),
    op("TD", 3, 0xE0, 1),
    op("TIO", 1, 0xF8, 0),
    op("TIX", 3, 0x2C, 1),
    op("TIXR", 2, 0xB8, 1),
    op("WD", 3, 0xDC, 1),
    dir("START", 0, 1, OpKind::Start),
    dir("CSECT", 0, 0, OpKind::Csect),
    dir("EXTDEF", 0, 1, OpKind::Extdef),
    dir("EXTREF", 0, 1, OpKind::Extref),
    dir("RESW", 0, 1, OpKind::Resw),
    dir("RESB", 0, 1, OpKind::Resb),
    dir("EQU", 0, 1, OpKind::Equ),
    dir("LTORG", 0, 0, OpKind::Ltorg),
    dir("END", 0, 0, OpKind::End),
    dir("BYTE", 1, 1, OpKind::Byte),
    dir("WORD", 3, 1, OpKind::Word),
];

impl From<&InstrDesc> for Instruction {
    fn from(d: &InstrDesc) -> Self {
        Self {
            mnemonic: d.mnemonic.to_string(),
            format: d.format,
            opcode: d.opcode,
            min_operands: d.min_operands as usize,
            kind: d.kind,
        }
    }
}

/// Read-only instruction directory keyed by upper-case mnemonic.
#[derive(Debug, Clone, Default)]
pub struct InstTable {
    entries: HashMap<String, Instruction>,
}

impl InstTable {
    pub fn sicxe() -> Self {
        Self::from_entries(TABLE.iter().map(Instruction::from))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = Instruction>) -> Self {
        let entries = entries
            .into_iter()
            .map(|i| (i.mnemonic.to_ascii_uppercase(), i))
            .collect();
        Self { entries }
    }

    /// Load a directory from a JSON array of instruction entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<Instruction> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl InstructionSet for InstTable {
    fn lookup(&self, mnemonic: &str) -> Option<Instruction> {
        let upper = mnemonic.trim().to_ascii_uppercase();
        match upper.strip_prefix('+') {
            // Extended form: only format-3 machine instructions have one
            Some(base) => {
                let inst = self.entries.get(base)?;
                if inst.kind != OpKind::Machine || inst.format != 3 {
                    return None;
                }
                Some(Instruction {
                    format: 4,
                    ..inst.clone()
                })
            }
            None => self.entries.get(&upper).cloned(),
        }
    }
}

impl<T: InstructionSet + ?Sized> InstructionSet for &T {
    fn lookup(&self, mnemonic: &str) -> Option<Instruction> {
        (**self).lookup(mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_form_only_for_format3() {
        let t = InstTable::sicxe();
        let jsub = t.lookup("+JSUB").unwrap();
        assert_eq!(jsub.format, 4);
        assert_eq!(jsub.opcode, Some(0x48));
        assert_eq!(jsub.mnemonic, "JSUB");
        assert!(t.lookup("+CLEAR").is_none());
        assert!(t.lookup("+WORD").is_none());
    }

    #[test]
    fn lookup_ignores_case() {
        let t = InstTable::sicxe();
        assert_eq!(t.lookup("lda").unwrap().opcode, Some(0x00));
        assert!(t.lookup("csect").unwrap().opens_section());
    }

    #[test]
    fn json_directory() {
        let t = InstTable::from_json(
            r#"[
                {"mnemonic": "LDA", "format": 3, "opcode": 0, "min_operands": 1, "kind": "MACHINE"},
                {"mnemonic": "END", "format": 0, "opcode": null, "kind": "END"}
            ]"#,
        )
        .unwrap();
        assert_eq!(t.len(), 2);
        let end = t.lookup("END").unwrap();
        assert!(end.is_directive());
        assert_eq!(end.min_operands, 0);
        assert!(t.lookup("STA").is_none());
    }
}
