//! Pass 2: addressing flags and object code for every token.

use tracing::{debug, trace, warn};

use crate::error::{AsmError, Result};
use crate::instructions::{Instruction, OpKind};
use crate::operand::{
    data_form, expression, form_to_hex, is_arithmetic, is_literal, is_number, is_symbol,
    parse_decimal, parse_literal, register, Addressing, ArithOp, Term,
};
use crate::section::{ControlSection, Stage};
use crate::tables::{ExtTable, LiteralTable, ModTable, Sign, SymbolTable};
use crate::token::{Nixbpe, Token};

/// Fixed encoding of RSUB (n=i=1, no target).
const RSUB_CODE: u32 = 0x4F_0000;

/// Read-only view of the tables a reference can resolve against.
struct Refs<'a> {
    symtab: &'a SymbolTable,
    littab: &'a LiteralTable,
    exttab: &'a ExtTable,
}

impl ControlSection {
    pub fn encode(&mut self) -> Result<()> {
        self.expect(Stage::Located)?;
        let Self {
            tokens,
            symtab,
            littab,
            exttab,
            modtab,
            info,
            ..
        } = self;
        let refs = Refs {
            symtab,
            littab,
            exttab,
        };

        for token in tokens.iter_mut() {
            let line = token.line;
            encode_token(token, &refs, modtab).map_err(|e| e.at(line))?;
        }

        debug!(
            section = %info.program_name,
            modifications = modtab.len(),
            "encoded section"
        );
        self.advance(Stage::Encoded);
        Ok(())
    }
}

fn encode_token(token: &mut Token, refs: &Refs<'_>, modtab: &mut ModTable) -> Result<()> {
    let instr = token.instruction()?.clone();

    let mode = token.operand(0).map(Addressing::of);
    if let Some(mode) = mode {
        token.set_flag(mode.flags(), true);
        if token.operand(1) == Some("X") {
            token.set_flag(Nixbpe::X, true);
        }
        if instr.format == 3 && matches!(mode, Addressing::Indirect | Addressing::Simple) {
            token.set_flag(Nixbpe::P, true);
        }
        if instr.format == 4 {
            token.set_flag(Nixbpe::E, true);
        }
    }

    match (instr.opcode, instr.kind) {
        (Some(opcode), _) => {
            let code = machine_code(token, &instr, opcode, refs, modtab)?;
            token.set_object_code(code);
        }
        (None, OpKind::Byte | OpKind::Word) => {
            let code = data_code(token, &instr, refs, modtab)?;
            token.set_object_code(code);
        }
        (None, OpKind::Extdef) => {
            for name in token.operand_list().iter().filter(|n| !n.is_empty()) {
                if refs.symtab.find(name).is_none() {
                    return Err(AsmError::SymbolNotFound { name: name.clone() });
                }
            }
        }
        (None, _) => {}
    }

    if let Some(code) = &token.object_code {
        trace!(location = token.location, code = %code, "encoded");
    }
    Ok(())
}

fn machine_code(
    token: &Token,
    instr: &Instruction,
    opcode: u8,
    refs: &Refs<'_>,
    modtab: &mut ModTable,
) -> Result<String> {
    let opcode = opcode as u32;
    let value = match instr.format {
        1 => opcode,
        2 => {
            let r1 = register(required(token, 0)?)?;
            let r2 = match instr.mnemonic.as_str() {
                "SHIFTL" | "SHIFTR" => {
                    let n = parse_decimal(token.operand(1))?;
                    u8::try_from(n)
                        .ok()
                        .filter(|n| *n <= 0xF)
                        .ok_or_else(|| AsmError::syntax(format!("shift count out of range: {n}")))?
                }
                _ => match token.operand(1) {
                    Some(r) if !r.is_empty() => register(r)?,
                    _ => 0,
                },
            };
            (opcode << 8) | ((r1 as u32) << 4) | r2 as u32
        }
        3 | 4 if instr.mnemonic == "RSUB" => RSUB_CODE,
        3 | 4 => {
            let bits = if instr.format == 3 { 12 } else { 20 };
            let disp = displacement(token, instr, refs, modtab)?;
            if !disp.fits(bits) {
                warn!(
                    location = token.location,
                    disp = disp.value(),
                    bits,
                    "displacement does not fit its field, truncating"
                );
            }
            let field = (disp.value() as u32) & ((1u32 << bits) - 1);
            ((opcode & 0xFC) << (bits + 4)) | ((token.nixbpe.bits() as u32) << bits) | field
        }
        f => return Err(AsmError::syntax(format!("unsupported format {f}"))),
    };
    Ok(format!("{:0w$X}", value, w = instr.format as usize * 2))
}

/// A format-3/4 target field before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disp {
    /// Measured from the next instruction; signed.
    Relative(i64),
    /// Taken as is; unsigned.
    Absolute(i64),
}

impl Disp {
    fn value(self) -> i64 {
        match self {
            Disp::Relative(v) | Disp::Absolute(v) => v,
        }
    }

    /// Whether the value survives masking to `bits`.
    fn fits(self, bits: u32) -> bool {
        match self {
            Disp::Relative(v) => (-(1i64 << (bits - 1))..(1i64 << (bits - 1))).contains(&v),
            Disp::Absolute(v) => (0..(1i64 << bits)).contains(&v),
        }
    }
}

/// Target field of a format-3/4 instruction. Records a modification for imported symbols.
fn displacement(
    token: &Token,
    instr: &Instruction,
    refs: &Refs<'_>,
    modtab: &mut ModTable,
) -> Result<Disp> {
    let raw = required(token, 0)?;
    let pc = token.location as i64 + instr.format as i64;

    let operand = match Addressing::of(raw) {
        Addressing::Simple if is_literal(raw) => {
            let (kind, text) = parse_literal(raw)?;
            let location = refs
                .littab
                .find(kind, text)
                .and_then(|i| refs.littab.get(i))
                .and_then(|l| l.location)
                .ok_or_else(|| AsmError::LiteralNotFound {
                    literal: raw.to_string(),
                })?;
            return Ok(Disp::Relative(location as i64 - pc));
        }
        Addressing::Simple => raw,
        Addressing::Immediate | Addressing::Indirect => &raw[1..],
    };

    if is_symbol(operand) {
        if let Some(location) = refs.symtab.find(operand) {
            let location = location as i64;
            return Ok(if instr.format == 3 {
                Disp::Relative(location - pc)
            } else {
                Disp::Absolute(location)
            });
        }
        if refs.exttab.is_import(operand) {
            modtab.add(token.location + 1, 5, Sign::Plus, operand);
            return Ok(Disp::Absolute(0));
        }
        return Err(AsmError::SymbolNotFound {
            name: operand.to_string(),
        });
    }
    if is_number(operand) {
        return operand
            .parse()
            .map(Disp::Absolute)
            .map_err(|_| AsmError::syntax(format!("number out of range: {operand}")));
    }
    Err(AsmError::syntax(format!("invalid operand: {raw}")))
}

/// BYTE/WORD data. Symbols contribute no value; imported ones get a modification record.
fn data_code(
    token: &Token,
    instr: &Instruction,
    refs: &Refs<'_>,
    modtab: &mut ModTable,
) -> Result<String> {
    let width = instr.format as usize * 2;
    let operand = required(token, 0)?;
    let overflow = || AsmError::SizeOverflow {
        operand: operand.to_string(),
        capacity: instr.format as usize,
    };

    if let Some((kind, body)) = data_form(operand) {
        let hex = form_to_hex(kind, body)?;
        if hex.len() > width {
            return Err(overflow());
        }
        return Ok(format!("{hex:0>width$}"));
    }
    if is_number(operand) {
        let n: u64 = operand.parse().map_err(|_| overflow())?;
        let hex = format!("{n:0width$X}");
        if hex.len() > width {
            return Err(overflow());
        }
        return Ok(hex);
    }
    if is_arithmetic(operand) || is_symbol(operand) {
        for (op, term) in expression(operand)? {
            let Term::Symbol(name) = term else { continue };
            if refs.symtab.find(name).is_some() {
                continue;
            }
            if !refs.exttab.is_import(name) {
                return Err(AsmError::SymbolNotFound {
                    name: name.to_string(),
                });
            }
            let sign = match op {
                ArithOp::Add => Sign::Plus,
                ArithOp::Sub => Sign::Minus,
                ArithOp::Mul | ArithOp::Div => {
                    return Err(AsmError::syntax(format!(
                        "external reference {name} cannot follow '{op}'"
                    )))
                }
            };
            modtab.add(token.location, width as u8, sign, name);
        }
        return Ok("0".repeat(width));
    }
    Err(AsmError::syntax(format!("invalid data operand: {operand}")))
}

fn required(token: &Token, i: usize) -> Result<&str> {
    token
        .operand(i)
        .ok_or_else(|| AsmError::syntax(format!("{} requires operand {}", token.operator, i + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_field_is_signed() {
        assert!(Disp::Relative(2047).fits(12));
        assert!(Disp::Relative(-2048).fits(12));
        assert!(!Disp::Relative(2048).fits(12));
        assert!(!Disp::Relative(2997).fits(12));
        assert!(!Disp::Relative(-2049).fits(12));
    }

    #[test]
    fn absolute_field_is_unsigned() {
        assert!(Disp::Absolute(4095).fits(12));
        assert!(!Disp::Absolute(4096).fits(12));
        assert!(!Disp::Absolute(-1).fits(12));
        assert!(Disp::Absolute(0xF_FFFF).fits(20));
        assert!(!Disp::Absolute(0x10_0000).fits(20));
    }
}
