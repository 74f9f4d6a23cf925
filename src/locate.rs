//! Pass 1: location counter, directives, symbol definitions and literal pooling.

use tracing::{debug, trace};

use crate::assembler::AsmConfig;
use crate::error::{AsmError, Result};
use crate::instructions::OpKind;
use crate::operand::{expression, is_literal, is_number, parse_decimal, parse_literal, Term};
use crate::section::{ControlSection, Stage};
use crate::tables::{ExtTable, LiteralTable, SectionInfo, SymbolTable};
use crate::token::Token;

impl ControlSection {
    pub fn locate(&mut self, cfg: &AsmConfig) -> Result<()> {
        self.expect(Stage::Parsed)?;
        let Self {
            tokens,
            symtab,
            littab,
            exttab,
            info,
            ..
        } = self;

        let mut location = 0u32;
        for token in tokens.iter_mut() {
            let line = token.line;
            location = locate_token(token, location, symtab, littab, exttab, info, cfg)
                .map_err(|e| e.at(line))?;
        }
        info.program_length = location;

        debug!(
            section = %info.program_name,
            length = info.program_length,
            symbols = symtab.len(),
            literals = littab.len(),
            "located section"
        );
        self.advance(Stage::Located);
        Ok(())
    }
}

fn locate_token(
    token: &mut Token,
    mut location: u32,
    symtab: &mut SymbolTable,
    littab: &mut LiteralTable,
    exttab: &mut ExtTable,
    info: &mut SectionInfo,
    cfg: &AsmConfig,
) -> Result<u32> {
    let (kind, format) = {
        let instr = token.instruction()?;
        (instr.kind, instr.format)
    };

    token.location = location;
    location = advance(location, format as u32)?;

    match kind {
        OpKind::Start | OpKind::Csect => {
            let label = token
                .label
                .clone()
                .ok_or_else(|| AsmError::syntax(format!("{} requires a label", token.operator)))?;
            info.program_name = label;
            if kind == OpKind::Start {
                info.is_main = true;
                info.start_address = parse_decimal(token.operand(0))?;
            }
        }
        OpKind::Extdef => exttab.add_defs(token.operand_list()),
        OpKind::Extref => exttab.add_refs(token.operand_list()),
        OpKind::Resw => {
            let words = parse_decimal(token.operand(0))?;
            let bytes = words
                .checked_mul(3)
                .ok_or_else(|| AsmError::syntax("reservation too large"))?;
            location = advance(location, bytes)?;
        }
        OpKind::Resb => location = advance(location, parse_decimal(token.operand(0))?)?,
        OpKind::Equ => token.location = equ_value(token.operand(0), location, symtab)?,
        OpKind::Ltorg | OpKind::End => {
            let (placed, next) = littab.pool(location);
            if !placed.is_empty() {
                trace!(from = location, to = next, count = placed.len(), "pooled literals");
                token.pooled = Some(placed);
            }
            location = next;
        }
        OpKind::Machine | OpKind::Byte | OpKind::Word => {}
    }

    if let Some(label) = &token.label {
        let previous = symtab.put(label, token.location);
        if previous.is_some() && cfg.reject_duplicate_symbols {
            return Err(AsmError::DuplicateSymbol {
                name: label.clone(),
            });
        }
    }

    for operand in token.operand_list() {
        if is_literal(operand) {
            let (kind, text) = parse_literal(operand)?;
            littab.insert(kind, text, None);
        }
    }

    trace!(
        location = token.location,
        operator = %token.operator,
        "assigned location"
    );
    Ok(location)
}

fn advance(location: u32, by: u32) -> Result<u32> {
    location
        .checked_add(by)
        .ok_or_else(|| AsmError::syntax("location counter overflow"))
}

/// Value of an EQU operand: `*`, a decimal number, or a left-to-right expression.
fn equ_value(operand: Option<&str>, location: u32, symtab: &SymbolTable) -> Result<u32> {
    let operand = operand.ok_or_else(|| AsmError::syntax("EQU requires an operand"))?;
    if operand == "*" {
        return Ok(location);
    }
    if is_number(operand) {
        return parse_decimal(Some(operand));
    }

    let mut value = 0i64;
    for (op, term) in expression(operand)? {
        let rhs = match term {
            Term::Number(n) => n,
            Term::Symbol(name) => symtab
                .find(name)
                .ok_or_else(|| AsmError::SymbolNotFound {
                    name: name.to_string(),
                })? as i64,
        };
        value = op.apply(value, rhs)?;
    }
    u32::try_from(value).map_err(|_| AsmError::syntax(format!("EQU value out of range: {operand}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equ_forms() {
        let mut sym = SymbolTable::default();
        sym.put("BUFFER", 0x36);
        sym.put("BUFEND", 0x1036);
        assert_eq!(equ_value(Some("*"), 0x1036, &sym).unwrap(), 0x1036);
        assert_eq!(equ_value(Some("4096"), 0, &sym).unwrap(), 4096);
        assert_eq!(equ_value(Some("BUFEND-BUFFER"), 0, &sym).unwrap(), 4096);
        assert_eq!(equ_value(Some("BUFFER"), 0, &sym).unwrap(), 0x36);
        assert_eq!(equ_value(Some("BUFFER*2/3"), 0, &sym).unwrap(), 0x24);
        assert!(matches!(
            equ_value(Some("BUFEND-NOPE"), 0, &sym),
            Err(AsmError::SymbolNotFound { .. })
        ));
        assert!(equ_value(Some("BUFFER-BUFEND"), 0, &sym).is_err());
        assert!(equ_value(Some("BUFFER/0"), 0, &sym).is_err());
    }
}
