use serde::{Deserialize, Serialize};

use crate::error::{AsmError, Result};
use crate::instructions::InstructionSet;
use crate::tables::{ExtTable, LiteralTable, ModTable, SectionInfo, SymbolTable};
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Parsed,
    Located,
    Encoded,
}

/// One program section: its tokens and the tables both passes read and write.
#[derive(Debug, Clone)]
pub struct ControlSection {
    pub tokens: Vec<Token>,
    pub symtab: SymbolTable,
    pub littab: LiteralTable,
    pub exttab: ExtTable,
    pub modtab: ModTable,
    pub info: SectionInfo,
    stage: Stage,
}

impl Default for ControlSection {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSection {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            symtab: SymbolTable::default(),
            littab: LiteralTable::default(),
            exttab: ExtTable::default(),
            modtab: ModTable::default(),
            info: SectionInfo::default(),
            stage: Stage::Parsed,
        }
    }

    /// Parse and validate one source line and append it.
    pub fn push_line<I: InstructionSet>(&mut self, line: &str, iset: &I) -> Result<&Token> {
        let mut token = Token::parse(line)?;
        let instr = iset.lookup(&token.operator);
        token.validate(instr)?;
        self.push_token(token)
    }

    pub fn push_token(&mut self, token: Token) -> Result<&Token> {
        self.expect(Stage::Parsed)?;
        self.tokens.push(token);
        Ok(&self.tokens[self.tokens.len() - 1])
    }

    pub fn pop_token(&mut self) -> Option<Token> {
        if self.stage != Stage::Parsed {
            return None;
        }
        self.tokens.pop()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn expect(&self, expected: Stage) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(AsmError::PassOrder {
                expected,
                found: self.stage,
            })
        }
    }

    pub(crate) fn advance(&mut self, to: Stage) {
        self.stage = to;
    }

    pub fn object_code(&self, index: usize) -> Option<&str> {
        self.tokens.get(index)?.object_code.as_deref()
    }

    /// One line per token: location, fields, object code.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for t in &self.tokens {
            out.push_str(&t.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::InstTable;

    #[test]
    fn push_and_pop() {
        let iset = InstTable::sicxe();
        let mut cs = ControlSection::new();
        cs.push_line("COPY\tSTART\t0", &iset).unwrap();
        cs.push_line("\tCSECT", &iset).unwrap();
        assert_eq!(cs.tokens.len(), 2);
        let popped = cs.pop_token().unwrap();
        assert_eq!(popped.operator, "CSECT");
        assert_eq!(cs.tokens.len(), 1);
    }

    #[test]
    fn rejected_line_is_not_appended() {
        let iset = InstTable::sicxe();
        let mut cs = ControlSection::new();
        assert!(cs.push_line("\tNOPE\tX", &iset).is_err());
        assert!(cs.tokens.is_empty());
    }
}
