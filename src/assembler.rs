use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::instructions::{InstTable, InstructionSet};
use crate::section::ControlSection;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsmConfig {
    /// Maximum T record payload, in hex digits.
    pub text_record_limit: usize,
    /// Fail on a second definition of a label instead of overwriting it.
    pub reject_duplicate_symbols: bool,
}

impl Default for AsmConfig {
    fn default() -> Self {
        Self {
            text_record_limit: 60,
            reject_duplicate_symbols: false,
        }
    }
}

/// An assembly session: the instruction directory, configuration and section counter.
pub struct Assembler<I: InstructionSet = InstTable> {
    iset: I,
    cfg: AsmConfig,
    sections_opened: usize,
}

impl Assembler<InstTable> {
    pub fn sicxe() -> Self {
        Self::new(InstTable::sicxe(), AsmConfig::default())
    }
}

impl<I: InstructionSet> Assembler<I> {
    pub fn new(iset: I, cfg: AsmConfig) -> Self {
        Self {
            iset,
            cfg,
            sections_opened: 0,
        }
    }

    pub fn config(&self) -> &AsmConfig {
        &self.cfg
    }

    pub fn instructions(&self) -> &I {
        &self.iset
    }

    /// START/CSECT lines seen so far.
    pub fn sections_opened(&self) -> usize {
        self.sections_opened
    }

    /// Parse and validate every line and group the tokens into sections.
    /// Blank lines and lines starting with `.` are skipped.
    pub fn split(&mut self, source: &str) -> Result<Vec<ControlSection>> {
        let mut sections = Vec::new();
        let mut current = ControlSection::new();

        for (i, raw) in source.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.trim().is_empty() || line.starts_with('.') {
                continue;
            }

            let mut token = Token::parse(line).map_err(|e| e.at(line_no))?;
            token.line = line_no;
            let instr = self.iset.lookup(&token.operator);
            token.validate(instr).map_err(|e| e.at(line_no))?;

            if token.instr.as_ref().is_some_and(|i| i.opens_section()) {
                self.sections_opened += 1;
                if !current.tokens.is_empty() {
                    sections.push(std::mem::take(&mut current));
                }
            }
            current.push_token(token)?;
        }
        if !current.tokens.is_empty() {
            sections.push(current);
        }
        Ok(sections)
    }

    /// Run both passes over one section and return its object program.
    pub fn assemble_section(&self, section: &mut ControlSection) -> Result<String> {
        section.locate(&self.cfg)?;
        section.encode()?;
        section.object_program(&self.cfg)
    }

    /// Assemble a whole source text into concatenated object programs, one per section.
    pub fn assemble(&mut self, source: &str) -> Result<String> {
        let mut sections = self.split(source)?;
        debug!(sections = sections.len(), "split source");

        let mut out = String::new();
        for section in &mut sections {
            out.push_str(&self.assemble_section(section)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: AsmConfig = serde_json::from_str(r#"{"reject_duplicate_symbols": true}"#).unwrap();
        assert_eq!(cfg.text_record_limit, 60);
        assert!(cfg.reject_duplicate_symbols);
    }

    #[test]
    fn session_exposes_config_and_directory() {
        let cfg = AsmConfig {
            text_record_limit: 20,
            ..AsmConfig::default()
        };
        let asm = Assembler::new(InstTable::sicxe(), cfg);
        assert_eq!(asm.config().text_record_limit, 20);
        assert!(!asm.config().reject_duplicate_symbols);
        let lda = asm.instructions().lookup("+LDA").unwrap();
        assert_eq!(lda.format, 4);
        assert_eq!(lda.opcode, Some(0x00));
    }

    #[test]
    fn counts_sections_and_splits_at_csect() {
        let mut asm = Assembler::sicxe();
        let src = "COPY\tSTART\t0\n\tRSUB\n. comment line\n\nRDREC\tCSECT\n\tRSUB\nWRREC\tCSECT\n\tRSUB\n\tEND\n";
        let sections = asm.split(src).unwrap();
        assert_eq!(asm.sections_opened(), 3);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].tokens[0].operator, "CSECT");
        assert_eq!(sections[1].tokens[0].line, 5);
        assert_eq!(sections[2].tokens.len(), 3);
    }
}
