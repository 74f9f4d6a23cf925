//! Object program text: H, D, R, T, M and E records.

use tracing::debug;

use crate::assembler::AsmConfig;
use crate::error::Result;
use crate::instructions::OpKind;
use crate::section::{ControlSection, Stage};

/// Accumulates T records, breaking whenever the payload would exceed `limit` hex digits.
#[derive(Debug)]
pub struct TextRecords {
    limit: usize,
    start: u32,
    payload: String,
    out: String,
    count: usize,
}

impl TextRecords {
    pub fn new(limit: usize) -> Self {
        Self {
            // keep whole bytes per record
            limit: (limit & !1).max(2),
            start: 0,
            payload: String::new(),
            out: String::new(),
            count: 0,
        }
    }

    /// Append `hex` encoded at `location`. A chunk longer than a whole record is split.
    pub fn push(&mut self, mut location: u32, mut hex: &str) {
        if !self.payload.is_empty() && self.payload.len() + hex.len() > self.limit {
            self.flush();
        }
        while self.payload.len() + hex.len() > self.limit {
            let room = self.limit - self.payload.len();
            if self.payload.is_empty() {
                self.start = location;
            }
            self.payload.push_str(&hex[..room]);
            hex = &hex[room..];
            location += (room / 2) as u32;
            self.flush();
        }
        if hex.is_empty() {
            return;
        }
        if self.payload.is_empty() {
            self.start = location;
        }
        self.payload.push_str(hex);
    }

    /// Close the current record, if any.
    pub fn flush(&mut self) {
        if self.payload.is_empty() {
            return;
        }
        self.out.push_str(&format!(
            "T{:06X}{:02X}{}\n",
            self.start,
            self.payload.len() / 2,
            self.payload
        ));
        self.payload.clear();
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(mut self) -> String {
        self.flush();
        self.out
    }
}

impl ControlSection {
    pub fn object_program(&self, cfg: &AsmConfig) -> Result<String> {
        self.expect(Stage::Encoded)?;
        let info = &self.info;
        let mut out = format!(
            "H{:<6}{:06X}{:06X}\n",
            info.program_name, info.start_address, info.program_length
        );
        out.push_str(&self.exttab.define_records(&self.symtab)?);
        out.push_str(&self.exttab.refer_records());

        let mut text = TextRecords::new(cfg.text_record_limit);
        for token in &self.tokens {
            if let Some(code) = &token.object_code {
                text.push(token.location, code);
                continue;
            }
            match token.instr.as_ref().map(|i| i.kind) {
                Some(OpKind::Resb | OpKind::Resw) => text.flush(),
                Some(OpKind::Ltorg | OpKind::End) => {
                    for i in token.pooled.clone().unwrap_or_default() {
                        let Some(lit) = self.littab.get(i) else { continue };
                        let Some(location) = lit.location else { continue };
                        text.push(location, &lit.render()?);
                    }
                }
                _ => {}
            }
        }
        let records = text.count();
        out.push_str(&text.finish());

        for m in self.modtab.iter() {
            out.push_str(&m.to_string());
            out.push('\n');
        }

        out.push('E');
        if info.is_main {
            out.push_str(&format!("{:06X}", info.start_address));
        }
        out.push_str("\n\n");

        debug!(
            section = %info.program_name,
            text_records = records,
            modifications = self.modtab.len(),
            "emitted object program"
        );
        Ok(out)
    }
}
