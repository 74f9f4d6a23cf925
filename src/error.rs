use thiserror::Error;

#[derive(Error, Debug)]
pub enum AsmError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("symbol not found: {name}")]
    SymbolNotFound { name: String },
    #[error("literal not found: {literal}")]
    LiteralNotFound { literal: String },
    #[error("data {operand} does not fit in {capacity} byte(s)")]
    SizeOverflow { operand: String, capacity: usize },
    #[error("duplicate symbol: {name}")]
    DuplicateSymbol { name: String },
    #[error("section is {found:?}, expected {expected:?}")]
    PassOrder {
        expected: crate::section::Stage,
        found: crate::section::Stage,
    },
    #[error("instruction table: {0}")]
    Config(#[from] serde_json::Error),
    #[error("line {line}: {source}")]
    At {
        line: usize,
        #[source]
        source: Box<AsmError>,
    },
}

impl AsmError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    /// Attach a 1-based source line. Line 0 means "unknown" and leaves the error as is.
    pub fn at(self, line: usize) -> Self {
        match self {
            e @ Self::At { .. } => e,
            e if line == 0 => e,
            e => Self::At {
                line,
                source: Box::new(e),
            },
        }
    }

    /// The error without any line context.
    pub fn root(&self) -> &AsmError {
        match self {
            Self::At { source, .. } => source.root(),
            e => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, AsmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_context_wraps_once() {
        let e = AsmError::syntax("operator is required").at(4).at(9);
        assert_eq!(e.to_string(), "line 4: syntax error: operator is required");
        assert!(matches!(e.root(), AsmError::Syntax(_)));
    }

    #[test]
    fn unknown_line_is_not_wrapped() {
        let e = AsmError::SymbolNotFound { name: "BUF".into() }.at(0);
        assert!(matches!(e, AsmError::SymbolNotFound { .. }));
    }
}
