pub mod assembler;
pub mod emit;
pub mod encode;
pub mod error;
pub mod instructions;
pub mod locate;
pub mod operand;
pub mod section;
pub mod tables;
pub mod token;

pub use assembler::{AsmConfig, Assembler};
pub use error::{AsmError, Result};
pub use instructions::{InstTable, Instruction, InstructionSet, OpKind};
pub use section::{ControlSection, Stage};
pub use tables::{Literal, LiteralTable, Modification, SectionInfo, Sign};
pub use token::{Nixbpe, Token, MAX_OPERAND};
