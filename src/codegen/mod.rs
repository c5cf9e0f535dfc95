//! Code generation: document model to typed client source.
//!
//! [`generate_exchange`] builds a [`TsFile`] AST from a validated document and
//! [`emit`] prints it. Nothing here re-validates: inconsistencies surface as
//! [`crate::error::GenerationError`].

pub mod ast;
pub mod emitter;
pub mod generator;
pub mod lower;
pub mod transactions;
pub mod transforms;
pub mod v2;

pub use ast::TsFile;
pub use emitter::emit;
pub use generator::{class_name, generate_exchange, GeneratorOptions};
