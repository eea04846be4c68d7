//! Lowers a validated UMS [`qmf_ums::Measure`] into textual CQL, lints the
//! result, and optionally bridges to a remote CQL-to-ELM translator.

pub mod error;
pub mod generate;
pub mod ident;
pub mod lint;
pub mod translator;

pub use error::{CqlError, Result};
pub use generate::{generate, CqlGeneration};
pub use lint::{lint as lint_cql, LintMetadata, LintResult};
pub use translator::{ElmAnnotations, ElmTranslator, HttpElmTranslator, NoopTranslator, TranslatorError};
