//! Lowers a validated UMS [`qmf_ums::Measure`] into parameterized SQL
//! against a fixed clinical warehouse schema.

pub mod binding;
pub mod error;
pub mod generate;
pub mod schema;

pub use binding::{SqlBinding, SqlValue};
pub use error::SqlError;
pub use generate::{generate, SqlGeneration};
pub use schema::{col, Dialect};
