//! # ShelfDB Core
//!
//! Core types shared by every ShelfDB storage strategy: typed values,
//! schemas and rows, condition lists with their canonical evaluator, and
//! the [`Table`] contract.
//!
//! ## Internal Implementation Detail
//!
//! Users should depend on the main `shelfdb` crate, which re-exports
//! everything needed from here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod condition;
pub mod error;
pub mod row;
pub mod table;
pub mod value;

pub use condition::{Condition, Connector, Filter, Operator, Predicate};
pub use error::{Error, Result};
pub use row::{parse_cell, Cell, Record, Row, Schema};
pub use table::{Table, TableKind};
pub use value::{Value, ValueKind};
