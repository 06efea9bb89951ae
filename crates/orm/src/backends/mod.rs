//! Database Backend Abstraction
//!
//! The ORM core never talks SQL wire protocols itself. Everything below the
//! query builder and the table layer goes through the [`Connection`] trait,
//! which a driver adapter implements for the actual backend.

pub mod core;

pub use core::{Connection, ConnectionError, SqlRow, Statement, SUCCESS_CODE};
