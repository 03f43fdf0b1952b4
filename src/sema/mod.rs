//! Semantic layer: C types, constant folding and type checking

pub mod check;
pub mod fold;
pub mod types;

pub use check::{check_unit, is_constant_initializer};
