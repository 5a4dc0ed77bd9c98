//! testsheet_engine - cell model, type inference and formula evaluation.

pub mod engine;
