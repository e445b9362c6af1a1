//! Core composition logic — types, parsing, ordering, building, planning,
//! composing, synthesis.

pub mod builder;
pub mod compose;
pub mod error;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod state;
pub mod synth;
pub mod types;
