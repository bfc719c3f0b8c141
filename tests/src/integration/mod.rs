//! Scenarios driven through the real serial channel registry.

pub mod harness;
mod scenarios;
