//! Batch input: lifecycle commands read from CSV.

pub mod batch;
pub mod command_reader;
