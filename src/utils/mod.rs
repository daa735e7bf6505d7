//! Utility modules for the devotional generator.

pub mod command;
pub mod date;
pub mod text;
