//! Side-effecting adapters around the pure core.

pub mod catalog;
pub mod config;
pub mod oracle;
pub mod process;
pub mod tools;
