//! Frostline ERP: manufacturing core for a frozen-food business
//!
//! Bill-of-materials cost rollup and the manufacturing order lifecycle,
//! stored as plain YAML files in a project directory.

pub mod cli;
pub mod core;
pub mod entities;
pub mod logging;
pub mod yaml;
