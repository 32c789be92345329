#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod log;
pub mod common;
pub mod strings;
pub mod graph;
pub mod bels;
pub mod pins;
pub mod lab;
pub mod cells;
pub mod arch;
pub mod config;
pub mod loader;
pub mod exporter;
