// src/lib.rs
pub mod catalog;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod si;

mod core;

pub mod scanner {
    pub use crate::core::{Options, report_json, run, run_dump};
}
