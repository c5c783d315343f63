#![forbid(unsafe_code)]

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod extract;
pub mod http;
pub mod logging;
pub mod manuscript;
pub mod orchestrator;
pub mod probe;
pub mod run_log;
pub mod runner;
pub mod sanitize;
pub mod taxonomy;
