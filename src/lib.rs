pub mod calc;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod parallel;
pub mod server;
