pub mod ask;
pub mod config;
pub mod daemon;
pub mod screenshot;
pub mod send;
pub mod targets;
pub mod utils;
pub mod wait;

#[cfg(test)]
#[path = "../commands_test.rs"]
mod commands_test;
