//! Support code for the `kibitz` command-line front end.

pub mod config;

pub use config::{Config, Secrets};
