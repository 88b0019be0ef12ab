// src/services/mod.rs

//! Protocol-facing services.

pub mod oai;

pub use oai::{OaiClient, RecordStream};
