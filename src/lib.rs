//! Parley - AI-to-AI Conversation Orchestrator
//!
//! This crate runs turn-based conversations between two independently
//! configured LLM participants, streaming each produced message to live
//! subscribers and keeping the exchange in memory for export.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
