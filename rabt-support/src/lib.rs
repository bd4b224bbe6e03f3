//! # Rabt Support
//!
//! Shared helpers for the Rabt DI workspace.
//!
//! This crate provides:
//! - Rendering of resolution chains and type names for diagnostics
//! - "Did you mean?" suggestions for unregistered contracts

pub mod rendering;
