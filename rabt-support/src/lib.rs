//! # Rabt Support
//!
//! Shared utilities for the Rabt registration crates.
//!
//! This crate provides:
//! - Text rendering for error messages and plan dumps
//! - Type-name shortening and "did you mean?" suggestions

pub mod rendering;
