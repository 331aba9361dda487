//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the kernel:
//! - Math types and operations
//! - Handle types and collections
//! - Time measurement
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;
pub mod time;
