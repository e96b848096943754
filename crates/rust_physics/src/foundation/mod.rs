//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and transform composition
//! - Handle types for colliders, constraints, subscriptions and worlds
//! - Fixed-step time keeping
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod time;
pub mod logging;
