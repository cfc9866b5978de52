#![deny(missing_docs)]
//! Media relay bot
//!
//! A Telegram bot that accepts photos and videos, queues them and reposts
//! them one at a time at a fixed interval, either to a configured channel or
//! back to the submitter.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Queue, dispatcher and delivery estimates
pub mod relay;
/// Utility functions
pub mod utils;
