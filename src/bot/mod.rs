/// Command and message handlers
pub mod handlers;
/// Resilient messaging with retry
pub mod resilient;
/// Update dispatch and runtime wiring
pub mod runner;
/// Telegram adapters for the relay ports
pub mod transport;
/// Message texts and keyboards
pub mod views;

pub use runner::run_bot;
