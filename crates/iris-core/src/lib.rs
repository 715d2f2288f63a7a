//! # iris-core
//!
//! Client core for Iris, a conversational image-analysis assistant.
//!
//! This crate has no UI. Front ends (the `iris` CLI, anything embedding
//! the core) drive a [`SessionController`] and re-render on [`SessionEvent`]s.
//!
//! ## Key Concepts
//!
//! - **Mode**: The analysis mode, locked once per session
//! - **Session**: Mode, attached image, messages and region of interest
//! - **ParsedResponse**: An assistant reply split into titled blocks
//! - **Report**: Fixed fields projected from the latest reply

pub mod auth;
pub mod backend;
pub mod config;
pub mod event_bus;
pub mod image;
pub mod logging;
pub mod mode;
pub mod parser;
pub mod paths;
pub mod persistence;
pub mod report;
pub mod session;
pub mod speech;

// Re-export commonly used types
pub use event_bus::{EventBus, SessionEvent};
pub use mode::Mode;
pub use parser::{parse_response, Block, ParsedResponse};
pub use session::{Message, Session, SessionController, SessionError};
