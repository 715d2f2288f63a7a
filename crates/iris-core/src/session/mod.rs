//! The analysis session state machine.
//!
//! A session starts with no mode, locks a mode once, and alternates between
//! idle and awaiting a reply. [`SessionController`] is its only writer.

mod controller;
mod region;
mod state;

pub use controller::{
    PendingSend, SendOutcome, SessionController, SessionError, ANALYZE_PROMPT, FALLBACK_REPLY,
    INITIALIZE_PROMPT,
};
pub use region::{ImageBounds, Point};
pub use state::{Insights, Message, Region, Role, Session};
