//! Risk guards, events, and the session risk engine

pub mod engine;
pub mod events;

pub use engine::{AccountView, RiskEngine};
pub use events::{RiskEvent, RiskEventType, RiskSeverity, RiskSnapshot};
