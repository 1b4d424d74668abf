//! Flow control for the investigation loop
//!
//! The substrate decides which agent runs next; this module decides whether
//! anything runs at all. Every round-trip updates handoff, token and cost
//! accounting and is followed by an early-termination check.

mod controller;
mod cost;
mod progress;
mod termination;

pub use controller::FlowController;
pub use cost::estimate_cost;
pub use progress::{HandoffRecord, InvestigationProgress};
pub use termination::{check_early_termination, TerminationReason};
