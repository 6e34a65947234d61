//! The probe core: role detection, replica discovery, connection lifecycle,
//! and the test-cycle orchestrator.

pub mod connections;
pub mod context;
pub mod cycle;
pub mod discovery;
pub mod error;
pub mod pods;
pub mod role;

pub use context::ProbeContext;
pub use cycle::{CycleOutcome, CycleReport, TestCycle};
pub use role::{detect_role, PromotionGate, Role};
