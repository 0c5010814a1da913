//! Multi-step instructions

pub mod engine;
pub mod state;
pub mod steps;

pub use engine::{ClickReport, FlowOutcome, FlowRunner, StepError};
pub use state::{FlowGuard, FlowState};
pub use steps::{classify, should_auto_click, split_steps, StepKind};
