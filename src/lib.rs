pub mod agent;
pub mod browser;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod flow;
pub mod interact;
pub mod locate;
pub mod observation;
pub mod overlay;
pub mod page;
pub mod protocol;

//  Re-export commonly used items
pub use agent::{
    Action, ActionExecutor, ActionResult, AgentConfig, AgentLoop, AgentRunReport, HttpPlanner,
    Planner, StopReason,
};
pub use browser::{ChromeDriver, ChromePage, ConnectionMode};
pub use config::{EngineConfig, OverlayConfig};
pub use engine::{GuideEngine, GuideOutcome, InstructOutcome};
pub use error::{GuideError, Result};
pub use flow::{FlowOutcome, FlowRunner};
pub use observation::{ElementDescriptor, Observation};
pub use overlay::GuideOverlay;
pub use page::{MemoryPage, NodeQuery, NodeRef, PageContext, RawNode};
pub use protocol::{Request, Response};
