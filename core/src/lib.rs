//! Agent orchestration engine.
//!
//! Owns the perception-action control loop (`orchestrator`), the external
//! VLM process lifecycle (`vlm`), coordinate normalization and output
//! parsing (`normalize`, `parser`), the in-process event bus (`event_bus`),
//! and short-lived session/chat state (`session`). Everything outside this
//! crate — GUI automation, screenshot capture, voice, UI shells — is an
//! external collaborator reached only through the `Actuator` and
//! `VlmClient` traits.

pub mod actuator;
pub mod clock;
pub mod config_summary;
pub mod error;
pub mod event_bus;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod session;
pub mod vlm;

pub use actuator::{Actuator, ActuatorError, NullActuator, PixelAction};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config_summary::OrchestratorConfig;
pub use error::{CoreError, OrchestratorError, VlmError};
pub use event_bus::{CoalescedSnapshot, EventBus, Subscriber};
pub use model::{
    AgentSnapshot, AgentStatus, CircuitBreaker, ScreenFrame, Task, TaskState, VlmProcess, VlmState,
};
pub use orchestrator::{Orchestrator, OrchestratorCommand, OrchestratorHandle, SharedOrchestrator};
pub use session::SessionState;
pub use vlm::{HttpVlmClient, MockVlmClient, SharedVlmManager, VlmClient, VlmManager, VlmReadiness};
