//! C4 Orchestrator: the think -> act -> verify control loop (§4.4). Runs as
//! a single Tokio task; external inputs arrive only through `OrchestratorCommand`
//! on a bounded queue, so all state mutation happens on this task's own context.

mod prompt;

pub use prompt::{PromptBuilder, PromptMessage};

use crate::actuator::Actuator;
use crate::config_summary::OrchestratorConfig;
use crate::event_bus::EventBus;
use crate::model::{AgentStatus, ScreenFrame, Task, TaskState};
use crate::normalize;
use crate::parser;
use crate::session::{ChatRole, SessionState};
use crate::vlm::{ChatMessage as VlmChatMessage, VlmClient, VlmManager};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use vla_stream_event::{
    ActionEnvelope, ActionPayload, ActionType, ChatMessagePayload, ChatRole as WireChatRole, Event,
    EventPayload, FramePayload, StatusPayload, ThoughtPayload,
};

const COMMAND_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskSubmitResult {
    Accepted(Task),
    Busy,
}

pub enum OrchestratorCommand {
    Task {
        command: String,
        reply: oneshot::Sender<TaskSubmitResult>,
    },
    Steer {
        context: String,
        reply: oneshot::Sender<Result<(), crate::error::OrchestratorError>>,
    },
    Pause {
        reply: oneshot::Sender<Result<(), crate::error::OrchestratorError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<(), crate::error::OrchestratorError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), crate::error::OrchestratorError>>,
    },
    ClearChat {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-able handle used by the gateway's HTTP routes to talk to the
/// orchestrator task. Never touches orchestrator state directly (§9).
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<OrchestratorCommand>,
    busy: Arc<AtomicBool>,
}

impl OrchestratorHandle {
    /// Whether a task is currently running, read without going through the
    /// command queue (used by `/model/switch` to refuse switching mid-task).
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn submit_task(&self, command: String) -> TaskSubmitResult {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(OrchestratorCommand::Task { command, reply })
            .await
            .is_err()
        {
            return TaskSubmitResult::Busy;
        }
        rx.await.unwrap_or(TaskSubmitResult::Busy)
    }

    pub async fn steer(&self, context: String) -> Result<(), crate::error::OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(OrchestratorCommand::Steer { context, reply }).await;
        rx.await.unwrap_or(Err(crate::error::OrchestratorError::NoActiveTask))
    }

    pub async fn pause(&self) -> Result<(), crate::error::OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(OrchestratorCommand::Pause { reply }).await;
        rx.await.unwrap_or(Err(crate::error::OrchestratorError::NoActiveTask))
    }

    pub async fn resume(&self) -> Result<(), crate::error::OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(OrchestratorCommand::Resume { reply }).await;
        rx.await.unwrap_or(Err(crate::error::OrchestratorError::NoActiveTask))
    }

    pub async fn stop(&self) -> Result<(), crate::error::OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(OrchestratorCommand::Stop { reply }).await;
        rx.await.unwrap_or(Ok(()))
    }

    pub async fn clear_chat(&self) {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(OrchestratorCommand::ClearChat { reply }).await;
        let _ = rx.await;
    }
}

/// The concrete type gateway/cli code builds, so it never needs to be
/// generic over `VlmClient` itself (mirrors `vlm::SharedVlmManager`).
pub type SharedOrchestrator = Orchestrator<std::sync::Arc<dyn VlmClient>>;

pub struct Orchestrator<C: VlmClient> {
    rx: mpsc::Receiver<OrchestratorCommand>,
    event_bus: EventBus,
    session: Arc<SessionState>,
    vlm: Arc<VlmManager<C>>,
    actuator: Arc<dyn Actuator>,
    config: OrchestratorConfig,
    busy: Arc<AtomicBool>,
}

impl<C: VlmClient + 'static> Orchestrator<C> {
    pub fn new(
        config: OrchestratorConfig,
        event_bus: EventBus,
        session: Arc<SessionState>,
        vlm: Arc<VlmManager<C>>,
        actuator: Arc<dyn Actuator>,
    ) -> (Self, OrchestratorHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let busy = Arc::new(AtomicBool::new(false));
        (
            Self {
                rx,
                event_bus,
                session,
                vlm,
                actuator,
                config,
                busy: busy.clone(),
            },
            OrchestratorHandle { tx, busy },
        )
    }

    /// Drives the orchestrator for its whole lifetime; returns when the
    /// handle (and every clone) is dropped.
    pub async fn run(mut self) {
        loop {
            match self.rx.recv().await {
                Some(OrchestratorCommand::Task { command, reply }) => {
                    let task = Task::new(command.clone());
                    let _ = reply.send(TaskSubmitResult::Accepted(task.clone()));
                    self.busy.store(true, Ordering::Release);
                    self.run_task(command, task).await;
                    self.busy.store(false, Ordering::Release);
                }
                Some(OrchestratorCommand::Steer { reply, .. }) => {
                    let _ = reply.send(Err(crate::error::OrchestratorError::NoActiveTask));
                }
                Some(OrchestratorCommand::Pause { reply }) => {
                    let _ = reply.send(Err(crate::error::OrchestratorError::NoActiveTask));
                }
                Some(OrchestratorCommand::Resume { reply }) => {
                    let _ = reply.send(Err(crate::error::OrchestratorError::NoActiveTask));
                }
                Some(OrchestratorCommand::Stop { reply }) => {
                    let _ = reply.send(Ok(()));
                }
                Some(OrchestratorCommand::ClearChat { reply }) => {
                    self.session.clear_chat();
                    let _ = reply.send(());
                }
                None => break,
            }
        }
    }

    async fn with_cancel<T>(
        &self,
        token: &CancellationToken,
        fut: impl Future<Output = T>,
    ) -> Option<T> {
        tokio::select! {
            _ = token.cancelled() => None,
            res = fut => Some(res),
        }
    }

    fn publish_status(&self, status: AgentStatus, details: Option<String>) {
        let mut snapshot = self.session.snapshot();
        snapshot.status = status;
        snapshot.details = details.clone();
        self.session.set_snapshot(snapshot);
        self.event_bus.publish(Event::new(EventPayload::Status(StatusPayload {
            status: wire_string(&status),
            details,
            vlm_status: Some(wire_string(&self.vlm.snapshot().state)),
            pid: self.vlm.snapshot().pid,
        })));
    }

    fn publish_thought(&self, text: &str) {
        let mut snapshot = self.session.snapshot();
        snapshot.last_thought = Some(text.to_string());
        self.session.set_snapshot(snapshot);
        self.session.push_activity(format!("thought: {text}"));
        self.event_bus
            .publish(Event::new(EventPayload::Thought(ThoughtPayload { text: text.to_string() })));
    }

    fn publish_action(&self, env: &ActionEnvelope) {
        let mut snapshot = self.session.snapshot();
        snapshot.current_action = Some(wire_string(&env.action_type));
        self.session.set_snapshot(snapshot);
        self.session
            .push_activity(format!("action: {}", wire_string(&env.action_type)));
        self.event_bus.publish(Event::new(EventPayload::Action(ActionPayload {
            envelope: env.clone(),
        })));
    }

    fn publish_frame(&self, frame: &mut ScreenFrame) {
        self.event_bus.publish(Event::new(EventPayload::Frame(FramePayload {
            captured_at: frame.captured_at,
            width_px: frame.width_px,
            height_px: frame.height_px,
            jpeg_base64: frame.base64().to_string(),
        })));
    }

    fn publish_chat(&self, role: WireChatRole, text: &str) {
        self.event_bus.publish(Event::new(EventPayload::ChatMessage(ChatMessagePayload {
            role,
            text: text.to_string(),
        })));
    }

    #[instrument(skip(self, command))]
    async fn run_task(&mut self, command: String, mut task: Task) {
        task.state = TaskState::Running;
        self.publish_chat(WireChatRole::User, &command);
        self.session.push_chat(ChatRole::User, command.clone());

        let mut steer_hints: Vec<String> = Vec::new();
        let mut paused = false;
        let token = CancellationToken::new();
        let mut stopped = false;
        let mut done = false;
        let mut error_reason: Option<String> = None;
        let mut abort_reason: Option<String> = None;

        'iter: loop {
            while let Ok(cmd) = self.rx.try_recv() {
                if self.dispatch_mid_task(cmd, &mut steer_hints, &mut paused, &token, &mut stopped) {
                    break;
                }
            }
            if stopped {
                break;
            }

            if paused {
                self.publish_status(AgentStatus::Paused, None);
                match self.rx.recv().await {
                    Some(cmd) => {
                        self.dispatch_mid_task(cmd, &mut steer_hints, &mut paused, &token, &mut stopped);
                        if stopped {
                            break;
                        }
                    }
                    None => {
                        stopped = true;
                        break;
                    }
                }
                continue 'iter;
            }

            if task.iterations_used >= self.config.max_iterations {
                abort_reason = Some("MAX_ITERATIONS".to_string());
                break;
            }

            self.publish_status(AgentStatus::Thinking, None);
            let history = self.session.chat_history();
            let prompt = PromptBuilder {
                command: &command,
                history: &history,
                history_turns: self.config.history_turns,
                steer_hints: &steer_hints,
                heartbeat_context: None,
            }
            .build();

            self.publish_status(AgentStatus::Capturing, None);
            let mut frame = match self.with_cancel(&token, self.actuator.capture()).await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    error_reason = Some(format!("actuator error: {e}"));
                    break;
                }
                None => {
                    stopped = true;
                    break;
                }
            };
            self.publish_frame(&mut frame);

            self.publish_status(AgentStatus::Thinking, None);
            let vlm_messages = to_vlm_messages(&prompt, &mut frame);
            let raw = match self.with_cancel(&token, self.vlm.chat(&vlm_messages)).await {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    task.iterations_used += 1;
                    self.publish_thought(&format!("vlm error: {e}"));
                    continue 'iter;
                }
                None => {
                    stopped = true;
                    break;
                }
            };

            let parsed = parser::parse(&raw);
            task.iterations_used += 1;
            let env = match parsed {
                Ok(env) => env,
                Err(_) => {
                    self.publish_thought("no well-formed action in vlm output");
                    if task.iterations_used >= self.config.max_iterations {
                        error_reason = Some("UNPARSEABLE".to_string());
                        break;
                    }
                    continue 'iter;
                }
            };

            self.publish_thought(env.rationale.as_deref().unwrap_or(""));

            if env.action_type == ActionType::Done {
                done = true;
                break;
            }
            if env.action_type == ActionType::Fail {
                error_reason = Some(env.rationale.clone().unwrap_or_default());
                break;
            }

            if env.confidence < self.config.confidence_threshold {
                self.publish_status(AgentStatus::Blocked, Some("LOW_CONFIDENCE".to_string()));
                continue 'iter;
            }

            self.publish_status(AgentStatus::Executing, None);
            if let Some(action) =
                normalize::to_pixel_action(&env, frame.width_px, frame.height_px, Default::default())
            {
                match self.with_cancel(&token, self.actuator.apply(action)).await {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        error_reason = Some(format!("actuator error: {e}"));
                        break;
                    }
                    None => {
                        stopped = true;
                        break;
                    }
                }
                self.publish_action(&env);
                tokio::time::sleep(self.config.post_action_delay).await;
            }

            self.publish_status(AgentStatus::Verifying, None);
            if let Some(rationale) = &env.rationale {
                self.session.push_chat(ChatRole::Assistant, rationale.clone());
                self.publish_chat(WireChatRole::Agent, rationale);
            }
            steer_hints.clear();
        }

        let (state, status, details) = if done {
            (TaskState::Done, AgentStatus::Done, None)
        } else if let Some(reason) = error_reason {
            (TaskState::Error, AgentStatus::Error, Some(reason))
        } else if let Some(reason) = abort_reason {
            (TaskState::Aborted, AgentStatus::Aborted, Some(reason))
        } else {
            (TaskState::Aborted, AgentStatus::Aborted, Some("STOPPED".to_string()))
        };
        task.state = state;
        self.publish_status(status, details);
        info!(task_id = %task.id, iterations = task.iterations_used, ?state, "task finished");
        self.publish_status(AgentStatus::Idle, None);
    }

    /// Returns `true` if the command was a `Stop` (caller should stop draining).
    fn dispatch_mid_task(
        &self,
        cmd: OrchestratorCommand,
        steer_hints: &mut Vec<String>,
        paused: &mut bool,
        token: &CancellationToken,
        stopped: &mut bool,
    ) -> bool {
        match cmd {
            OrchestratorCommand::Task { reply, .. } => {
                let _ = reply.send(TaskSubmitResult::Busy);
                false
            }
            OrchestratorCommand::Steer { context, reply } => {
                steer_hints.push(context);
                let _ = reply.send(Ok(()));
                false
            }
            OrchestratorCommand::Pause { reply } => {
                *paused = true;
                let _ = reply.send(Ok(()));
                false
            }
            OrchestratorCommand::Resume { reply } => {
                *paused = false;
                let _ = reply.send(Ok(()));
                false
            }
            OrchestratorCommand::Stop { reply } => {
                token.cancel();
                *stopped = true;
                let _ = reply.send(Ok(()));
                true
            }
            OrchestratorCommand::ClearChat { reply } => {
                self.session.clear_chat();
                let _ = reply.send(());
                false
            }
        }
    }
}

/// Renders a wire-tagged enum (`SCREAMING_SNAKE_CASE` serde) to the bare
/// string observers expect in event payloads, e.g. `VlmState::IdleHold` -> `"IDLE_HOLD"`.
fn wire_string<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "UNKNOWN".to_string(),
    }
}

fn to_vlm_messages(prompt: &[PromptMessage], frame: &mut ScreenFrame) -> Vec<VlmChatMessage> {
    let last_index = prompt.len().saturating_sub(1);
    let image = frame.base64().to_string();
    prompt
        .iter()
        .enumerate()
        .map(|(i, m)| VlmChatMessage {
            role: m.role.clone(),
            content: m.content.clone(),
            image_base64: if i == last_index { Some(image.clone()) } else { None },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::NullActuator;
    use crate::vlm::{MockVlmClient, VlmManagerConfig};
    use std::time::Duration;

    fn test_vlm_config() -> VlmManagerConfig {
        VlmManagerConfig {
            binary_path: "sleep".to_string(),
            args: vec!["30".to_string()],
            probe_interval: Duration::from_millis(5),
            warmup_deadline: Duration::from_millis(200),
            ..VlmManagerConfig::default()
        }
    }

    async fn spawn_orchestrator(
        responses: Vec<&str>,
        config: OrchestratorConfig,
    ) -> (OrchestratorHandle, EventBus, tokio::task::JoinHandle<()>) {
        let client = Arc::new(MockVlmClient::new(responses));
        let vlm = Arc::new(VlmManager::new(client, test_vlm_config(), "model-a"));
        vlm.ensure_ready("model-a").await.unwrap();
        let actuator: Arc<dyn Actuator> = Arc::new(NullActuator::new(1920, 1080));
        let event_bus = EventBus::new();
        let session = Arc::new(SessionState::new());
        let (orchestrator, handle) = Orchestrator::new(config, event_bus.clone(), session, vlm, actuator);
        let join = tokio::spawn(orchestrator.run());
        (handle, event_bus, join)
    }

    #[tokio::test]
    async fn happy_path_done_ends_task_done() {
        let done_block = "```action\ntype: DONE\nconfidence: 1.0\nrationale: finished\n```";
        let (handle, _bus, _join) =
            spawn_orchestrator(vec![done_block], OrchestratorConfig::default()).await;
        let result = handle.submit_task("open the Start menu".to_string()).await;
        assert!(matches!(result, TaskSubmitResult::Accepted(_)));
        // allow the task to run to completion
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = handle.submit_task("second task".to_string()).await;
        assert!(matches!(second, TaskSubmitResult::Accepted(_)));
    }

    #[tokio::test]
    async fn second_task_while_running_is_busy() {
        let slow_block = "no action here, just thinking";
        let (handle, _bus, _join) = spawn_orchestrator(
            vec![slow_block; 25],
            OrchestratorConfig {
                max_iterations: 3,
                post_action_delay: Duration::from_millis(1),
                ..OrchestratorConfig::default()
            },
        )
        .await;
        let _ = handle.submit_task("first".to_string()).await;
        let second = handle.submit_task("second".to_string()).await;
        assert_eq!(second, TaskSubmitResult::Busy);
    }

    #[tokio::test]
    async fn low_confidence_action_is_skipped_without_actuator_call() {
        let low_conf = "```action\ntype: CLICK\ntarget: 10, 10\nconfidence: 0.1\nrationale: guess\n```";
        let done_block = "```action\ntype: DONE\nconfidence: 1.0\nrationale: finished\n```";
        let (handle, _bus, _join) = spawn_orchestrator(
            vec![low_conf, done_block],
            OrchestratorConfig {
                confidence_threshold: 0.8,
                post_action_delay: Duration::from_millis(1),
                ..OrchestratorConfig::default()
            },
        )
        .await;
        handle.submit_task("click something".to_string()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn stop_mid_task_ends_aborted() {
        let stalling = "no action block, keeps talking";
        let (handle, _bus, _join) = spawn_orchestrator(
            vec![stalling; 25],
            OrchestratorConfig {
                max_iterations: 20,
                post_action_delay: Duration::from_millis(1),
                ..OrchestratorConfig::default()
            },
        )
        .await;
        handle.submit_task("wander".to_string()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let next = handle.submit_task("after stop".to_string()).await;
        assert!(matches!(next, TaskSubmitResult::Accepted(_)));
    }
}
