//! The synchronization core: connection registry, fan-out broadcast, the
//! single-flight job coordinator, and the hub that ties them to the
//! canonical scene document.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, Utf8Bytes};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use stage_gen::{AssetGenerator, CancelToken};
use stage_scene::{Patch, SceneDocument};

/// Translates a free-text command into a patch. Never fails; a command
/// that is not understood yields an empty patch.
pub trait Interpreter: Send + Sync {
    fn interpret(&self, text: &str) -> Patch;
}

impl<F> Interpreter for F
where
    F: Fn(&str) -> Patch + Send + Sync,
{
    fn interpret(&self, text: &str) -> Patch {
        self(text)
    }
}

pub type ConnectionId = u64;
pub type ConnectionSender = UnboundedSender<Message>;

/// Live connections, keyed by a monotonically assigned id. The owner
/// serializes access; methods here never block.
#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, ConnectionSender>,
    next_id: ConnectionId,
}

impl Registry {
    pub fn register(&mut self, sender: ConnectionSender) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(id, sender);
        id
    }

    /// Safe to call for ids already removed.
    pub fn unregister(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queues the same payload to every member. Failed deliveries are
    /// collected during the pass and pruned after it, so one dead peer
    /// neither blocks the others nor mutates the set mid-iteration.
    pub fn broadcast(&mut self, payload: &Utf8Bytes) {
        let mut dead = Vec::new();
        for (id, sender) in &self.connections {
            if sender.send(Message::Text(payload.clone())).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            debug!(connection = id, "pruning dead connection");
            self.connections.remove(&id);
        }
    }
}

/// Issues one cancellation token per generation epoch. At any instant at
/// most one token is live; superseding is synchronous from the caller's
/// point of view even while the old job is still physically executing.
#[derive(Default)]
pub struct JobCoordinator {
    active: Mutex<Option<CancelToken>>,
}

impl JobCoordinator {
    pub fn supersede(&self) -> CancelToken {
        let mut active = self.active.lock().expect("coordinator lock");
        if let Some(previous) = active.take() {
            previous.cancel();
        }
        let token = CancelToken::new();
        *active = Some(token.clone());
        token
    }
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Origin viewers can reach the asset route through, e.g.
    /// `http://127.0.0.1:8765`.
    pub public_origin: String,
    /// Directory the generation cache writes to and `/assets` serves from.
    pub asset_dir: PathBuf,
}

struct HubState {
    document: SceneDocument,
    registry: Registry,
}

/// Shared context threaded into every session: the canonical document,
/// the connection set, and the job coordinator. All document mutation and
/// all fan-out runs inside the single state lock, so merges never
/// interleave and every connection observes snapshots in document order.
pub struct Hub {
    state: Mutex<HubState>,
    coordinator: JobCoordinator,
    interpreter: Box<dyn Interpreter>,
    generator: Arc<dyn AssetGenerator>,
    config: HubConfig,
}

impl Hub {
    pub fn new(
        config: HubConfig,
        interpreter: Box<dyn Interpreter>,
        generator: Arc<dyn AssetGenerator>,
    ) -> Self {
        Self {
            state: Mutex::new(HubState {
                document: SceneDocument::new(),
                registry: Registry::default(),
            }),
            coordinator: JobCoordinator::default(),
            interpreter,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().expect("hub state lock").registry.len()
    }

    /// Registers a connection, queueing the current snapshot as its first
    /// message. Both happen under the state lock, so no broadcast can
    /// slip in between and the snapshot is never stale.
    pub fn connect(&self, sender: ConnectionSender) -> ConnectionId {
        let mut state = self.state.lock().expect("hub state lock");
        if let Some(snapshot) = encode_snapshot(&state.document) {
            let _ = sender.send(Message::Text(snapshot));
        }
        state.registry.register(sender)
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.state.lock().expect("hub state lock").registry.unregister(id);
    }

    pub fn handle_command(self: Arc<Self>, text: &str) {
        let patch = self.interpreter.interpret(text);
        self.handle_patch(patch);
    }

    /// Merge, broadcast, then (when the patch introduces an object)
    /// trigger generation, in that order, so every viewer sees the
    /// editorial change before the "working" indicator.
    pub fn handle_patch(self: Arc<Self>, patch: Patch) {
        if patch.is_empty() {
            return;
        }
        let prompt = patch
            .introduces_object()
            .then(|| patch.object_name().unwrap_or("object").to_string());
        self.apply_and_broadcast(&patch);
        if let Some(prompt) = prompt {
            self.spawn_generation(prompt);
        }
    }

    pub fn asset_url(&self, file_name: &str) -> String {
        format!(
            "{}/assets/{}",
            self.config.public_origin.trim_end_matches('/'),
            file_name
        )
    }

    fn apply_and_broadcast(&self, patch: &Patch) {
        let mut state = self.state.lock().expect("hub state lock");
        state.document.apply_patch(patch);
        broadcast_snapshot(&mut state);
    }

    /// Supersedes any running job and schedules a new one. The token
    /// swap, the busy-flag patch, and its broadcast form one critical
    /// section; the job body itself runs on the blocking pool.
    fn spawn_generation(self: Arc<Self>, prompt: String) {
        let token = {
            let mut state = self.state.lock().expect("hub state lock");
            let token = self.coordinator.supersede();
            state.document.apply_patch(&Patch::generation_started());
            broadcast_snapshot(&mut state);
            token
        };
        info!(%prompt, "generation job started");

        tokio::spawn(async move {
            self.run_generation(prompt, token).await;
        });
    }

    async fn run_generation(self: Arc<Self>, prompt: String, token: CancelToken) {
        let generator = Arc::clone(&self.generator);
        let worker_token = token.clone();
        let worker_prompt = prompt.clone();
        let outcome =
            tokio::task::spawn_blocking(move || generator.generate(&worker_prompt, &worker_token))
                .await;

        let patch = match outcome {
            Ok(Ok(Some(locator))) => {
                let url = self.asset_url(&locator.file_name);
                Patch::generation_finished(Some(url))
            }
            Ok(Ok(None)) => Patch::generation_finished(None),
            Ok(Err(err)) => {
                warn!(%prompt, error = %err, "generation job failed");
                Patch::generation_finished(None)
            }
            Err(err) => {
                warn!(%prompt, error = %err, "generation worker panicked");
                Patch::generation_finished(None)
            }
        };

        if self.finish_generation(&token, &patch) {
            info!(%prompt, "generation result broadcast");
        } else {
            debug!(%prompt, "superseded generation result dropped");
        }
    }

    /// Applies the completion patch unless the job was superseded. The
    /// token check and the mutation share the state lock, so a result
    /// can never land after a newer trigger has been observed.
    fn finish_generation(&self, token: &CancelToken, patch: &Patch) -> bool {
        let mut state = self.state.lock().expect("hub state lock");
        if token.is_cancelled() {
            return false;
        }
        state.document.apply_patch(patch);
        broadcast_snapshot(&mut state);
        true
    }
}

fn broadcast_snapshot(state: &mut HubState) {
    match encode_snapshot(&state.document) {
        Some(payload) => state.registry.broadcast(&payload),
        None => {}
    }
}

fn encode_snapshot(document: &SceneDocument) -> Option<Utf8Bytes> {
    match serde_json::to_string(&document.snapshot()) {
        Ok(payload) => Some(Utf8Bytes::from(payload)),
        Err(err) => {
            warn!(error = %err, "scene snapshot failed to encode");
            None
        }
    }
}
