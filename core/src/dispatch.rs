//! Monitor message dispatch
//!
//! A monitor message is two or three top-level expressions: the game state
//! delta, the scene header and, optionally, the scene body. The dispatcher
//! parses a message and applies all of it to a shared [`World`] while holding
//! the world lock, so observers never see a half-applied frame.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{trace, warn};

use sparkview_shared::{SExpError, SceneHeader, SceneHeaderError, SceneKind, parse};

use crate::game_state::{ChangeCounts, GameState};
use crate::scene::{NullScene, SceneError, SceneGraph};

/// Game state plus the scene graph it belongs to.
pub struct World {
    pub game_state: GameState,
    pub scene: Box<dyn SceneGraph>,
}

impl World {
    pub fn new(scene: Box<dyn SceneGraph>) -> Self {
        Self {
            game_state: GameState::new(),
            scene,
        }
    }

    /// World with a scene that accepts everything.
    pub fn headless() -> Self {
        Self::new(Box::new(NullScene))
    }

    /// Forget both the game state and the resident scene.
    pub fn reset(&mut self) {
        self.game_state.reset();
        self.scene.reset();
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("game_state", &self.game_state)
            .finish_non_exhaustive()
    }
}

/// What a dispatched message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub state: ChangeCounts,
    pub scene: SceneKind,
}

/// Reasons a message could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("malformed message: {0}")]
    Parse(#[from] SExpError),

    #[error("message has {found} top-level expressions, expected 2 or 3")]
    Structure { found: usize },

    #[error("invalid scene header: {0}")]
    Header(#[from] SceneHeaderError),

    #[error("scene update failed: {0}")]
    Scene(#[from] SceneError),
}

impl DispatchError {
    /// Whether the message depended on scene state that is not resident.
    pub fn is_missing_state(&self) -> bool {
        matches!(self, DispatchError::Scene(SceneError::MissingState))
    }
}

/// Applies monitor messages to a shared world.
#[derive(Debug, Clone)]
pub struct MessageDispatcher {
    world: Arc<Mutex<World>>,
}

impl MessageDispatcher {
    pub fn new(world: Arc<Mutex<World>>) -> Self {
        Self { world }
    }

    /// The world this dispatcher mutates.
    pub fn world(&self) -> &Arc<Mutex<World>> {
        &self.world
    }

    /// Lock the world. A poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, World> {
        lock_world(&self.world)
    }

    /// Parse and apply one message.
    ///
    /// The game state delta is applied before the scene; when the scene
    /// rejects its part the game state has still advanced.
    pub fn dispatch(&self, message: &str) -> Result<ChangeSet, DispatchError> {
        let exprs = parse(message)?.unwrap_or_default();
        if !(2..=3).contains(&exprs.len()) {
            return Err(DispatchError::Structure { found: exprs.len() });
        }
        let header = SceneHeader::parse(&exprs[1])?;
        let body = exprs.get(2);

        let mut world = self.lock();
        let state = world.game_state.apply_state_delta(&exprs[0]);
        if header.kind.is_full() {
            world.scene.replace(&header, body)?;
        } else {
            world.scene.update(&header, body)?;
        }
        trace!(
            "dispatched {} message at t={}",
            header,
            world.game_state.time()
        );

        Ok(ChangeSet {
            state,
            scene: header.kind,
        })
    }
}

/// Lock a shared world, recovering from poisoning.
pub fn lock_world(world: &Mutex<World>) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(|e| {
        warn!("world mutex poisoned; continuing");
        e.into_inner()
    })
}
