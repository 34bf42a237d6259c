//! Scene graph collaborator
//!
//! The viewer's scene model lives outside this crate. The dispatcher only
//! hands it the parsed scene description: a full graph replaces whatever is
//! resident, a diff is applied on top of it. A diff only makes sense when the
//! graph it was computed against is resident, which is what
//! [`SceneError::MissingState`] reports.

use sparkview_shared::{Expression, SceneHeader};

/// Name of a scene node in both full graphs and diffs.
pub const NODE: &str = "nd";

/// Errors raised by a scene graph while applying a description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// A diff referenced state that is not resident
    #[error("scene diff does not match any resident scene")]
    MissingState,

    #[error("scene rejected update: {0}")]
    Rejected(String),
}

/// Receiver of scene descriptions.
///
/// `body` is the third expression of the message when present.
pub trait SceneGraph: Send {
    /// Replace the resident scene with a full description.
    fn replace(&mut self, header: &SceneHeader, body: Option<&Expression>) -> Result<(), SceneError>;

    /// Apply a diff to the resident scene.
    fn update(&mut self, header: &SceneHeader, body: Option<&Expression>) -> Result<(), SceneError>;

    /// Drop the resident scene.
    fn reset(&mut self);
}

/// Scene that accepts everything and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScene;

impl SceneGraph for NullScene {
    fn replace(&mut self, _: &SceneHeader, _: Option<&Expression>) -> Result<(), SceneError> {
        Ok(())
    }

    fn update(&mut self, _: &SceneHeader, _: Option<&Expression>) -> Result<(), SceneError> {
        Ok(())
    }

    fn reset(&mut self) {}
}

/// Node structure of a scene: the nested `nd` children, nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneShape {
    nodes: Vec<SceneShape>,
}

impl SceneShape {
    pub fn of(expr: Option<&Expression>) -> Self {
        let Some(expr) = expr else {
            return Self::default();
        };
        Self {
            nodes: expr
                .children()
                .iter()
                .filter(|c| c.name() == Some(NODE))
                .map(|c| Self::of(Some(c)))
                .collect(),
        }
    }

    /// Total number of nodes below this one.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(|n| 1 + n.node_count()).sum()
    }
}

/// Scene that tracks only the node structure of the last full graph.
///
/// Diffs carry one `nd` per resident node, so a diff whose structure differs
/// from the resident one (or a diff with nothing resident) is rejected with
/// [`SceneError::MissingState`]. Headless playback uses this to find frames
/// that can be applied after a jump.
#[derive(Debug, Default, Clone)]
pub struct SceneSkeleton {
    resident: Option<SceneShape>,
    updates: u64,
}

impl SceneSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resident(&self) -> Option<&SceneShape> {
        self.resident.as_ref()
    }

    /// Diffs applied since the last full graph.
    pub fn updates_since_full(&self) -> u64 {
        self.updates
    }
}

impl SceneGraph for SceneSkeleton {
    fn replace(&mut self, _: &SceneHeader, body: Option<&Expression>) -> Result<(), SceneError> {
        self.resident = Some(SceneShape::of(body));
        self.updates = 0;
        Ok(())
    }

    fn update(&mut self, _: &SceneHeader, body: Option<&Expression>) -> Result<(), SceneError> {
        let resident = self.resident.as_ref().ok_or(SceneError::MissingState)?;
        if body.is_some() && SceneShape::of(body) != *resident {
            return Err(SceneError::MissingState);
        }
        self.updates += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.resident = None;
        self.updates = 0;
    }
}
