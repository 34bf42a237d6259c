//! Scene graph header
//!
//! The second expression of every monitor message declares whether the scene
//! description that follows is a full graph or a diff against the previous
//! one: `(RSG 0 1)` or `(RDS 0 1)`.

use std::fmt;

use crate::sexp::Expression;

/// Header atom of a full scene graph.
pub const FULL: &str = "RSG";

/// Header atom of a scene graph diff.
pub const DIFF: &str = "RDS";

/// Kind of scene description carried by a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneKind {
    /// Full description; may change the structure of the graph
    Full,
    /// Diff against the resident graph; same structure, changed nodes only
    Diff,
    /// Any other header, treated as a diff
    Other(String),
}

impl SceneKind {
    pub fn is_full(&self) -> bool {
        matches!(self, SceneKind::Full)
    }
}

/// Errors while reading a scene header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneHeaderError {
    #[error("scene header has no type atom")]
    MissingType,

    #[error("invalid scene header version '{0}'")]
    InvalidVersion(String),
}

/// Parsed scene header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneHeader {
    pub kind: SceneKind,
    pub major_version: u32,
    pub minor_version: u32,
}

impl SceneHeader {
    /// Parse `(<type> <major> <minor>)`. Missing version atoms default to 0.
    pub fn parse(expr: &Expression) -> Result<Self, SceneHeaderError> {
        let kind = match expr.name() {
            Some(FULL) => SceneKind::Full,
            Some(DIFF) => SceneKind::Diff,
            Some(other) => SceneKind::Other(other.to_string()),
            None => return Err(SceneHeaderError::MissingType),
        };
        let version = |index: usize| -> Result<u32, SceneHeaderError> {
            match expr.atom(index) {
                Some(text) => text
                    .parse()
                    .map_err(|_| SceneHeaderError::InvalidVersion(text.to_string())),
                None => Ok(0),
            }
        };

        Ok(Self {
            kind,
            major_version: version(1)?,
            minor_version: version(2)?,
        })
    }
}

impl fmt::Display for SceneHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            SceneKind::Full => FULL,
            SceneKind::Diff => DIFF,
            SceneKind::Other(name) => name.as_str(),
        };
        write!(f, "{} v{}.{}", name, self.major_version, self.minor_version)
    }
}
