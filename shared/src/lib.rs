//! Protocol-level types for the SimSpark monitor protocol.
//!
//! Nothing here owns a thread, a socket or a file: the s-expression parser,
//! scene headers, protocol vocabulary, outbound control commands and the
//! length-prefixed wire codec.

pub mod command;
pub mod framing;
pub mod protocol;
pub mod scene;
pub mod sexp;

pub use command::{ControlCommand, Vec3};
pub use framing::{FrameError, read_frame, write_frame};
pub use protocol::{FoulType, Team};
pub use scene::{SceneHeader, SceneHeaderError, SceneKind};
pub use sexp::{Expression, SExpError, parse};
