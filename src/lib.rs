pub mod channel;
pub mod config;
pub mod harness;
pub mod input;
pub mod keys;
pub mod objects;
pub mod runtime;
pub mod sandbox;
pub mod surface;
pub mod time;

pub use objects::{GameObject, ObjectId, ObjectRegistry, ObjectSnapshot};
pub use runtime::{RunState, Runtime, RuntimeContext, RuntimeSnapshot, TickOutcome};
pub use surface::{DrawCommand, NullSurface, RecordingSurface, Surface};
