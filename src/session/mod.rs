//! Session lifecycle.
//!
//! A session moves `idle -> processing -> completed | failed`:
//!
//! - `SessionController` - operations used by the service layer
//! - `SessionStore` - bounded registry with oldest-first eviction
//! - `SessionState` - per-session state machine behind its own lock
//! - `FrameSource` - supplier of detection batches (in-memory or channel)
//!
//! Each processing session runs on its own thread and is the only writer of
//! its state. Progress and result queries read concurrently through the
//! session's read-write lock.

mod controller;
mod source;
mod state;
mod store;
mod task;

pub use controller::SessionController;
pub use source::{ChannelFrameSource, FrameSender, FrameSource, FramesDocument, VecFrameSource, VideoMetadata};
pub use state::{Progress, SessionId, SessionState, SessionStatus};
pub use store::{SessionHandle, SessionStore};
