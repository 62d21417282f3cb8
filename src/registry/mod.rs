//! Process-local registries for chat sessions and background ingestion tasks.
//!
//! Both registries are injectable service objects: each owns a single coarse
//! mutex around a plain map, handles are cheaply cloneable, and state is lost
//! on restart by design. No operation ever holds both locks at once.

mod session;
mod task;

pub use session::{ChatSession, SessionRegistry, SessionStats};
pub use task::{TaskRegistry, TaskSnapshot, TaskStatus};
