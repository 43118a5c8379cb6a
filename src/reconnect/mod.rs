//! Connection-resilience engine.
//!
//! The engine replaces a broken real-time connection with a fresh one, bounded
//! by a retry budget, while keeping a single status indicator current. It is
//! split into a pure state machine ([`ReconnectMachine`]) that maps lifecycle
//! events to effects, an [`Indicator`] that publishes the latest status
//! (last-write-wins), and a [`Supervisor`] that drives real socket attempts
//! and retry timers. The browser-side rendition served by the gateway mirrors
//! the same transition table.

mod indicator;
mod machine;
mod supervisor;

pub use indicator::{Indicator, StatusUpdate};
pub use machine::{ConnectionState, Effect, ReconnectMachine, RetryPolicy, SocketEvent};
pub use supervisor::{NativeSocketFactory, SocketFactory, SocketReporter, Supervisor, SupervisorHandle};
