//! Test support for `eslframe`.
//!
//! Frame builders produce the byte sequences a peer would send, the outbound
//! helpers turn what a [`Listener`](eslframe::Listener) wrote into strings,
//! and [`spawn_connection`] runs a [`Connection`](eslframe::Connection) over
//! an in-memory duplex stream.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use eslframe::{HookRegistry, Listener, ListenerConfig};
//! use eslframe_testing::{auth_request, drain_text, event_frame};
//!
//! let registry = HookRegistry::new().on("custom", |session| async move {
//!     session.send_data("seen")?;
//!     Ok(())
//! });
//! let (mut listener, mut outbound) = Listener::new(Arc::new(registry), ListenerConfig::default());
//! listener.receive_data(&auth_request()).unwrap();
//! listener.receive_data(&event_frame("CUSTOM", &[])).unwrap();
//! assert_eq!(drain_text(&mut outbound), vec!["seen"]);
//! ```

pub mod driver;
pub mod frames;
pub mod logging;
pub mod macros;
pub mod outbound;
pub mod recorder;

pub use driver::{DriverHandle, spawn_connection};
pub use frames::{
    api_response,
    auth_request,
    command_reply,
    disconnect_notice,
    event_frame,
    json_event_frame,
    plain_event_frame,
};
pub use logging::{LoggerHandle, logger};
pub use outbound::{drain_text, recv_text};
pub use recorder::{counter_value, with_recorder};
