//! Shared setup for listener integration tests.

use std::sync::Arc;

use eslframe::{HookRegistry, Listener, ListenerConfig, outbound::Outbound};
use eslframe_testing::auth_request;

/// Listener over `registry` whose session is already established.
pub fn established(registry: HookRegistry) -> (Listener, Outbound) {
    let (mut listener, outbound) = Listener::new(Arc::new(registry), ListenerConfig::default());
    listener
        .receive_data(&auth_request())
        .expect("session establishment");
    (listener, outbound)
}
