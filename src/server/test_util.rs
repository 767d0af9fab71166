//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use rstest::fixture;

use super::{NoEvents, ServerHandle, dispatch::ServerCore};

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

#[fixture]
/// A dispatcher with no event hooks over an empty registry.
pub fn dispatcher() -> Arc<ServerCore> {
    Arc::new(ServerCore::new(ServerHandle::default(), Arc::new(NoEvents)))
}
