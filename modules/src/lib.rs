//! Ferricd Modules
//!
//! Command handlers for the IRC daemon, registered into the core's command
//! table at startup.

pub mod channel;
pub mod conn;
pub mod info;
pub mod messaging;
pub mod oper;

use ferricd_core::Server;

/// Register every command module.
pub fn register_all(server: &mut Server) {
    conn::register(server);
    oper::register(server);
    channel::register(server);
    messaging::register(server);
    info::register(server);
}
