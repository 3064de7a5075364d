pub mod server;

pub use server::{build_app, ProxyServer, ServerState};
