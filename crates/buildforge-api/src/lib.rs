//! The control surface (C5): a JSON-RPC 2.0 endpoint exposing `build.create`,
//! `build.status`, `build.logs`, `build.cancel`, and `build.history`
//! .

pub mod error;
pub mod methods;
pub mod routes;
pub mod rpc;
pub mod state;

pub use state::AppState;
