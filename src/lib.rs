pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod test_utils;
pub mod users;

pub use config::Config;
pub use server::Server;
