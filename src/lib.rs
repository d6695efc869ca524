pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod job_cache;
pub mod middleware;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod tmdb;
pub mod upstream;
pub mod validation;

pub use config::Config;
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use server::create_app;
