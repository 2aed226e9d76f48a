pub mod cli;
pub mod config;
pub mod http;
pub mod logging;
pub mod resolutions;
pub mod routes;
pub mod server;
