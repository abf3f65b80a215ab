pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod sink;
pub mod state;
