// Library exports for Inkpost
// The binary and the integration tests both build the router from here.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
