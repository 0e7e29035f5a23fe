//! Core gatectl library (credentials, gateway API client, session lifecycle).

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod interrupt;
pub mod keepalive;
pub mod logging;
pub mod routes;
pub mod session;
