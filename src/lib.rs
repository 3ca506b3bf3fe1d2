pub mod archive;
pub mod auth;
pub mod commands;
pub mod company;
pub mod geo;
pub mod http;
pub mod ranking;
pub mod runtime;
pub mod session;
pub mod statements;
