pub mod application;
pub mod cache;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod package;
pub mod runtime;
pub mod source;
