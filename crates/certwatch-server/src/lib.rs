pub mod app;
pub mod cert;
pub mod config;
pub mod sync;
