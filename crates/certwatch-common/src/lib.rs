//! Domain types shared by every certwatch crate.

pub mod types;
