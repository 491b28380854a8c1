pub mod core;
pub mod error;
pub mod memory;
pub mod models;
pub mod providers;
pub mod settings;
