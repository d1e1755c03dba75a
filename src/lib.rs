// src/lib.rs

// Import the top-level `sentinel` module.
pub mod sentinel;

// Re-exporting key items for easier external access.
pub use sentinel::config::Config;
pub use sentinel::pipeline::Pipeline;
pub use sentinel::store::Store;
