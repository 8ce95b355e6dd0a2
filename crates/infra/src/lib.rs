//! Infrastructure: in-memory storage engine, composition root and telemetry.

pub mod engine;
pub mod memory;
pub mod telemetry;

pub use engine::Engine;
pub use memory::MemoryStore;
