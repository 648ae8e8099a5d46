//! Cookie manager with one serialized worker per platform cookie engine,
//! pluggable durable storage and a JSON bridge for a scripting runtime.

pub mod engine;

pub use engine::*;
