//! Outer adapters that drive the engine.

pub mod jsonl;
