//! Toolwright: a self-extending agent engine.
//!
//! The engine accomplishes tasks with callable tools, and when no
//! registered tool fits it writes one: an LLM drafts a Lua function,
//! a static validator vets it, a bounded repair loop fixes what the
//! validator flags, and the result runs in a locked-down interpreter
//! before being persisted for future sessions.
//!
//! # Architecture
//!
//! ```text
//! task ──▶ Agent loop ──▶ TwoPhaseSelector ──▶ ToolRegistry ──▶ dispatch
//!              │                │  (no match)
//!              │                ▼
//!              │          ToolPipeline (generate ▸ validate ▸ repair)
//!              │                │
//!              │                ▼
//!              │          LuaSandbox ──▶ ToolStore + SimilarityIndex
//!              ▼
//!           answer
//! ```
//!
//! Generated tools stay untrusted (shorter budget) for the session that
//! created them; on the next session they load from storage as trusted.

pub mod agent;
pub mod app;
pub mod config;
pub mod create;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod llm;
pub mod sandbox;
pub mod select;
pub mod storage;
#[cfg(test)]
pub mod testing;
pub mod tools;
pub mod validate;

pub use config::Config;
pub use error::{Error, Result};
