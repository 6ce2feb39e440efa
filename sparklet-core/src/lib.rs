//! # Sparklet Core
//!
//! Runtime for Sparklet mini-apps: JSON definitions carrying initial state,
//! helper and action bodies written in a small sandboxed script language,
//! and a declarative view tree.
//!
//! No terminal, thread or filesystem dependencies; hosts supply a timer
//! backend, a data store and (optionally) a generator.
//!
//! ## Example
//!
//! ```ignore
//! use sparklet_core::{EngineConfig, SparkletSession};
//!
//! let mut session = SparkletSession::headless(json, EngineConfig::default());
//! session.execute_action("onCellPress", serde_json::json!({"index": 0}).into());
//! session.advance(1_000);
//! let view = session.render();
//! ```

pub mod config;
pub mod definition;
pub mod engine;
pub mod interpolate;
pub mod parser;
pub mod render;
pub mod runtime;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use config::EngineConfig;
pub use definition::{CompiledSparklet, DefinitionError, SparkletDefinition};
pub use engine::{DispatchOutcome, SparkletSession, TimerBackend, TimerId, VirtualTimers};
pub use interpolate::Interpolator;
pub use render::{NativeStyle, PressParams, PressTarget, RenderedNode};
pub use runtime::Value;
pub use service::{
    GeneratedSparklet, MemoryRepository, PublishStatus, ServiceError, SparkletGenerator,
    SparkletRecord, SparkletRepository, SparkletService,
};
pub use store::{MemoryDataStore, SparkDataStore, StoreError};
