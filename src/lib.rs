//! fallback-proxy: streaming mediator between a knowledge-base backend and a
//! chat-completion backend
//!
//! Features:
//! - Byte-faithful passthrough of the primary backend's event stream
//! - Mid-stream cutover to an OpenAI-compatible backend on a "no answer" signal
//! - Secondary deltas re-framed as cumulative-answer events
//! - Exactly one terminal frame per response
//! - Per-request stream summaries

pub mod api;
pub mod backends;
pub mod config;
pub mod mediator;
pub mod policy;
pub mod proxy;
pub mod stats;
pub mod wire;

pub use config::AppConfig;
pub use mediator::{Mediator, MediatorSettings};
pub use policy::{FallbackPolicy, FallbackReason};
pub use proxy::{build_router, run_server, ProxyState};
