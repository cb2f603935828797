//! Shared kernel: the JSON-RPC agent protocol, service registry client,
//! circuit breaker, idempotency, retry, and configuration primitives used
//! by every monitoring-pipeline agent process.

pub mod agent_card;
pub mod auth;
pub mod breaker;
pub mod client;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http_server;
pub mod idempotency;
pub mod protocol;
pub mod registry;
pub mod retry;
pub mod skill;

pub use agent_card::{AgentCard, Provider, SkillDescriptor};
pub use auth::ApiKeyAuth;
pub use breaker::{BreakerRegistry, BreakerState, CircuitBreaker};
pub use client::AgentClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AgentRole, BreakerConfig, Config, RetryConfig};
pub use dispatch::{Dispatcher, TaskRecord, TaskSink, TaskStatus};
pub use error::ErrorKind;
pub use http_server::{router, AppState};
pub use idempotency::{canonical_json, content_hash, parameters_hash};
pub use protocol::{Method, RpcError, RpcRequest, RpcResponse};
pub use registry::{heartbeat_loop, Registry, RedisRegistry, ServiceEntry};
pub use retry::{backoff_delay, with_retry};
pub use skill::{Skill, SkillRegistry};
