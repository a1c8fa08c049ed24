//! Shared LLM access layer: provider clients, env-driven model profiles,
//! health probes and a crate-scoped log layer.

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::{AiLlmError, Result};
pub use health_service::{HealthService, HealthStatus};
pub use service_profiles::LlmServiceProfiles;
