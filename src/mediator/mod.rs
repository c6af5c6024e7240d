//! Per-request mediation between the primary and secondary backends

mod adapter;
mod context;
mod orchestrator;

pub use adapter::SecondaryAdapter;
pub use context::StreamContext;
pub use orchestrator::Orchestrator;

use std::sync::Arc;
use std::time::Duration;

use crate::api::InboundRequest;
use crate::backends::{build_http_client, HttpPrimary, OpenAiSecondary, PrimaryBackend, SecondaryBackend};
use crate::config::{AppConfig, PrimaryErrorPolicy, StatsConfig};
use crate::policy::FallbackPolicy;

/// Read-only settings shared by every request
#[derive(Debug, Clone)]
pub struct MediatorSettings {
    /// Bound on the primary connection and on each primary read
    pub primary_timeout: Duration,
    pub on_primary_error: PrimaryErrorPolicy,
    /// System message prepended to the conversation sent to the secondary backend
    pub persona: Option<String>,
    pub stats: StatsConfig,
}

impl MediatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            primary_timeout: Duration::from_secs(config.primary.timeout_seconds),
            on_primary_error: config.primary.on_primary_error,
            persona: config
                .secondary
                .persona
                .clone()
                .filter(|p| !p.trim().is_empty()),
            stats: config.stats.clone(),
        }
    }
}

/// Everything a request needs, built once at startup
pub struct Mediator {
    primary: Arc<dyn PrimaryBackend>,
    secondary: Arc<dyn SecondaryBackend>,
    policy: FallbackPolicy,
    settings: MediatorSettings,
}

impl Mediator {
    pub fn new(
        primary: Arc<dyn PrimaryBackend>,
        secondary: Arc<dyn SecondaryBackend>,
        policy: FallbackPolicy,
        settings: MediatorSettings,
    ) -> Self {
        Self {
            primary,
            secondary,
            policy,
            settings,
        }
    }

    /// Build HTTP backends from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let primary_client = build_http_client(
            Duration::from_secs(config.primary.timeout_seconds),
            config.primary.tls.as_ref(),
        )?;
        let secondary_client = build_http_client(
            Duration::from_secs(config.secondary.connect_timeout_seconds),
            config.secondary.tls.as_ref(),
        )?;

        let primary = HttpPrimary::new(primary_client, &config.primary);
        let secondary = OpenAiSecondary::new(secondary_client, &config.secondary);
        tracing::info!("Primary backend: {}", primary.url());
        tracing::info!(
            "Secondary backend: {} (model {})",
            secondary.url(),
            secondary.model()
        );

        Ok(Self::new(
            Arc::new(primary),
            Arc::new(secondary),
            FallbackPolicy::from_config(&config.fallback),
            MediatorSettings::from_config(config),
        ))
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Start mediating one client request
    pub fn mediate(self: &Arc<Self>, request: InboundRequest) -> Orchestrator {
        Orchestrator::new(Arc::clone(self), request)
    }
}
