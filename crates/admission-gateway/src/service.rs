//! Admission gateway service - main entry point.
//!
//! Owns the prepared-transaction buffers and the route table, serves them
//! over HTTP and runs the expiry sweepers.

use crate::adapters::buffer::{sweep_task, MultiRequestBuffer, RequestBuffer, Sweepable};
use crate::domain::config::{Eviction, GatewayConfig};
use crate::domain::error::GatewayError;
use crate::handlers::ContractState;
use crate::middleware::{create_cors_layer, TimeoutLayer, TracingLayer};
use crate::ports::{Clock, Collaborators, SystemClock};
use crate::router::{RouteHandlers, RouteTable};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Admission gateway service state
pub struct GatewayService {
    config: GatewayConfig,
    collaborators: Collaborators,
    contracts: Arc<ContractState>,
    routes: Arc<RouteTable>,
    shutdown: Arc<Notify>,
}

impl GatewayService {
    /// Create a new gateway service on the system clock
    pub fn new(config: GatewayConfig, collaborators: Collaborators) -> Result<Self, GatewayError> {
        Self::with_clock(config, collaborators, Arc::new(SystemClock))
    }

    /// Create a new gateway service whose buffers expire on `clock`
    pub fn with_clock(
        config: GatewayConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let requests = Arc::new(RequestBuffer::from_config(&config.buffer, Arc::clone(&clock)));
        let multi_requests = Arc::new(MultiRequestBuffer::from_config(&config.buffer, clock));
        let contracts = Arc::new(ContractState::new(
            Arc::clone(&collaborators.engine),
            requests,
            multi_requests,
        ));

        let handlers = RouteHandlers::new(&collaborators, Arc::clone(&contracts));
        let routes = RouteTable::build(&handlers, config.node.is_supporting_vde()).map_err(|e| {
            error!(error = %e, "Route table rejected");
            e
        })?;

        Ok(Self {
            config,
            collaborators,
            contracts,
            routes: Arc::new(routes),
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Contract state, including both request buffers
    pub fn contracts(&self) -> &Arc<ContractState> {
        &self.contracts
    }

    /// Build the HTTP router with all global layers applied
    pub fn router(&self) -> Router {
        self.routes
            .router(
                &self.config.http.api_path,
                &self.config.cors,
                Arc::clone(&self.collaborators.store),
            )
            .layer(DefaultBodyLimit::max(self.config.http.max_body_size))
            .layer(TimeoutLayer::new(self.config.timeouts.request))
            .layer(TracingLayer::new())
            .layer(create_cors_layer(&self.config.cors))
    }

    /// Serve until `shutdown()` is called
    pub async fn start(&self) -> Result<(), GatewayError> {
        let addr = self.config.http_addr();
        info!(
            addr = %addr,
            api_path = %self.config.http.api_path,
            routes = self.routes.len(),
            "Starting admission gateway"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;

        let sweepers = self.start_sweep_tasks();
        let shutdown = Arc::clone(&self.shutdown);
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await;

        for sweeper in sweepers {
            sweeper.abort();
        }

        match result {
            Ok(()) => {
                info!("Admission gateway stopped");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "HTTP server error");
                Err(GatewayError::Internal(e.to_string()))
            }
        }
    }

    /// Trigger graceful shutdown. Takes effect even if `start` has not
    /// reached its wait yet.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.notify_one();
    }

    fn start_sweep_tasks(&self) -> Vec<JoinHandle<()>> {
        if self.config.buffer.eviction != Eviction::Sweep {
            return Vec::new();
        }

        let interval = self.config.buffer.sweep_interval;
        let buffers: [Arc<dyn Sweepable>; 2] = [
            Arc::clone(self.contracts.requests()) as Arc<dyn Sweepable>,
            Arc::clone(self.contracts.multi_requests()) as Arc<dyn Sweepable>,
        ];
        buffers
            .into_iter()
            .map(|buffer| tokio::spawn(sweep_task(buffer, interval)))
            .collect()
    }
}

