/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::backend::config_service::{ConfigService, ConfigServiceBackend, NodelistFileService};
use crate::backend::controller::{ControllerIpcBackend, IpcConnector};
use crate::backend::{BackendKind, NodesBackend};
use crate::context::SharedRequestContext;
use crate::handle::ConnectionHandle;
use crate::{
    BackendChoice, ControllerIpcConfig, EventLoop, NodeRecord, ResolveError, ResolverConfig,
    ResolverStats,
};

pub struct ResolverBuilder {
    config: ResolverConfig,
    config_service: Option<Arc<dyn ConfigService>>,
    ipc_connector: Option<Arc<dyn IpcConnector>>,
    event_loop: Option<&'static EventLoop>,
}

impl ResolverBuilder {
    pub fn new(config: ResolverConfig) -> Self {
        ResolverBuilder {
            config,
            config_service: None,
            ipc_connector: None,
            event_loop: None,
        }
    }

    /// Use a custom configuration service instead of the nodelist file.
    pub fn config_service(mut self, service: Arc<dyn ConfigService>) -> Self {
        self.config_service = Some(service);
        self
    }

    /// Use a custom channel to the controller instead of its unix socket.
    pub fn ipc_connector(mut self, connector: Arc<dyn IpcConnector>) -> Self {
        self.ipc_connector = Some(connector);
        self
    }

    /// Drive a private event loop instead of the process wide one.
    pub fn event_loop(mut self, event_loop: &'static EventLoop) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    pub fn build(self) -> io::Result<Resolver> {
        let event_loop = match self.event_loop {
            Some(l) => l,
            None => EventLoop::global()?,
        };

        let controller_config = self.config.controller.clone();
        let controller = match (self.ipc_connector, controller_config) {
            (Some(connector), config) => Some(ControllerIpcBackend::new(
                connector,
                &config.unwrap_or_default(),
            )),
            #[cfg(unix)]
            (None, Some(config)) => {
                let connector = crate::backend::controller::UnixSocketConnector::new(
                    config.socket_path.clone(),
                );
                Some(ControllerIpcBackend::new(Arc::new(connector), &config))
            }
            _ => None,
        };

        let config_service = match (self.config_service, &self.config.config_service) {
            (Some(service), _) => Some(ConfigServiceBackend::new(service)),
            (None, Some(config)) => Some(ConfigServiceBackend::new(Arc::new(
                NodelistFileService::new(config.path.clone()),
            ))),
            (None, None) => None,
        };

        let reference_prefix = self
            .config
            .controller
            .as_ref()
            .map(|c| c.reference_prefix.clone())
            .unwrap_or_else(|| ControllerIpcConfig::default().reference_prefix);

        Ok(Resolver {
            config: self.config,
            event_loop,
            controller,
            config_service,
            reference_prefix,
            sequence: AtomicU64::new(1),
            stats: Arc::new(ResolverStats::default()),
        })
    }
}

/// Synchronous node list resolver over the cluster backends.
pub struct Resolver {
    config: ResolverConfig,
    event_loop: &'static EventLoop,
    controller: Option<ControllerIpcBackend>,
    config_service: Option<ConfigServiceBackend>,
    reference_prefix: String,
    sequence: AtomicU64,
    stats: Arc<ResolverStats>,
}

impl Resolver {
    #[inline]
    pub fn get_config(&self) -> &ResolverConfig {
        &self.config
    }

    #[inline]
    pub fn get_stats(&self) -> Arc<ResolverStats> {
        self.stats.clone()
    }

    /// Resolve with the configured backend choice and timeout.
    pub fn resolve(&self) -> Result<Vec<NodeRecord>, ResolveError> {
        self.resolve_nodes(self.config.backend, self.config.timeout)
    }

    /// Get the current cluster nodes, blocking the calling thread.
    ///
    /// The timeout covers the whole call, including the connect and a fallback
    /// to the configuration service. Calling it from within an async runtime
    /// fails with `InAsyncContext`.
    pub fn resolve_nodes(
        &self,
        choice: BackendChoice,
        timeout: Duration,
    ) -> Result<Vec<NodeRecord>, ResolveError> {
        self.stats.add_query_total();
        let r = self
            .event_loop
            .drive(self.resolve_in_loop(choice, timeout))
            .and_then(|r| r);
        match &r {
            Ok(nodes) => debug!("resolved {} nodes with {choice}", nodes.len()),
            Err(e) => {
                warn!(
                    "failed to resolve nodes with {choice}: {e} (type: {}, subtype: {})",
                    e.get_type(),
                    e.get_subtype()
                );
                self.stats.add_error(e);
            }
        }
        r
    }

    async fn resolve_in_loop(
        &self,
        choice: BackendChoice,
        timeout: Duration,
    ) -> Result<Vec<NodeRecord>, ResolveError> {
        let deadline = Instant::now().checked_add(timeout);
        match choice {
            BackendChoice::Controller => {
                let Some(controller) = &self.controller else {
                    return Err(ResolveError::NoBackend(BackendKind::Controller));
                };
                self.resolve_with(controller, deadline).await
            }
            BackendChoice::ConfigService => {
                let Some(config_service) = &self.config_service else {
                    return Err(ResolveError::NoBackend(BackendKind::ConfigService));
                };
                self.resolve_with(config_service, deadline).await
            }
            BackendChoice::PreferController => {
                let r = match &self.controller {
                    Some(controller) => self.resolve_with(controller, deadline).await,
                    None => Err(ResolveError::NoBackend(BackendKind::Controller)),
                };
                match (r, &self.config_service) {
                    (
                        Err(e @ (ResolveError::ConnectFailed { .. } | ResolveError::NoBackend(_))),
                        Some(config_service),
                    ) => {
                        warn!("controller unavailable ({e}), fall back to config service");
                        self.stats.add_query_fallback();
                        self.resolve_with(config_service, deadline).await
                    }
                    (r, _) => r,
                }
            }
        }
    }

    fn next_reference(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{seq}", self.reference_prefix, std::process::id())
    }

    async fn resolve_with<B: NodesBackend>(
        &self,
        backend: &B,
        deadline: Option<Instant>,
    ) -> Result<Vec<NodeRecord>, ResolveError> {
        match backend.kind() {
            BackendKind::Controller => self.stats.add_query_controller(),
            BackendKind::ConfigService => self.stats.add_query_config_service(),
        }

        let transport = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, backend.connect()).await {
                Ok(r) => r?,
                Err(_) => {
                    debug!("{} connect timed out", backend.kind());
                    return Err(ResolveError::Timeout);
                }
            },
            None => backend.connect().await?,
        };
        let mut handle = ConnectionHandle::open(backend.kind(), transport, self.stats.clone());
        let ctx = SharedRequestContext::new(self.next_reference(), self.stats.clone());
        backend.issue_query(&mut handle, &ctx);

        // the adapter may have resolved the context already
        while ctx.is_pending() {
            tokio::select! {
                biased;

                _ = ctx.changed() => {}
                _ = wait_deadline(deadline) => {
                    if ctx.fail(ResolveError::Timeout) {
                        debug!("request {} timed out", ctx.reference());
                    }
                }
            }
        }

        let r = ctx.take_result();
        handle.close();
        r
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
