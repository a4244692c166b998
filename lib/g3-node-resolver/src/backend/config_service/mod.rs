/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use super::{BackendKind, NodesBackend};
use crate::context::SharedRequestContext;
use crate::handle::{ConnectionHandle, Transport};
use crate::{BackendError, NodeRecord, ResolveError};

mod nodelist;
pub use nodelist::NodelistFileService;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigServiceError {
    /// A native service error code.
    #[error("service error code {0}")]
    Code(i32),
    #[error("malformed data: {0}")]
    Malformed(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// The cluster configuration service, as a connect/query/disconnect triad.
///
/// Calls are synchronous and never touch the event loop.
pub trait ConfigService: Send + Sync {
    fn connect(&self) -> Result<Box<dyn ConfigServiceSession>, ConfigServiceError>;
}

pub trait ConfigServiceSession {
    fn list_members(&mut self) -> Result<Vec<NodeRecord>, ConfigServiceError>;

    fn disconnect(&mut self) {}
}

pub(crate) struct ConfigServiceBackend {
    service: Arc<dyn ConfigService>,
}

impl ConfigServiceBackend {
    pub(crate) fn new(service: Arc<dyn ConfigService>) -> Self {
        ConfigServiceBackend { service }
    }
}

impl NodesBackend for ConfigServiceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ConfigService
    }

    async fn connect(&self) -> Result<Transport, ResolveError> {
        self.service
            .connect()
            .map(Transport::ConfigService)
            .map_err(|e| ResolveError::connect_failed(BackendKind::ConfigService, e))
    }

    fn issue_query(&self, handle: &mut ConnectionHandle, ctx: &SharedRequestContext) {
        let Some(session) = handle.config_session_mut() else {
            ctx.fail(ResolveError::ChannelClosed);
            return;
        };
        match session.list_members() {
            Ok(nodes) if nodes.is_empty() => {
                warn!("config service returned an empty member list");
                ctx.fail(ResolveError::ParseError("empty member list".to_string()));
            }
            Ok(nodes) => {
                debug!("config service returned {} members", nodes.len());
                ctx.append(nodes);
                ctx.complete();
            }
            Err(ConfigServiceError::Code(code)) => {
                ctx.fail(BackendError::new(BackendKind::ConfigService, code).into());
            }
            Err(ConfigServiceError::Malformed(s)) => {
                ctx.fail(ResolveError::ParseError(s));
            }
            Err(ConfigServiceError::Unavailable(_)) => {
                ctx.fail(ResolveError::ChannelClosed);
            }
        }
    }
}
