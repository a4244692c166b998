/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;

use crate::ResolveError;
use crate::context::SharedRequestContext;
use crate::handle::{ConnectionHandle, Transport};

pub mod config_service;
pub mod controller;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Controller,
    ConfigService,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Controller => "controller",
            BackendKind::ConfigService => "config-service",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The capability every backend adapter provides to the resolver.
pub(crate) trait NodesBackend {
    fn kind(&self) -> BackendKind;

    /// Open the raw transport. Nothing is allocated for the request yet.
    async fn connect(&self) -> Result<Transport, ResolveError>;

    /// Issue the list nodes query without blocking.
    ///
    /// An adapter either resolves the context before returning, or registers a
    /// dispatch task on the handle which will resolve it later.
    fn issue_query(&self, handle: &mut ConnectionHandle, ctx: &SharedRequestContext);
}
