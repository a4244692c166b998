/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{BackendKind, NodesBackend};
use crate::context::SharedRequestContext;
use crate::handle::{ConnectionHandle, Transport};
use crate::{ControllerIpcConfig, ResolveError};

mod dispatch;
use dispatch::NodesDispatcher;

mod message;
mod recv_buf;

pub trait IpcStream: AsyncRead + AsyncWrite + Unpin {}

impl<T: AsyncRead + AsyncWrite + Unpin> IpcStream for T {}

pub type BoxIpcStream = Box<dyn IpcStream>;

/// Opens the interprocess channel to the controller daemon.
///
/// `connect` runs inside the event loop under the deadline of the resolve
/// call, it must not block the thread.
#[async_trait(?Send)]
pub trait IpcConnector: Send + Sync {
    async fn connect(&self) -> io::Result<BoxIpcStream>;
}

#[cfg(unix)]
pub struct UnixSocketConnector {
    path: PathBuf,
}

#[cfg(unix)]
impl UnixSocketConnector {
    pub fn new(path: PathBuf) -> Self {
        UnixSocketConnector { path }
    }
}

#[cfg(unix)]
#[async_trait(?Send)]
impl IpcConnector for UnixSocketConnector {
    async fn connect(&self) -> io::Result<BoxIpcStream> {
        // a full listen backlog is reported as EAGAIN rather than waited on
        let stream = tokio::net::UnixStream::connect(&self.path).await?;
        Ok(Box::new(stream))
    }
}

pub(crate) struct ControllerIpcBackend {
    connector: Arc<dyn IpcConnector>,
    max_message_size: usize,
}

impl ControllerIpcBackend {
    pub(crate) fn new(connector: Arc<dyn IpcConnector>, config: &ControllerIpcConfig) -> Self {
        ControllerIpcBackend {
            connector,
            max_message_size: config.max_message_size(),
        }
    }
}

impl NodesBackend for ControllerIpcBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Controller
    }

    async fn connect(&self) -> Result<Transport, ResolveError> {
        self.connector
            .connect()
            .await
            .map(Transport::Ipc)
            .map_err(|e| ResolveError::connect_failed(BackendKind::Controller, e))
    }

    fn issue_query(&self, handle: &mut ConnectionHandle, ctx: &SharedRequestContext) {
        let Some(stream) = handle.take_ipc_stream() else {
            ctx.fail(ResolveError::ChannelClosed);
            return;
        };
        let request = message::encode_request(ctx.reference());
        let dispatcher = NodesDispatcher::new(ctx.clone(), self.max_message_size);
        let task = tokio::task::spawn_local(dispatcher.run(stream, request));
        let token = handle.register(task.abort_handle());
        debug!(
            "request {} issued on controller handle {} as {token}",
            ctx.reference(),
            handle.id()
        );
    }
}
