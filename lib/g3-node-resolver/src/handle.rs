/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use tokio::task::AbortHandle;

use crate::backend::BackendKind;
use crate::backend::config_service::ConfigServiceSession;
use crate::backend::controller::BoxIpcStream;
use crate::stats::ResolverStats;

static HANDLE_ID: AtomicU64 = AtomicU64::new(1);
static REGISTRATION_TOKEN: AtomicU64 = AtomicU64::new(1);

/// The raw resource behind a connection handle.
pub(crate) enum Transport {
    ConfigService(Box<dyn ConfigServiceSession>),
    /// The stream moves into the dispatch task once it gets registered.
    Ipc(BoxIpcStream),
}

struct Registration {
    token: u64,
    abort: AbortHandle,
}

/// One open channel to a backend, owned by a single resolve call.
pub(crate) struct ConnectionHandle {
    id: u64,
    backend: BackendKind,
    transport: Option<Transport>,
    registration: Option<Registration>,
    stats: Arc<ResolverStats>,
    closed: bool,
}

impl ConnectionHandle {
    pub(crate) fn open(
        backend: BackendKind,
        transport: Transport,
        stats: Arc<ResolverStats>,
    ) -> Self {
        let id = HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        stats.add_handle_opened();
        debug!("{backend} connection handle {id} opened");
        ConnectionHandle {
            id,
            backend,
            transport: Some(transport),
            registration: None,
            stats,
            closed: false,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn config_session_mut(&mut self) -> Option<&mut dyn ConfigServiceSession> {
        match self.transport.as_mut() {
            Some(Transport::ConfigService(session)) => Some(session.as_mut()),
            _ => None,
        }
    }

    pub(crate) fn take_ipc_stream(&mut self) -> Option<BoxIpcStream> {
        match self.transport.take() {
            Some(Transport::Ipc(stream)) => Some(stream),
            other => {
                self.transport = other;
                None
            }
        }
    }

    /// Attach the dispatch task to this handle.
    ///
    /// A handle carries at most one registration, a previous one is dropped.
    pub(crate) fn register(&mut self, abort: AbortHandle) -> u64 {
        self.unregister();
        let token = REGISTRATION_TOKEN.fetch_add(1, Ordering::Relaxed);
        self.stats.add_registration_added();
        debug!(
            "{} connection handle {} registered as {token}",
            self.backend, self.id
        );
        self.registration = Some(Registration { token, abort });
        token
    }

    pub(crate) fn unregister(&mut self) {
        if let Some(r) = self.registration.take() {
            r.abort.abort();
            self.stats.add_registration_removed();
            debug!(
                "{} connection handle {} unregistered {}",
                self.backend, self.id, r.token
            );
        }
    }

    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.unregister();
        if let Some(Transport::ConfigService(mut session)) = self.transport.take() {
            session.disconnect();
        }
        self.stats.add_handle_closed();
        debug!("{} connection handle {} closed", self.backend, self.id);
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}
