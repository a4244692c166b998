/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use log::{debug, trace, warn};
use tokio::io::AsyncWriteExt;

use super::BoxIpcStream;
use super::message::NodesFragment;
use super::recv_buf::{MessageRecvBuf, RecvMessageError};
use crate::backend::BackendKind;
use crate::context::SharedRequestContext;
use crate::{BackendError, ResolveError};

/// The read side callback of one controller request.
///
/// It only ever changes the request context, the resolver notices the change
/// and decides what to do with the connection.
pub(super) struct NodesDispatcher {
    ctx: SharedRequestContext,
    recv_buf: MessageRecvBuf,
}

impl NodesDispatcher {
    pub(super) fn new(ctx: SharedRequestContext, max_message_size: usize) -> Self {
        NodesDispatcher {
            ctx,
            recv_buf: MessageRecvBuf::new(max_message_size),
        }
    }

    pub(super) async fn run(mut self, mut stream: BoxIpcStream, request: Vec<u8>) {
        if let Err(e) = stream.write_all(&request).await {
            warn!(
                "failed to send request {} to controller: {e}",
                self.ctx.reference()
            );
            self.ctx.fail(ResolveError::ChannelClosed);
            return;
        }
        if let Err(e) = stream.flush().await {
            warn!(
                "failed to flush request {} to controller: {e}",
                self.ctx.reference()
            );
            self.ctx.fail(ResolveError::ChannelClosed);
            return;
        }

        while self.ctx.is_pending() {
            let msg = match self.recv_buf.read_message(&mut stream).await {
                Ok(msg) => msg,
                Err(RecvMessageError::IoClosed) => {
                    debug!("controller closed the channel");
                    self.ctx.fail(ResolveError::ChannelClosed);
                    return;
                }
                Err(RecvMessageError::IoError(e)) => {
                    debug!("controller channel read failed: {e}");
                    self.ctx.fail(ResolveError::ChannelClosed);
                    return;
                }
                Err(e @ RecvMessageError::MessageTooLarge(_)) => {
                    self.ctx.fail(ResolveError::parse(e));
                    return;
                }
            };
            let parsed = NodesFragment::parse(msg, self.ctx.reference());
            self.recv_buf.consume_message();
            self.handle_fragment(parsed);
        }
        if !self.recv_buf.is_empty() {
            trace!("discard controller data buffered after the final response");
        }
    }

    fn handle_fragment(&self, parsed: Result<Option<NodesFragment>, ResolveError>) {
        let fragment = match parsed {
            Ok(Some(f)) => f,
            Ok(None) => {
                debug!(
                    "ignore controller message not for request {}",
                    self.ctx.reference()
                );
                return;
            }
            Err(e) => {
                warn!("malformed controller response: {e}");
                self.ctx.fail(e);
                return;
            }
        };
        if fragment.rc != 0 {
            self.ctx
                .fail(BackendError::new(BackendKind::Controller, fragment.rc).into());
            return;
        }
        trace!(
            "controller fragment with {} nodes, final: {}",
            fragment.nodes.len(),
            fragment.is_final
        );
        self.ctx.append(fragment.nodes);
        if fragment.is_final {
            self.ctx.complete();
        }
    }
}
