/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

const MESSAGE_DELIMITER: u8 = b'\0';
const READ_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Error)]
pub(crate) enum RecvMessageError {
    #[error("io error: {0:?}")]
    IoError(#[from] io::Error),
    #[error("io closed")]
    IoClosed,
    #[error("message larger than {0} bytes")]
    MessageTooLarge(usize),
}

/// Receive buffer for NUL terminated messages.
///
/// Bytes after the current message are kept for the next read, a message may
/// span any number of reads.
pub(crate) struct MessageRecvBuf {
    max_size: usize,
    length: usize,
    msg_start: usize,
    msg_end: usize,
    buf: Vec<u8>,
}

impl MessageRecvBuf {
    pub(crate) fn new(max_size: usize) -> Self {
        MessageRecvBuf {
            max_size,
            length: 0,
            msg_start: 0,
            msg_end: 0,
            buf: Vec::new(),
        }
    }

    /// Read until a complete message is buffered and return it without the
    /// trailing delimiter.
    pub(crate) async fn read_message<R>(&mut self, reader: &mut R) -> Result<&[u8], RecvMessageError>
    where
        R: AsyncRead + Unpin,
    {
        self.fill_message(reader).await?;
        Ok(&self.buf[self.msg_start..self.msg_end - 1])
    }

    async fn fill_message<R>(&mut self, reader: &mut R) -> Result<(), RecvMessageError>
    where
        R: AsyncRead + Unpin,
    {
        if self.get_message().is_some() {
            return Ok(());
        }
        loop {
            let pending = self.length - self.msg_start;
            if pending > self.max_size {
                return Err(RecvMessageError::MessageTooLarge(self.max_size));
            }
            let to_read = READ_CHUNK_SIZE.min(self.max_size + 1 - pending);
            if self.buf.len() < self.length + to_read {
                self.buf.resize(self.length + to_read, 0);
            }
            let nr = reader
                .read(&mut self.buf[self.length..self.length + to_read])
                .await?;
            if nr == 0 {
                return Err(RecvMessageError::IoClosed);
            }
            self.length += nr;
            if self.get_message().is_some() {
                return Ok(());
            }
        }
    }

    fn get_message(&mut self) -> Option<()> {
        if self.msg_end > self.msg_start {
            return Some(());
        }
        if self.msg_start >= self.length {
            return None;
        }
        let p = memchr::memchr(MESSAGE_DELIMITER, &self.buf[self.msg_start..self.length])?;
        let end = self.msg_start + p + 1;
        if end - self.msg_start - 1 > self.max_size {
            return None;
        }
        self.msg_end = end;
        Some(())
    }

    pub(crate) fn consume_message(&mut self) {
        self.msg_start = self.msg_end;
        if self.get_message().is_some() {
            return;
        }
        if self.msg_start < self.length {
            self.buf.copy_within(self.msg_start..self.length, 0);
            self.length -= self.msg_start;
        } else {
            self.length = 0;
        }
        self.msg_start = 0;
        self.msg_end = 0;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.length == 0
    }
}
