/*
 * stream.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Buffered line/data-mode framing over a POP3 connection: `readLine`,
//! dot-unstuffed `read_body`, and queued command writes with explicit flush.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::Pop3Error;

/// One read of unread server bytes per refill.
const BLOCK_SIZE: usize = 4096;
/// Extra headroom so a response line spanning several refills (rare, but
/// legal) doesn't force a reallocation of the input buffer.
const PREFIX_SIZE: usize = 128;
/// Reserved, unused tail bytes; kept to mirror the fixed-capacity layout
/// this buffer is modeled on rather than to avoid a bounds check we'd still
/// want in safe Rust.
const PAD_SIZE: usize = 2;
const BUF_CAP: usize = BLOCK_SIZE + PREFIX_SIZE + PAD_SIZE;
const WINDOW_CAP: usize = BLOCK_SIZE + PREFIX_SIZE;

/// Framed stream over `S`. Owns the one input buffer and one output buffer
/// used for the lifetime of a session; upgrading to TLS replaces `S` by
/// reconstructing a `FramedStream` around the new stream once both buffers
/// are empty (see `is_idle`).
pub struct FramedStream<S> {
    inner: S,
    in_buf: Box<[u8]>,
    in_start: usize,
    in_end: usize,
    out_buf: Vec<u8>,
    connected: bool,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            in_buf: vec![0u8; BUF_CAP].into_boxed_slice(),
            in_start: 0,
            in_end: 0,
            out_buf: Vec::with_capacity(BLOCK_SIZE),
            connected: true,
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Arm read/write timeouts; `None` in either slot disables that timeout.
    /// Either one firing is treated the same as any other I/O error: fatal,
    /// since a stalled write may have landed partially and there's no way to
    /// resynchronize with the server's view of the stream.
    pub fn set_timeouts(&mut self, read_timeout: Option<Duration>, write_timeout: Option<Duration>) {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// True once every queued byte has been flushed and no partial response
    /// remains buffered — the only state in which it's safe to replace the
    /// inner stream (an `STLS` upgrade).
    pub fn is_idle(&self) -> bool {
        self.in_start == self.in_end && self.out_buf.is_empty()
    }

    /// Hand back the inner stream. Callers upgrading to TLS must check
    /// `is_idle()` first; there is nowhere to carry buffered bytes across
    /// the swap.
    pub fn into_inner(self) -> S {
        self.inner
    }

    async fn refill(&mut self) -> Result<(), Pop3Error> {
        if self.in_start > 0 {
            self.in_buf.copy_within(self.in_start..self.in_end, 0);
            self.in_end -= self.in_start;
            self.in_start = 0;
        }
        if self.in_end >= WINDOW_CAP {
            self.connected = false;
            return Err(Pop3Error::protocol("response line exceeds buffer capacity"));
        }
        let read = self.inner.read(&mut self.in_buf[self.in_end..WINDOW_CAP]);
        let n = match self.read_timeout {
            Some(d) => match timeout(d, read).await {
                Ok(result) => result?,
                Err(_) => {
                    self.connected = false;
                    return Err(Pop3Error::Timeout);
                }
            },
            None => read.await?,
        };
        if n == 0 {
            self.connected = false;
            return Err(Pop3Error::protocol("server disconnected unexpectedly"));
        }
        self.in_end += n;
        Ok(())
    }

    /// Read one line (a single response status line, or one line of a
    /// multi-line body) with the trailing CRLF/LF stripped.
    pub async fn read_line(&mut self) -> Result<String, Pop3Error> {
        loop {
            if let Some(rel) = self.in_buf[self.in_start..self.in_end].iter().position(|&b| b == b'\n') {
                let line_end = self.in_start + rel;
                let mut raw = &self.in_buf[self.in_start..line_end];
                if raw.last() == Some(&b'\r') {
                    raw = &raw[..raw.len() - 1];
                }
                let line = String::from_utf8_lossy(raw).into_owned();
                self.in_start = line_end + 1;
                return Ok(line);
            }
            self.refill().await?;
        }
    }

    /// Read a multi-line POP3 body (RETR/TOP/CAPA/LIST/UIDL/LANG), delivering
    /// dot-unstuffed chunks to `on_chunk` and reconstructing CRLF line
    /// endings. Terminates on a line containing only `.`, accepting both
    /// `.\r\n` and `.\n`.
    pub async fn read_body_with<F>(&mut self, mut on_chunk: F) -> Result<(), Pop3Error>
    where
        F: FnMut(&[u8]),
    {
        loop {
            let line = self.read_line().await?;
            if line == "." {
                return Ok(());
            }
            let content: &str = if line.starts_with('.') { &line[1..] } else { line.as_str() };
            on_chunk(content.as_bytes());
            on_chunk(b"\r\n");
        }
    }

    /// Read a multi-line body into one buffer.
    pub async fn read_body(&mut self) -> Result<Bytes, Pop3Error> {
        let mut out = BytesMut::new();
        self.read_body_with(|chunk| out.extend_from_slice(chunk)).await?;
        Ok(out.freeze())
    }

    /// Queue a command line for the next `flush`. Flushes first if the
    /// buffered output would otherwise overflow the output block.
    pub async fn queue_command(&mut self, text: &str) -> Result<(), Pop3Error> {
        let needed = text.len() + 2;
        if !self.out_buf.is_empty() && self.out_buf.len() + needed > BLOCK_SIZE {
            self.flush().await?;
        }
        self.out_buf.extend_from_slice(text.as_bytes());
        self.out_buf.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Discard any buffered-but-unflushed output. Used when a write phase is
    /// cancelled partway through queuing commands: the bytes queued so far
    /// never reached the wire, so dropping them (rather than flushing a
    /// mixture of the cancelled and next run's commands) keeps the
    /// connection usable.
    pub fn clear_output(&mut self) {
        self.out_buf.clear();
    }

    pub async fn flush(&mut self) -> Result<(), Pop3Error> {
        if self.out_buf.is_empty() {
            return Ok(());
        }
        let write = async {
            self.inner.write_all(&self.out_buf).await?;
            self.inner.flush().await
        };
        let result = match self.write_timeout {
            Some(d) => match timeout(d, write).await {
                Ok(result) => result,
                Err(_) => {
                    self.connected = false;
                    return Err(Pop3Error::Timeout);
                }
            },
            None => write.await,
        };
        match result {
            Ok(()) => {
                self.out_buf.clear();
                Ok(())
            }
            Err(e) => {
                self.connected = false;
                Err(Pop3Error::from(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn framed_with(bytes: &[u8]) -> (FramedStream<tokio::io::DuplexStream>, tokio::io::DuplexStream) {
        let (client, mut server) = duplex(8192);
        server.write_all(bytes).await.unwrap();
        (FramedStream::new(client), server)
    }

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let (mut fs, _server) = framed_with(b"+OK hello\r\n").await;
        assert_eq!(fs.read_line().await.unwrap(), "+OK hello");
    }

    #[tokio::test]
    async fn read_line_tolerates_bare_lf() {
        let (mut fs, _server) = framed_with(b"+OK hi\n").await;
        assert_eq!(fs.read_line().await.unwrap(), "+OK hi");
    }

    #[tokio::test]
    async fn read_line_across_short_reads() {
        let (client, mut server) = duplex(8192);
        let mut fs = FramedStream::new(client);
        tokio::spawn(async move {
            server.write_all(b"+OK par").await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            server.write_all(b"tial\r\n").await.unwrap();
        });
        assert_eq!(fs.read_line().await.unwrap(), "+OK partial");
    }

    #[tokio::test]
    async fn read_body_unstuffs_and_terminates() {
        let (mut fs, _server) = framed_with(b"Subject: hi\r\n\r\n.stuffed line\r\n..double dot\r\n.\r\n").await;
        let body = fs.read_body().await.unwrap();
        assert_eq!(&body[..], b"Subject: hi\r\n\r\nstuffed line\r\n.double dot\r\n");
    }

    #[tokio::test]
    async fn read_body_accepts_bare_lf_terminator() {
        let (mut fs, _server) = framed_with(b"hello\r\n.\n").await;
        let body = fs.read_body().await.unwrap();
        assert_eq!(&body[..], b"hello\r\n");
    }

    #[tokio::test]
    async fn premature_eof_is_protocol_error() {
        let (client, server) = duplex(8192);
        drop(server);
        let mut fs = FramedStream::new(client);
        let err = fs.read_line().await.unwrap_err();
        assert!(matches!(err, Pop3Error::Protocol(_)));
        assert!(!fs.is_connected());
    }

    #[tokio::test]
    async fn read_timeout_fires_and_disconnects() {
        let (client, _server) = duplex(8192);
        let mut fs = FramedStream::new(client);
        fs.set_timeouts(Some(std::time::Duration::from_millis(20)), None);
        let err = fs.read_line().await.unwrap_err();
        assert!(matches!(err, Pop3Error::Timeout));
        assert!(!fs.is_connected());
    }

    #[tokio::test]
    async fn queue_and_flush_writes_crlf_terminated_commands() {
        let (client, mut server) = duplex(8192);
        let mut fs = FramedStream::new(client);
        fs.queue_command("DELE 1").await.unwrap();
        fs.queue_command("DELE 2").await.unwrap();
        fs.flush().await.unwrap();
        let mut buf = [0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"DELE 1\r\nDELE 2\r\n");
    }
}
