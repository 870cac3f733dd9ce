/*
 * engine.rs
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

//! The session state machine: command queue, pipelined run loop, and the
//! per-command handler dispatch. `Engine` owns the one `FramedStream` for
//! the life of a session; nothing else is allowed to touch the socket while
//! a `run` is in flight.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Pop3Error;
use crate::observer::{Event, NullObserver, Observer};
use crate::pop3::auth::{self, Credentials, SaslMechanism};
use crate::pop3::cancel::CancelToken;
use crate::pop3::capabilities::{Capabilities, Capability, ProbedFeatures, ServerMetadata};
use crate::pop3::command::{Command, CommandQueue, CommandStatus};
use crate::pop3::ids::{self, MessageIndex, UidMap};
use crate::pop3::parser::{self, Status};
use crate::pop3::redact::{Scan, SecretRedactor};
use crate::pop3::state::SessionState;
use crate::pop3::stream::FramedStream;

/// The POP3 protocol engine. Generic over the byte stream so the same state
/// machine drives a plain `TcpStream`, a TLS stream, or (in tests) an
/// in-memory `tokio::io::DuplexStream` — the connector chooses the concrete
/// stream type and performs the STLS swap via [`Engine::replace_stream`].
pub struct Engine<S> {
    stream: Option<FramedStream<S>>,
    state: SessionState,
    capabilities: Capabilities,
    metadata: ServerMetadata,
    probed: ProbedFeatures,
    message_count: u32,
    uid_map: UidMap,
    queue: CommandQueue,
    observer: Box<dyn Observer + Send>,
    secret_redactor: SecretRedactor,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl<S> Engine<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new() -> Self {
        Self::with_boxed_observer(Box::new(NullObserver))
    }

    pub fn with_observer(observer: impl Observer + Send + 'static) -> Self {
        Self::with_boxed_observer(Box::new(observer))
    }

    pub(crate) fn with_boxed_observer(observer: Box<dyn Observer + Send>) -> Self {
        Self {
            stream: None,
            state: SessionState::Disconnected,
            capabilities: Capabilities::initial(),
            metadata: ServerMetadata::default(),
            probed: ProbedFeatures::default(),
            message_count: 0,
            uid_map: UidMap::new(),
            queue: CommandQueue::new(),
            observer,
            secret_redactor: SecretRedactor::new(),
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Read/write timeouts applied to the stream on the next (or current) connect.
    pub fn set_timeouts(&mut self, read_timeout: Option<Duration>, write_timeout: Option<Duration>) {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        if let Some(stream) = &mut self.stream {
            stream.set_timeouts(read_timeout, write_timeout);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn metadata(&self) -> &ServerMetadata {
        &self.metadata
    }

    pub fn message_count(&self) -> u32 {
        self.message_count
    }

    /// The uid <-> sequence-id map populated so far by `UIDL` calls.
    /// Invalidated (cleared) on disconnect, since a new session may assign
    /// different sequence ids to the same uids.
    pub fn uid_map(&self) -> &UidMap {
        &self.uid_map
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from != to {
            self.state = to;
            self.observer.on_event(Event::StateChanged { from, to });
        }
    }

    fn emit_secret(&mut self, offset: usize, len: usize) {
        self.observer.on_event(Event::SecretRedacted { offset, len });
    }

    fn require_connected(&self) -> Result<(), Pop3Error> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(Pop3Error::state("not connected"))
        }
    }

    fn require_transaction(&self) -> Result<(), Pop3Error> {
        if self.state.is_transaction() {
            Ok(())
        } else {
            Err(Pop3Error::state("command requires an authenticated session"))
        }
    }

    fn validate_index(&self, index: MessageIndex) -> Result<(), Pop3Error> {
        if index < self.message_count {
            Ok(())
        } else {
            Err(Pop3Error::argument(format!(
                "message index {index} out of range (0..{})",
                self.message_count
            )))
        }
    }

    // ---- Connection lifecycle -------------------------------------------------

    /// Take ownership of `stream`, wrap it as a `FramedStream`, and read the
    /// greeting. Fails with `Protocol` on a malformed greeting, leaving the
    /// engine `Disconnected`.
    pub async fn connect(&mut self, stream: S) -> Result<(), Pop3Error> {
        if self.state != SessionState::Disconnected {
            return Err(Pop3Error::state("engine is already connected"));
        }
        let mut framed = FramedStream::new(stream);
        framed.set_timeouts(self.read_timeout, self.write_timeout);
        let greeting = framed.read_line().await?;
        if parser::classify(&greeting) != Some(Status::Ok) {
            return Err(Pop3Error::protocol(format!("malformed greeting: {greeting}")));
        }
        if let Some(token) = parser::parse_greeting_apop_token(&greeting) {
            self.capabilities.enable(Capability::Apop);
            self.metadata.apop_token = Some(token);
        }
        self.stream = Some(framed);
        self.transition(SessionState::Connected);
        Ok(())
    }

    /// Close the underlying stream and return to `Disconnected`.
    pub fn disconnect(&mut self, reason: Option<&str>) {
        self.stream = None;
        self.queue = CommandQueue::new();
        self.uid_map.clear();
        self.transition(SessionState::Disconnected);
        self.observer.on_event(Event::Disconnected { reason });
    }

    /// Send `QUIT` (best-effort — the server's reply is not load-bearing)
    /// and disconnect.
    pub async fn quit(&mut self) -> Result<(), Pop3Error> {
        if self.state.is_connected() {
            self.queue_simple("QUIT");
            let _ = self.run(false).await;
        }
        self.disconnect(None);
        Ok(())
    }

    /// True once the stream has no buffered input or output — the only
    /// moment it's safe to swap the inner stream for an `STLS` upgrade.
    pub fn stream_is_idle(&self) -> bool {
        self.stream.as_ref().map_or(true, |s| s.is_idle())
    }

    /// Swap the inner stream (an in-place TLS upgrade). `upgrade` receives
    /// the old stream and must hand back the new one; the `FramedStream`'s
    /// buffers are discarded and recreated empty, which is only safe when
    /// [`Engine::stream_is_idle`] holds.
    pub async fn replace_stream<F, Fut>(&mut self, upgrade: F) -> Result<(), Pop3Error>
    where
        F: FnOnce(S) -> Fut,
        Fut: Future<Output = Result<S, Pop3Error>>,
    {
        if !self.stream_is_idle() {
            return Err(Pop3Error::protocol("cannot upgrade stream with buffered data pending"));
        }
        let inner = self
            .stream
            .take()
            .ok_or_else(|| Pop3Error::state("not connected"))?
            .into_inner();
        let new_inner = match upgrade(inner).await {
            Ok(s) => s,
            Err(e) => {
                self.disconnect(Some(&e.to_string()));
                return Err(e);
            }
        };
        let mut framed = FramedStream::new(new_inner);
        framed.set_timeouts(self.read_timeout, self.write_timeout);
        self.stream = Some(framed);
        Ok(())
    }

    // ---- Command queue / run loop ----------------------------------------------

    pub fn queue_simple(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.observer.on_event(Event::CommandQueued { text: &text });
        self.queue.push(Command::simple(text));
    }

    pub fn queue_multiline(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.observer.on_event(Event::CommandQueued { text: &text });
        self.queue.push(Command::multiline(text));
    }

    pub fn queue_with_body(&mut self, text: impl Into<String>, handler: impl FnMut(&[u8]) + Send + 'static) {
        let text = text.into();
        self.observer.on_event(Event::CommandQueued { text: &text });
        self.queue.push(Command::with_body(text, handler));
    }

    /// Drain the queue and drive it to completion: write every queued
    /// command (flushing once), then read and classify one response per
    /// command in FIFO order, invoking a multi-line command's body read (and
    /// handler, if any). Any fatal error disconnects the engine before
    /// propagating. When `throw_on_error`, the first command left in
    /// `Error` status (or carrying a parse error) is raised as the `Err`;
    /// otherwise every command's outcome is left for the caller to inspect.
    pub async fn run(&mut self, throw_on_error: bool) -> Result<Vec<Command>, Pop3Error> {
        self.run_cancellable(throw_on_error, None).await
    }

    /// Like [`Self::run`], but races each phase against `cancel`. Cancelling
    /// before the write phase completes discards any unflushed output and
    /// returns `Cancelled` with the connection still usable (nothing reached
    /// the wire, barring a pipeline so large it forced an early flush
    /// mid-queue — an edge case the caller is expected to avoid by bounding
    /// queue depth). Cancelling during the read phase is fatal: the response
    /// stream is now desynchronized from the server's in-flight replies.
    pub async fn run_cancellable(
        &mut self,
        throw_on_error: bool,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Command>, Pop3Error> {
        let mut commands = self.queue.drain();
        if commands.is_empty() {
            return Ok(commands);
        }

        match cancel {
            None => {
                if let Err(e) = self.write_phase(&mut commands).await {
                    self.disconnect(Some(&e.to_string()));
                    return Err(e);
                }
            }
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        if let Some(stream) = &mut self.stream {
                            stream.clear_output();
                        }
                        return Err(Pop3Error::Cancelled);
                    }
                    result = self.write_phase(&mut commands) => {
                        if let Err(e) = result {
                            self.disconnect(Some(&e.to_string()));
                            return Err(e);
                        }
                    }
                }
            }
        }

        match cancel {
            None => {
                if let Err(e) = self.read_phase(&mut commands).await {
                    self.disconnect(Some(&e.to_string()));
                    return Err(e);
                }
            }
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        self.disconnect(Some("cancelled while awaiting a response"));
                        return Err(Pop3Error::Cancelled);
                    }
                    result = self.read_phase(&mut commands) => {
                        if let Err(e) = result {
                            self.disconnect(Some(&e.to_string()));
                            return Err(e);
                        }
                    }
                }
            }
        }

        if throw_on_error {
            for command in &commands {
                command.throw_if_error()?;
            }
        }
        Ok(commands)
    }

    async fn write_phase(&mut self, commands: &mut [Command]) -> Result<(), Pop3Error> {
        let stream = self.stream.as_mut().ok_or_else(|| Pop3Error::state("not connected"))?;
        for command in commands.iter_mut() {
            command.status = CommandStatus::Active;
            match self.secret_redactor.scan(command.text()) {
                Scan::Ranges(ranges) => {
                    for (offset, len) in ranges {
                        if len > 0 {
                            self.observer.on_event(Event::SecretRedacted { offset, len });
                        }
                    }
                }
                Scan::RedactAll => {
                    self.observer.on_event(Event::SecretRedacted {
                        offset: 0,
                        len: command.text().len(),
                    });
                }
            }
            stream.queue_command(command.text()).await?;
        }
        stream.flush().await
    }

    async fn read_phase(&mut self, commands: &mut [Command]) -> Result<(), Pop3Error> {
        let stream = self.stream.as_mut().ok_or_else(|| Pop3Error::state("not connected"))?;
        for command in commands.iter_mut() {
            let line = stream.read_line().await?;
            let status_text = parser::status_text(&line).to_string();
            match parser::classify(&line) {
                Some(Status::Ok) => {
                    command.status = CommandStatus::Ok;
                    command.status_text = status_text;
                    if command.has_body() {
                        let body = stream.read_body().await?;
                        if let Some(handler) = command.handler_mut() {
                            handler(&body);
                        } else {
                            command.body = Some(body);
                        }
                    }
                }
                Some(Status::Error) => {
                    command.status = CommandStatus::Error;
                    command.status_text = status_text;
                }
                Some(Status::Continue) => {
                    command.status = CommandStatus::Continue;
                    command.status_text = status_text;
                }
                None => {
                    return Err(Pop3Error::protocol(format!("unexpected response: {line}")));
                }
            }
            self.observer.on_event(Event::CommandCompleted {
                text: command.text(),
                ok: command.status == CommandStatus::Ok,
                status_text: &command.status_text,
            });
        }
        Ok(())
    }

    // ---- Capabilities -----------------------------------------------------

    /// Queue and run `CAPA`, folding the (additive-only) flags and metadata
    /// it reports into the current capability set. A server that doesn't
    /// support `CAPA` (`-ERR`) is tolerated silently, leaving capabilities
    /// unchanged.
    pub async fn query_capabilities(&mut self) -> Result<(), Pop3Error> {
        self.require_connected()?;
        self.queue_multiline("CAPA");
        let mut commands = self.run(false).await?;
        let command = commands.pop().expect("exactly one command was queued");
        if command.status == CommandStatus::Ok {
            if let Some(body) = &command.body {
                let text = String::from_utf8_lossy(body);
                for line in text.lines() {
                    if !line.is_empty() {
                        parser::parse_capa_line(line, &mut self.capabilities, &mut self.metadata);
                    }
                }
            }
        }
        Ok(())
    }

    // ---- Authentication -----------------------------------------------------

    /// Attempt `APOP`. Returns `Ok(false)` (not `Ok(true)`) both when the
    /// server doesn't advertise `Apop` and when it rejects the credentials —
    /// callers fall through to the next mechanism either way.
    pub async fn try_apop(&mut self, credentials: &Credentials) -> Result<bool, Pop3Error> {
        self.require_connected()?;
        if self.state != SessionState::Connected {
            return Err(Pop3Error::state("APOP is only valid before authentication"));
        }
        if !self.capabilities.contains(Capability::Apop) {
            return Ok(false);
        }
        let token = self
            .metadata
            .apop_token
            .clone()
            .ok_or_else(|| Pop3Error::protocol("Apop capability set without a greeting timestamp token"))?;
        let utf8 = self.capabilities.contains(Capability::Utf8) || self.capabilities.contains(Capability::Utf8User);
        let username = auth::prepare_credential(&credentials.username, utf8)?;
        let password = auth::prepare_credential(&credentials.password, utf8)?;
        let digest = auth::apop_digest(&token, &password);

        self.secret_redactor.enable();
        self.queue_simple(format!("APOP {username} {digest}"));
        let result = self.run(false).await;
        self.secret_redactor.disable();
        let commands = result?;

        if commands[0].status == CommandStatus::Ok {
            self.transition(SessionState::Transaction);
            self.post_auth_init().await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Drive one `AUTH <mechanism>` exchange to completion. Returns
    /// `Ok(false)` on a clean rejection so the caller can try the next
    /// mechanism; any I/O or framing failure is fatal and disconnects.
    pub async fn try_sasl_mechanism(&mut self, mechanism: &mut dyn SaslMechanism) -> Result<bool, Pop3Error> {
        if self.state != SessionState::Connected {
            return Err(Pop3Error::state("AUTH is only valid before authentication"));
        }
        self.secret_redactor.enable();
        let outcome = {
            let stream = self.stream.as_mut().ok_or_else(|| Pop3Error::state("not connected"))?;
            let observer = &mut self.observer;
            auth::drive_sasl(stream, &mut self.secret_redactor, mechanism, |offset, len| {
                observer.on_event(Event::SecretRedacted { offset, len });
            })
            .await
        };
        self.secret_redactor.disable();

        match outcome {
            Ok(true) => {
                self.transition(SessionState::Transaction);
                self.post_auth_init().await?;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                self.disconnect(Some(&e.to_string()));
                Err(e)
            }
        }
    }

    /// `USER`/`PASS` fallback. Raises `Authentication` (recoverable; the
    /// session stays `Connected`) if either step is rejected.
    pub async fn try_user_pass(&mut self, credentials: &Credentials) -> Result<(), Pop3Error> {
        if self.state != SessionState::Connected {
            return Err(Pop3Error::state("USER/PASS is only valid before authentication"));
        }
        let utf8 = self.capabilities.contains(Capability::Utf8User);
        let username = auth::prepare_credential(&credentials.username, utf8)?;
        let password = auth::prepare_credential(&credentials.password, utf8)?;

        self.secret_redactor.enable();
        self.queue_simple(format!("USER {username}"));
        let user_result = self.run(false).await;
        let user_commands = match user_result {
            Ok(c) => c,
            Err(e) => {
                self.secret_redactor.disable();
                return Err(e);
            }
        };
        if user_commands[0].status != CommandStatus::Ok {
            self.secret_redactor.disable();
            return Err(Pop3Error::authentication(user_commands[0].status_text.clone()));
        }

        self.queue_simple(format!("PASS {password}"));
        let pass_result = self.run(false).await;
        self.secret_redactor.disable();
        let pass_commands = pass_result?;
        if pass_commands[0].status != CommandStatus::Ok {
            return Err(Pop3Error::authentication(pass_commands[0].status_text.clone()));
        }

        self.transition(SessionState::Transaction);
        self.post_auth_init().await?;
        Ok(())
    }

    /// Post-authentication bookkeeping common to every successful
    /// APOP/SASL/USER-PASS path: re-query capabilities, refresh
    /// `MessageCount`, and opportunistically probe `UIDL` when the server
    /// didn't already advertise it and there's at least one message.
    async fn post_auth_init(&mut self) -> Result<(), Pop3Error> {
        self.query_capabilities().await?;
        self.refresh_message_count().await?;
        if !self.capabilities.contains(Capability::Uidl) && !self.probed.uidl_probed && self.message_count > 0 {
            match self.uidl_one(0).await {
                Ok(_) | Err(Pop3Error::NotSupported(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ---- Message-scoped operations -----------------------------------------

    pub async fn refresh_message_count(&mut self) -> Result<u32, Pop3Error> {
        self.require_transaction()?;
        self.queue_simple("STAT");
        let commands = self.run(true).await?;
        let (count, _size) = parser::parse_stat(&commands[0].status_text).map_err(Pop3Error::protocol)?;
        self.message_count = count;
        Ok(count)
    }

    pub async fn list_one(&mut self, index: MessageIndex) -> Result<u64, Pop3Error> {
        self.require_transaction()?;
        self.validate_index(index)?;
        let seqid = ids::seqid_of(index);
        self.queue_simple(format!("LIST {seqid}"));
        let commands = self.run(true).await?;
        let (_seqid, size) = parser::parse_list_line(&commands[0].status_text).map_err(Pop3Error::protocol)?;
        Ok(size)
    }

    pub async fn list_all(&mut self) -> Result<Vec<(MessageIndex, u64)>, Pop3Error> {
        self.require_transaction()?;
        self.queue_multiline("LIST");
        let commands = self.run(true).await?;
        parse_index_lines(commands[0].body.as_deref().unwrap_or(&[]), parser::parse_list_line)
    }

    pub async fn uidl_one(&mut self, index: MessageIndex) -> Result<String, Pop3Error> {
        self.require_transaction()?;
        self.validate_index(index)?;
        if self.probed.uidl_probed && !self.probed.uidl_supported {
            return Err(Pop3Error::NotSupported(Capability::Uidl));
        }
        let seqid = ids::seqid_of(index);
        self.queue_simple(format!("UIDL {seqid}"));
        let commands = self.run(false).await?;
        match commands[0].status {
            CommandStatus::Ok => {
                self.probed.uidl_probed = true;
                self.probed.uidl_supported = true;
                let (seqid, uid) = parser::parse_uidl_line(&commands[0].status_text).map_err(Pop3Error::protocol)?;
                self.uid_map.insert(seqid, uid.clone());
                Ok(uid)
            }
            CommandStatus::Error => {
                self.probed.uidl_probed = true;
                self.probed.uidl_supported = false;
                Err(Pop3Error::NotSupported(Capability::Uidl))
            }
            _ => Err(Pop3Error::protocol("unexpected UIDL response")),
        }
    }

    pub async fn uidl_all(&mut self) -> Result<Vec<(MessageIndex, String)>, Pop3Error> {
        self.require_transaction()?;
        if self.probed.uidl_probed && !self.probed.uidl_supported {
            return Err(Pop3Error::NotSupported(Capability::Uidl));
        }
        self.queue_multiline("UIDL");
        let commands = self.run(false).await?;
        match commands[0].status {
            CommandStatus::Ok => {
                self.probed.uidl_probed = true;
                self.probed.uidl_supported = true;
                let entries =
                    parse_index_lines(commands[0].body.as_deref().unwrap_or(&[]), parser::parse_uidl_line)?;
                for (index, uid) in &entries {
                    self.uid_map.insert(ids::seqid_of(*index), uid.clone());
                }
                Ok(entries)
            }
            CommandStatus::Error => {
                self.probed.uidl_probed = true;
                self.probed.uidl_supported = false;
                Err(Pop3Error::NotSupported(Capability::Uidl))
            }
            _ => Err(Pop3Error::protocol("unexpected UIDL response")),
        }
    }

    pub async fn delete(&mut self, index: MessageIndex) -> Result<(), Pop3Error> {
        self.delete_many(std::iter::once(index)).await
    }

    /// Delete every index in `indices`, pipelined into a single `run`. The
    /// wire sequence id is always `index + 1` — a previous revision of this
    /// path had an off-by-one on one branch; there is now only one branch.
    pub async fn delete_many(&mut self, indices: impl IntoIterator<Item = MessageIndex>) -> Result<(), Pop3Error> {
        self.require_transaction()?;
        let indices: Vec<MessageIndex> = indices.into_iter().collect();
        for &index in &indices {
            self.validate_index(index)?;
        }
        if indices.is_empty() {
            return Ok(());
        }
        for index in indices {
            self.queue_simple(format!("DELE {}", ids::seqid_of(index)));
        }
        self.run(true).await?;
        Ok(())
    }

    pub async fn delete_range(&mut self, start: MessageIndex, count: u32) -> Result<(), Pop3Error> {
        if count == 0 {
            return Ok(());
        }
        self.delete_many(start..start + count).await
    }

    /// Delete every message in the maildrop. A no-op (no wire traffic) when
    /// `message_count() == 0`.
    pub async fn delete_all(&mut self) -> Result<(), Pop3Error> {
        let count = self.message_count;
        self.delete_range(0, count).await
    }

    pub async fn retrieve(&mut self, index: MessageIndex) -> Result<Bytes, Pop3Error> {
        self.require_transaction()?;
        self.validate_index(index)?;
        self.queue_multiline(format!("RETR {}", ids::seqid_of(index)));
        let mut commands = self.run(true).await?;
        Ok(commands.pop().unwrap().body.unwrap_or_default())
    }

    /// Stream a single message's body to `sink` instead of retaining a copy
    /// on the `Command`.
    pub async fn retrieve_streaming(
        &mut self,
        index: MessageIndex,
        sink: impl FnMut(&[u8]) + Send + 'static,
    ) -> Result<(), Pop3Error> {
        self.require_transaction()?;
        self.validate_index(index)?;
        self.queue_with_body(format!("RETR {}", ids::seqid_of(index)), sink);
        self.run(true).await?;
        Ok(())
    }

    /// Fetch `0..count` messages starting at `start`, pipelined into one
    /// `run`. A no-op (no wire traffic, empty result) when `count == 0`.
    pub async fn retrieve_many(&mut self, start: MessageIndex, count: u32) -> Result<Vec<Bytes>, Pop3Error> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.require_transaction()?;
        for i in 0..count {
            self.validate_index(start + i)?;
        }
        for i in 0..count {
            self.queue_multiline(format!("RETR {}", ids::seqid_of(start + i)));
        }
        let commands = self.run(true).await?;
        Ok(commands.into_iter().map(|c| c.body.unwrap_or_default()).collect())
    }

    pub async fn retrieve_headers(&mut self, index: MessageIndex, lines: u32) -> Result<Bytes, Pop3Error> {
        self.require_transaction()?;
        self.validate_index(index)?;
        if !self.capabilities.contains(Capability::Top) {
            return Err(Pop3Error::NotSupported(Capability::Top));
        }
        self.queue_multiline(format!("TOP {} {}", ids::seqid_of(index), lines));
        let mut commands = self.run(true).await?;
        Ok(commands.pop().unwrap().body.unwrap_or_default())
    }

    /// Fetch headers (plus `lines` body lines) for `0..count` messages
    /// starting at `start`, pipelined into one `run`. A no-op when
    /// `count == 0`.
    pub async fn retrieve_headers_many(
        &mut self,
        start: MessageIndex,
        count: u32,
        lines: u32,
    ) -> Result<Vec<Bytes>, Pop3Error> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.require_transaction()?;
        if !self.capabilities.contains(Capability::Top) {
            return Err(Pop3Error::NotSupported(Capability::Top));
        }
        for i in 0..count {
            self.validate_index(start + i)?;
        }
        for i in 0..count {
            self.queue_multiline(format!("TOP {} {}", ids::seqid_of(start + i), lines));
        }
        let commands = self.run(true).await?;
        Ok(commands.into_iter().map(|c| c.body.unwrap_or_default()).collect())
    }

    pub async fn list_languages(&mut self) -> Result<Vec<(String, String)>, Pop3Error> {
        self.require_connected()?;
        if !self.capabilities.contains(Capability::Lang) {
            return Err(Pop3Error::NotSupported(Capability::Lang));
        }
        self.queue_multiline("LANG");
        let commands = self.run(true).await?;
        let body = commands[0].body.as_deref().unwrap_or(&[]);
        let text = String::from_utf8_lossy(body);
        let mut out = Vec::new();
        for line in text.lines() {
            if !line.is_empty() {
                out.push(parser::parse_lang_line(line).map_err(Pop3Error::protocol)?);
            }
        }
        Ok(out)
    }

    pub async fn set_language(&mut self, code: &str) -> Result<(), Pop3Error> {
        self.require_connected()?;
        if code.is_empty() {
            return Err(Pop3Error::argument("language code must not be empty"));
        }
        if !self.capabilities.contains(Capability::Lang) {
            return Err(Pop3Error::NotSupported(Capability::Lang));
        }
        self.queue_simple(format!("LANG {code}"));
        self.run(true).await?;
        Ok(())
    }

    pub async fn reset(&mut self) -> Result<(), Pop3Error> {
        self.require_transaction()?;
        self.queue_simple("RSET");
        self.run(true).await?;
        Ok(())
    }

    pub async fn noop(&mut self) -> Result<(), Pop3Error> {
        self.require_transaction()?;
        self.queue_simple("NOOP");
        self.run(true).await?;
        Ok(())
    }

    // ---- STLS ---------------------------------------------------------------

    /// Issue `STLS`. Callers then perform the actual TLS handshake and call
    /// [`Engine::replace_stream`]; the engine itself never touches TLS.
    pub async fn begin_stls_upgrade(&mut self) -> Result<(), Pop3Error> {
        if self.state != SessionState::Connected {
            return Err(Pop3Error::state("STLS is only valid before authentication"));
        }
        if !self.capabilities.contains(Capability::StartTls) {
            return Err(Pop3Error::NotSupported(Capability::StartTls));
        }
        self.queue_simple("STLS");
        self.run(true).await?;
        Ok(())
    }
}

impl<S> Default for Engine<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}

fn parse_index_lines<T>(
    body: &[u8],
    parse_line: impl Fn(&str) -> Result<(u32, T), &'static str>,
) -> Result<Vec<(MessageIndex, T)>, Pop3Error> {
    let text = String::from_utf8_lossy(body);
    let mut out = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let (seqid, value) = parse_line(line).map_err(Pop3Error::protocol)?;
        out.push((ids::index_of(seqid), value));
    }
    Ok(out)
}
