/*
 * command.rs
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

//! A queued POP3 command and its eventual outcome.
//!
//! A `Command`'s handler, if any, is a plain closure over the decoded
//! multi-line body (`Engine` reads and dot-unstuffs the body itself via
//! `FramedStream::read_body` before invoking it) — there is no back
//! reference from `Command` to the engine or the stream.

use bytes::Bytes;

use crate::error::Pop3Error;

/// Outcome of a command once its response has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Queued,
    Active,
    Ok,
    Error,
    /// Reserved for SASL continuations; commands processed through the
    /// ordinary queue never end in this state since `AUTH` is driven
    /// separately by `auth.rs`.
    Continue,
}

/// One queued POP3 command line and, once run, its result.
pub struct Command {
    pub(crate) text: String,
    pub(crate) has_body: bool,
    pub(crate) handler: Option<Box<dyn FnMut(&[u8]) + Send>>,
    pub status: CommandStatus,
    pub status_text: String,
    pub parse_error: Option<String>,
    /// The dot-unstuffed multi-line body, if this command carries one and
    /// no streaming `handler` consumed it instead.
    pub body: Option<Bytes>,
}

impl Command {
    /// A command whose success response is a single status line.
    pub fn simple(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            has_body: false,
            handler: None,
            status: CommandStatus::Queued,
            status_text: String::new(),
            parse_error: None,
            body: None,
        }
    }

    /// A command whose success response is a status line followed by a
    /// dot-terminated multi-line body, collected whole into `body` for the
    /// caller to inspect once `run` returns.
    pub fn multiline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            has_body: true,
            handler: None,
            status: CommandStatus::Queued,
            status_text: String::new(),
            parse_error: None,
            body: None,
        }
    }

    /// A command whose dot-unstuffed multi-line body is streamed to
    /// `handler` as it's assembled, rather than retained on `body` — for a
    /// caller (e.g. a large `RETR`) that wants to consume the bytes without
    /// holding a second copy.
    pub fn with_body(text: impl Into<String>, handler: impl FnMut(&[u8]) + Send + 'static) -> Self {
        Self {
            text: text.into(),
            has_body: true,
            handler: Some(Box::new(handler)),
            status: CommandStatus::Queued,
            status_text: String::new(),
            parse_error: None,
            body: None,
        }
    }

    pub fn has_body(&self) -> bool {
        self.has_body
    }

    pub(crate) fn handler_mut(&mut self) -> Option<&mut (dyn FnMut(&[u8]) + Send)> {
        self.handler.as_deref_mut()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_ok(&self) -> bool {
        self.status == CommandStatus::Ok
    }

    /// Raise `Command`/`Protocol` if this command did not succeed cleanly.
    pub fn throw_if_error(&self) -> Result<(), Pop3Error> {
        match self.status {
            CommandStatus::Ok => {
                if let Some(msg) = &self.parse_error {
                    return Err(Pop3Error::protocol(msg.clone()));
                }
                Ok(())
            }
            CommandStatus::Error => Err(Pop3Error::Command {
                status_text: self.status_text.clone(),
            }),
            CommandStatus::Queued | CommandStatus::Active | CommandStatus::Continue => {
                Err(Pop3Error::state("command has not completed"))
            }
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text)
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .finish()
    }
}

/// FIFO queue of commands awaiting a single `Engine::run`.
#[derive(Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Remove every queued command, in order, for `Engine::run` to drive.
    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_with_no_parse_error_is_not_an_error() {
        let mut cmd = Command::simple("STAT");
        cmd.status = CommandStatus::Ok;
        assert!(cmd.throw_if_error().is_ok());
    }

    #[test]
    fn error_status_carries_status_text() {
        let mut cmd = Command::simple("DELE 3");
        cmd.status = CommandStatus::Error;
        cmd.status_text = "no such message".to_string();
        let err = cmd.throw_if_error().unwrap_err();
        match err {
            Pop3Error::Command { status_text } => assert_eq!(status_text, "no such message"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn queue_drains_in_order() {
        let mut queue = CommandQueue::new();
        queue.push(Command::simple("DELE 1"));
        queue.push(Command::simple("DELE 2"));
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].text(), "DELE 1");
        assert_eq!(drained[1].text(), "DELE 2");
        assert!(queue.is_empty());
    }
}
