/*
 * error.rs
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

//! Engine errors: local/recoverable vs. fatal/connection-terminating.

use std::fmt;
use std::io;

use crate::pop3::capabilities::Capability;

/// Errors raised by the POP3 engine.
///
/// `Command` carries the server's own status text and leaves the session in
/// `Transaction`/`Connected`; `Protocol`, `Io`, `TlsHandshake`, and a read
/// `Cancelled`/`Timeout` are fatal and force the session to `Disconnected`.
#[derive(Debug)]
pub enum Pop3Error {
    /// Caller passed an invalid argument (out-of-range index, empty language code, ...).
    Argument(String),
    /// Operation is not valid for the current session state.
    State(String),
    /// A required capability is not advertised by the server.
    NotSupported(Capability),
    /// Credentials were rejected by every available authentication method.
    Authentication(String),
    /// A single command received `-ERR`; the connection stays up.
    Command { status_text: String },
    /// Malformed response, parse failure inside a handler, or premature EOF.
    /// Fatal: the engine disconnects.
    Protocol(String),
    /// Underlying transport error. Fatal.
    Io(io::Error),
    /// TLS negotiation failed. Fatal.
    TlsHandshake(String),
    /// The operation was cancelled before any bytes were written; the
    /// connection remains usable.
    Cancelled,
    /// The operation timed out while waiting for a response. Fatal.
    Timeout,
}

impl Pop3Error {
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Fatal errors force the engine back to `Disconnected`; everything else
    /// leaves the current session usable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Pop3Error::Protocol(_) | Pop3Error::Io(_) | Pop3Error::TlsHandshake(_) | Pop3Error::Timeout
        )
    }
}

impl fmt::Display for Pop3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pop3Error::Argument(m) => write!(f, "invalid argument: {}", m),
            Pop3Error::State(m) => write!(f, "invalid session state: {}", m),
            Pop3Error::NotSupported(cap) => write!(f, "server does not support {:?}", cap),
            Pop3Error::Authentication(m) => write!(f, "authentication failed: {}", m),
            Pop3Error::Command { status_text } => write!(f, "{}", status_text),
            Pop3Error::Protocol(m) => write!(f, "protocol error: {}", m),
            Pop3Error::Io(e) => write!(f, "{}", e),
            Pop3Error::TlsHandshake(m) => write!(f, "TLS handshake failed: {}", m),
            Pop3Error::Cancelled => write!(f, "operation cancelled"),
            Pop3Error::Timeout => write!(f, "operation timed out"),
        }
    }
}

impl std::error::Error for Pop3Error {}

impl From<io::Error> for Pop3Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Pop3Error::Protocol("server disconnected unexpectedly".to_string())
        } else {
            Pop3Error::Io(e)
        }
    }
}
