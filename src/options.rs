/*
 * options.rs
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

//! Per-connection parameters. There is no persisted configuration: a POP3
//! engine instance is a single-session protocol driver, not an account
//! manager, so these values are supplied fresh on every `connect`.

use std::time::Duration;

/// How to arrive at a TLS-protected (or plaintext) connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityOptions {
    /// Raw TCP, no TLS at any point.
    None,
    /// Wrap the TCP stream with TLS immediately, before the greeting is read.
    SslOnConnect,
    /// Connect plain, then require `STLS`; fail with `NotSupported` if the
    /// server does not advertise it.
    StartTls,
    /// Like `StartTls`, but silently stay plaintext if `STLS` isn't advertised.
    StartTlsWhenAvailable,
    /// `SslOnConnect` on port 995, `StartTlsWhenAvailable` otherwise.
    Auto,
}

impl SecurityOptions {
    /// Resolve `Auto` against the destination port; every other variant is returned as-is.
    pub fn resolve(self, port: u16) -> SecurityOptions {
        match self {
            SecurityOptions::Auto => {
                if port == 995 {
                    SecurityOptions::SslOnConnect
                } else {
                    SecurityOptions::StartTlsWhenAvailable
                }
            }
            other => other,
        }
    }

    /// The conventional port for this security mode, used when the caller
    /// doesn't specify one explicitly.
    pub fn default_port(self) -> u16 {
        match self {
            SecurityOptions::SslOnConnect => 995,
            _ => 110,
        }
    }
}

/// Parameters for a single `connect` attempt.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub security: SecurityOptions,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, security: SecurityOptions) -> Self {
        let host = host.into();
        let port = security.default_port();
        Self {
            host,
            port,
            security,
            read_timeout: None,
            write_timeout: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}
