/*
 * state.rs
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

//! POP3 session states (RFC 1939 §3).

/// Where the session sits in the POP3 state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection, or the connection has been torn down after a fatal
    /// error, `QUIT`, or explicit disconnect.
    Disconnected,
    /// Connected and greeted, not yet authenticated.
    Connected,
    /// Authenticated; message commands are valid.
    Transaction,
}

impl SessionState {
    /// Whether message-scoped commands (`STAT`, `LIST`, `RETR`, ...) are valid.
    pub fn is_transaction(self) -> bool {
        matches!(self, SessionState::Transaction)
    }

    pub fn is_connected(self) -> bool {
        !matches!(self, SessionState::Disconnected)
    }
}
