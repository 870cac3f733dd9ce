/*
 * lib.rs
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

//! POP3 (RFC 1939) protocol engine: session state machine, command
//! pipelining, a framed line/data-mode stream, and the APOP/SASL/USER-PASS
//! authentication flows. MIME parsing, SASL mechanism internals, TLS
//! cryptography, and the public synchronous/asynchronous client façade are
//! layered on top of this crate, not inside it.

pub mod error;
pub mod net;
pub mod observer;
pub mod options;
pub mod pop3;

pub use error::Pop3Error;
pub use observer::{Event, Observer};
pub use options::{ConnectOptions, SecurityOptions};
pub use pop3::auth::{Credentials, SaslMechanism};
pub use pop3::cancel::CancelToken;
pub use pop3::capabilities::{Capabilities, Capability, ExpirePolicy, ServerMetadata};
pub use pop3::command::{Command, CommandStatus};
pub use pop3::connector::{connect, Pop3Stream};
pub use pop3::engine::Engine;
pub use pop3::ids::{MessageIndex, SequenceId, UidMap};
pub use pop3::state::SessionState;
