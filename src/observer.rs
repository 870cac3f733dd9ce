/*
 * observer.rs
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

//! Engine event notifications, injected by the caller instead of reached
//! from a logging singleton. A logging façade built on top of this crate
//! implements `Observer` and formats `Event`s itself; the engine never
//! formats a log line.

use crate::pop3::state::SessionState;

/// One notable thing that happened inside the engine.
#[derive(Debug, Clone)]
pub enum Event<'a> {
    /// The session moved from one state to another.
    StateChanged { from: SessionState, to: SessionState },
    /// A command was appended to the run queue.
    CommandQueued { text: &'a str },
    /// A queued command finished with the given status text (empty on success).
    CommandCompleted { text: &'a str, ok: bool, status_text: &'a str },
    /// The engine disconnected, with an optional reason.
    Disconnected { reason: Option<&'a str> },
    /// A secret span was recognised in the outbound byte stream during
    /// authentication. `offset`/`len` index into the command bytes just
    /// written; a logger should replace that span with a fixed placeholder
    /// rather than print it.
    SecretRedacted { offset: usize, len: usize },
}

/// Receives `Event`s from the engine. All methods have a no-op default so
/// implementors only override what they care about.
pub trait Observer {
    fn on_event(&mut self, event: Event<'_>) {
        let _ = event;
    }
}

/// Observer that discards every event; the engine's default when the caller
/// supplies none.
#[derive(Default)]
pub struct NullObserver;

impl Observer for NullObserver {}
