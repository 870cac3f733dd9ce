/*
 * capabilities.rs
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

//! Server capability flags (`CAPA`, RFC 2449) and the metadata that rides
//! along with some of them.

/// A single capability a POP3 server may advertise (or that the engine
/// infers, in APOP's case, from the greeting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Apop,
    Expire,
    LoginDelay,
    Pipelining,
    ResponseCodes,
    Sasl,
    StartTls,
    Top,
    Uidl,
    User,
    Utf8,
    Utf8User,
    Lang,
}

impl Capability {
    fn bit(self) -> u16 {
        match self {
            Capability::Apop => 1 << 0,
            Capability::Expire => 1 << 1,
            Capability::LoginDelay => 1 << 2,
            Capability::Pipelining => 1 << 3,
            Capability::ResponseCodes => 1 << 4,
            Capability::Sasl => 1 << 5,
            Capability::StartTls => 1 << 6,
            Capability::Top => 1 << 7,
            Capability::Uidl => 1 << 8,
            Capability::User => 1 << 9,
            Capability::Utf8 => 1 << 10,
            Capability::Utf8User => 1 << 11,
            Capability::Lang => 1 << 12,
        }
    }
}

/// Capability flag set. Only the engine may add flags (as it learns them
/// from a greeting or a `CAPA` response); callers may only subtract flags,
/// to disable a feature they don't want used even though the server offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u16);

impl Capabilities {
    pub fn empty() -> Self {
        Self(0)
    }

    /// The set the engine starts with before any `CAPA`/greeting has been read.
    pub fn initial() -> Self {
        let mut caps = Self::empty();
        caps.enable(Capability::User);
        caps
    }

    pub fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    /// Engine-internal: record that the server advertised `cap`.
    pub(crate) fn enable(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    /// Caller-facing: disable a feature even though the server supports it.
    pub fn disable(&mut self, cap: Capability) {
        self.0 &= !cap.bit();
    }
}

/// `EXPIRE` policy advertised by `CAPA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirePolicy {
    Never,
    PerSession,
    Days(u32),
}

/// Values extracted from `CAPA` extension lines beyond the plain flags.
#[derive(Debug, Clone, Default)]
pub struct ServerMetadata {
    pub implementation: Option<String>,
    pub login_delay_secs: Option<u32>,
    pub expire: Option<ExpirePolicy>,
    /// The timestamp token (including `<` and `>`) from the greeting, used
    /// to compute the APOP digest.
    pub apop_token: Option<String>,
    /// SASL mechanism names the server offered, in the order it listed them.
    pub auth_mechanisms: Vec<String>,
}

/// Tracks which optional features have been empirically probed, so the
/// engine doesn't re-probe (and re-fail) a feature every time it's used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbedFeatures {
    pub uidl_probed: bool,
    pub uidl_supported: bool,
}
