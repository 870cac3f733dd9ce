/*
 * auth.rs
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

//! Authentication building blocks: APOP digest composition, the SASL
//! challenge/response driver, and UTF-8-aware credential preparation.
//!
//! `SaslMechanism` is the black-box the engine drives — the actual PLAIN,
//! LOGIN, SCRAM-*, and XOAUTH2 implementations live in a SASL subsystem
//! above this crate; this module only knows how to exchange their
//! challenges/responses over the wire and how to rank a server's offered
//! mechanism list by strength.

use base64::Engine as _;
use md5::{Digest, Md5};

use crate::error::Pop3Error;
use crate::pop3::redact::SecretRedactor;
use crate::pop3::stream::FramedStream;

/// Username/password pair for a single authentication attempt.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A SASL mechanism's client side, treated as a black box: the engine
/// sends `name()` in the `AUTH` command, then round-trips whatever bytes
/// the mechanism wants through `initial_response`/`challenge`.
pub trait SaslMechanism: Send {
    /// The mechanism name as advertised in `CAPA`'s `SASL` line (e.g. `PLAIN`).
    fn name(&self) -> &str;

    /// An initial response to send inline with `AUTH <mech>`, if the
    /// mechanism supports one. `None` means wait for the server's first
    /// challenge instead.
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Produce the response to a decoded server challenge.
    fn challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>, Pop3Error>;
}

/// Order a server's offered mechanism names strongest-first, per §4.4's
/// "ordered by a strength ranking" rule. Mechanisms outside this table keep
/// their relative server-advertised order, appended after the ranked ones.
pub fn rank_mechanisms(server_mechanisms: &[String]) -> Vec<String> {
    const STRENGTH_ORDER: &[&str] = &[
        "SCRAM-SHA-256",
        "SCRAM-SHA-1",
        "DIGEST-MD5",
        "CRAM-MD5",
        "OAUTHBEARER",
        "XOAUTH2",
        "PLAIN",
        "LOGIN",
    ];
    let mut ranked: Vec<String> = Vec::with_capacity(server_mechanisms.len());
    for &name in STRENGTH_ORDER {
        if let Some(found) = server_mechanisms.iter().find(|m| m.eq_ignore_ascii_case(name)) {
            ranked.push(found.clone());
        }
    }
    for m in server_mechanisms {
        if !ranked.iter().any(|r| r.eq_ignore_ascii_case(m)) {
            ranked.push(m.clone());
        }
    }
    ranked
}

/// MD5 of `token || password`, rendered as lowercase hex, per RFC 1939 §7.
pub fn apop_digest(token: &str, password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(token.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Run `value` through the SASLprep stringprep profile when the server
/// advertises UTF8 (RFC 6856); otherwise pass it through unchanged.
pub fn prepare_credential(value: &str, utf8_enabled: bool) -> Result<String, Pop3Error> {
    if !utf8_enabled {
        return Ok(value.to_string());
    }
    stringprep::saslprep(value)
        .map(|s| s.into_owned())
        .map_err(|_| Pop3Error::argument("credential contains characters prohibited by SASLprep"))
}

/// One AUTH exchange: write `AUTH <mech> [initial response]`, then loop on
/// `+ <b64 challenge>` continuations until the server replies `+OK` (caller
/// transitions to `Transaction`) or `-ERR` (caller tries the next mechanism
/// or falls back to `USER`/`PASS`). Returns `Ok(true)` on success, `Ok(false)`
/// on a clean `-ERR`; any I/O/protocol failure is fatal and propagated for
/// the caller to disconnect on.
///
/// Lives outside `Engine` so the borrow of `stream`/`redactor` doesn't have
/// to overlap with engine-level bookkeeping (capability re-query, message
/// count refresh) that only runs after this returns.
pub(crate) async fn drive_sasl<S>(
    stream: &mut FramedStream<S>,
    redactor: &mut SecretRedactor,
    mech: &mut dyn SaslMechanism,
    mut on_secret: impl FnMut(usize, usize),
) -> Result<bool, Pop3Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let b64 = base64::engine::general_purpose::STANDARD;

    let mut line = format!("AUTH {}", mech.name());
    if let Some(initial) = mech.initial_response() {
        line.push(' ');
        line.push_str(&b64.encode(initial));
    }
    emit_scan(redactor.scan(&line), &mut on_secret);
    stream.queue_command(&line).await?;
    stream.flush().await?;

    loop {
        let response = stream.read_line().await?;
        match crate::pop3::parser::classify(&response) {
            Some(crate::pop3::parser::Status::Continue) => {
                let encoded = crate::pop3::parser::status_text(&response);
                let decoded = b64
                    .decode(encoded)
                    .map_err(|_| Pop3Error::protocol("malformed base64 SASL challenge"))?;
                let reply = mech.challenge(&decoded)?;
                let encoded_reply = b64.encode(reply);
                emit_scan(redactor.scan(&encoded_reply), &mut on_secret);
                stream.queue_command(&encoded_reply).await?;
                stream.flush().await?;
            }
            Some(crate::pop3::parser::Status::Ok) => return Ok(true),
            Some(crate::pop3::parser::Status::Error) => return Ok(false),
            None => return Err(Pop3Error::protocol(format!("unexpected response during AUTH: {response}"))),
        }
    }
}

fn emit_scan(scan: crate::pop3::redact::Scan, on_secret: &mut impl FnMut(usize, usize)) {
    match scan {
        crate::pop3::redact::Scan::Ranges(ranges) => {
            for (offset, len) in ranges {
                if len > 0 {
                    on_secret(offset, len);
                }
            }
        }
        crate::pop3::redact::Scan::RedactAll => on_secret(0, usize::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apop_digest_matches_rfc1939_example() {
        let digest = apop_digest("<1896.697170952@dbc.mtview.ca.us>", "tanstaaftanstaaf");
        assert_eq!(digest, "c4c9334bac560ecc979e58001b3e22fb");
    }

    #[test]
    fn prepare_credential_passes_through_when_utf8_disabled() {
        assert_eq!(prepare_credential("alice", false).unwrap(), "alice");
    }

    #[test]
    fn prepare_credential_normalizes_when_utf8_enabled() {
        assert_eq!(prepare_credential("alice", true).unwrap(), "alice");
    }

    #[test]
    fn rank_mechanisms_orders_strongest_first() {
        let server = vec!["LOGIN".to_string(), "PLAIN".to_string(), "SCRAM-SHA-256".to_string()];
        let ranked = rank_mechanisms(&server);
        assert_eq!(ranked, vec!["SCRAM-SHA-256", "PLAIN", "LOGIN"]);
    }

    #[test]
    fn rank_mechanisms_keeps_unknown_mechanisms_after_known_ones() {
        let server = vec!["GSSAPI".to_string(), "PLAIN".to_string()];
        let ranked = rank_mechanisms(&server);
        assert_eq!(ranked, vec!["PLAIN", "GSSAPI"]);
    }
}
