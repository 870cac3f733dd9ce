/*
 * redact.rs
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

//! Finds the secret spans (username, APOP digest, password, SASL
//! challenge/response) in an outbound command line during authentication,
//! so an observer can mask them before logging. Fails closed: any line it
//! can't confidently parse comes back as "redact everything", never as
//! "nothing to redact".

#[derive(Clone, Copy)]
enum Mode {
    Idle,
    /// The last line we scanned was `AUTH <mech>`; the next line(s) we
    /// write are SASL challenge responses and carry no command verb at all.
    ExpectContinuation,
}

/// Result of scanning one outbound line.
#[derive(Debug, PartialEq, Eq)]
pub enum Scan {
    /// Parsed successfully; these `(offset, len)` byte ranges (into the
    /// scanned text) are secret.
    Ranges(Vec<(usize, usize)>),
    /// Could not confidently identify the secret spans; treat the entire
    /// line as secret.
    RedactAll,
}

/// Stateful scanner, armed only while the client is mid-authentication.
pub struct SecretRedactor {
    enabled: bool,
    mode: Mode,
}

impl Default for SecretRedactor {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: Mode::Idle,
        }
    }
}

impl SecretRedactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Call when an authentication attempt begins.
    pub fn enable(&mut self) {
        self.enabled = true;
        self.mode = Mode::Idle;
    }

    /// Call once authentication succeeds, fails, or the connection drops.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.mode = Mode::Idle;
    }

    /// Scan one outbound command line (without the trailing CRLF). Returns
    /// `Ranges(vec![])` when disabled or when the line legitimately carries
    /// no secret (e.g. `CAPA` issued mid-authentication).
    pub fn scan(&mut self, text: &str) -> Scan {
        if !self.enabled {
            return Scan::Ranges(Vec::new());
        }

        if let Mode::ExpectContinuation = self.mode {
            self.mode = Mode::Idle;
            return Scan::Ranges(vec![(0, text.len())]);
        }

        let upper = text.to_ascii_uppercase();
        if let Some(stripped) = strip_verb(&upper, "APOP ") {
            let base = text.len() - stripped.len();
            let body = &text[base..];
            let tokens = whitespace_tokens(body);
            if tokens.len() != 2 {
                return Scan::RedactAll;
            }
            return Scan::Ranges(tokens.into_iter().map(|(o, l)| (base + o, l)).collect());
        }
        if let Some(stripped) = strip_verb(&upper, "USER ") {
            let base = text.len() - stripped.len();
            let body = &text[base..];
            let tokens = whitespace_tokens(body);
            if tokens.len() != 1 {
                return Scan::RedactAll;
            }
            let (o, l) = tokens[0];
            return Scan::Ranges(vec![(base + o, l)]);
        }
        if let Some(stripped) = strip_verb(&upper, "PASS ") {
            let base = text.len() - stripped.len();
            let body = &text[base..];
            let tokens = whitespace_tokens(body);
            if tokens.len() != 1 {
                return Scan::RedactAll;
            }
            let (o, l) = tokens[0];
            return Scan::Ranges(vec![(base + o, l)]);
        }
        if upper == "AUTH" || upper.starts_with("AUTH ") {
            let body = &text[4..];
            let tokens = whitespace_tokens(body);
            let Some((mech_off, mech_len)) = tokens.first().copied() else {
                return Scan::RedactAll;
            };
            self.mode = Mode::ExpectContinuation;
            if let Some(&(ir_off, ir_len)) = tokens.get(1) {
                // An inline initial response after the mechanism name.
                return Scan::Ranges(vec![(4 + ir_off, ir_len)]);
            }
            let _ = (mech_off, mech_len); // mechanism name itself is not secret
            return Scan::Ranges(Vec::new());
        }

        // Any other command issued while authenticating (QUIT, NOOP, CAPA)
        // carries no secret.
        Scan::Ranges(Vec::new())
    }
}

fn strip_verb<'a>(upper: &'a str, verb: &str) -> Option<&'a str> {
    upper.strip_prefix(verb)
}

fn whitespace_tokens(s: &str) -> Vec<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        out.push((start, i - start));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_redactor_reports_nothing() {
        let mut r = SecretRedactor::new();
        assert_eq!(r.scan("PASS s3cret"), Scan::Ranges(Vec::new()));
    }

    #[test]
    fn user_pass_spans() {
        let mut r = SecretRedactor::new();
        r.enable();
        assert_eq!(r.scan("USER alice"), Scan::Ranges(vec![(5, 5)]));
        assert_eq!(r.scan("PASS s3cret"), Scan::Ranges(vec![(5, 6)]));
    }

    #[test]
    fn apop_redacts_user_and_digest() {
        let mut r = SecretRedactor::new();
        r.enable();
        let line = "APOP alice 5f7ba0f7a15c99e5d9aa9b8b4fa2c4f0";
        match r.scan(line) {
            Scan::Ranges(spans) => {
                assert_eq!(spans.len(), 2);
                let (o0, l0) = spans[0];
                assert_eq!(&line[o0..o0 + l0], "alice");
                let (o1, l1) = spans[1];
                assert_eq!(&line[o1..o1 + l1], "5f7ba0f7a15c99e5d9aa9b8b4fa2c4f0");
            }
            Scan::RedactAll => panic!("expected parsed ranges"),
        }
    }

    #[test]
    fn auth_mechanism_line_then_continuation_is_fully_secret() {
        let mut r = SecretRedactor::new();
        r.enable();
        assert_eq!(r.scan("AUTH PLAIN"), Scan::Ranges(Vec::new()));
        assert_eq!(r.scan("AGFsaWNlAHMzY3JldA=="), Scan::Ranges(vec![(0, 21)]));
    }

    #[test]
    fn auth_with_initial_response_redacts_only_the_response() {
        let mut r = SecretRedactor::new();
        r.enable();
        let line = "AUTH PLAIN AGFsaWNlAHMzY3JldA==";
        match r.scan(line) {
            Scan::Ranges(spans) => {
                assert_eq!(spans.len(), 1);
                let (o, l) = spans[0];
                assert_eq!(&line[o..o + l], "AGFsaWNlAHMzY3JldA==");
            }
            Scan::RedactAll => panic!("expected parsed ranges"),
        }
    }

    #[test]
    fn malformed_user_line_fails_closed() {
        let mut r = SecretRedactor::new();
        r.enable();
        assert_eq!(r.scan("USER alice extra"), Scan::RedactAll);
        assert_eq!(r.scan("USER"), Scan::RedactAll);
    }

    #[test]
    fn quit_mid_auth_has_no_secret() {
        let mut r = SecretRedactor::new();
        r.enable();
        assert_eq!(r.scan("QUIT"), Scan::Ranges(Vec::new()));
    }
}
