/*
 * parser.rs
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

//! Pure, allocation-light parsers for POP3 status lines and the line
//! formats nested inside multi-line responses (`CAPA`, `LIST`, `UIDL`,
//! `LANG`). None of these touch the network; `Engine` drives the reads and
//! hands lines here for classification.

use crate::pop3::capabilities::{Capabilities, Capability, ExpirePolicy};

/// Classification of a single POP3 status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    /// A SASL continuation (`+ <b64>`).
    Continue,
}

/// Classify a status line's leading token. Anything other than `+OK`,
/// `-ERR`, or `+` is a protocol violation the caller should treat as fatal.
pub fn classify(line: &str) -> Option<Status> {
    if line.starts_with("+OK") {
        Some(Status::Ok)
    } else if line.starts_with("-ERR") {
        Some(Status::Error)
    } else if line.starts_with('+') {
        Some(Status::Continue)
    } else {
        None
    }
}

/// The free text following the status token (trimmed).
pub fn status_text(line: &str) -> &str {
    let rest = line
        .strip_prefix("+OK")
        .or_else(|| line.strip_prefix("-ERR"))
        .or_else(|| line.strip_prefix('+'))
        .unwrap_or(line);
    rest.trim()
}

/// Extract the APOP timestamp token (including the angle brackets) from a
/// greeting line, if present.
pub fn parse_greeting_apop_token(line: &str) -> Option<String> {
    let start = line.find('<')?;
    let end = line[start..].find('>')? + start;
    Some(line[start..=end].to_string())
}

/// Apply one line of a `CAPA` response body to `caps`/`meta`.
pub fn parse_capa_line(line: &str, caps: &mut Capabilities, meta: &mut crate::pop3::capabilities::ServerMetadata) {
    let mut parts = line.split_whitespace();
    let Some(token) = parts.next() else { return };
    match token.to_ascii_uppercase().as_str() {
        "EXPIRE" => {
            caps.enable(Capability::Expire);
            meta.expire = match parts.next() {
                Some(v) if v.eq_ignore_ascii_case("NEVER") => Some(ExpirePolicy::Never),
                Some(v) => v.parse::<u32>().ok().map(|d| {
                    if d == 0 {
                        ExpirePolicy::PerSession
                    } else {
                        ExpirePolicy::Days(d)
                    }
                }),
                None => None,
            };
        }
        "IMPLEMENTATION" => {
            let rest: Vec<&str> = parts.collect();
            meta.implementation = Some(rest.join(" "));
        }
        "LANG" => caps.enable(Capability::Lang),
        "LOGIN-DELAY" => {
            caps.enable(Capability::LoginDelay);
            meta.login_delay_secs = parts.next().and_then(|v| v.parse().ok());
        }
        "PIPELINING" => caps.enable(Capability::Pipelining),
        "RESP-CODES" => caps.enable(Capability::ResponseCodes),
        "STLS" => caps.enable(Capability::StartTls),
        "TOP" => caps.enable(Capability::Top),
        "UIDL" => caps.enable(Capability::Uidl),
        "USER" => caps.enable(Capability::User),
        "SASL" => {
            caps.enable(Capability::Sasl);
            meta.auth_mechanisms = parts.map(|m| m.to_ascii_uppercase()).collect();
        }
        "UTF8" => {
            caps.enable(Capability::Utf8);
            if parts.next().is_some_and(|v| v.eq_ignore_ascii_case("USER")) {
                caps.enable(Capability::Utf8User);
            }
        }
        _ => {}
    }
}

/// A `LIST` body line: `seqid size`.
pub fn parse_list_line(line: &str) -> Result<(u32, u64), &'static str> {
    let mut parts = line.split_whitespace();
    let seqid: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or("missing sequence id")?;
    let size: u64 = parts.next().and_then(|s| s.parse().ok()).ok_or("missing size")?;
    if seqid == 0 {
        return Err("sequence id must be positive");
    }
    Ok((seqid, size))
}

/// A `UIDL` body line: `seqid uid`.
pub fn parse_uidl_line(line: &str) -> Result<(u32, String), &'static str> {
    let mut parts = line.splitn(2, ' ');
    let seqid: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or("missing sequence id")?;
    let uid = parts.next().ok_or("missing uid")?.trim().to_string();
    if seqid == 0 {
        return Err("sequence id must be positive");
    }
    if uid.is_empty() {
        return Err("empty uid");
    }
    Ok((seqid, uid))
}

/// A `LANG` body line: `code description`.
pub fn parse_lang_line(line: &str) -> Result<(String, String), &'static str> {
    let mut parts = line.splitn(2, ' ');
    let code = parts.next().ok_or("missing language code")?.to_string();
    let description = parts.next().unwrap_or("").trim().to_string();
    if code.is_empty() {
        return Err("empty language code");
    }
    Ok((code, description))
}

/// `STAT`'s single-line response: `count size`.
pub fn parse_stat(status_text: &str) -> Result<(u32, u64), &'static str> {
    let mut parts = status_text.split_whitespace();
    let count: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or("missing message count")?;
    let size: u64 = parts.next().and_then(|s| s.parse().ok()).ok_or("missing total size")?;
    Ok((count, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_ok_error_continue() {
        assert_eq!(classify("+OK ready"), Some(Status::Ok));
        assert_eq!(classify("-ERR no such message"), Some(Status::Error));
        assert_eq!(classify("+ VXNlcm5hbWU6"), Some(Status::Continue));
        assert_eq!(classify("HELLO"), None);
    }

    #[test]
    fn greeting_apop_token() {
        let token = parse_greeting_apop_token("+OK POP3 ready <1896.697170952@dbc.mtview.ca.us>");
        assert_eq!(token.as_deref(), Some("<1896.697170952@dbc.mtview.ca.us>"));
        assert_eq!(parse_greeting_apop_token("+OK POP3 ready"), None);
    }

    #[test]
    fn capa_line_sets_flags_and_metadata() {
        let mut caps = Capabilities::empty();
        let mut meta = crate::pop3::capabilities::ServerMetadata::default();
        parse_capa_line("PIPELINING", &mut caps, &mut meta);
        parse_capa_line("UIDL", &mut caps, &mut meta);
        parse_capa_line("SASL PLAIN LOGIN", &mut caps, &mut meta);
        parse_capa_line("EXPIRE NEVER", &mut caps, &mut meta);
        parse_capa_line("UTF8 USER", &mut caps, &mut meta);
        assert!(caps.contains(Capability::Pipelining));
        assert!(caps.contains(Capability::Uidl));
        assert!(caps.contains(Capability::Sasl));
        assert!(caps.contains(Capability::Utf8));
        assert!(caps.contains(Capability::Utf8User));
        assert_eq!(meta.auth_mechanisms, vec!["PLAIN".to_string(), "LOGIN".to_string()]);
        assert_eq!(meta.expire, Some(ExpirePolicy::Never));
    }

    #[test]
    fn list_and_uidl_lines() {
        assert_eq!(parse_list_line("1 320"), Ok((1, 320)));
        assert!(parse_list_line("0 320").is_err());
        assert_eq!(parse_uidl_line("2 QhdPYR:00WBw1Ph7x7"), Ok((2, "QhdPYR:00WBw1Ph7x7".to_string())));
    }

    #[test]
    fn stat_line() {
        assert_eq!(parse_stat("2 320"), Ok((2, 320)));
    }
}
