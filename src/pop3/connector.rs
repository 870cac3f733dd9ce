/*
 * connector.rs
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

//! Resolves `ConnectOptions` into a live, greeted `Engine`: picks plain vs.
//! implicit TLS, and drives the `STLS` upgrade-in-place sequence when asked
//! for (or when `Auto` falls back to it).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::Pop3Error;
use crate::net::{self, PlainStream, TlsStreamWrapper};
use crate::options::{ConnectOptions, SecurityOptions};
use crate::pop3::capabilities::Capability;
use crate::pop3::engine::Engine;

/// The stream backing a connected `Engine`: plain TCP until (and unless) an
/// `STLS` upgrade replaces it with TLS in place.
pub enum Pop3Stream {
    Plain(PlainStream),
    Tls(TlsStreamWrapper),
}

impl AsyncRead for Pop3Stream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Pop3Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Pop3Stream::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Pop3Stream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Pop3Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Pop3Stream::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Pop3Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Pop3Stream::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Pop3Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Pop3Stream::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Connect, read the greeting, and — per `options.security` — arrive at the
/// requested transport security before returning the ready-to-authenticate
/// `Engine`.
///
/// `StartTls`/`StartTlsWhenAvailable`/`Auto`-resolved-to-`StartTls...` all
/// follow the same CAPA -> STLS -> CAPA sequence: capabilities must be
/// re-queried after the upgrade since a server may only advertise some
/// extensions (e.g. `SASL` mechanisms requiring confidentiality) once TLS is
/// in place.
pub async fn connect(options: &ConnectOptions) -> Result<Engine<Pop3Stream>, Pop3Error> {
    let security = options.security.resolve(options.port);
    let mut engine: Engine<Pop3Stream> = Engine::new();
    engine.set_timeouts(options.read_timeout, options.write_timeout);

    let stream = match security {
        SecurityOptions::SslOnConnect => {
            let tls = net::connect_implicit_tls(&options.host, options.port)
                .await
                .map_err(Pop3Error::from)?;
            Pop3Stream::Tls(tls)
        }
        _ => {
            let plain = net::connect_plain(&options.host, options.port)
                .await
                .map_err(Pop3Error::from)?;
            Pop3Stream::Plain(plain)
        }
    };
    engine.connect(stream).await?;

    match security {
        SecurityOptions::None | SecurityOptions::SslOnConnect => {}
        SecurityOptions::StartTls => {
            engine.query_capabilities().await?;
            upgrade_to_tls(&mut engine, &options.host).await?;
            engine.query_capabilities().await?;
        }
        SecurityOptions::StartTlsWhenAvailable => {
            engine.query_capabilities().await?;
            if engine.capabilities().contains(Capability::StartTls) {
                upgrade_to_tls(&mut engine, &options.host).await?;
                engine.query_capabilities().await?;
            }
        }
        SecurityOptions::Auto => unreachable!("resolve() never returns Auto"),
    }

    Ok(engine)
}

async fn upgrade_to_tls(engine: &mut Engine<Pop3Stream>, host: &str) -> Result<(), Pop3Error> {
    if !engine.capabilities().contains(Capability::StartTls) {
        return Err(Pop3Error::NotSupported(Capability::StartTls));
    }
    engine.begin_stls_upgrade().await?;
    let host = host.to_owned();
    engine
        .replace_stream(move |stream| async move {
            match stream {
                Pop3Stream::Plain(plain) => {
                    let tls = plain
                        .upgrade_to_tls(&host)
                        .await
                        .map_err(|e| Pop3Error::TlsHandshake(e.to_string()))?;
                    Ok(Pop3Stream::Tls(tls))
                }
                Pop3Stream::Tls(_) => Err(Pop3Error::state("stream is already TLS")),
            }
        })
        .await
}
