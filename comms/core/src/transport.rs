// Copyright 2024, The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! The interface transport plugins expose to this crate.
//!
//! Readers and writers are shared handles. Either task of a duplex connection may dispose both directions, and
//! disposing a direction must unblock any read or write that is pending on it.

use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::properties::TransportProperties;

/// The reading half of a transport connection
#[async_trait]
pub trait TransportConnectionReader: Send + Sync {
    /// Reads up to `buf.len()` bytes from the raw stream. Returns `Ok(0)` at the end of the stream.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Closes the reader. `exception` is true if the connection failed, `recognised` tells the plugin whether the
    /// stream tag was recognised, which a plugin may use to decide whether to keep accepting from the remote peer.
    async fn dispose(&self, exception: bool, recognised: bool) -> io::Result<()>;
}

/// The writing half of a transport connection
#[async_trait]
pub trait TransportConnectionWriter: Send + Sync {
    /// The maximum time a packet may take to reach the remote peer over this transport
    fn max_latency(&self) -> Duration;

    /// The maximum time a duplex connection may be idle before the transport considers it dead
    fn max_idle_time(&self) -> Duration;

    /// True if it is cheap to send duplicate data over this transport and data may be lost, in which case outgoing
    /// simplex sessions retransmit eagerly
    fn is_lossy_and_cheap(&self) -> bool;

    async fn write(&self, buf: &[u8]) -> io::Result<()>;

    async fn flush(&self) -> io::Result<()>;

    async fn dispose(&self, exception: bool) -> io::Result<()>;
}

pub type TransportReader = Arc<dyn TransportConnectionReader>;
pub type TransportWriter = Arc<dyn TransportConnectionWriter>;

/// A bidirectional transport connection
#[derive(Clone)]
pub struct DuplexTransportConnection {
    reader: TransportReader,
    writer: TransportWriter,
    remote_properties: TransportProperties,
}

impl DuplexTransportConnection {
    pub fn new(reader: TransportReader, writer: TransportWriter, remote_properties: TransportProperties) -> Self {
        Self {
            reader,
            writer,
            remote_properties,
        }
    }

    pub fn reader(&self) -> &TransportReader {
        &self.reader
    }

    pub fn writer(&self) -> &TransportWriter {
        &self.writer
    }

    /// Transport properties of the remote peer that were discovered from this connection, for example the address
    /// an incoming connection came from
    pub fn remote_properties(&self) -> &TransportProperties {
        &self.remote_properties
    }
}

/// Fill `buf` from the reader, failing with `UnexpectedEof` if the stream ends first
pub async fn read_fully(reader: &dyn TransportConnectionReader, buf: &mut [u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < buf.len() {
        let n = reader.read(&mut buf[offset..]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {} of {} bytes", offset, buf.len()),
            ));
        }
        offset += n;
    }
    Ok(())
}
