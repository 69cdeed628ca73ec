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

//! Encrypted, framed streams layered over a transport connection.

use std::io;

use async_trait::async_trait;

use crate::{
    transport::{TransportReader, TransportWriter},
    types::StreamContext,
};

/// Reads the plaintext of one incoming stream
#[async_trait]
pub trait StreamReader: Send {
    /// Reads up to `buf.len()` bytes of plaintext. Returns `Ok(0)` once the end of the stream has been authenticated.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Writes one outgoing stream. The tag and stream header are written before the first frame.
#[async_trait]
pub trait StreamWriter: Send {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Flush buffered frames to the transport. Flushing an empty stream still sends the tag and stream header so that
    /// the remote peer can start reading.
    async fn flush(&mut self) -> io::Result<()>;

    async fn send_end_of_stream(&mut self) -> io::Result<()>;
}

pub trait StreamReaderFactory: Send + Sync {
    /// Wrap the reader in a stream reader for a stream whose tag has already been read
    fn create_stream_reader(&self, reader: TransportReader, ctx: &StreamContext) -> io::Result<Box<dyn StreamReader>>;
}

pub trait StreamWriterFactory: Send + Sync {
    fn create_stream_writer(&self, writer: TransportWriter, ctx: &StreamContext) -> io::Result<Box<dyn StreamWriter>>;
}
