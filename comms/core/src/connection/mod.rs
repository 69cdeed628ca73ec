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

//! # Connections
//!
//! Every connection direction runs as its own task. The shared steps of those tasks live here as methods of
//! [ConnectionContext], which bundles the collaborators every connection needs:
//!
//! - recognising the tag at the head of an incoming stream,
//! - allocating stream contexts for outgoing streams,
//! - wrapping readers in incoming sync sessions,
//! - disposing readers and writers without failing.
//!
//! The tasks themselves are in [simplex], [duplex] and [handshake].

mod error;
pub use error::ConnectionError;

pub mod duplex;
pub mod handshake;
mod interrupt;
pub mod simplex;


use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use log::*;

use crate::{
    chooser::ConnectionChooser,
    handshake::{ContactExchangeManager, HandshakeManager},
    key_manager::KeyManager,
    properties::TransportPropertyManager,
    registry::ConnectionRegistry,
    stream::{StreamReaderFactory, StreamWriterFactory},
    sync::{PriorityHandler, SyncSession, SyncSessionFactory},
    transport::{read_fully, TransportReader, TransportWriter},
    types::{ContactId, PendingContactId, StreamContext, Tag, TransportId, TAG_LENGTH},
};

const LOG_TARGET: &str = "comms::connection";

/// Process-unique identifier of a duplex connection
pub type ConnectionId = usize;

static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn next_connection_id() -> ConnectionId {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed) // Monotonic
}

/// The collaborators shared by all connection tasks
#[derive(Clone)]
pub struct ConnectionContext {
    pub key_manager: Arc<dyn KeyManager>,
    pub stream_reader_factory: Arc<dyn StreamReaderFactory>,
    pub stream_writer_factory: Arc<dyn StreamWriterFactory>,
    pub sync_session_factory: Arc<dyn SyncSessionFactory>,
    pub handshake_manager: Arc<dyn HandshakeManager>,
    pub contact_exchange_manager: Arc<dyn ContactExchangeManager>,
    pub transport_property_manager: Arc<dyn TransportPropertyManager>,
    pub connection_registry: Arc<ConnectionRegistry>,
    pub connection_chooser: Arc<ConnectionChooser>,
}

impl ConnectionContext {
    /// Read the tag at the head of the stream and look up its stream context. Returns `None` if the tag is not
    /// recognised or cannot be read.
    pub(crate) async fn recognise_tag(
        &self,
        reader: &TransportReader,
        transport_id: &TransportId,
    ) -> Option<StreamContext> {
        let mut tag: Tag = [0u8; TAG_LENGTH];
        if let Err(err) = read_fully(reader.as_ref(), &mut tag).await {
            debug!(target: LOG_TARGET, "Failed to read tag over {}: {}", transport_id, err);
            return None;
        }
        match self.key_manager.get_stream_context_for_tag(transport_id, &tag).await {
            Ok(ctx) => ctx,
            Err(err) => {
                warn!(target: LOG_TARGET, "Failed to look up tag over {}: {}", transport_id, err);
                None
            },
        }
    }

    pub(crate) async fn allocate_stream_context(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
    ) -> Result<StreamContext, ConnectionError> {
        self.key_manager
            .get_stream_context_for_contact(contact_id, transport_id)
            .await?
            .ok_or(ConnectionError::StreamContextUnavailable)
    }

    pub(crate) async fn allocate_pending_stream_context(
        &self,
        pending_contact_id: &PendingContactId,
        transport_id: &TransportId,
    ) -> Result<StreamContext, ConnectionError> {
        self.key_manager
            .get_stream_context_for_pending_contact(pending_contact_id, transport_id)
            .await?
            .ok_or(ConnectionError::StreamContextUnavailable)
    }

    /// Wrap the reader in a stream reader and create an incoming sync session for the context's contact
    pub(crate) fn create_incoming_session(
        &self,
        ctx: &StreamContext,
        reader: TransportReader,
        priority_handler: Option<PriorityHandler>,
    ) -> Result<Box<dyn SyncSession>, ConnectionError> {
        let contact_id = ctx
            .contact_id()
            .ok_or(ConnectionError::ProtocolViolation("sync session requires a contact"))?;
        let stream_reader = self.stream_reader_factory.create_stream_reader(reader, ctx)?;
        Ok(self
            .sync_session_factory
            .create_incoming_session(contact_id, stream_reader, priority_handler))
    }
}

pub(crate) async fn dispose_reader(reader: &TransportReader, exception: bool, recognised: bool) {
    if let Err(err) = reader.dispose(exception, recognised).await {
        warn!(target: LOG_TARGET, "Failed to dispose reader: {}", err);
    }
}

pub(crate) async fn dispose_reader_on_error(reader: &TransportReader, recognised: bool) {
    dispose_reader(reader, true, recognised).await
}

pub(crate) async fn dispose_writer(writer: &TransportWriter, exception: bool) {
    if let Err(err) = writer.dispose(exception).await {
        warn!(target: LOG_TARGET, "Failed to dispose writer: {}", err);
    }
}

pub(crate) async fn dispose_writer_on_error(writer: &TransportWriter) {
    dispose_writer(writer, true).await
}

/// Disposes each direction of a duplex transport connection at most once. Whichever task disposes a direction first
/// decides the `exception` flag the transport sees, later disposals of that direction are ignored.
#[derive(Debug, Default)]
pub(crate) struct DisposeOnce {
    reader_disposed: AtomicBool,
    writer_disposed: AtomicBool,
}

impl DisposeOnce {
    pub fn new() -> Self {
        Default::default()
    }

    pub async fn dispose_reader(&self, reader: &TransportReader, exception: bool, recognised: bool) {
        if self.reader_disposed.swap(true, Ordering::SeqCst) {
            trace!(target: LOG_TARGET, "Reader already disposed");
            return;
        }
        dispose_reader(reader, exception, recognised).await;
    }

    pub async fn dispose_writer(&self, writer: &TransportWriter, exception: bool) {
        if self.writer_disposed.swap(true, Ordering::SeqCst) {
            trace!(target: LOG_TARGET, "Writer already disposed");
            return;
        }
        dispose_writer(writer, exception).await;
    }
}
