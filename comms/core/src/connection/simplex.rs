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

//! Simplex connections carry one stream in one direction and are not tracked by the registry.

use std::sync::Arc;

use log::*;

use super::{dispose_reader, dispose_reader_on_error, dispose_writer, dispose_writer_on_error, ConnectionContext};
use crate::{
    connection::ConnectionError,
    sync::{OutgoingSessionRecord, SyncSession},
    transport::{TransportReader, TransportWriter},
    types::{ContactId, StreamContext, TransportId},
};

const LOG_TARGET: &str = "comms::connection::simplex";

pub struct IncomingSimplexSyncConnection {
    context: Arc<ConnectionContext>,
    transport_id: TransportId,
    reader: TransportReader,
}

impl IncomingSimplexSyncConnection {
    pub fn new(context: Arc<ConnectionContext>, transport_id: TransportId, reader: TransportReader) -> Self {
        Self {
            context,
            transport_id,
            reader,
        }
    }

    pub async fn run(self) {
        match self.run_session().await {
            Ok(()) => dispose_reader(&self.reader, false, true).await,
            Err(err) => {
                match &err {
                    ConnectionError::UnrecognisedTag => {
                        info!(target: LOG_TARGET, "Unrecognised tag on incoming stream over {}", self.transport_id)
                    },
                    err => warn!(
                        target: LOG_TARGET,
                        "Incoming simplex connection over {} failed: {}", self.transport_id, err
                    ),
                }
                dispose_reader_on_error(&self.reader, err.is_recognised()).await;
            },
        }
    }

    async fn run_session(&self) -> Result<(), ConnectionError> {
        let ctx = self
            .context
            .recognise_tag(&self.reader, &self.transport_id)
            .await
            .ok_or(ConnectionError::UnrecognisedTag)?;
        if ctx.contact_id().is_none() {
            return Err(ConnectionError::ProtocolViolation(
                "received rendezvous stream over simplex transport",
            ));
        }
        if ctx.is_handshake_mode() {
            return Err(ConnectionError::ProtocolViolation(
                "received handshake mode stream over simplex transport",
            ));
        }
        let session = self.context.create_incoming_session(&ctx, self.reader.clone(), None)?;
        session.run().await?;
        Ok(())
    }
}

pub struct OutgoingSimplexSyncConnection {
    context: Arc<ConnectionContext>,
    contact_id: ContactId,
    transport_id: TransportId,
    writer: TransportWriter,
    session_record: Option<Arc<OutgoingSessionRecord>>,
}

impl OutgoingSimplexSyncConnection {
    pub fn new(
        context: Arc<ConnectionContext>,
        contact_id: ContactId,
        transport_id: TransportId,
        writer: TransportWriter,
        session_record: Option<Arc<OutgoingSessionRecord>>,
    ) -> Self {
        Self {
            context,
            contact_id,
            transport_id,
            writer,
            session_record,
        }
    }

    pub async fn run(self) {
        match self.run_session().await {
            Ok(()) => dispose_writer(&self.writer, false).await,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "Outgoing simplex connection to {} over {} failed: {}", self.contact_id, self.transport_id, err
                );
                dispose_writer_on_error(&self.writer).await;
            },
        }
    }

    async fn run_session(&self) -> Result<(), ConnectionError> {
        let ctx = self
            .context
            .allocate_stream_context(self.contact_id, &self.transport_id)
            .await?;
        if ctx.is_handshake_mode() {
            return Err(ConnectionError::ProtocolViolation(
                "cannot use handshake mode stream context for simplex connection",
            ));
        }
        let session = self.create_session(&ctx)?;
        session.run().await?;
        Ok(())
    }

    fn create_session(&self, ctx: &StreamContext) -> Result<Box<dyn SyncSession>, ConnectionError> {
        let stream_writer = self
            .context
            .stream_writer_factory
            .create_stream_writer(self.writer.clone(), ctx)?;
        let max_latency = self.writer.max_latency();
        let session = match &self.session_record {
            Some(record) => self.context.sync_session_factory.create_simplex_outgoing_session_with_record(
                self.contact_id,
                &self.transport_id,
                max_latency,
                stream_writer,
                record.clone(),
            ),
            None => self.context.sync_session_factory.create_simplex_outgoing_session(
                self.contact_id,
                &self.transport_id,
                max_latency,
                self.writer.is_lossy_and_cheap(),
                stream_writer,
            ),
        };
        Ok(session)
    }
}
