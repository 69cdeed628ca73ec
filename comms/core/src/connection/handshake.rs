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

//! # Handshake connections
//!
//! First contact with a pending contact over a duplex transport connection. Both peers start a stream keyed for the
//! pending contact, run the key agreement handshake over those streams, exchange contacts and then hand the same
//! transport connection to the [ConnectionManager] as an ordinary duplex connection to the new contact.
//!
//! If both peers connect to each other at the same time, the second connection to reach the registry is redundant
//! and is closed without error.

use std::sync::Arc;

use log::*;

use super::{ConnectionContext, DisposeOnce};
use crate::{
    connection::ConnectionError,
    handshake::Contact,
    manager::ConnectionManager,
    stream::{StreamReader, StreamWriter},
    transport::DuplexTransportConnection,
    types::{PendingContactId, StreamContext, TransportId},
};

const LOG_TARGET: &str = "comms::connection::handshake";

enum HandshakeOutcome {
    Completed(Contact),
    /// A rendezvous connection to the pending contact is already in progress
    Redundant,
}

/// Shared by both directions of handshake connection
struct HandshakeConnection {
    context: Arc<ConnectionContext>,
    manager: ConnectionManager,
    pending_contact_id: PendingContactId,
    transport_id: TransportId,
    connection: DuplexTransportConnection,
    disposal: DisposeOnce,
}

impl HandshakeConnection {
    fn new(
        context: Arc<ConnectionContext>,
        manager: ConnectionManager,
        pending_contact_id: PendingContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    ) -> Self {
        Self {
            context,
            manager,
            pending_contact_id,
            transport_id,
            connection,
            disposal: DisposeOnce::new(),
        }
    }

    async fn on_error(&self, recognised: bool) {
        self.disposal
            .dispose_reader(self.connection.reader(), true, recognised)
            .await;
        self.disposal.dispose_writer(self.connection.writer(), true).await;
    }

    async fn close_redundant(&self) {
        info!(
            target: LOG_TARGET,
            "Redundant rendezvous connection to {} over {}", self.pending_contact_id, self.transport_id
        );
        self.disposal
            .dispose_reader(self.connection.reader(), false, true)
            .await;
        self.disposal.dispose_writer(self.connection.writer(), false).await;
    }

    fn check_pending_contact(&self, ctx: &StreamContext) -> Result<(), ConnectionError> {
        match ctx.pending_contact_id() {
            Some(pending_contact_id) if pending_contact_id == self.pending_contact_id => Ok(()),
            Some(_) => Err(ConnectionError::ProtocolViolation("wrong pending contact id")),
            None => Err(ConnectionError::ProtocolViolation(
                "expected rendezvous tag, got contact tag",
            )),
        }
    }

    async fn allocate_outgoing_stream(&self) -> Result<Box<dyn StreamWriter>, ConnectionError> {
        let ctx = self
            .context
            .allocate_pending_stream_context(&self.pending_contact_id, &self.transport_id)
            .await?;
        let writer = self
            .context
            .stream_writer_factory
            .create_stream_writer(self.connection.writer().clone(), &ctx)?;
        Ok(writer)
    }

    /// Deduplicate, handshake and exchange contacts. The pending contact is unregistered from the registry on every
    /// path that registered it.
    async fn handshake(
        &self,
        reader: Box<dyn StreamReader>,
        writer: Box<dyn StreamWriter>,
    ) -> Result<HandshakeOutcome, ConnectionError> {
        let registry = &self.context.connection_registry;
        if !registry.register_pending_contact(self.pending_contact_id) {
            return Ok(HandshakeOutcome::Redundant);
        }
        let result = self.handshake_and_exchange_contacts(reader, writer).await;
        // Registry misuse is logged by the registry
        let _result = registry.unregister_pending_contact(self.pending_contact_id, result.is_ok());
        result.map(HandshakeOutcome::Completed)
    }

    async fn handshake_and_exchange_contacts(
        &self,
        reader: Box<dyn StreamReader>,
        writer: Box<dyn StreamWriter>,
    ) -> Result<Contact, ConnectionError> {
        let result = self
            .context
            .handshake_manager
            .handshake_pending_contact(&self.pending_contact_id, reader, writer)
            .await?;
        let contact = self
            .context
            .contact_exchange_manager
            .exchange_contacts(
                &self.pending_contact_id,
                &self.connection,
                result.master_key(),
                result.is_alice(),
                false,
            )
            .await?;
        info!(
            target: LOG_TARGET,
            "Pending contact {} is now {} over {}", self.pending_contact_id, contact.id(), self.transport_id
        );
        Ok(contact)
    }
}

/// A rendezvous connection accepted from a pending contact
pub struct IncomingHandshakeConnection {
    inner: HandshakeConnection,
}

impl IncomingHandshakeConnection {
    pub fn new(
        context: Arc<ConnectionContext>,
        manager: ConnectionManager,
        pending_contact_id: PendingContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    ) -> Self {
        Self {
            inner: HandshakeConnection::new(context, manager, pending_contact_id, transport_id, connection),
        }
    }

    pub async fn run(self) {
        let conn = self.inner;
        match run_incoming(&conn).await {
            Ok(HandshakeOutcome::Completed(_contact)) => {
                // The remote peer starts a new stream with the contact's keys on the same connection
                conn.manager
                    .manage_incoming_duplex(conn.transport_id.clone(), conn.connection.clone());
            },
            Ok(HandshakeOutcome::Redundant) => conn.close_redundant().await,
            Err(err) => {
                match &err {
                    ConnectionError::UnrecognisedTag => info!(
                        target: LOG_TARGET,
                        "Unrecognised tag on rendezvous connection over {}", conn.transport_id
                    ),
                    err => warn!(
                        target: LOG_TARGET,
                        "Incoming handshake with {} over {} failed: {}", conn.pending_contact_id, conn.transport_id, err
                    ),
                }
                conn.on_error(err.is_recognised()).await;
            },
        }
    }
}

async fn run_incoming(conn: &HandshakeConnection) -> Result<HandshakeOutcome, ConnectionError> {
    let ctx_in = conn
        .context
        .recognise_tag(conn.connection.reader(), &conn.transport_id)
        .await
        .ok_or(ConnectionError::UnrecognisedTag)?;
    conn.check_pending_contact(&ctx_in)?;
    let mut writer = conn.allocate_outgoing_stream().await?;
    // Send the outgoing stream header so that the remote peer can start reading
    writer.flush().await?;
    let reader = conn
        .context
        .stream_reader_factory
        .create_stream_reader(conn.connection.reader().clone(), &ctx_in)?;
    conn.handshake(reader, writer).await
}

/// A rendezvous connection dialed by this peer
pub struct OutgoingHandshakeConnection {
    inner: HandshakeConnection,
}

impl OutgoingHandshakeConnection {
    pub fn new(
        context: Arc<ConnectionContext>,
        manager: ConnectionManager,
        pending_contact_id: PendingContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    ) -> Self {
        Self {
            inner: HandshakeConnection::new(context, manager, pending_contact_id, transport_id, connection),
        }
    }

    pub async fn run(self) {
        let conn = self.inner;
        match run_outgoing(&conn).await {
            Ok(HandshakeOutcome::Completed(contact)) => {
                conn.manager
                    .manage_outgoing_duplex(contact.id(), conn.transport_id.clone(), conn.connection.clone());
            },
            Ok(HandshakeOutcome::Redundant) => conn.close_redundant().await,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "Outgoing handshake with {} over {} failed: {}", conn.pending_contact_id, conn.transport_id, err
                );
                conn.on_error(true).await;
            },
        }
    }
}

async fn run_outgoing(conn: &HandshakeConnection) -> Result<HandshakeOutcome, ConnectionError> {
    let mut writer = conn.allocate_outgoing_stream().await?;
    writer.flush().await?;
    // We dialed this connection, so an unrecognised tag is not just an unknown peer
    let ctx_in = conn
        .context
        .recognise_tag(conn.connection.reader(), &conn.transport_id)
        .await
        .ok_or(ConnectionError::ProtocolViolation("unrecognised tag on returning stream"))?;
    conn.check_pending_contact(&ctx_in)?;
    let reader = conn
        .context
        .stream_reader_factory
        .create_stream_reader(conn.connection.reader().clone(), &ctx_in)?;
    conn.handshake(reader, writer).await
}
