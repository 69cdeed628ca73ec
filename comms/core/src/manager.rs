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

//! # Connection manager
//!
//! The single entry point used by transport plugins. Each `manage_*` call spawns the task for one connection and
//! returns its [JoinHandle]. Connection tasks never fail: their outcome is visible through
//! [ConnectionEvent](crate::events::ConnectionEvent)s published by the registry and through logs.

use std::{fmt, sync::Arc};

use log::*;
use tokio::task::JoinHandle;

use crate::{
    connection::{
        duplex::{IncomingDuplexSyncConnection, OutgoingDuplexSyncConnection},
        handshake::{IncomingHandshakeConnection, OutgoingHandshakeConnection},
        simplex::{IncomingSimplexSyncConnection, OutgoingSimplexSyncConnection},
        ConnectionContext,
    },
    sync::OutgoingSessionRecord,
    transport::{DuplexTransportConnection, TransportReader, TransportWriter},
    types::{ContactId, PendingContactId, TransportId},
};

const LOG_TARGET: &str = "comms::manager";

/// A connection surfaced by a transport plugin, or a connection this peer has decided to make
pub enum ConnectionKind {
    IncomingSimplex {
        transport_id: TransportId,
        reader: TransportReader,
    },
    OutgoingSimplex {
        contact_id: ContactId,
        transport_id: TransportId,
        writer: TransportWriter,
        session_record: Option<Arc<OutgoingSessionRecord>>,
    },
    IncomingDuplex {
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    },
    OutgoingDuplex {
        contact_id: ContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    },
    IncomingHandshake {
        pending_contact_id: PendingContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    },
    OutgoingHandshake {
        pending_contact_id: PendingContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    },
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ConnectionKind::*;
        match self {
            IncomingSimplex { transport_id, .. } => write!(f, "IncomingSimplex({})", transport_id),
            OutgoingSimplex {
                contact_id,
                transport_id,
                ..
            } => write!(f, "OutgoingSimplex({}, {})", contact_id, transport_id),
            IncomingDuplex { transport_id, .. } => write!(f, "IncomingDuplex({})", transport_id),
            OutgoingDuplex {
                contact_id,
                transport_id,
                ..
            } => write!(f, "OutgoingDuplex({}, {})", contact_id, transport_id),
            IncomingHandshake {
                pending_contact_id,
                transport_id,
                ..
            } => write!(f, "IncomingHandshake({}, {})", pending_contact_id, transport_id),
            OutgoingHandshake {
                pending_contact_id,
                transport_id,
                ..
            } => write!(f, "OutgoingHandshake({}, {})", pending_contact_id, transport_id),
        }
    }
}

#[derive(Clone)]
pub struct ConnectionManager {
    context: Arc<ConnectionContext>,
}

impl ConnectionManager {
    pub fn new(context: ConnectionContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Spawn the task for the connection
    pub fn manage(&self, kind: ConnectionKind) -> JoinHandle<()> {
        debug!(target: LOG_TARGET, "Managing connection: {}", kind);
        let context = self.context.clone();
        match kind {
            ConnectionKind::IncomingSimplex { transport_id, reader } => {
                tokio::spawn(IncomingSimplexSyncConnection::new(context, transport_id, reader).run())
            },
            ConnectionKind::OutgoingSimplex {
                contact_id,
                transport_id,
                writer,
                session_record,
            } => tokio::spawn(
                OutgoingSimplexSyncConnection::new(context, contact_id, transport_id, writer, session_record).run(),
            ),
            ConnectionKind::IncomingDuplex {
                transport_id,
                connection,
            } => tokio::spawn(IncomingDuplexSyncConnection::new(context, transport_id, connection).run()),
            ConnectionKind::OutgoingDuplex {
                contact_id,
                transport_id,
                connection,
            } => tokio::spawn(OutgoingDuplexSyncConnection::new(context, contact_id, transport_id, connection).run()),
            ConnectionKind::IncomingHandshake {
                pending_contact_id,
                transport_id,
                connection,
            } => tokio::spawn(
                IncomingHandshakeConnection::new(context, self.clone(), pending_contact_id, transport_id, connection)
                    .run(),
            ),
            ConnectionKind::OutgoingHandshake {
                pending_contact_id,
                transport_id,
                connection,
            } => tokio::spawn(
                OutgoingHandshakeConnection::new(context, self.clone(), pending_contact_id, transport_id, connection)
                    .run(),
            ),
        }
    }

    pub fn manage_incoming_simplex(&self, transport_id: TransportId, reader: TransportReader) -> JoinHandle<()> {
        self.manage(ConnectionKind::IncomingSimplex { transport_id, reader })
    }

    pub fn manage_incoming_duplex(
        &self,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    ) -> JoinHandle<()> {
        self.manage(ConnectionKind::IncomingDuplex {
            transport_id,
            connection,
        })
    }

    pub fn manage_incoming_handshake(
        &self,
        pending_contact_id: PendingContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    ) -> JoinHandle<()> {
        self.manage(ConnectionKind::IncomingHandshake {
            pending_contact_id,
            transport_id,
            connection,
        })
    }

    pub fn manage_outgoing_simplex(
        &self,
        contact_id: ContactId,
        transport_id: TransportId,
        writer: TransportWriter,
    ) -> JoinHandle<()> {
        self.manage(ConnectionKind::OutgoingSimplex {
            contact_id,
            transport_id,
            writer,
            session_record: None,
        })
    }

    /// Like `manage_outgoing_simplex`, recording the acks and messages sent in `session_record`
    pub fn manage_outgoing_simplex_with_record(
        &self,
        contact_id: ContactId,
        transport_id: TransportId,
        writer: TransportWriter,
        session_record: Arc<OutgoingSessionRecord>,
    ) -> JoinHandle<()> {
        self.manage(ConnectionKind::OutgoingSimplex {
            contact_id,
            transport_id,
            writer,
            session_record: Some(session_record),
        })
    }

    pub fn manage_outgoing_duplex(
        &self,
        contact_id: ContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    ) -> JoinHandle<()> {
        self.manage(ConnectionKind::OutgoingDuplex {
            contact_id,
            transport_id,
            connection,
        })
    }

    pub fn manage_outgoing_handshake(
        &self,
        pending_contact_id: PendingContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    ) -> JoinHandle<()> {
        self.manage(ConnectionKind::OutgoingHandshake {
            pending_contact_id,
            transport_id,
            connection,
        })
    }
}
