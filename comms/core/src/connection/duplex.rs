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

//! # Duplex connections
//!
//! A duplex transport connection carries one stream in each direction. Each direction is run by its own task so that
//! a blocked read never holds up writing or vice versa. The two tasks share a [DuplexSyncConnection], which lets
//! either of them close the connection:
//!
//! - the incoming task ends when the remote peer closes its stream or the read fails, and then interrupts the
//!   outgoing session,
//! - the outgoing task ends when its session is interrupted or a write fails. A failed write disposes the reader too,
//!   which ends the incoming task.
//!
//! Each direction of the transport connection is disposed exactly once. A failure in either task marks the whole
//! connection as failed, so the incoming task reports it as closed with an exception even if its own session ended
//! cleanly because the reader was disposed under it.
//!
//! The incoming task owns the registry and chooser bookkeeping for the connection.
//!
//! The peer that dialed the connection sends a random [Priority] at the start of its outgoing stream. If both peers
//! dial each other at the same time, both [ConnectionChooser](crate::chooser::ConnectionChooser)s compare the same two
//! priorities and keep the same connection.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Utc;
use log::*;

use super::{
    interrupt::OutgoingSessionSlot,
    DisposeOnce,
    next_connection_id,
    ConnectionContext,
    ConnectionError,
    ConnectionId,
};
use crate::{
    chooser::InterruptibleConnection,
    sync::{PriorityHandler, SyncSession},
    transport::{DuplexTransportConnection, TransportReader, TransportWriter},
    types::{ContactId, Priority, StreamContext, TransportId},
};

const LOG_TARGET: &str = "comms::connection::duplex";

/// State shared by the incoming and outgoing tasks of one duplex connection
pub struct DuplexSyncConnection {
    id: ConnectionId,
    context: Arc<ConnectionContext>,
    transport_id: TransportId,
    connection: DuplexTransportConnection,
    outgoing_session: OutgoingSessionSlot,
    disposal: DisposeOnce,
    failed: AtomicBool,
}

impl DuplexSyncConnection {
    fn new(context: Arc<ConnectionContext>, transport_id: TransportId, connection: DuplexTransportConnection) -> Self {
        Self {
            id: next_connection_id(),
            context,
            transport_id,
            connection,
            outgoing_session: OutgoingSessionSlot::new(),
            disposal: DisposeOnce::new(),
            failed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn transport_id(&self) -> &TransportId {
        &self.transport_id
    }

    fn reader(&self) -> &TransportReader {
        self.connection.reader()
    }

    fn writer(&self) -> &TransportWriter {
        self.connection.writer()
    }

    /// True once either task has failed
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    async fn on_read_error(&self, recognised: bool) {
        self.failed.store(true, Ordering::SeqCst);
        self.disposal.dispose_reader(self.reader(), true, recognised).await;
        self.disposal.dispose_writer(self.writer(), true).await;
        self.interrupt_outgoing_session();
    }

    async fn on_write_error(&self) {
        // Set before the reader is disposed so that the incoming task sees it when its session ends
        self.failed.store(true, Ordering::SeqCst);
        self.disposal.dispose_reader(self.reader(), true, true).await;
        self.disposal.dispose_writer(self.writer(), true).await;
    }

    /// Allocate the outgoing stream context for the contact and create the outgoing session. `priority` is only
    /// given by the peer that dialed the connection.
    async fn create_outgoing_session(
        &self,
        contact_id: ContactId,
        priority: Option<Priority>,
    ) -> Result<Arc<dyn SyncSession>, ConnectionError> {
        let ctx = self.allocate_rotation_stream_context(contact_id).await?;
        let stream_writer = self
            .context
            .stream_writer_factory
            .create_stream_writer(self.writer().clone(), &ctx)?;
        Ok(self.context.sync_session_factory.create_duplex_outgoing_session(
            contact_id,
            &self.transport_id,
            self.writer().max_latency(),
            self.writer().max_idle_time(),
            stream_writer,
            priority,
        ))
    }

    async fn allocate_rotation_stream_context(&self, contact_id: ContactId) -> Result<StreamContext, ConnectionError> {
        let ctx = self
            .context
            .allocate_stream_context(contact_id, &self.transport_id)
            .await?;
        if ctx.is_handshake_mode() {
            return Err(ConnectionError::ProtocolViolation(
                "cannot use handshake mode stream context for duplex connection",
            ));
        }
        Ok(ctx)
    }

    async fn run_outgoing_session(&self, session: Arc<dyn SyncSession>) {
        self.outgoing_session.install(session.clone());
        match session.run().await {
            Ok(()) => self.disposal.dispose_writer(self.writer(), false).await,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "[Conn={}] Outgoing session over {} failed: {}", self.id, self.transport_id, err
                );
                self.on_write_error().await;
            },
        }
    }

    /// Store transport properties discovered from the connection, then run the incoming session
    async fn run_incoming_session(
        &self,
        contact_id: ContactId,
        ctx: &StreamContext,
        priority_handler: Option<PriorityHandler>,
    ) -> Result<(), ConnectionError> {
        let remote_properties = self.connection.remote_properties();
        if !remote_properties.is_empty() {
            self.context
                .transport_property_manager
                .add_remote_properties_from_connection(contact_id, &self.transport_id, remote_properties)
                .await?;
        }
        let session = self
            .context
            .create_incoming_session(ctx, self.reader().clone(), priority_handler)?;
        session.run().await?;
        Ok(())
    }

    /// Clean up after the incoming session ends, successfully or not. Always removes the connection from the chooser
    /// and registry. The connection is reported as failed if either task failed.
    async fn close_incoming(&self, contact_id: ContactId, incoming: bool, result: Result<(), ConnectionError>) {
        let exception = match result {
            Ok(()) if self.has_failed() => {
                debug!(
                    target: LOG_TARGET,
                    "[Conn={}] Incoming session with {} over {} ended after the connection failed",
                    self.id,
                    contact_id,
                    self.transport_id
                );
                self.interrupt_outgoing_session();
                true
            },
            Ok(()) => {
                debug!(
                    target: LOG_TARGET,
                    "[Conn={}] Incoming session with {} over {} ended", self.id, contact_id, self.transport_id
                );
                self.disposal.dispose_reader(self.reader(), false, true).await;
                self.interrupt_outgoing_session();
                false
            },
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "[Conn={}] Incoming session with {} over {} failed: {}", self.id, contact_id, self.transport_id, err
                );
                self.on_read_error(true).await;
                true
            },
        };
        self.context
            .connection_chooser
            .remove_connection(contact_id, self.transport_id.clone(), self.id);
        // Registry misuse is logged by the registry
        let _result = self.context.connection_registry.unregister_connection(
            contact_id,
            self.transport_id.clone(),
            self.id,
            incoming,
            exception,
        );
    }
}

impl InterruptibleConnection for DuplexSyncConnection {
    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    fn interrupt_outgoing_session(&self) {
        self.outgoing_session.interrupt();
    }
}

/// A duplex connection accepted from a remote peer
pub struct IncomingDuplexSyncConnection {
    connection: Arc<DuplexSyncConnection>,
}

impl IncomingDuplexSyncConnection {
    pub fn new(context: Arc<ConnectionContext>, transport_id: TransportId, connection: DuplexTransportConnection) -> Self {
        Self {
            connection: Arc::new(DuplexSyncConnection::new(context, transport_id, connection)),
        }
    }

    pub fn connection(&self) -> &Arc<DuplexSyncConnection> {
        &self.connection
    }

    pub async fn run(self) {
        let conn = self.connection;
        let (contact_id, ctx) = match recognise_contact_stream(&conn).await {
            Ok(v) => v,
            Err(err) => {
                match &err {
                    ConnectionError::UnrecognisedTag => info!(
                        target: LOG_TARGET,
                        "[Conn={}] Unrecognised tag on incoming stream over {}", conn.id, conn.transport_id
                    ),
                    err => warn!(
                        target: LOG_TARGET,
                        "[Conn={}] Incoming duplex connection over {} failed: {}", conn.id, conn.transport_id, err
                    ),
                }
                conn.on_read_error(err.is_recognised()).await;
                return;
            },
        };

        conn.context
            .connection_registry
            .register_connection(contact_id, conn.transport_id.clone(), conn.clone(), true);

        // The remote peer dialed, so it will send the connection's priority at the start of its stream
        let priority_handler: PriorityHandler = {
            let conn = conn.clone();
            Box::new(move |priority| {
                let chooser = conn.context.connection_chooser.clone();
                let transport_id = conn.transport_id.clone();
                chooser.add_connection(contact_id, transport_id, conn, priority);
            })
        };

        tokio::spawn(run_responder_outgoing(conn.clone(), contact_id));

        let result = conn.run_incoming_session(contact_id, &ctx, Some(priority_handler)).await;
        conn.close_incoming(contact_id, true, result).await;
    }
}

/// Recognise the tag of an incoming stream, which must belong to a contact. If the contact's keys are in handshake
/// mode the contact handshake is run first, after which the incoming session uses a freshly allocated rotation mode
/// stream context.
async fn recognise_contact_stream(conn: &DuplexSyncConnection) -> Result<(ContactId, StreamContext), ConnectionError> {
    let ctx = conn
        .context
        .recognise_tag(conn.reader(), &conn.transport_id)
        .await
        .ok_or(ConnectionError::UnrecognisedTag)?;
    let contact_id = ctx.contact_id().ok_or(ConnectionError::ProtocolViolation(
        "received rendezvous stream, expected contact",
    ))?;
    if !ctx.is_handshake_mode() {
        return Ok((contact_id, ctx));
    }

    handshake_contact(conn, contact_id, &ctx).await?;

    let ctx = conn
        .context
        .allocate_stream_context(contact_id, &conn.transport_id)
        .await?;
    if ctx.is_handshake_mode() {
        return Err(ConnectionError::ProtocolViolation(
            "got handshake mode context after handshaking",
        ));
    }
    Ok((contact_id, ctx))
}

async fn handshake_contact(
    conn: &DuplexSyncConnection,
    contact_id: ContactId,
    ctx_in: &StreamContext,
) -> Result<(), ConnectionError> {
    debug!(
        target: LOG_TARGET,
        "[Conn={}] Handshaking with {} over {}", conn.id, contact_id, conn.transport_id
    );
    let ctx_out = conn
        .context
        .allocate_stream_context(contact_id, &conn.transport_id)
        .await?;
    let mut writer = conn
        .context
        .stream_writer_factory
        .create_stream_writer(conn.writer().clone(), &ctx_out)?;
    // Send the outgoing stream header so that the remote peer can start reading
    writer.flush().await?;
    let reader = conn
        .context
        .stream_reader_factory
        .create_stream_reader(conn.reader().clone(), ctx_in)?;
    let result = conn
        .context
        .handshake_manager
        .handshake_contact(contact_id, reader, writer)
        .await?;
    conn.context
        .key_manager
        .add_rotation_keys(
            contact_id,
            result.master_key(),
            Utc::now().timestamp_millis(),
            result.is_alice(),
            true,
        )
        .await?;
    debug!(
        target: LOG_TARGET,
        "[Conn={}] Handshake with {} over {} complete", conn.id, contact_id, conn.transport_id
    );
    Ok(())
}

/// The outgoing task of an accepted connection. This peer did not dial, so no priority is sent.
async fn run_responder_outgoing(conn: Arc<DuplexSyncConnection>, contact_id: ContactId) {
    match conn.create_outgoing_session(contact_id, None).await {
        Ok(session) => conn.run_outgoing_session(session).await,
        Err(err) => {
            warn!(
                target: LOG_TARGET,
                "[Conn={}] Failed to start outgoing session to {} over {}: {}",
                conn.id,
                contact_id,
                conn.transport_id,
                err
            );
            conn.on_write_error().await;
        },
    }
}

/// A duplex connection dialed by this peer
pub struct OutgoingDuplexSyncConnection {
    connection: Arc<DuplexSyncConnection>,
    contact_id: ContactId,
}

impl OutgoingDuplexSyncConnection {
    pub fn new(
        context: Arc<ConnectionContext>,
        contact_id: ContactId,
        transport_id: TransportId,
        connection: DuplexTransportConnection,
    ) -> Self {
        Self {
            connection: Arc::new(DuplexSyncConnection::new(context, transport_id, connection)),
            contact_id,
        }
    }

    pub fn connection(&self) -> &Arc<DuplexSyncConnection> {
        &self.connection
    }

    pub async fn run(self) {
        let conn = self.connection;
        let contact_id = self.contact_id;
        let priority = Priority::random();
        trace!(
            target: LOG_TARGET,
            "[Conn={}] Dialed {} over {} with {:?}", conn.id, contact_id, conn.transport_id, priority
        );

        let session = match conn.create_outgoing_session(contact_id, Some(priority.clone())).await {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    "[Conn={}] Failed to start outgoing session to {} over {}: {}",
                    conn.id,
                    contact_id,
                    conn.transport_id,
                    err
                );
                conn.on_write_error().await;
                return;
            },
        };

        tokio::spawn(run_dialer_incoming(conn.clone(), contact_id, priority));

        conn.run_outgoing_session(session).await;
    }
}

/// The incoming task of a dialed connection. The returning stream must belong to the contact that was dialed.
async fn run_dialer_incoming(conn: Arc<DuplexSyncConnection>, contact_id: ContactId, priority: Priority) {
    let ctx = match recognise_returning_stream(&conn, contact_id).await {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(
                target: LOG_TARGET,
                "[Conn={}] Returning stream from {} over {} rejected: {}", conn.id, contact_id, conn.transport_id, err
            );
            conn.on_read_error(true).await;
            return;
        },
    };

    conn.context
        .connection_registry
        .register_connection(contact_id, conn.transport_id.clone(), conn.clone(), false);
    conn.context
        .connection_chooser
        .add_connection(contact_id, conn.transport_id.clone(), conn.clone(), priority);

    let result = conn.run_incoming_session(contact_id, &ctx, None).await;
    conn.close_incoming(contact_id, false, result).await;
}

async fn recognise_returning_stream(
    conn: &DuplexSyncConnection,
    contact_id: ContactId,
) -> Result<StreamContext, ConnectionError> {
    // We dialed this connection, so an unrecognised tag is not just an unknown peer
    let ctx = conn
        .context
        .recognise_tag(conn.reader(), &conn.transport_id)
        .await
        .ok_or(ConnectionError::ProtocolViolation("unrecognised tag on returning stream"))?;
    if ctx.contact_id() != Some(contact_id) {
        return Err(ConnectionError::ProtocolViolation(
            "wrong contact id on returning stream",
        ));
    }
    if ctx.is_handshake_mode() {
        return Err(ConnectionError::ProtocolViolation(
            "received handshake mode stream on returning stream",
        ));
    }
    Ok(ctx)
}
