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

//! In-memory collaborators that record how they are called.

use std::{
    cmp,
    collections::{HashMap, VecDeque},
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    chooser::{ConnectionChooser, InterruptibleConnection},
    config::ConnectionRegistryConfig,
    connection::{ConnectionContext, ConnectionId},
    handshake::{
        Contact,
        ContactExchangeError,
        ContactExchangeManager,
        HandshakeError,
        HandshakeManager,
        HandshakeResult,
    },
    key_manager::{KeyManager, KeyManagerError},
    manager::ConnectionManager,
    properties::{TransportProperties, TransportPropertyError, TransportPropertyManager},
    registry::ConnectionRegistry,
    stream::{StreamReader, StreamReaderFactory, StreamWriter, StreamWriterFactory},
    sync::{OutgoingSessionRecord, PriorityHandler, SyncSession, SyncSessionFactory},
    transport::{
        DuplexTransportConnection,
        TransportConnectionReader,
        TransportConnectionWriter,
        TransportReader,
        TransportWriter,
    },
    types::{ContactId, PendingContactId, Priority, SecretKey, StreamContext, Tag, TransportId},
};

/// Counts how often its outgoing session is interrupted
pub struct MockConnection {
    id: ConnectionId,
    interrupts: AtomicUsize,
}

impl MockConnection {
    pub fn new(id: ConnectionId) -> Arc<Self> {
        Arc::new(Self {
            id,
            interrupts: AtomicUsize::new(0),
        })
    }

    pub fn interrupt_count(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }
}

impl InterruptibleConnection for MockConnection {
    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    fn interrupt_outgoing_session(&self) {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reads from a fixed buffer. A reader that is held open blocks at the end of the buffer until it is closed or
/// disposed, like a socket whose peer has not hung up.
pub struct MockTransportReader {
    data: Mutex<VecDeque<u8>>,
    chunk_size: usize,
    hold_open: bool,
    closed: AtomicBool,
    close_notify: Notify,
    disposals: Mutex<Vec<(bool, bool)>>,
}

impl MockTransportReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_chunk_size(data, usize::MAX)
    }

    /// Returns at most `chunk_size` bytes from each read
    pub fn with_chunk_size(data: Vec<u8>, chunk_size: usize) -> Self {
        Self {
            data: Mutex::new(data.into()),
            chunk_size,
            hold_open: false,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            disposals: Mutex::new(Vec::new()),
        }
    }

    pub fn held_open(data: Vec<u8>) -> Self {
        Self {
            hold_open: true,
            ..Self::new(data)
        }
    }

    /// Simulate the remote peer closing its end
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_notify.notify_one();
    }

    /// `(exception, recognised)` for every call to dispose
    pub fn disposals(&self) -> Vec<(bool, bool)> {
        self.disposals.lock().unwrap().clone()
    }

    pub fn is_disposed(&self) -> bool {
        !self.disposals.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl TransportConnectionReader for MockTransportReader {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            {
                let mut data = self.data.lock().unwrap();
                if !data.is_empty() {
                    let n = cmp::min(cmp::min(buf.len(), self.chunk_size), data.len());
                    for (i, byte) in data.drain(..n).enumerate() {
                        buf[i] = byte;
                    }
                    return Ok(n);
                }
            }
            if !self.hold_open || self.closed.load(Ordering::SeqCst) {
                return Ok(0);
            }
            self.close_notify.notified().await;
        }
    }

    async fn dispose(&self, exception: bool, recognised: bool) -> io::Result<()> {
        self.disposals.lock().unwrap().push((exception, recognised));
        self.close();
        Ok(())
    }
}

pub struct MockTransportWriter {
    written: Mutex<Vec<u8>>,
    flush_count: AtomicUsize,
    disposals: Mutex<Vec<bool>>,
    lossy_and_cheap: bool,
}

impl MockTransportWriter {
    pub fn new() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            flush_count: AtomicUsize::new(0),
            disposals: Mutex::new(Vec::new()),
            lossy_and_cheap: false,
        }
    }

    pub fn lossy_and_cheap() -> Self {
        Self {
            lossy_and_cheap: true,
            ..Self::new()
        }
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }

    /// `exception` for every call to dispose
    pub fn disposals(&self) -> Vec<bool> {
        self.disposals.lock().unwrap().clone()
    }

    pub fn is_disposed(&self) -> bool {
        !self.disposals.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl TransportConnectionWriter for MockTransportWriter {
    fn max_latency(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn max_idle_time(&self) -> Duration {
        Duration::from_secs(60)
    }

    fn is_lossy_and_cheap(&self) -> bool {
        self.lossy_and_cheap
    }

    async fn write(&self, buf: &[u8]) -> io::Result<()> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&self) -> io::Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self, exception: bool) -> io::Result<()> {
        self.disposals.lock().unwrap().push(exception);
        Ok(())
    }
}

/// A duplex connection over a mock reader and writer, and the mocks themselves so that tests can inspect them
pub fn create_duplex_connection(
    incoming_data: Vec<u8>,
) -> (DuplexTransportConnection, Arc<MockTransportReader>, Arc<MockTransportWriter>) {
    let reader = Arc::new(MockTransportReader::held_open(incoming_data));
    let writer = Arc::new(MockTransportWriter::new());
    let mut remote_properties = TransportProperties::new();
    remote_properties.insert("address", "10.0.0.1:4242");
    let connection = DuplexTransportConnection::new(reader.clone(), writer.clone(), remote_properties);
    (connection, reader, writer)
}

struct MockStreamReader {
    reader: TransportReader,
}

#[async_trait]
impl StreamReader for MockStreamReader {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf).await
    }
}

struct MockStreamWriter {
    writer: TransportWriter,
}

#[async_trait]
impl StreamWriter for MockStreamWriter {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write(buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }

    async fn send_end_of_stream(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}

#[derive(Default)]
pub struct MockStreamFactory {
    reader_contexts: Mutex<Vec<StreamContext>>,
    writer_contexts: Mutex<Vec<StreamContext>>,
}

impl MockStreamFactory {
    pub fn reader_contexts(&self) -> Vec<StreamContext> {
        self.reader_contexts.lock().unwrap().clone()
    }

    pub fn writer_contexts(&self) -> Vec<StreamContext> {
        self.writer_contexts.lock().unwrap().clone()
    }
}

impl StreamReaderFactory for MockStreamFactory {
    fn create_stream_reader(&self, reader: TransportReader, ctx: &StreamContext) -> io::Result<Box<dyn StreamReader>> {
        self.reader_contexts.lock().unwrap().push(ctx.clone());
        Ok(Box::new(MockStreamReader { reader }))
    }
}

impl StreamWriterFactory for MockStreamFactory {
    fn create_stream_writer(&self, writer: TransportWriter, ctx: &StreamContext) -> io::Result<Box<dyn StreamWriter>> {
        self.writer_contexts.lock().unwrap().push(ctx.clone());
        Ok(Box::new(MockStreamWriter { writer }))
    }
}

/// Recognises scripted tags and hands out scripted outgoing stream contexts, each of them once
#[derive(Default)]
pub struct MockKeyManager {
    tags: Mutex<HashMap<Tag, StreamContext>>,
    outgoing: Mutex<Vec<StreamContext>>,
    calls: Mutex<Vec<String>>,
}

impl MockKeyManager {
    pub fn add_tag(&self, tag: Tag, ctx: StreamContext) {
        self.tags.lock().unwrap().insert(tag, ctx);
    }

    pub fn add_outgoing_context(&self, ctx: StreamContext) {
        self.outgoing.lock().unwrap().push(ctx);
    }

    pub fn take_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().drain(..).collect()
    }

    pub fn count_calls_containing(&self, pat: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.contains(pat)).count()
    }

    fn add_call(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_outgoing<F: Fn(&StreamContext) -> bool>(&self, predicate: F) -> Option<StreamContext> {
        let mut outgoing = self.outgoing.lock().unwrap();
        let pos = outgoing.iter().position(predicate)?;
        Some(outgoing.remove(pos))
    }
}

#[async_trait]
impl KeyManager for MockKeyManager {
    async fn get_stream_context_for_contact(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
    ) -> Result<Option<StreamContext>, KeyManagerError> {
        self.add_call(format!("get_stream_context_for_contact({}, {})", contact_id, transport_id));
        Ok(self.take_outgoing(|ctx| ctx.contact_id() == Some(contact_id) && ctx.transport_id() == transport_id))
    }

    async fn get_stream_context_for_pending_contact(
        &self,
        pending_contact_id: &PendingContactId,
        transport_id: &TransportId,
    ) -> Result<Option<StreamContext>, KeyManagerError> {
        self.add_call(format!(
            "get_stream_context_for_pending_contact({}, {})",
            pending_contact_id, transport_id
        ));
        Ok(self.take_outgoing(|ctx| {
            ctx.pending_contact_id() == Some(*pending_contact_id) && ctx.transport_id() == transport_id
        }))
    }

    async fn get_stream_context_for_tag(
        &self,
        transport_id: &TransportId,
        tag: &Tag,
    ) -> Result<Option<StreamContext>, KeyManagerError> {
        self.add_call(format!("get_stream_context_for_tag({})", transport_id));
        Ok(self.tags.lock().unwrap().remove(tag))
    }

    async fn add_rotation_keys(
        &self,
        contact_id: ContactId,
        _master_key: &SecretKey,
        _timestamp: i64,
        is_initiator: bool,
        forward_only: bool,
    ) -> Result<(), KeyManagerError> {
        self.add_call(format!(
            "add_rotation_keys({}, is_initiator={}, forward_only={})",
            contact_id, is_initiator, forward_only
        ));
        Ok(())
    }
}

/// An incoming session that reports the scripted remote priority, then reads until the end of the stream
struct MockIncomingSession {
    reader: Mutex<Option<Box<dyn StreamReader>>>,
    priority_handler: Mutex<Option<PriorityHandler>>,
    remote_priority: Option<Priority>,
    fail: bool,
}

#[async_trait]
impl SyncSession for MockIncomingSession {
    async fn run(&self) -> io::Result<()> {
        let handler = self.priority_handler.lock().unwrap().take();
        if let (Some(handler), Some(priority)) = (handler, self.remote_priority.clone()) {
            handler(priority);
        }
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Mock incoming session failed"));
        }
        let reader = self.reader.lock().unwrap().take();
        if let Some(mut reader) = reader {
            let mut buf = [0u8; 64];
            while reader.read(&mut buf).await? > 0 {}
        }
        Ok(())
    }

    fn interrupt(&self) {}
}

/// An outgoing session that sends its stream header, then waits to be interrupted if it is a duplex session
pub struct MockOutgoingSession {
    pub contact_id: ContactId,
    pub transport_id: TransportId,
    pub priority: Option<Priority>,
    pub eager: bool,
    pub with_record: bool,
    writer: Mutex<Option<Box<dyn StreamWriter>>>,
    duplex: bool,
    interrupted: AtomicBool,
    interrupt_count: AtomicUsize,
    interrupt_notify: Notify,
}

impl MockOutgoingSession {
    fn new(
        contact_id: ContactId,
        transport_id: &TransportId,
        writer: Box<dyn StreamWriter>,
        duplex: bool,
    ) -> Self {
        Self {
            contact_id,
            transport_id: transport_id.clone(),
            priority: None,
            eager: false,
            with_record: false,
            writer: Mutex::new(Some(writer)),
            duplex,
            interrupted: AtomicBool::new(false),
            interrupt_count: AtomicUsize::new(0),
            interrupt_notify: Notify::new(),
        }
    }

    pub fn interrupt_count(&self) -> usize {
        self.interrupt_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncSession for MockOutgoingSession {
    async fn run(&self) -> io::Result<()> {
        let writer = self.writer.lock().unwrap().take();
        if let Some(mut writer) = writer {
            writer.flush().await?;
        }
        if self.duplex {
            while !self.interrupted.load(Ordering::SeqCst) {
                self.interrupt_notify.notified().await;
            }
        }
        Ok(())
    }

    fn interrupt(&self) {
        self.interrupt_count.fetch_add(1, Ordering::SeqCst);
        self.interrupted.store(true, Ordering::SeqCst);
        self.interrupt_notify.notify_one();
    }
}

/// Creates mock sessions and keeps the outgoing ones for inspection
#[derive(Default)]
pub struct MockSyncSessionFactory {
    remote_priority: Mutex<Option<Priority>>,
    fail_incoming: AtomicBool,
    incoming_count: AtomicUsize,
    outgoing: Mutex<Vec<Arc<MockOutgoingSession>>>,
}

impl MockSyncSessionFactory {
    /// Incoming sessions created after this call report `priority` as the remote peer's priority
    pub fn set_remote_priority(&self, priority: Priority) {
        *self.remote_priority.lock().unwrap() = Some(priority);
    }

    pub fn set_fail_incoming(&self, fail: bool) {
        self.fail_incoming.store(fail, Ordering::SeqCst);
    }

    pub fn incoming_count(&self) -> usize {
        self.incoming_count.load(Ordering::SeqCst)
    }

    pub fn outgoing_sessions(&self) -> Vec<Arc<MockOutgoingSession>> {
        self.outgoing.lock().unwrap().clone()
    }

    fn add_outgoing(&self, session: MockOutgoingSession) -> Arc<MockOutgoingSession> {
        let session = Arc::new(session);
        self.outgoing.lock().unwrap().push(session.clone());
        session
    }
}

impl SyncSessionFactory for MockSyncSessionFactory {
    fn create_incoming_session(
        &self,
        _contact_id: ContactId,
        reader: Box<dyn StreamReader>,
        priority_handler: Option<PriorityHandler>,
    ) -> Box<dyn SyncSession> {
        self.incoming_count.fetch_add(1, Ordering::SeqCst);
        Box::new(MockIncomingSession {
            reader: Mutex::new(Some(reader)),
            priority_handler: Mutex::new(priority_handler),
            remote_priority: self.remote_priority.lock().unwrap().clone(),
            fail: self.fail_incoming.load(Ordering::SeqCst),
        })
    }

    fn create_simplex_outgoing_session(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
        _max_latency: Duration,
        eager: bool,
        writer: Box<dyn StreamWriter>,
    ) -> Box<dyn SyncSession> {
        let session = self.add_outgoing(MockOutgoingSession {
            eager,
            ..MockOutgoingSession::new(contact_id, transport_id, writer, false)
        });
        Box::new(ArcSession(session))
    }

    fn create_simplex_outgoing_session_with_record(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
        _max_latency: Duration,
        writer: Box<dyn StreamWriter>,
        _session_record: Arc<OutgoingSessionRecord>,
    ) -> Box<dyn SyncSession> {
        let session = self.add_outgoing(MockOutgoingSession {
            with_record: true,
            ..MockOutgoingSession::new(contact_id, transport_id, writer, false)
        });
        Box::new(ArcSession(session))
    }

    fn create_duplex_outgoing_session(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
        _max_latency: Duration,
        _max_idle_time: Duration,
        writer: Box<dyn StreamWriter>,
        priority: Option<Priority>,
    ) -> Arc<dyn SyncSession> {
        self.add_outgoing(MockOutgoingSession {
            priority,
            ..MockOutgoingSession::new(contact_id, transport_id, writer, true)
        })
    }
}

/// Lets the factory keep a session it hands out in a box
struct ArcSession(Arc<MockOutgoingSession>);

#[async_trait]
impl SyncSession for ArcSession {
    async fn run(&self) -> io::Result<()> {
        self.0.run().await
    }

    fn interrupt(&self) {
        self.0.interrupt()
    }
}

pub struct MockHandshakeManager {
    alice: bool,
    fail: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockHandshakeManager {
    pub fn new(alice: bool) -> Self {
        Self {
            alice,
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn result(&self) -> Result<HandshakeResult, HandshakeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HandshakeError::ProofVerificationFailed);
        }
        Ok(HandshakeResult::new(SecretKey::random(), self.alice))
    }
}

#[async_trait]
impl HandshakeManager for MockHandshakeManager {
    async fn handshake_pending_contact(
        &self,
        pending_contact_id: &PendingContactId,
        _reader: Box<dyn StreamReader>,
        _writer: Box<dyn StreamWriter>,
    ) -> Result<HandshakeResult, HandshakeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("handshake_pending_contact({})", pending_contact_id));
        self.result()
    }

    async fn handshake_contact(
        &self,
        contact_id: ContactId,
        _reader: Box<dyn StreamReader>,
        _writer: Box<dyn StreamWriter>,
    ) -> Result<HandshakeResult, HandshakeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("handshake_contact({})", contact_id));
        self.result()
    }
}

/// Confirms every pending contact as the same contact
pub struct MockContactExchangeManager {
    contact_id: ContactId,
    exchanges: Mutex<Vec<(PendingContactId, bool, bool)>>,
}

impl MockContactExchangeManager {
    pub fn new(contact_id: ContactId) -> Self {
        Self {
            contact_id,
            exchanges: Mutex::new(Vec::new()),
        }
    }

    /// `(pending_contact_id, alice, verified)` for every exchange
    pub fn exchanges(&self) -> Vec<(PendingContactId, bool, bool)> {
        self.exchanges.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContactExchangeManager for MockContactExchangeManager {
    async fn exchange_contacts(
        &self,
        pending_contact_id: &PendingContactId,
        _connection: &DuplexTransportConnection,
        _master_key: &SecretKey,
        alice: bool,
        verified: bool,
    ) -> Result<Contact, ContactExchangeError> {
        self.exchanges
            .lock()
            .unwrap()
            .push((*pending_contact_id, alice, verified));
        Ok(Contact::new(self.contact_id, None, verified))
    }
}

#[derive(Default)]
pub struct MockTransportPropertyManager {
    added: Mutex<Vec<(ContactId, TransportId, TransportProperties)>>,
}

impl MockTransportPropertyManager {
    pub fn added(&self) -> Vec<(ContactId, TransportId, TransportProperties)> {
        self.added.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportPropertyManager for MockTransportPropertyManager {
    async fn add_remote_properties_from_connection(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
        properties: &TransportProperties,
    ) -> Result<(), TransportPropertyError> {
        self.added
            .lock()
            .unwrap()
            .push((contact_id, transport_id.clone(), properties.clone()));
        Ok(())
    }
}

/// The mock collaborators of one peer
pub struct MockCollaborators {
    pub key_manager: Arc<MockKeyManager>,
    pub stream_factory: Arc<MockStreamFactory>,
    pub sync_session_factory: Arc<MockSyncSessionFactory>,
    pub handshake_manager: Arc<MockHandshakeManager>,
    pub contact_exchange_manager: Arc<MockContactExchangeManager>,
    pub transport_property_manager: Arc<MockTransportPropertyManager>,
    pub registry: Arc<ConnectionRegistry>,
    pub chooser: Arc<ConnectionChooser>,
}

impl MockCollaborators {
    /// Pending contacts are confirmed as `new_contact_id`
    pub fn new(new_contact_id: ContactId) -> Self {
        Self {
            key_manager: Arc::new(MockKeyManager::default()),
            stream_factory: Arc::new(MockStreamFactory::default()),
            sync_session_factory: Arc::new(MockSyncSessionFactory::default()),
            handshake_manager: Arc::new(MockHandshakeManager::new(true)),
            contact_exchange_manager: Arc::new(MockContactExchangeManager::new(new_contact_id)),
            transport_property_manager: Arc::new(MockTransportPropertyManager::default()),
            registry: Arc::new(ConnectionRegistry::new(&ConnectionRegistryConfig::default())),
            chooser: Arc::new(ConnectionChooser::new()),
        }
    }

    pub fn connection_context(&self) -> ConnectionContext {
        ConnectionContext {
            key_manager: self.key_manager.clone(),
            stream_reader_factory: self.stream_factory.clone(),
            stream_writer_factory: self.stream_factory.clone(),
            sync_session_factory: self.sync_session_factory.clone(),
            handshake_manager: self.handshake_manager.clone(),
            contact_exchange_manager: self.contact_exchange_manager.clone(),
            transport_property_manager: self.transport_property_manager.clone(),
            connection_registry: self.registry.clone(),
            connection_chooser: self.chooser.clone(),
        }
    }

    pub fn connection_manager(&self) -> ConnectionManager {
        ConnectionManager::new(self.connection_context())
    }
}
