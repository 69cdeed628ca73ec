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

//! The sync session collaborator. Sessions exchange acks, offers, requests and messages with a contact over one
//! stream; their wire format is not this crate's concern.

use std::{
    fmt,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    stream::{StreamReader, StreamWriter},
    types::{ContactId, Priority, TransportId},
};

pub const MESSAGE_ID_LENGTH: usize = 32;

/// Called at most once by an incoming duplex session, when the remote peer announces the priority of the connection
pub type PriorityHandler = Box<dyn FnOnce(Priority) + Send>;

#[async_trait]
pub trait SyncSession: Send + Sync {
    /// Runs the session until the stream ends, an error occurs or, for outgoing sessions, the session is interrupted
    async fn run(&self) -> io::Result<()>;

    /// Asks an outgoing session to stop sending and close its stream. Has no effect on incoming sessions.
    fn interrupt(&self);
}

pub trait SyncSessionFactory: Send + Sync {
    fn create_incoming_session(
        &self,
        contact_id: ContactId,
        reader: Box<dyn StreamReader>,
        priority_handler: Option<PriorityHandler>,
    ) -> Box<dyn SyncSession>;

    /// `eager` asks the session to retransmit unacked messages without waiting for their retransmission time
    fn create_simplex_outgoing_session(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
        max_latency: Duration,
        eager: bool,
        writer: Box<dyn StreamWriter>,
    ) -> Box<dyn SyncSession>;

    /// Like `create_simplex_outgoing_session` but the session records the acks and messages it sends in
    /// `session_record`, so that the caller can track delivery
    fn create_simplex_outgoing_session_with_record(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
        max_latency: Duration,
        writer: Box<dyn StreamWriter>,
        session_record: Arc<OutgoingSessionRecord>,
    ) -> Box<dyn SyncSession>;

    /// `priority` is sent to the remote peer if this peer dialed the connection
    fn create_duplex_outgoing_session(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
        max_latency: Duration,
        max_idle_time: Duration,
        writer: Box<dyn StreamWriter>,
        priority: Option<Priority>,
    ) -> Arc<dyn SyncSession>;
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId([u8; MESSAGE_ID_LENGTH]);

impl MessageId {
    pub const fn new(bytes: [u8; MESSAGE_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", hex::encode(self.0))
    }
}

/// Records which messages were acked and sent by an outgoing simplex session
#[derive(Debug, Default)]
pub struct OutgoingSessionRecord {
    inner: Mutex<SessionRecordInner>,
}

#[derive(Debug, Default)]
struct SessionRecordInner {
    acked: Vec<MessageId>,
    sent: Vec<MessageId>,
}

impl OutgoingSessionRecord {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn on_ack_sent<I: IntoIterator<Item = MessageId>>(&self, acked: I) {
        acquire_lock!(self.inner).acked.extend(acked);
    }

    pub fn on_message_sent(&self, sent: MessageId) {
        acquire_lock!(self.inner).sent.push(sent);
    }

    pub fn acked_ids(&self) -> Vec<MessageId> {
        acquire_lock!(self.inner).acked.clone()
    }

    pub fn sent_ids(&self) -> Vec<MessageId> {
        acquire_lock!(self.inner).sent.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn session_record_keeps_order() {
        let record = OutgoingSessionRecord::new();
        record.on_ack_sent([MessageId::new([1; 32]), MessageId::new([2; 32])]);
        record.on_message_sent(MessageId::new([3; 32]));
        record.on_ack_sent(vec![MessageId::new([4; 32])]);
        assert_eq!(record.acked_ids(), vec![
            MessageId::new([1; 32]),
            MessageId::new([2; 32]),
            MessageId::new([4; 32])
        ]);
        assert_eq!(record.sent_ids(), vec![MessageId::new([3; 32])]);
    }
}
