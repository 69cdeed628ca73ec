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

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ContactId, PendingContactId, SecretKey, StreamContext, Tag, TransportId};

#[derive(Debug, Error)]
pub enum KeyManagerError {
    #[error("Key store error: {0}")]
    StoreError(String),
    #[error("Contact {0} does not exist")]
    UnknownContact(ContactId),
    #[error("Pending contact {0} does not exist")]
    UnknownPendingContact(PendingContactId),
    #[error("Transport {0} is not supported by the key manager")]
    UnsupportedTransport(TransportId),
}

/// Derives stream contexts from the transport keys of contacts and pending contacts, and recognises the tags of
/// incoming streams.
///
/// Every `get_stream_context_*` call hands out a context that is owned by the caller: outgoing contexts consume a
/// stream number, recognised tags are not recognised a second time.
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Allocate a context for an outgoing stream to a contact. Returns `None` if the contact has no keys for the
    /// transport.
    async fn get_stream_context_for_contact(
        &self,
        contact_id: ContactId,
        transport_id: &TransportId,
    ) -> Result<Option<StreamContext>, KeyManagerError>;

    /// Allocate a context for an outgoing stream to a pending contact
    async fn get_stream_context_for_pending_contact(
        &self,
        pending_contact_id: &PendingContactId,
        transport_id: &TransportId,
    ) -> Result<Option<StreamContext>, KeyManagerError>;

    /// Look up the context of an incoming stream by its tag. Returns `None` if the tag is not recognised.
    async fn get_stream_context_for_tag(
        &self,
        transport_id: &TransportId,
        tag: &Tag,
    ) -> Result<Option<StreamContext>, KeyManagerError>;

    /// Derive rotation mode transport keys for a contact from a master key agreed by a handshake. `is_initiator`
    /// selects which of the two directional keys is used for outgoing streams. If `forward_only` is true the keys are
    /// only used for streams with numbers greater than any already seen for the contact.
    async fn add_rotation_keys(
        &self,
        contact_id: ContactId,
        master_key: &SecretKey,
        timestamp: i64,
        is_initiator: bool,
        forward_only: bool,
    ) -> Result<(), KeyManagerError>;
}
