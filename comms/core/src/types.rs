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

//! Identifiers and value types shared by every connection variant.

use std::{fmt, str::FromStr};

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

/// Length of the pseudo-random tag at the head of every stream
pub const TAG_LENGTH: usize = 16;
/// Length of the random nonce used to break ties between redundant duplex connections
pub const PRIORITY_NONCE_LENGTH: usize = 16;
/// Length of symmetric key material
pub const SECRET_KEY_LENGTH: usize = 32;
/// Length of a pending contact identifier
pub const PENDING_CONTACT_ID_LENGTH: usize = 32;

/// The tag read from the head of a stream. Its meaning is known only to the key manager.
pub type Tag = [u8; TAG_LENGTH];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Transport id must not be empty")]
    EmptyTransportId,
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Incorrect byte count (expected {expected} bytes, got {actual})")]
    IncorrectByteCount { expected: usize, actual: usize },
}

/// Identifies a transport plugin
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransportId(String);

impl TransportId {
    pub fn new<T: Into<String>>(id: T) -> Result<Self, IdentifierError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentifierError::EmptyTransportId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TransportId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TransportId> for String {
    fn from(id: TransportId) -> Self {
        id.0
    }
}

impl FromStr for TransportId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Local identifier of an established contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(u32);

impl ContactId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Contact#{}", self.0)
    }
}

/// Identifies a contact that has been added by rendezvous but whose first contact handshake has not yet completed
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingContactId([u8; PENDING_CONTACT_ID_LENGTH]);

impl PendingContactId {
    pub const fn new(bytes: [u8; PENDING_CONTACT_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, IdentifierError> {
        let bytes = hex::decode(hex_str).map_err(|err| IdentifierError::InvalidHex(err.to_string()))?;
        let actual = bytes.len();
        let bytes = bytes.try_into().map_err(|_| IdentifierError::IncorrectByteCount {
            expected: PENDING_CONTACT_ID_LENGTH,
            actual,
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// A short hex string used in log lines
    pub fn short_str(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for PendingContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_str())
    }
}

impl fmt::Debug for PendingContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingContactId({})", self.to_hex())
    }
}

/// Symmetric key material. The bytes are zeroed when the key is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; SECRET_KEY_LENGTH]);

impl SecretKey {
    pub fn new(bytes: [u8; SECRET_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; SECRET_KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// The peer a stream context was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPeer {
    Contact(ContactId),
    PendingContact(PendingContactId),
}

/// Parameters for reading or writing one encrypted stream, issued by the key manager for a single connection
/// attempt. Exactly one of a contact or a pending contact applies.
#[derive(Debug, Clone)]
pub struct StreamContext {
    peer: StreamPeer,
    transport_id: TransportId,
    tag_key: SecretKey,
    header_key: SecretKey,
    stream_number: u64,
    handshake_mode: bool,
}

impl StreamContext {
    pub fn for_contact(
        contact_id: ContactId,
        transport_id: TransportId,
        tag_key: SecretKey,
        header_key: SecretKey,
        stream_number: u64,
        handshake_mode: bool,
    ) -> Self {
        Self {
            peer: StreamPeer::Contact(contact_id),
            transport_id,
            tag_key,
            header_key,
            stream_number,
            handshake_mode,
        }
    }

    /// Streams for pending contacts are always in handshake mode
    pub fn for_pending_contact(
        pending_contact_id: PendingContactId,
        transport_id: TransportId,
        tag_key: SecretKey,
        header_key: SecretKey,
        stream_number: u64,
    ) -> Self {
        Self {
            peer: StreamPeer::PendingContact(pending_contact_id),
            transport_id,
            tag_key,
            header_key,
            stream_number,
            handshake_mode: true,
        }
    }

    pub fn peer(&self) -> StreamPeer {
        self.peer
    }

    pub fn contact_id(&self) -> Option<ContactId> {
        match self.peer {
            StreamPeer::Contact(contact_id) => Some(contact_id),
            StreamPeer::PendingContact(_) => None,
        }
    }

    pub fn pending_contact_id(&self) -> Option<PendingContactId> {
        match self.peer {
            StreamPeer::Contact(_) => None,
            StreamPeer::PendingContact(pending_contact_id) => Some(pending_contact_id),
        }
    }

    pub fn transport_id(&self) -> &TransportId {
        &self.transport_id
    }

    pub fn tag_key(&self) -> &SecretKey {
        &self.tag_key
    }

    pub fn header_key(&self) -> &SecretKey {
        &self.header_key
    }

    pub fn stream_number(&self) -> u64 {
        self.stream_number
    }

    pub fn is_handshake_mode(&self) -> bool {
        self.handshake_mode
    }
}

/// The priority of a duplex connection. Generated by the dialing peer and compared byte-lexicographically by both
/// peers so that they keep the same connection when they dial each other at the same time.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority {
    nonce: [u8; PRIORITY_NONCE_LENGTH],
}

impl Priority {
    pub const fn new(nonce: [u8; PRIORITY_NONCE_LENGTH]) -> Self {
        Self { nonce }
    }

    /// Generates a fresh priority for one dial attempt
    pub fn random() -> Self {
        let mut nonce = [0u8; PRIORITY_NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        Self { nonce }
    }

    pub fn nonce(&self) -> &[u8; PRIORITY_NONCE_LENGTH] {
        &self.nonce
    }
}

impl fmt::Debug for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority({})", hex::encode(self.nonce))
    }
}
