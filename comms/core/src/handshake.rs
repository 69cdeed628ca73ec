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

//! First contact collaborators: the key agreement handshake and the contact exchange that follows it.

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    stream::{StreamReader, StreamWriter},
    transport::DuplexTransportConnection,
    types::{ContactId, PendingContactId, SecretKey},
};

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Remote peer sent an invalid public key")]
    InvalidPublicKey,
    #[error("Remote peer failed to prove knowledge of the shared secret")]
    ProofVerificationFailed,
    #[error("Key store error: {0}")]
    StoreError(String),
}

#[derive(Debug, Error)]
pub enum ContactExchangeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Remote peer's identity signature is invalid")]
    InvalidSignature,
    #[error("Contact already exists")]
    ContactExists,
    #[error("Store error: {0}")]
    StoreError(String),
}

/// Outcome of a successful handshake
#[derive(Debug, Clone)]
pub struct HandshakeResult {
    master_key: SecretKey,
    alice: bool,
}

impl HandshakeResult {
    pub fn new(master_key: SecretKey, alice: bool) -> Self {
        Self { master_key, alice }
    }

    pub fn master_key(&self) -> &SecretKey {
        &self.master_key
    }

    /// True if this peer took the initiator role in the handshake
    pub fn is_alice(&self) -> bool {
        self.alice
    }
}

/// Runs the key agreement handshake over a pair of handshake mode streams
#[async_trait]
pub trait HandshakeManager: Send + Sync {
    async fn handshake_pending_contact(
        &self,
        pending_contact_id: &PendingContactId,
        reader: Box<dyn StreamReader>,
        writer: Box<dyn StreamWriter>,
    ) -> Result<HandshakeResult, HandshakeError>;

    /// Handshake with a contact whose transport keys are in handshake mode
    async fn handshake_contact(
        &self,
        contact_id: ContactId,
        reader: Box<dyn StreamReader>,
        writer: Box<dyn StreamWriter>,
    ) -> Result<HandshakeResult, HandshakeError>;
}

/// A contact confirmed by a contact exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    id: ContactId,
    alias: Option<String>,
    verified: bool,
}

impl Contact {
    pub fn new(id: ContactId, alias: Option<String>, verified: bool) -> Self {
        Self { id, alias, verified }
    }

    pub fn id(&self) -> ContactId {
        self.id
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }
}

/// Exchanges identities with a pending contact using the master key agreed by the handshake, adds the contact and
/// derives its transport keys
#[async_trait]
pub trait ContactExchangeManager: Send + Sync {
    async fn exchange_contacts(
        &self,
        pending_contact_id: &PendingContactId,
        connection: &DuplexTransportConnection,
        master_key: &SecretKey,
        alice: bool,
        verified: bool,
    ) -> Result<Contact, ContactExchangeError>;
}
