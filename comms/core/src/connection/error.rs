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

use std::io;

use thiserror::Error;

use crate::{
    handshake::{ContactExchangeError, HandshakeError},
    key_manager::KeyManagerError,
    properties::TransportPropertyError,
};

/// Reasons a connection task ends early. These never leave the task: they are logged and turned into disposal of the
/// transport connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Key manager error: {0}")]
    KeyManager(#[from] KeyManagerError),
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("Contact exchange failed: {0}")]
    ContactExchange(#[from] ContactExchangeError),
    #[error("Failed to store transport properties: {0}")]
    TransportProperties(#[from] TransportPropertyError),
    #[error("Unrecognised tag")]
    UnrecognisedTag,
    #[error("Protocol violation: {0}")]
    ProtocolViolation(&'static str),
    #[error("Could not allocate a stream context")]
    StreamContextUnavailable,
}

impl ConnectionError {
    /// True unless the peer could not be identified, which tells the transport plugin whether the remote peer is known
    pub fn is_recognised(&self) -> bool {
        !matches!(self, ConnectionError::UnrecognisedTag)
    }
}
