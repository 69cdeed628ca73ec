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

//! # Mesh Comms
//!
//! The connection layer that sits between transport plugins and the sync protocol.
//!
//! Transport plugins surface raw simplex readers/writers and duplex connections. The [ConnectionManager] schedules a
//! task for every connection direction which recognises the stream tag, obtains stream contexts from the
//! [KeyManager](key_manager::KeyManager), and either runs a sync session for an established contact or a first
//! contact handshake for a pending contact. Live connections are tracked by the
//! [ConnectionRegistry](registry::ConnectionRegistry) and redundant duplex connections between the same two peers are
//! resolved by the [ConnectionChooser](chooser::ConnectionChooser).
//!
//! [ConnectionManager]: manager::ConnectionManager

#[macro_use]
mod macros;

#[cfg(test)]
#[macro_use]
pub(crate) mod test_utils;

pub mod chooser;
pub mod config;
pub mod connection;
pub mod events;
pub mod handshake;
pub mod key_manager;
pub mod manager;
pub mod properties;
pub mod registry;
pub mod stream;
pub mod sync;
pub mod transport;
pub mod types;

pub use chooser::{ConnectionChooser, InterruptibleConnection};
pub use connection::{ConnectionContext, ConnectionError, ConnectionId};
pub use manager::{ConnectionKind, ConnectionManager};
pub use registry::{ConnectionRegistry, ConnectionRegistryError};
