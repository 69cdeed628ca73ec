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

//! Resolves redundant duplex connections.
//!
//! When two peers dial each other at the same time they end up with two duplex connections over the same transport.
//! The dialer of each connection sends a random [Priority] which both peers compare in the same way, so both keep
//! the connection with the greater priority and close the other without any further coordination.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::*;

use crate::{
    connection::ConnectionId,
    types::{ContactId, Priority, TransportId},
};

const LOG_TARGET: &str = "comms::chooser";

/// A duplex connection whose outgoing session can be interrupted, which closes the connection
pub trait InterruptibleConnection: Send + Sync {
    fn connection_id(&self) -> ConnectionId;

    fn interrupt_outgoing_session(&self);
}

struct ChosenConnection {
    connection: Arc<dyn InterruptibleConnection>,
    priority: Priority,
}

#[derive(Default)]
pub struct ConnectionChooser {
    chosen: Mutex<HashMap<(ContactId, TransportId), ChosenConnection>>,
}

impl ConnectionChooser {
    pub fn new() -> Self {
        Default::default()
    }

    /// Offer a connection with the given priority. If a connection to the contact over the transport has already been
    /// chosen, the connection with the lesser priority is interrupted. Equal priorities keep the existing connection.
    pub fn add_connection(
        &self,
        contact_id: ContactId,
        transport_id: TransportId,
        connection: Arc<dyn InterruptibleConnection>,
        priority: Priority,
    ) {
        let loser = {
            let mut chosen = acquire_lock!(self.chosen);
            let key = (contact_id, transport_id);
            match chosen.get_mut(&key) {
                None => {
                    chosen.insert(key, ChosenConnection { connection, priority });
                    None
                },
                Some(existing) if priority > existing.priority => {
                    debug!(
                        target: LOG_TARGET,
                        "New connection {} to {} over {} replaces connection {} ({:?} > {:?})",
                        connection.connection_id(),
                        key.0,
                        key.1,
                        existing.connection.connection_id(),
                        priority,
                        existing.priority
                    );
                    let old = std::mem::replace(existing, ChosenConnection { connection, priority });
                    Some(old.connection)
                },
                Some(existing) => {
                    debug!(
                        target: LOG_TARGET,
                        "Keeping connection {} to {} over {} in favour of new connection {} ({:?} <= {:?})",
                        existing.connection.connection_id(),
                        key.0,
                        key.1,
                        connection.connection_id(),
                        priority,
                        existing.priority
                    );
                    Some(connection)
                },
            }
        };

        if let Some(loser) = loser {
            info!(target: LOG_TARGET, "Interrupting redundant connection {}", loser.connection_id());
            loser.interrupt_outgoing_session();
        }
    }

    /// Remove the chosen connection to the contact over the transport, if it is the given connection. A connection
    /// that lost the tie break never replaces the winner's entry.
    pub fn remove_connection(&self, contact_id: ContactId, transport_id: TransportId, connection_id: ConnectionId) {
        let mut chosen = acquire_lock!(self.chosen);
        let key = (contact_id, transport_id);
        if chosen
            .get(&key)
            .map(|c| c.connection.connection_id() == connection_id)
            .unwrap_or(false)
        {
            trace!(target: LOG_TARGET, "Removing chosen connection {}", connection_id);
            chosen.remove(&key);
        }
    }

    /// The id of the currently chosen connection to the contact over the transport
    pub fn chosen_connection_id(&self, contact_id: ContactId, transport_id: &TransportId) -> Option<ConnectionId> {
        acquire_lock!(self.chosen)
            .get(&(contact_id, transport_id.clone()))
            .map(|c| c.connection.connection_id())
    }
}
