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

//! # Connection registry
//!
//! Tracks which contacts are connected over which transports and broadcasts a [ConnectionEvent] for every change.
//!
//! A contact is connected while it has at least one registered connection. Registering the first connection for a
//! contact broadcasts [ConnectionEvent::ContactConnected] after the connection event, and removing the last one
//! broadcasts [ConnectionEvent::ContactDisconnected] after it. Events are broadcast in the order the registry changes
//! were committed, but never while the registry lock is held.
//!
//! Transport preferences are enforced when a connection is registered. A new connection is interrupted if the
//! contact is already connected over a preferred transport, and registering a connection over a preferred transport
//! interrupts the contact's connections over worse ones. Each connection is interrupted by the registry at most once.
//!
//! The registry also keeps the set of pending contacts that have a rendezvous connection in progress, which
//! handshake connections use to drop redundant connections.

mod error;
pub use error::ConnectionRegistryError;


use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use log::*;
use tokio::sync::broadcast;

use crate::{
    chooser::InterruptibleConnection,
    config::ConnectionRegistryConfig,
    connection::ConnectionId,
    events::{ConnectionEvent, ConnectionEventRx, ConnectionEventTx},
    types::{ContactId, PendingContactId, TransportId},
};

const LOG_TARGET: &str = "comms::registry";

/// A live connection to a contact
struct ConnectionRecord {
    transport_id: TransportId,
    connection: Arc<dyn InterruptibleConnection>,
    /// Set once the registry has interrupted the connection
    interrupted: bool,
}

impl ConnectionRecord {
    fn is(&self, transport_id: &TransportId, connection_id: ConnectionId) -> bool {
        self.transport_id == *transport_id && self.connection.connection_id() == connection_id
    }
}

#[derive(Default)]
struct RegistryState {
    contact_connections: HashMap<ContactId, Vec<ConnectionRecord>>,
    connected_pending_contacts: HashSet<PendingContactId>,
}

pub struct ConnectionRegistry {
    event_tx: ConnectionEventTx,
    /// Maps a transport to the transports that are preferred over it
    better_transports: HashMap<TransportId, Vec<TransportId>>,
    state: Mutex<RegistryState>,
    /// Taken before the state lock is released and held while broadcasting, so that events are published in the order
    /// the state changes were made
    publish_lock: Mutex<()>,
}

impl ConnectionRegistry {
    pub fn new(config: &ConnectionRegistryConfig) -> Self {
        let capacity = match config.event_channel_size {
            0 => {
                warn!(
                    target: LOG_TARGET,
                    "Connection event channel size must be at least 1, using 1"
                );
                1
            },
            n => n,
        };
        let (event_tx, _) = broadcast::channel(capacity);
        Self::with_event_sender(config, event_tx)
    }

    /// Create a registry that publishes to an existing event channel
    pub fn with_event_sender(config: &ConnectionRegistryConfig, event_tx: ConnectionEventTx) -> Self {
        let mut better_transports = HashMap::<_, Vec<_>>::new();
        for pref in &config.transport_preferences {
            better_transports
                .entry(pref.worse.clone())
                .or_default()
                .push(pref.better.clone());
        }
        Self {
            event_tx,
            better_transports,
            state: Mutex::new(RegistryState::default()),
            publish_lock: Mutex::new(()),
        }
    }

    pub fn subscribe_events(&self) -> ConnectionEventRx {
        self.event_tx.subscribe()
    }

    /// Register a live connection to the contact. If the contact is already connected over a preferred transport the
    /// new connection is interrupted. Connections to the contact over transports the new one is preferred to are
    /// interrupted, unless the registry already interrupted them.
    pub fn register_connection(
        &self,
        contact_id: ContactId,
        transport_id: TransportId,
        connection: Arc<dyn InterruptibleConnection>,
        incoming: bool,
    ) {
        if incoming {
            info!(target: LOG_TARGET, "Incoming connection registered: {}", transport_id);
        } else {
            info!(target: LOG_TARGET, "Outgoing connection registered: {}", transport_id);
        }

        let (first_connection, interrupt_new, to_interrupt, publish_guard) = {
            let mut state = acquire_lock!(self.state);
            let records = state.contact_connections.entry(contact_id).or_default();
            let first_connection = records.is_empty();
            let mut interrupt_new = false;
            let mut to_interrupt = Vec::new();
            for record in records.iter_mut() {
                match self.compare_transports(&transport_id, &record.transport_id) {
                    Ordering::Less => interrupt_new = true,
                    Ordering::Greater if !record.interrupted => {
                        record.interrupted = true;
                        to_interrupt.push(record.connection.clone());
                    },
                    _ => {},
                }
            }
            records.push(ConnectionRecord {
                transport_id: transport_id.clone(),
                connection: connection.clone(),
                interrupted: interrupt_new,
            });
            (
                first_connection,
                interrupt_new,
                to_interrupt,
                acquire_lock!(self.publish_lock),
            )
        };

        self.publish_event(ConnectionEvent::ConnectionOpened {
            contact_id,
            transport_id,
            incoming,
        });
        if first_connection {
            info!(target: LOG_TARGET, "Contact connected: {}", contact_id);
            self.publish_event(ConnectionEvent::ContactConnected(contact_id));
        }
        drop(publish_guard);

        if interrupt_new {
            info!(
                target: LOG_TARGET,
                "Interrupting new connection {} to {}, a preferred transport is connected",
                connection.connection_id(),
                contact_id
            );
            connection.interrupt_outgoing_session();
        }
        for old in to_interrupt {
            info!(
                target: LOG_TARGET,
                "Interrupting connection {} to {} over a worse transport",
                old.connection_id(),
                contact_id
            );
            old.interrupt_outgoing_session();
        }
    }

    /// Remove a connection that was registered with `register_connection`. `exception` is true if the connection
    /// failed.
    ///
    /// Returns an error, without broadcasting anything, if the connection is not registered for the contact over the
    /// transport. This always indicates a bug in the caller.
    pub fn unregister_connection(
        &self,
        contact_id: ContactId,
        transport_id: TransportId,
        connection_id: ConnectionId,
        incoming: bool,
        exception: bool,
    ) -> Result<(), ConnectionRegistryError> {
        if incoming {
            info!(target: LOG_TARGET, "Incoming connection unregistered: {}", transport_id);
        } else {
            info!(target: LOG_TARGET, "Outgoing connection unregistered: {}", transport_id);
        }

        let (last_connection, _publish_guard) = {
            let mut state = acquire_lock!(self.state);
            let records = state.contact_connections.get_mut(&contact_id);
            let pos = records
                .as_ref()
                .and_then(|recs| recs.iter().position(|r| r.is(&transport_id, connection_id)));
            let (records, pos) = match (records, pos) {
                (Some(records), Some(pos)) => (records, pos),
                _ => {
                    error!(
                        target: LOG_TARGET,
                        "Attempt to unregister connection {} to {} over {} which is not registered",
                        connection_id,
                        contact_id,
                        transport_id
                    );
                    return Err(ConnectionRegistryError::ConnectionNotRegistered {
                        contact_id,
                        transport_id,
                    });
                },
            };
            records.remove(pos);
            let last_connection = records.is_empty();
            if last_connection {
                state.contact_connections.remove(&contact_id);
            }
            (last_connection, acquire_lock!(self.publish_lock))
        };

        self.publish_event(ConnectionEvent::ConnectionClosed {
            contact_id,
            transport_id,
            incoming,
            exception,
        });
        if last_connection {
            info!(target: LOG_TARGET, "Contact disconnected: {}", contact_id);
            self.publish_event(ConnectionEvent::ContactDisconnected(contact_id));
        }
        Ok(())
    }

    /// Returns the contacts that have at least one connection over the given transport
    pub fn get_connected_contacts(&self, transport_id: &TransportId) -> Vec<ContactId> {
        let state = acquire_lock!(self.state);
        let contact_ids = state
            .contact_connections
            .iter()
            .filter(|(_, recs)| recs.iter().any(|r| r.transport_id == *transport_id))
            .map(|(contact_id, _)| *contact_id)
            .collect::<Vec<_>>();
        debug!(
            target: LOG_TARGET,
            "{} contacts connected: {}",
            contact_ids.len(),
            transport_id
        );
        contact_ids
    }

    /// Returns the contacts that are connected over the given transport or over any transport that is preferred to
    /// it. Used to avoid dialing a contact over a transport when a better one is already connected.
    pub fn get_connected_or_preferred_contacts(&self, transport_id: &TransportId) -> Vec<ContactId> {
        let better = self.better_transports(transport_id);
        let state = acquire_lock!(self.state);
        let contact_ids = state
            .contact_connections
            .iter()
            .filter(|(_, recs)| {
                recs.iter()
                    .any(|r| r.transport_id == *transport_id || better.contains(&r.transport_id))
            })
            .map(|(contact_id, _)| *contact_id)
            .collect::<Vec<_>>();
        debug!(
            target: LOG_TARGET,
            "{} contacts connected or preferred: {}",
            contact_ids.len(),
            transport_id
        );
        contact_ids
    }

    pub fn is_connected(&self, contact_id: ContactId) -> bool {
        acquire_lock!(self.state).contact_connections.contains_key(&contact_id)
    }

    pub fn is_connected_over(&self, contact_id: ContactId, transport_id: &TransportId) -> bool {
        acquire_lock!(self.state)
            .contact_connections
            .get(&contact_id)
            .map(|recs| recs.iter().any(|r| r.transport_id == *transport_id))
            .unwrap_or(false)
    }

    /// Register a rendezvous connection to a pending contact. Returns false, without broadcasting anything, if a
    /// rendezvous connection to the pending contact is already registered.
    pub fn register_pending_contact(&self, pending_contact_id: PendingContactId) -> bool {
        let (added, _publish_guard) = {
            let mut state = acquire_lock!(self.state);
            let added = state.connected_pending_contacts.insert(pending_contact_id);
            (added, acquire_lock!(self.publish_lock))
        };
        if added {
            debug!(
                target: LOG_TARGET,
                "Rendezvous connection registered: {}", pending_contact_id
            );
            self.publish_event(ConnectionEvent::RendezvousConnectionOpened(pending_contact_id));
        }
        added
    }

    pub fn unregister_pending_contact(
        &self,
        pending_contact_id: PendingContactId,
        success: bool,
    ) -> Result<(), ConnectionRegistryError> {
        let _publish_guard = {
            let mut state = acquire_lock!(self.state);
            if !state.connected_pending_contacts.remove(&pending_contact_id) {
                error!(
                    target: LOG_TARGET,
                    "Attempt to unregister rendezvous connection to {} which is not registered", pending_contact_id
                );
                return Err(ConnectionRegistryError::PendingContactNotRegistered(
                    pending_contact_id,
                ));
            }
            acquire_lock!(self.publish_lock)
        };
        debug!(
            target: LOG_TARGET,
            "Rendezvous connection unregistered: {} (success = {})", pending_contact_id, success
        );
        self.publish_event(ConnectionEvent::RendezvousConnectionClosed {
            pending_contact_id,
            success,
        });
        Ok(())
    }

    /// `Less` if `b` is preferred to `a`, `Greater` if `a` is preferred to `b`
    fn compare_transports(&self, a: &TransportId, b: &TransportId) -> Ordering {
        if self.better_transports(a).contains(b) {
            Ordering::Less
        } else if self.better_transports(b).contains(a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    fn better_transports(&self, transport_id: &TransportId) -> &[TransportId] {
        self.better_transports
            .get(transport_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn publish_event(&self, event: ConnectionEvent) {
        trace!(target: LOG_TARGET, "Publishing event: {}", event);
        // A send operation can only fail if there are no subscribers, so it is safe to ignore the error
        let _result = self.event_tx.send(Arc::new(event));
    }
}
