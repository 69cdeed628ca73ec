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

use std::{fmt, sync::Arc};

use tokio::sync::broadcast;

use crate::types::{ContactId, PendingContactId, TransportId};

pub type ConnectionEventTx = broadcast::Sender<Arc<ConnectionEvent>>;
pub type ConnectionEventRx = broadcast::Receiver<Arc<ConnectionEvent>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectionOpened {
        contact_id: ContactId,
        transport_id: TransportId,
        incoming: bool,
    },
    ConnectionClosed {
        contact_id: ContactId,
        transport_id: TransportId,
        incoming: bool,
        exception: bool,
    },
    ContactConnected(ContactId),
    ContactDisconnected(ContactId),
    RendezvousConnectionOpened(PendingContactId),
    RendezvousConnectionClosed {
        pending_contact_id: PendingContactId,
        success: bool,
    },
}

impl ConnectionEvent {
    is_fn!(is_connection_opened, ConnectionEvent::ConnectionOpened { .. });

    is_fn!(is_connection_closed, ConnectionEvent::ConnectionClosed { .. });

    is_fn!(is_contact_connected, ConnectionEvent::ContactConnected(_));

    is_fn!(is_contact_disconnected, ConnectionEvent::ContactDisconnected(_));
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ConnectionEvent::*;
        match self {
            ConnectionOpened {
                contact_id,
                transport_id,
                incoming,
            } => write!(
                f,
                "ConnectionOpened({}, {}, {})",
                contact_id,
                transport_id,
                direction_str(*incoming)
            ),
            ConnectionClosed {
                contact_id,
                transport_id,
                incoming,
                exception,
            } => write!(
                f,
                "ConnectionClosed({}, {}, {}, exception = {})",
                contact_id,
                transport_id,
                direction_str(*incoming),
                exception
            ),
            ContactConnected(contact_id) => write!(f, "ContactConnected({})", contact_id),
            ContactDisconnected(contact_id) => write!(f, "ContactDisconnected({})", contact_id),
            RendezvousConnectionOpened(pending_contact_id) => {
                write!(f, "RendezvousConnectionOpened({})", pending_contact_id)
            },
            RendezvousConnectionClosed {
                pending_contact_id,
                success,
            } => write!(
                f,
                "RendezvousConnectionClosed({}, success = {})",
                pending_contact_id, success
            ),
        }
    }
}

fn direction_str(incoming: bool) -> &'static str {
    if incoming {
        "Incoming"
    } else {
        "Outgoing"
    }
}
