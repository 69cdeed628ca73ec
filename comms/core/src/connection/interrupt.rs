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

use std::sync::{Arc, Mutex};

use crate::sync::SyncSession;

enum SlotState {
    NoSession,
    InterruptPending,
    Installed(Arc<dyn SyncSession>),
}

/// Holds the outgoing session of a duplex connection. The session is created by the outgoing task after it has
/// allocated its stream context, which can race with the incoming task deciding to close the connection, so an
/// interrupt requested before the session exists is held and delivered when the session is installed.
pub(crate) struct OutgoingSessionSlot {
    state: Mutex<SlotState>,
}

impl OutgoingSessionSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::NoSession),
        }
    }

    pub fn interrupt(&self) {
        let session = {
            let mut state = acquire_lock!(self.state);
            match &*state {
                SlotState::Installed(session) => Some(session.clone()),
                SlotState::NoSession | SlotState::InterruptPending => {
                    *state = SlotState::InterruptPending;
                    None
                },
            }
        };
        if let Some(session) = session {
            session.interrupt();
        }
    }

    pub fn install(&self, session: Arc<dyn SyncSession>) {
        let interrupt_pending = {
            let mut state = acquire_lock!(self.state);
            let pending = matches!(*state, SlotState::InterruptPending);
            *state = SlotState::Installed(session.clone());
            pending
        };
        if interrupt_pending {
            session.interrupt();
        }
    }
}
