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

use std::{sync::Arc, time::Duration};

use tokio::{sync::broadcast::error::TryRecvError, time};

use crate::events::{ConnectionEvent, ConnectionEventRx};

pub mod mocks;

/// Unpack the tuple or struct variant variables from an enum, panicking if the enum is a different variant.
macro_rules! unpack_enum {
    ($($enum_key:ident)::+ { $($idents:tt),* } = $enum:expr) => {
        let ($($idents),+) = match $enum {
            $($enum_key)::+{$($idents),+} => ($($idents),+),
            _ => panic!("Unexpected enum variant given to unpack_enum"),
        };
    };
    ($($enum_key:ident)::+ ( $($idents:tt),* ) = $enum:expr) => {
        let ($($idents),+) = match $enum {
            $($enum_key)::+($($idents),+) => ($($idents),+),
            _ => panic!("Unexpected enum variant given to unpack_enum"),
        };
    };
    ($($enum_key:ident)::+ = $enum:expr) => {
        match $enum {
            $($enum_key)::+ => {},
            _ => panic!("Unexpected enum variant given to unpack_enum"),
        };
    };
}

/// Collect the events that have already been published
pub fn collect_events(rx: &mut ConnectionEventRx) -> Vec<Arc<ConnectionEvent>> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(n)) => panic!("Event receiver lagged by {} events", n),
            Err(_) => break events,
        }
    }
}

/// Receive events until one matches the predicate, returning all events received. Panics if no event matches within
/// the timeout.
pub async fn wait_for_event<F>(rx: &mut ConnectionEventRx, predicate: F) -> Vec<Arc<ConnectionEvent>>
where F: Fn(&ConnectionEvent) -> bool {
    let mut events = Vec::new();
    time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            let is_match = predicate(&*event);
            events.push(event);
            if is_match {
                break;
            }
        }
    })
    .await
    .expect("Timed out waiting for event");
    events
}
