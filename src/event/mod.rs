// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The runtime event bus (C5, §4.5).
//!
//! Every lifecycle notice the dispatcher, auto-wire, and rule engine
//! produce flows through one [`EventBus`], backed by
//! `tokio::sync::broadcast` the same way the teacher's own event bus is.
//! Subscribers that fall behind lose the oldest events rather than
//! blocking a publisher (§4.5 "a slow consumer must not block the
//! runtime").

mod event_bus;

pub use event_bus::{EventBus, RuntimeEvent};
