// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! IPv4 network topology.
//!
//! Currently this only covers subnet masks and the arithmetic on them.

mod netmask;

pub use netmask::{InvalidMaskError, NetMask, NetMaskParseError};
