// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Small network toolkit.
//!
//! Build and send Wake On LAN magic packets (optionally with a SecureOn
//! password), resolve IPv4 addresses to hardware addresses through the ARP
//! cache of the operating system, and do arithmetic on IPv4 subnet masks.

pub mod config;
pub mod model;
pub mod net;
pub mod storage;
pub mod topology;
