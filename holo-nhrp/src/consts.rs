//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// Default holdtime (in seconds) advertised for cache entries.
pub const DFLT_HOLDTIME: u16 = 7200;

// Maximum nesting of notifications (tunnel -> carrier chains).
pub const MAX_NOTIFY_DEPTH: usize = 8;

// Default configuration file path.
pub const DFLT_CONFIG_FILEPATH: &str = "/etc/holo-nhrp.toml";
