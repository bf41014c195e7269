//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

/// NHRP cache operations triggered by local address changes.
pub trait CacheApi: std::fmt::Debug + Send {
    /// Installs a local binding for a protocol address of the interface.
    fn local_binding_install(&mut self, ifname: &str, addr: IpAddr);

    /// Removes the local binding of a protocol address of the interface.
    fn local_binding_remove(&mut self, ifname: &str, addr: IpAddr);
}
