//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use derive_new::new;

use crate::config::NhsCfg;
use crate::debug::Debug;
use crate::ip::AddressFamily;

// Next Hop Server entry.
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct Nhs {
    pub af: AddressFamily,
    // Protocol address (dynamically learned when not configured).
    pub proto_addr: Option<IpAddr>,
    // NBMA address or FQDN.
    pub nbma_fqdn: String,
}

// ===== impl Nhs =====

impl Nhs {
    pub(crate) fn from_config(af: AddressFamily, config: &NhsCfg) -> Nhs {
        Nhs::new(af, config.protocol_address, config.nbma.clone())
    }

    // Releases the NHS entry.
    pub(crate) fn free(self, ifname: &str) {
        Debug::NhsFree(ifname, &self).log();
    }
}
