//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::ip::AddressFamily;
use crate::nhs::Nhs;
use crate::notification::NotifyEvent;
use crate::os::TunnelConfig;
use crate::southbound::SouthboundMsg;

// NHRP debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Interfaces
    InterfaceCreate(&'a str),
    InterfaceDelete(&'a str),
    InterfaceStart(&'a str),
    InterfaceStop(&'a str, InterfaceInactiveReason),
    InterfaceTunnelConfig(&'a str, &'a TunnelConfig),
    InterfaceCarrierBind(&'a str, &'a str),
    InterfaceCarrierUnbind(&'a str, &'a str),
    InterfaceNbmaChange(&'a str, Option<IpAddr>),
    InterfaceAddrChange(&'a str, AddressFamily, Option<&'a IpNetwork>),
    InterfaceDmvpnConfig(&'a str, AddressFamily),
    NhsFree(&'a str, &'a Nhs),
    // Notifications
    Notify(&'a str, NotifyEvent),
    // Southbound
    MsgRx(&'a SouthboundMsg),
    MsgDrop(Option<&'a SouthboundMsg>),
}

// Reason why NHRP is inactive on an interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum InterfaceInactiveReason {
    MissingNbmaAddress,
    MissingIfindex,
    NoNetworkId,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InterfaceCreate(name)
            | Debug::InterfaceDelete(name)
            | Debug::InterfaceStart(name) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::InterfaceStop(name, reason) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%reason, "{}", self);
                })
            }
            Debug::InterfaceTunnelConfig(name, tunnel) => {
                debug_span!("interface", %name).in_scope(|| {
                    let key = tunnel.key;
                    let link = tunnel.link_ifindex;
                    let local = tunnel.local_addr;
                    debug!(%key, ?link, ?local, "{}", self);
                })
            }
            Debug::InterfaceCarrierBind(name, carrier)
            | Debug::InterfaceCarrierUnbind(name, carrier) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%carrier, "{}", self);
                })
            }
            Debug::InterfaceNbmaChange(name, nbma) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(?nbma, "{}", self);
                })
            }
            Debug::InterfaceAddrChange(name, af, addr) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%af, ?addr, "{}", self);
                })
            }
            Debug::InterfaceDmvpnConfig(name, af) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%af, "{}", self);
                })
            }
            Debug::NhsFree(name, nhs) => {
                debug_span!("interface", %name).in_scope(|| {
                    let af = nhs.af;
                    let proto_addr = nhs.proto_addr;
                    let nbma = &nhs.nbma_fqdn;
                    debug!(%af, ?proto_addr, %nbma, "{}", self);
                })
            }
            Debug::Notify(name, event) => {
                debug_span!("notification").in_scope(|| {
                    debug!(%name, %event, "{}", self);
                })
            }
            Debug::MsgRx(msg) => {
                debug_span!("southbound").in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        let data = serde_json::to_string(&msg)
                            .unwrap_or_default();
                        debug!(r#type = %msg, %data, "{}", self);
                    })
                })
            }
            Debug::MsgDrop(msg) => {
                debug_span!("southbound").in_scope(|| {
                    debug_span!("input").in_scope(|| match msg {
                        Some(msg) => debug!(r#type = %msg, "{}", self),
                        None => debug!("{}", self),
                    })
                })
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InterfaceCreate(..) => {
                write!(f, "interface created")
            }
            Debug::InterfaceDelete(..) => {
                write!(f, "interface deleted")
            }
            Debug::InterfaceStart(..) => {
                write!(f, "starting NHRP operation on interface")
            }
            Debug::InterfaceStop(..) => {
                write!(f, "stopping NHRP operation on interface")
            }
            Debug::InterfaceTunnelConfig(..) => {
                write!(f, "tunnel configuration")
            }
            Debug::InterfaceCarrierBind(..) => {
                write!(f, "bound to carrier interface")
            }
            Debug::InterfaceCarrierUnbind(..) => {
                write!(f, "unbound from carrier interface")
            }
            Debug::InterfaceNbmaChange(..) => {
                write!(f, "NBMA address changed")
            }
            Debug::InterfaceAddrChange(..) => {
                write!(f, "protocol address changed")
            }
            Debug::InterfaceDmvpnConfig(..) => {
                write!(f, "configured interface for DMVPN operation")
            }
            Debug::NhsFree(..) => {
                write!(f, "next hop server released")
            }
            Debug::Notify(..) => {
                write!(f, "publishing event")
            }
            Debug::MsgRx(..) => {
                write!(f, "message")
            }
            Debug::MsgDrop(..) => {
                write!(f, "dropped message")
            }
        }
    }
}

// ===== impl InterfaceInactiveReason =====

impl std::fmt::Display for InterfaceInactiveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceInactiveReason::MissingNbmaAddress => {
                write!(f, "missing NBMA address")
            }
            InterfaceInactiveReason::MissingIfindex => {
                write!(f, "missing ifindex")
            }
            InterfaceInactiveReason::NoNetworkId => {
                write!(f, "no address family with a network-id")
            }
        }
    }
}
