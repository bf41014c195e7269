//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::Error;
use crate::events;
use crate::instance::Instance;
use crate::interface::{AddressFlags, InterfaceFlags, InterfaceIndex};
use crate::ip::IpNetworkExt;

// Interface and address records received from the routing stack.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum SouthboundMsg {
    InterfaceAdd(InterfaceMsg),
    InterfaceDel(InterfaceMsg),
    InterfaceUp(InterfaceMsg),
    InterfaceDown(InterfaceMsg),
    AddressAdd(AddressMsg),
    AddressDel(AddressMsg),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InterfaceMsg {
    pub ifname: String,
    pub ifindex: Option<u32>,
    #[serde(default)]
    pub hw_type: u16,
    #[serde(default)]
    pub flags: InterfaceFlags,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AddressMsg {
    pub ifname: String,
    pub addr: IpNetwork,
    #[serde(default)]
    pub flags: AddressFlags,
}

// ===== impl SouthboundMsg =====

impl std::fmt::Display for SouthboundMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SouthboundMsg::InterfaceAdd(..) => write!(f, "if-add"),
            SouthboundMsg::InterfaceDel(..) => write!(f, "if-delete"),
            SouthboundMsg::InterfaceUp(..) => write!(f, "if-up"),
            SouthboundMsg::InterfaceDown(..) => write!(f, "if-down"),
            SouthboundMsg::AddressAdd(..) => write!(f, "if-addr-add"),
            SouthboundMsg::AddressDel(..) => write!(f, "if-addr-del"),
        }
    }
}

// ===== impl Instance =====

impl Instance {
    /// Processes a record received from the routing stack.
    ///
    /// Records that failed to decode (`None`) or that refer to unknown
    /// interfaces are dropped without any state change.
    pub fn process_southbound_msg(&mut self, msg: Option<SouthboundMsg>) {
        let Some(msg) = msg else {
            Debug::MsgDrop(None).log();
            return;
        };
        Debug::MsgRx(&msg).log();

        let result = match &msg {
            SouthboundMsg::InterfaceAdd(msg) => process_iface_add(self, msg),
            SouthboundMsg::InterfaceDel(msg) => process_iface_del(self, msg),
            SouthboundMsg::InterfaceUp(msg)
            | SouthboundMsg::InterfaceDown(msg) => {
                process_iface_state(self, msg)
            }
            SouthboundMsg::AddressAdd(msg) => process_addr_add(self, msg),
            SouthboundMsg::AddressDel(msg) => process_addr_del(self, msg),
        };
        match result {
            Ok(true) => (),
            Ok(false) => Debug::MsgDrop(Some(&msg)).log(),
            Err(error) => error.log(),
        }
    }
}

// ===== helper functions =====

// Each handler returns whether the record was accepted.

fn process_iface_add(
    instance: &mut Instance,
    msg: &InterfaceMsg,
) -> Result<bool, Error> {
    let iface_idx = instance.interface_get_or_create(&msg.ifname);
    update_iface_system(instance, iface_idx, msg);
    events::update_nbma(instance, iface_idx, 0)?;

    // Bind tunnels that were waiting for this interface to show up.
    if let Some(ifindex) = msg.ifindex {
        let tunnels = instance
            .interfaces
            .iter()
            .filter(|(tunnel_idx, tunnel)| {
                *tunnel_idx != iface_idx
                    && tunnel.is_tunnel()
                    && tunnel.carrier.is_none()
                    && tunnel.nbma.is_none()
                    && tunnel.link_ifindex == Some(ifindex)
            })
            .map(|(tunnel_idx, _)| tunnel_idx)
            .collect::<Vec<_>>();
        for tunnel_idx in tunnels {
            events::update_nbma(instance, tunnel_idx, 0)?;
        }
    }

    Ok(true)
}

fn process_iface_del(
    instance: &mut Instance,
    msg: &InterfaceMsg,
) -> Result<bool, Error> {
    let Some((iface_idx, _)) = instance.interfaces.get_by_name(&msg.ifname)
    else {
        return Ok(false);
    };

    // The interface is kept around, but without a valid ifindex.
    instance.interfaces.update_ifindex(iface_idx, None);
    instance.interfaces[iface_idx].system.flags = msg.flags;
    events::update_state(instance, iface_idx, 0)?;

    Ok(true)
}

fn process_iface_state(
    instance: &mut Instance,
    msg: &InterfaceMsg,
) -> Result<bool, Error> {
    let Some((iface_idx, _)) = instance.interfaces.get_by_name(&msg.ifname)
    else {
        return Ok(false);
    };

    update_iface_system(instance, iface_idx, msg);
    events::update_state(instance, iface_idx, 0)?;

    Ok(true)
}

fn process_addr_add(
    instance: &mut Instance,
    msg: &AddressMsg,
) -> Result<bool, Error> {
    let Some((iface_idx, iface)) =
        instance.interfaces.get_mut_by_name(&msg.ifname)
    else {
        return Ok(false);
    };

    iface.addr_add(msg.addr, msg.flags);
    events::update_address(instance, iface_idx, msg.addr.address_family(), 0)?;

    Ok(true)
}

fn process_addr_del(
    instance: &mut Instance,
    msg: &AddressMsg,
) -> Result<bool, Error> {
    let Some((iface_idx, iface)) =
        instance.interfaces.get_mut_by_name(&msg.ifname)
    else {
        return Ok(false);
    };

    iface.addr_del(msg.addr);
    events::update_address(instance, iface_idx, msg.addr.address_family(), 0)?;

    Ok(true)
}

fn update_iface_system(
    instance: &mut Instance,
    iface_idx: InterfaceIndex,
    msg: &InterfaceMsg,
) {
    instance.interfaces.update_ifindex(iface_idx, msg.ifindex);
    let iface = &mut instance.interfaces[iface_idx];
    iface.system.hw_type = msg.hw_type;
    iface.system.flags = msg.flags;
}
