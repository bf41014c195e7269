//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::ops::{Index, IndexMut};

use bitflags::bitflags;
use generational_arena::Arena;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::consts::DFLT_HOLDTIME;
use crate::debug::{Debug, InterfaceInactiveReason};
use crate::ip::{AddressFamilies, AddressFamily, IpNetworkExt};
use crate::nhs::Nhs;
use crate::notification::{
    Notifier, NotifyEvent, SubscriberKind, Subscription, SubscriptionId,
};

pub type InterfaceIndex = generational_arena::Index;

#[derive(Debug, Default)]
pub struct Interfaces {
    // Interface arena.
    arena: Arena<Interface>,
    // Interface binary tree keyed by name (1:1).
    name_tree: BTreeMap<String, InterfaceIndex>,
    // Interface hash table keyed by ifindex (1:1).
    ifindex_tree: HashMap<u32, InterfaceIndex>,
    // Subscriptions to the interface notification channels.
    subscriptions: Arena<Subscription>,
}

#[derive(Debug)]
pub struct Interface {
    // Interface name.
    pub name: String,
    // Interface system data.
    pub system: InterfaceSys,
    // NBMA address.
    pub nbma: Option<IpAddr>,
    // Carrier interface supplying the NBMA address.
    pub carrier: Option<CarrierLink>,
    // GRE tunnel parameters.
    pub gre_key: u32,
    pub link_ifindex: Option<u32>,
    // Whether NHRP is active on at least one address family.
    pub enabled: bool,
    // Per address family data.
    pub afs: AddressFamilies<InterfaceAf>,
    // Notification channel.
    pub notifier: Notifier,
    // IPsec protection profiles.
    pub ipsec_profile: Option<String>,
    pub ipsec_fallback_profile: Option<String>,
}

#[derive(Debug, Default)]
pub struct InterfaceSys {
    // Interface ifindex.
    pub ifindex: Option<u32>,
    // Hardware type (ARPHRD_*).
    pub hw_type: u16,
    // Interface flags.
    pub flags: InterfaceFlags,
    // Connected addresses, in the order they were learned.
    pub addresses: Vec<InterfaceAddress>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InterfaceAddress {
    pub addr: IpNetwork,
    pub flags: AddressFlags,
}

#[derive(Debug)]
pub struct InterfaceAf {
    // Holdtime of the cache entries created for this address family.
    pub holdtime: u16,
    // NHRP network-id (zero means disabled).
    pub network_id: u32,
    // Whether the one-time kernel configuration has been done.
    pub configured: bool,
    // Selected local protocol address.
    pub addr: Option<IpAddr>,
    // Whether a local cache binding is installed for the selected address.
    pub bound: bool,
    // Configured Next Hop Servers.
    pub nhs_list: Vec<Nhs>,
}

// Dependency of a tunnel interface on its carrier interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CarrierLink {
    pub iface_idx: InterfaceIndex,
    pub sub_id: SubscriptionId,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct InterfaceFlags: u8 {
        const OPERATIVE = 0x01;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct AddressFlags: u8 {
        const SECONDARY = 0x01;
    }
}

// ===== impl Interfaces =====

impl Interfaces {
    // Returns the interface with the given name, creating it if necessary.
    //
    // The returned flag tells whether a new interface was created.
    pub(crate) fn get_or_insert(
        &mut self,
        ifname: &str,
    ) -> (InterfaceIndex, bool) {
        if let Some(iface_idx) = self.name_tree.get(ifname).copied() {
            return (iface_idx, false);
        }

        let iface = Interface::new(ifname.to_owned());
        let iface_idx = self.arena.insert(iface);
        self.name_tree.insert(ifname.to_owned(), iface_idx);
        (iface_idx, true)
    }

    // Updates the ifindex of the given interface.
    pub(crate) fn update_ifindex(
        &mut self,
        iface_idx: InterfaceIndex,
        ifindex: Option<u32>,
    ) {
        let iface = &mut self.arena[iface_idx];
        if iface.system.ifindex == ifindex {
            return;
        }

        if let Some(old_ifindex) = iface.system.ifindex.take()
            && self.ifindex_tree.get(&old_ifindex) == Some(&iface_idx)
        {
            self.ifindex_tree.remove(&old_ifindex);
        }
        if let Some(ifindex) = ifindex {
            iface.system.ifindex = Some(ifindex);
            self.ifindex_tree.insert(ifindex, iface_idx);
        }
    }

    // Removes the given interface.
    //
    // Subscriptions attached to or held by the interface must have been
    // released beforehand.
    pub(crate) fn remove(
        &mut self,
        iface_idx: InterfaceIndex,
    ) -> Option<Interface> {
        let iface = self.arena.remove(iface_idx)?;
        self.name_tree.remove(&iface.name);
        if let Some(ifindex) = iface.system.ifindex
            && self.ifindex_tree.get(&ifindex) == Some(&iface_idx)
        {
            self.ifindex_tree.remove(&ifindex);
        }
        Some(iface)
    }

    // Attaches a new subscriber to the notification channel of the given
    // interface.
    pub(crate) fn subscribe(
        &mut self,
        publisher: InterfaceIndex,
        kind: SubscriberKind,
    ) -> SubscriptionId {
        let sub = Subscription { publisher, kind };
        let sub_id = SubscriptionId(self.subscriptions.insert(sub));
        self.arena[publisher].notifier.add(sub_id);
        sub_id
    }

    // Detaches a subscriber from the notification channel it's attached to.
    //
    // Unknown subscriptions are ignored.
    pub(crate) fn unsubscribe(
        &mut self,
        sub_id: SubscriptionId,
    ) -> Option<Subscription> {
        let sub = self.subscriptions.remove(sub_id.0)?;
        if let Some(iface) = self.arena.get_mut(sub.publisher) {
            iface.notifier.remove(sub_id);
        }
        Some(sub)
    }

    // Returns whether the given subscription binds a tunnel to its carrier.
    pub(crate) fn is_carrier_subscription(
        &self,
        sub_id: SubscriptionId,
    ) -> bool {
        self.subscriptions.get(sub_id.0).is_some_and(|sub| {
            matches!(sub.kind, SubscriberKind::Carrier { .. })
        })
    }

    // Delivers an event to a single subscriber.
    //
    // External subscribers are invoked right away. For carrier subscriptions,
    // the index of the dependent tunnel is returned so that the caller can
    // re-run its NBMA binding.
    pub(crate) fn deliver(
        &mut self,
        sub_id: SubscriptionId,
        event: NotifyEvent,
    ) -> Option<InterfaceIndex> {
        // The subscription might have been removed by a previous subscriber.
        let sub = self.subscriptions.get_mut(sub_id.0)?;
        match &mut sub.kind {
            SubscriberKind::Carrier { tunnel } => {
                event.affects_carrier().then_some(*tunnel)
            }
            SubscriberKind::External(subscriber) => {
                let iface = &self.arena[sub.publisher];
                subscriber.notify(sub_id, event, iface);
                None
            }
        }
    }

    // Returns the interface a subscription is attached to.
    pub fn subscription_publisher(
        &self,
        sub_id: SubscriptionId,
    ) -> Option<&Interface> {
        self.subscriptions
            .get(sub_id.0)
            .and_then(|sub| self.arena.get(sub.publisher))
    }

    // Returns a reference to the interface corresponding to the given name.
    pub fn get_by_name(
        &self,
        ifname: &str,
    ) -> Option<(InterfaceIndex, &Interface)> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(|iface_idx| (iface_idx, &self.arena[iface_idx]))
    }

    // Returns a mutable reference to the interface corresponding to the given
    // name.
    pub(crate) fn get_mut_by_name(
        &mut self,
        ifname: &str,
    ) -> Option<(InterfaceIndex, &mut Interface)> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(move |iface_idx| (iface_idx, &mut self.arena[iface_idx]))
    }

    // Returns a reference to the interface corresponding to the given ifindex.
    pub fn get_by_ifindex(
        &self,
        ifindex: u32,
    ) -> Option<(InterfaceIndex, &Interface)> {
        self.ifindex_tree
            .get(&ifindex)
            .copied()
            .map(|iface_idx| (iface_idx, &self.arena[iface_idx]))
    }

    // Returns an iterator visiting all interfaces.
    //
    // Interfaces are ordered by their names.
    pub fn iter(&self) -> impl Iterator<Item = (InterfaceIndex, &Interface)> {
        self.name_tree
            .values()
            .map(|iface_idx| (*iface_idx, &self.arena[*iface_idx]))
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

impl Index<InterfaceIndex> for Interfaces {
    type Output = Interface;

    fn index(&self, index: InterfaceIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl IndexMut<InterfaceIndex> for Interfaces {
    fn index_mut(&mut self, index: InterfaceIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}

// ===== impl Interface =====

impl Interface {
    pub(crate) fn new(name: String) -> Interface {
        Debug::InterfaceCreate(&name).log();

        Interface {
            name,
            system: Default::default(),
            nbma: None,
            carrier: None,
            gre_key: 0,
            link_ifindex: None,
            enabled: false,
            afs: Default::default(),
            notifier: Default::default(),
            ipsec_profile: None,
            ipsec_fallback_profile: None,
        }
    }

    // Returns whether this is a GRE tunnel interface.
    pub fn is_tunnel(&self) -> bool {
        self.system.hw_type == libc::ARPHRD_IPGRE
    }

    // Checks whether NHRP can operate on this interface, returning its
    // ifindex on success.
    pub fn is_ready(&self) -> Result<u32, InterfaceInactiveReason> {
        if self.nbma.is_none() {
            return Err(InterfaceInactiveReason::MissingNbmaAddress);
        }
        self.system
            .ifindex
            .ok_or(InterfaceInactiveReason::MissingIfindex)
    }

    // Selects the best connected address of the given address family.
    //
    // Primary addresses are preferred over secondary ones. Among addresses
    // of the same kind, the one with the shortest prefix length wins, and
    // ties are broken in favor of the first address learned.
    pub fn select_address(
        &self,
        af: AddressFamily,
    ) -> Option<&InterfaceAddress> {
        let mut best: Option<&InterfaceAddress> = None;
        for addr in self
            .system
            .addresses
            .iter()
            .filter(|addr| addr.addr.address_family() == af)
        {
            let Some(curr) = best else {
                best = Some(addr);
                continue;
            };

            let curr_secondary = curr.flags.contains(AddressFlags::SECONDARY);
            let addr_secondary = addr.flags.contains(AddressFlags::SECONDARY);
            if curr_secondary != addr_secondary {
                if curr_secondary {
                    best = Some(addr);
                }
                continue;
            }
            if addr.addr.prefix() < curr.addr.prefix() {
                best = Some(addr);
            }
        }
        best
    }

    // Adds or updates a connected address.
    pub(crate) fn addr_add(&mut self, addr: IpNetwork, flags: AddressFlags) {
        match self
            .system
            .addresses
            .iter_mut()
            .find(|iface_addr| iface_addr.addr == addr)
        {
            Some(iface_addr) => iface_addr.flags = flags,
            None => {
                self.system
                    .addresses
                    .push(InterfaceAddress { addr, flags });
            }
        }
    }

    // Removes a connected address.
    pub(crate) fn addr_del(&mut self, addr: IpNetwork) -> bool {
        let len = self.system.addresses.len();
        self.system
            .addresses
            .retain(|iface_addr| iface_addr.addr != addr);
        self.system.addresses.len() != len
    }
}

// ===== impl InterfaceAf =====

impl Default for InterfaceAf {
    fn default() -> InterfaceAf {
        InterfaceAf {
            holdtime: DFLT_HOLDTIME,
            network_id: 0,
            configured: false,
            addr: None,
            bound: false,
            nhs_list: Default::default(),
        }
    }
}
