//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use crate::debug::{Debug, InterfaceInactiveReason};
use crate::error::Error;
use crate::instance::Instance;
use crate::interface::{CarrierLink, InterfaceIndex};
use crate::ip::{AddressFamily, IpNetworkExt};
use crate::notification::{self, NotifyEvent, SubscriberKind};

// ===== NBMA address resolution =====

// Resolves the NBMA address of the interface, (re)binding tunnel interfaces
// to their carrier interface when necessary.
pub(crate) fn update_nbma(
    instance: &mut Instance,
    iface_idx: InterfaceIndex,
    depth: usize,
) -> Result<(), Error> {
    let mut nbma = None;
    let mut carrier_idx = None;

    // Read the tunnel parameters from the kernel.
    let iface = &mut instance.interfaces[iface_idx];
    if iface.is_tunnel()
        && let Some(tunnel) = instance.os.tunnel_config(&iface.name)
    {
        Debug::InterfaceTunnelConfig(&iface.name, &tunnel).log();
        iface.gre_key = tunnel.key;
        iface.link_ifindex = tunnel.link_ifindex;

        if let Some(local_addr) = tunnel.local_addr {
            nbma = Some(IpAddr::V4(local_addr));
        } else if let Some(link_ifindex) = tunnel.link_ifindex {
            carrier_idx = instance
                .interfaces
                .get_by_ifindex(link_ifindex)
                .map(|(carrier_idx, _)| carrier_idx)
                .filter(|carrier_idx| *carrier_idx != iface_idx);
        }
    }

    // Check if the carrier interface has changed.
    let old_carrier = instance.interfaces[iface_idx].carrier;
    if old_carrier.map(|carrier| carrier.iface_idx) != carrier_idx {
        if let Some(old_carrier) = old_carrier {
            instance.interfaces.unsubscribe(old_carrier.sub_id);
            Debug::InterfaceCarrierUnbind(
                &instance.interfaces[iface_idx].name,
                &instance.interfaces[old_carrier.iface_idx].name,
            )
            .log();
        }

        let carrier = carrier_idx.map(|carrier_idx| {
            let kind = SubscriberKind::Carrier { tunnel: iface_idx };
            let sub_id = instance.interfaces.subscribe(carrier_idx, kind);
            CarrierLink {
                iface_idx: carrier_idx,
                sub_id,
            }
        });
        instance.interfaces[iface_idx].carrier = carrier;
        if let Some(carrier_idx) = carrier_idx {
            Debug::InterfaceCarrierBind(
                &instance.interfaces[iface_idx].name,
                &instance.interfaces[carrier_idx].name,
            )
            .log();
        }
    }

    // The carrier's primary IPv4 address is the NBMA address.
    if let Some(carrier_idx) = carrier_idx {
        nbma = instance.interfaces[carrier_idx].afs.ipv4.addr;
    }

    // Check if the NBMA address has changed.
    let iface = &mut instance.interfaces[iface_idx];
    if iface.nbma != nbma {
        iface.nbma = nbma;
        Debug::InterfaceNbmaChange(&iface.name, nbma).log();
        notification::notify(
            instance,
            iface_idx,
            NotifyEvent::NbmaChange,
            depth,
        )?;
    }

    // The NBMA address affects the interface operational state.
    update_state(instance, iface_idx, depth)
}

// ===== interface enable/disable state machine =====

// Checks if NHRP needs to be started or stopped on the interface.
pub(crate) fn update_state(
    instance: &mut Instance,
    iface_idx: InterfaceIndex,
    depth: usize,
) -> Result<(), Error> {
    let mut active_afs = Vec::with_capacity(AddressFamily::ALL.len());

    let iface = &mut instance.interfaces[iface_idx];
    let result = iface.is_ready().and_then(|ifindex| {
        for af in AddressFamily::ALL {
            let iface_af = &mut iface.afs[af];
            if iface_af.network_id == 0 {
                iface_af.configured = false;
                continue;
            }

            // One-time kernel configuration. Failures are retried the next
            // time the state is evaluated.
            if !iface_af.configured {
                match instance.os.configure_dmvpn(ifindex, &iface.name, af) {
                    Ok(()) => {
                        iface_af.configured = true;
                        Debug::InterfaceDmvpnConfig(&iface.name, af).log();
                    }
                    Err(error) => {
                        let ifname = iface.name.clone();
                        Error::DmvpnConfigError(ifname, af, error).log();
                    }
                }
            }
            active_afs.push(af);
        }

        if active_afs.is_empty() {
            return Err(InterfaceInactiveReason::NoNetworkId);
        }
        Ok(())
    });

    // Publish state transitions.
    let enabled = result.is_ok();
    if enabled != iface.enabled {
        iface.enabled = enabled;
        let event = match result {
            Ok(()) => {
                // Address selection of the active families starts over, now
                // with the host prefix requirement in effect.
                Debug::InterfaceStart(&iface.name).log();
                for af in &active_afs {
                    iface.afs[*af].addr = None;
                }
                NotifyEvent::Up
            }
            Err(reason) => {
                Debug::InterfaceStop(&iface.name, reason).log();
                NotifyEvent::Down
            }
        };

        // Local cache bindings are removed before DOWN is published.
        if !enabled {
            binding_remove_inactive(instance, iface_idx, &[]);
        }
        notification::notify(instance, iface_idx, event, depth)?;
    } else if enabled {
        binding_remove_inactive(instance, iface_idx, &active_afs);
    }

    // Refresh the protocol address of the active address families.
    if enabled {
        for af in active_afs {
            update_address(instance, iface_idx, af, depth)?;
        }
    }

    Ok(())
}

// Removes the local cache bindings of the address families that aren't
// active anymore.
fn binding_remove_inactive(
    instance: &mut Instance,
    iface_idx: InterfaceIndex,
    active_afs: &[AddressFamily],
) {
    let iface = &mut instance.interfaces[iface_idx];
    for af in AddressFamily::ALL {
        let iface_af = &mut iface.afs[af];
        if active_afs.contains(&af) || !iface_af.bound {
            continue;
        }
        if let Some(addr) = iface_af.addr {
            instance.cache.local_binding_remove(&iface.name, addr);
        }
        iface_af.bound = false;
    }
}

// ===== protocol address selection =====

// Selects the local protocol address of the given address family, updating
// the local cache bindings when it changes.
pub(crate) fn update_address(
    instance: &mut Instance,
    iface_idx: InterfaceIndex,
    af: AddressFamily,
    depth: usize,
) -> Result<(), Error> {
    let iface = &mut instance.interfaces[iface_idx];
    let active = iface.enabled && iface.afs[af].network_id != 0;

    // On NHRP interfaces a host prefix is required.
    let mut best = iface.select_address(af).map(|iface_addr| iface_addr.addr);
    if let Some(addr) = best
        && active
        && !addr.is_host_prefix()
    {
        Error::NotHostPrefix(iface.name.clone(), addr).log();
        best = None;
    }

    // Check if the address has changed.
    let addr = best.map(|best| best.ip());
    let iface_af = &mut iface.afs[af];
    if iface_af.addr == addr {
        // The address family might have just been activated.
        if active
            && !iface_af.bound
            && let Some(addr) = addr
        {
            instance.cache.local_binding_install(&iface.name, addr);
            iface_af.bound = true;
        }
        return Ok(());
    }

    // Update local cache bindings.
    if iface_af.bound
        && let Some(old_addr) = iface_af.addr
    {
        instance.cache.local_binding_remove(&iface.name, old_addr);
    }
    iface_af.bound = false;
    Debug::InterfaceAddrChange(&iface.name, af, best.as_ref()).log();
    iface_af.addr = addr;
    if active && let Some(addr) = addr {
        instance.cache.local_binding_install(&iface.name, addr);
        iface_af.bound = true;
    }

    notification::notify(instance, iface_idx, NotifyEvent::AddressChange, depth)
}
