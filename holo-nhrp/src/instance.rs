//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::cache::CacheApi;
use crate::config::Config;
use crate::debug::Debug;
use crate::events;
use crate::interface::{Interface, InterfaceIndex, Interfaces};
use crate::ip::AddressFamily;
use crate::nhs::Nhs;
use crate::notification::{Subscriber, SubscriberKind, SubscriptionId};
use crate::os::OsApi;

#[derive(Debug)]
pub struct Instance {
    // Daemon configuration.
    pub config: Config,
    // List of interfaces.
    pub interfaces: Interfaces,
    // Operating system services.
    pub os: Box<dyn OsApi>,
    // NHRP cache.
    pub cache: Box<dyn CacheApi>,
}

// ===== impl Instance =====

impl Instance {
    pub fn new(
        config: Config,
        os: Box<dyn OsApi>,
        cache: Box<dyn CacheApi>,
    ) -> Instance {
        Instance {
            config,
            interfaces: Default::default(),
            os,
            cache,
        }
    }

    // Returns a reference to the interface corresponding to the given name.
    pub fn interface(&self, ifname: &str) -> Option<&Interface> {
        self.interfaces.get_by_name(ifname).map(|(_, iface)| iface)
    }

    // Returns the interface with the given name, creating it if necessary.
    //
    // New interfaces are initialized from their configuration.
    pub(crate) fn interface_get_or_create(
        &mut self,
        ifname: &str,
    ) -> InterfaceIndex {
        let (iface_idx, created) = self.interfaces.get_or_insert(ifname);
        if !created {
            return iface_idx;
        }

        if let Some(iface_cfg) = self.config.interface(ifname) {
            let iface = &mut self.interfaces[iface_idx];
            for af in AddressFamily::ALL {
                let af_cfg = iface_cfg.af(af);
                let iface_af = &mut iface.afs[af];
                iface_af.holdtime = af_cfg.holdtime;
                iface_af.network_id = af_cfg.network_id;
                iface_af.nhs_list = af_cfg
                    .nhs
                    .iter()
                    .map(|nhs_cfg| Nhs::from_config(af, nhs_cfg))
                    .collect();
            }
            iface.ipsec_profile.clone_from(&iface_cfg.ipsec_profile);
            iface
                .ipsec_fallback_profile
                .clone_from(&iface_cfg.ipsec_fallback_profile);
        }

        iface_idx
    }

    /// Destroys the interface with the given name.
    ///
    /// Owned next hop servers and local cache bindings are released, and
    /// tunnels bound to this interface lose their NBMA address.
    pub fn delete_interface(&mut self, ifname: &str) {
        let Some((iface_idx, iface)) = self.interfaces.get_mut_by_name(ifname)
        else {
            return;
        };

        // Release next hop servers and local cache bindings.
        for af in AddressFamily::ALL {
            let iface_af = &mut iface.afs[af];
            for nhs in iface_af.nhs_list.drain(..) {
                nhs.free(&iface.name);
            }
            if iface_af.bound
                && let Some(addr) = iface_af.addr.take()
            {
                self.cache.local_binding_remove(&iface.name, addr);
            }
        }

        // Release carrier subscription.
        if let Some(carrier) = iface.carrier.take() {
            self.interfaces.unsubscribe(carrier.sub_id);
        }

        // Detach all subscribers.
        let mut tunnels = vec![];
        let subscribers = self.interfaces[iface_idx]
            .notifier
            .subscribers()
            .collect::<Vec<_>>();
        for sub_id in subscribers {
            if let Some(sub) = self.interfaces.unsubscribe(sub_id)
                && let SubscriberKind::Carrier { tunnel } = sub.kind
            {
                self.interfaces[tunnel].carrier = None;
                tunnels.push(tunnel);
            }
        }

        Debug::InterfaceDelete(ifname).log();
        self.interfaces.remove(iface_idx);

        // Tunnels that were bound to this interface need a new NBMA address.
        for tunnel_idx in tunnels {
            if let Err(error) = events::update_nbma(self, tunnel_idx, 0) {
                error.log();
            }
        }
    }

    /// Subscribes to the notification channel of the given interface.
    ///
    /// Returns `None` if the interface doesn't exist.
    pub fn subscribe(
        &mut self,
        ifname: &str,
        subscriber: impl Subscriber + 'static,
    ) -> Option<SubscriptionId> {
        let (iface_idx, _) = self.interfaces.get_by_name(ifname)?;
        let kind = SubscriberKind::External(Box::new(subscriber));
        Some(self.interfaces.subscribe(iface_idx, kind))
    }

    /// Cancels a subscription. Unknown handles are ignored.
    pub fn unsubscribe(&mut self, sub_id: SubscriptionId) {
        // Carrier bindings are owned by the tunnel interfaces.
        if self.interfaces.is_carrier_subscription(sub_id) {
            return;
        }
        self.interfaces.unsubscribe(sub_id);
    }

    /// Replaces the IPsec protection profiles of the given interface.
    pub fn set_protection(
        &mut self,
        ifname: &str,
        profile: Option<&str>,
        fallback_profile: Option<&str>,
    ) {
        let Some((_, iface)) = self.interfaces.get_mut_by_name(ifname) else {
            return;
        };

        iface.ipsec_profile = profile.map(str::to_owned);
        iface.ipsec_fallback_profile = fallback_profile.map(str::to_owned);
    }

    /// Updates the NHRP network-id of the given interface and address family.
    ///
    /// A network-id of zero disables NHRP on that address family.
    pub fn set_network_id(
        &mut self,
        ifname: &str,
        af: AddressFamily,
        network_id: u32,
    ) {
        let Some((iface_idx, iface)) = self.interfaces.get_mut_by_name(ifname)
        else {
            return;
        };
        if iface.afs[af].network_id == network_id {
            return;
        }
        iface.afs[af].network_id = network_id;

        if let Err(error) = events::update_state(self, iface_idx, 0) {
            error.log();
        }
    }
}
