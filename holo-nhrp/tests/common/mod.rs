//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, Once};

use holo_nhrp::cache::CacheApi;
use holo_nhrp::config::Config;
use holo_nhrp::error::OsError;
use holo_nhrp::instance::Instance;
use holo_nhrp::interface::{AddressFlags, Interface, InterfaceFlags};
use holo_nhrp::ip::AddressFamily;
use holo_nhrp::notification::{NotifyEvent, SubscriptionId};
use holo_nhrp::os::{OsApi, TunnelConfig};
use holo_nhrp::southbound::{AddressMsg, InterfaceMsg, SouthboundMsg};

static INIT: Once = Once::new();

// Carrier interface shared by most tests.
pub const CARRIER_IFINDEX: u32 = 2;

#[derive(Debug, Default)]
pub struct OsState {
    pub tunnels: HashMap<String, TunnelConfig>,
    pub dmvpn_configs: Vec<(String, AddressFamily)>,
    pub fail_dmvpn_config: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StubOs(pub Arc<Mutex<OsState>>);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CacheOp {
    Install(String, IpAddr),
    Remove(String, IpAddr),
}

#[derive(Clone, Debug, Default)]
pub struct StubCache(pub Arc<Mutex<Vec<CacheOp>>>);

pub type EventLog = Arc<Mutex<Vec<(String, NotifyEvent)>>>;

pub struct TestInstance {
    pub instance: Instance,
    pub os: StubOs,
    pub cache: StubCache,
    pub events: EventLog,
}

// ===== impl StubOs =====

impl OsApi for StubOs {
    fn tunnel_config(&mut self, ifname: &str) -> Option<TunnelConfig> {
        self.0.lock().unwrap().tunnels.get(ifname).copied()
    }

    fn configure_dmvpn(
        &mut self,
        _ifindex: u32,
        ifname: &str,
        af: AddressFamily,
    ) -> Result<(), OsError> {
        let mut state = self.0.lock().unwrap();
        if state.fail_dmvpn_config {
            let error = std::io::Error::other("operation not permitted");
            return Err(OsError::IoError(error));
        }
        state.dmvpn_configs.push((ifname.to_owned(), af));
        Ok(())
    }
}

// ===== impl StubCache =====

impl CacheApi for StubCache {
    fn local_binding_install(&mut self, ifname: &str, addr: IpAddr) {
        let op = CacheOp::Install(ifname.to_owned(), addr);
        self.0.lock().unwrap().push(op);
    }

    fn local_binding_remove(&mut self, ifname: &str, addr: IpAddr) {
        let op = CacheOp::Remove(ifname.to_owned(), addr);
        self.0.lock().unwrap().push(op);
    }
}

// ===== impl TestInstance =====

impl TestInstance {
    pub fn new(config: &str) -> TestInstance {
        setup();

        let config: Config = toml::from_str(config).unwrap();
        let os = StubOs::default();
        let cache = StubCache::default();
        let instance = Instance::new(
            config,
            Box::new(os.clone()),
            Box::new(cache.clone()),
        );
        TestInstance {
            instance,
            os,
            cache,
            events: Default::default(),
        }
    }

    pub fn set_tunnel(
        &self,
        ifname: &str,
        link_ifindex: Option<u32>,
        local_addr: Option<&str>,
    ) {
        let local_addr = local_addr.map(|addr| addr.parse().unwrap());
        let tunnel = TunnelConfig::new(0, link_ifindex, local_addr);
        let mut state = self.os.0.lock().unwrap();
        state.tunnels.insert(ifname.to_owned(), tunnel);
    }

    pub fn iface_add(&mut self, ifname: &str, ifindex: u32, hw_type: u16) {
        let msg = iface_msg(ifname, Some(ifindex), hw_type);
        self.process(SouthboundMsg::InterfaceAdd(msg));
    }

    pub fn carrier_add(&mut self, ifname: &str, ifindex: u32) {
        self.iface_add(ifname, ifindex, libc::ARPHRD_ETHER);
    }

    pub fn tunnel_add(&mut self, ifname: &str, ifindex: u32) {
        self.iface_add(ifname, ifindex, libc::ARPHRD_IPGRE);
    }

    pub fn iface_del(&mut self, ifname: &str) {
        let hw_type = self.iface(ifname).system.hw_type;
        let msg = iface_msg(ifname, None, hw_type);
        self.process(SouthboundMsg::InterfaceDel(msg));
    }

    pub fn iface_up(&mut self, ifname: &str) {
        let iface = self.iface(ifname);
        let msg = iface_msg(ifname, iface.system.ifindex, iface.system.hw_type);
        self.process(SouthboundMsg::InterfaceUp(msg));
    }

    pub fn addr_add(&mut self, ifname: &str, addr: &str, secondary: bool) {
        let msg = addr_msg(ifname, addr, secondary);
        self.process(SouthboundMsg::AddressAdd(msg));
    }

    pub fn addr_del(&mut self, ifname: &str, addr: &str) {
        let msg = addr_msg(ifname, addr, false);
        self.process(SouthboundMsg::AddressDel(msg));
    }

    pub fn process(&mut self, msg: SouthboundMsg) {
        self.instance.process_southbound_msg(Some(msg));
    }

    pub fn iface(&self, ifname: &str) -> &Interface {
        self.instance.interface(ifname).unwrap()
    }

    // Records every event published on the given interface.
    pub fn watch(&mut self, ifname: &str) -> SubscriptionId {
        let events = self.events.clone();
        let recorder =
            move |_: SubscriptionId, event: NotifyEvent, iface: &Interface| {
                events.lock().unwrap().push((iface.name.clone(), event));
            };
        self.instance.subscribe(ifname, recorder).unwrap()
    }

    pub fn take_events(&self) -> Vec<(String, NotifyEvent)> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn take_cache_ops(&self) -> Vec<CacheOp> {
        std::mem::take(&mut *self.cache.0.lock().unwrap())
    }

    pub fn dmvpn_configs(&self) -> Vec<(String, AddressFamily)> {
        self.os.0.lock().unwrap().dmvpn_configs.clone()
    }
}

// ===== global functions =====

pub fn setup() {
    INIT.call_once(|| {
        tracing_subscriber::fmt::Subscriber::builder()
            .with_target(false)
            .with_ansi(false)
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    });
}

pub fn event(ifname: &str, event: NotifyEvent) -> (String, NotifyEvent) {
    (ifname.to_owned(), event)
}

// Tunnel gre1 (ifindex 10) on top of eth0, with NHRP enabled for IPv4.
pub fn tunnel_topology() -> TestInstance {
    let mut test = TestInstance::new(
        r#"
        [interfaces.gre1.ipv4]
        network-id = 1
        "#,
    );
    test.set_tunnel("gre1", Some(CARRIER_IFINDEX), None);
    test.carrier_add("eth0", CARRIER_IFINDEX);
    test.addr_add("eth0", "10.0.0.1/24", false);
    test.tunnel_add("gre1", 10);
    test.addr_add("gre1", "172.16.0.1/32", false);
    test
}

// ===== helper functions =====

fn iface_msg(
    ifname: &str,
    ifindex: Option<u32>,
    hw_type: u16,
) -> InterfaceMsg {
    InterfaceMsg {
        ifname: ifname.to_owned(),
        ifindex,
        hw_type,
        flags: InterfaceFlags::OPERATIVE,
    }
}

fn addr_msg(ifname: &str, addr: &str, secondary: bool) -> AddressMsg {
    let mut flags = AddressFlags::empty();
    if secondary {
        flags.insert(AddressFlags::SECONDARY);
    }
    AddressMsg {
        ifname: ifname.to_owned(),
        addr: addr.parse().unwrap(),
        flags,
    }
}
