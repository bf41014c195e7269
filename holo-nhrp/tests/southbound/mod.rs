//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use const_addrs::ip;
use holo_nhrp::interface::InterfaceFlags;
use holo_nhrp::notification::NotifyEvent;
use holo_nhrp::southbound::{InterfaceMsg, SouthboundMsg};

use crate::common::{CARRIER_IFINDEX, CacheOp, TestInstance, event};

// Recorded stream of routing stack messages.
const MSGS: &str = r#"[
    {"InterfaceAdd": {"ifname": "eth0", "ifindex": 2, "hw_type": 1}},
    {"AddressAdd": {"ifname": "eth0", "addr": "10.0.0.1/24"}},
    {"AddressAdd": {"ifname": "eth0", "addr": "2001:db8::1/64"}},
    {"InterfaceAdd": {"ifname": "gre1", "ifindex": 10, "hw_type": 778}},
    {"AddressAdd": {"ifname": "gre1", "addr": "172.16.0.1/32"}},
    {"AddressAdd": {"ifname": "gre1", "addr": "fd00::1/128"}}
]"#;

fn replay(test: &mut TestInstance, msgs: &str) {
    let msgs: Vec<serde_json::Value> = serde_json::from_str(msgs).unwrap();
    for msg in msgs {
        let msg = serde_json::from_value::<SouthboundMsg>(msg).ok();
        test.instance.process_southbound_msg(msg);
    }
}

#[test]
fn replay_messages() {
    let mut test = TestInstance::new(
        r#"
        [interfaces.gre1.ipv4]
        network-id = 1
        [interfaces.gre1.ipv6]
        network-id = 1
        "#,
    );
    test.set_tunnel("gre1", Some(CARRIER_IFINDEX), None);
    replay(&mut test, MSGS);

    let iface = test.iface("gre1");
    assert!(iface.enabled);
    assert_eq!(iface.system.ifindex, Some(10));
    assert_eq!(iface.nbma, Some(ip!("10.0.0.1")));
    assert_eq!(iface.afs.ipv4.addr, Some(ip!("172.16.0.1")));
    assert_eq!(iface.afs.ipv6.addr, Some(ip!("fd00::1")));
    assert_eq!(
        test.take_cache_ops(),
        vec![
            CacheOp::Install("gre1".to_owned(), ip!("172.16.0.1")),
            CacheOp::Install("gre1".to_owned(), ip!("fd00::1")),
        ]
    );
    assert_eq!(test.dmvpn_configs().len(), 2);

    // The carrier only provides the NBMA address.
    let iface = test.iface("eth0");
    assert!(!iface.enabled);
    assert_eq!(iface.afs.ipv6.addr, Some(ip!("2001:db8::1")));
}

#[test]
fn malformed_message() {
    let mut test = TestInstance::new("");
    replay(
        &mut test,
        r#"[
            {"InterfaceAdd": {"ifindex": 2}},
            {"AddressAdd": {"ifname": "eth0", "addr": "10.0.0.1/33"}},
            {"RouteAdd": {"prefix": "10.0.0.0/8"}}
        ]"#,
    );
    test.instance.process_southbound_msg(None);
    assert!(test.instance.interfaces.is_empty());
}

#[test]
fn unknown_interface() {
    let mut test = TestInstance::new("");
    test.carrier_add("eth0", CARRIER_IFINDEX);

    test.addr_add("eth9", "10.0.0.1/24", false);
    test.addr_del("eth9", "10.0.0.1/24");
    let msg = InterfaceMsg {
        ifname: "eth9".to_owned(),
        ifindex: Some(9),
        hw_type: 1,
        flags: InterfaceFlags::OPERATIVE,
    };
    test.process(SouthboundMsg::InterfaceUp(msg.clone()));
    test.process(SouthboundMsg::InterfaceDown(msg.clone()));
    test.process(SouthboundMsg::InterfaceDel(msg));

    assert!(test.instance.interface("eth9").is_none());
    assert_eq!(test.instance.interfaces.len(), 1);
}

#[test]
fn interface_flags() {
    let mut test = TestInstance::new("");
    test.carrier_add("eth0", CARRIER_IFINDEX);
    assert_eq!(test.iface("eth0").system.flags, InterfaceFlags::OPERATIVE);

    let msg = InterfaceMsg {
        ifname: "eth0".to_owned(),
        ifindex: Some(CARRIER_IFINDEX),
        hw_type: 1,
        flags: InterfaceFlags::empty(),
    };
    test.process(SouthboundMsg::InterfaceDown(msg));
    let iface = test.iface("eth0");
    assert!(iface.system.flags.is_empty());
    assert_eq!(iface.system.ifindex, Some(CARRIER_IFINDEX));
}

#[test]
fn interface_ifindex_change() {
    let mut test = TestInstance::new("");
    test.carrier_add("eth0", CARRIER_IFINDEX);
    test.carrier_add("eth0", 20);

    let interfaces = &test.instance.interfaces;
    assert!(interfaces.get_by_ifindex(CARRIER_IFINDEX).is_none());
    let (_, iface) = interfaces.get_by_ifindex(20).unwrap();
    assert_eq!(iface.name, "eth0");
}

#[test]
fn late_carrier() {
    let mut test = TestInstance::new(
        r#"
        [interfaces.gre1.ipv4]
        network-id = 1
        "#,
    );
    test.set_tunnel("gre1", Some(CARRIER_IFINDEX), None);
    test.tunnel_add("gre1", 10);
    test.addr_add("gre1", "172.16.0.1/32", false);
    test.watch("gre1");

    let msgs = r#"[
        {"InterfaceAdd": {"ifname": "eth0", "ifindex": 2, "hw_type": 1}},
        {"AddressAdd": {"ifname": "eth0", "addr": "10.0.0.1/24"}}
    ]"#;
    replay(&mut test, msgs);
    assert_eq!(
        test.take_events(),
        vec![
            event("gre1", NotifyEvent::NbmaChange),
            event("gre1", NotifyEvent::Up),
            event("gre1", NotifyEvent::AddressChange),
        ]
    );
}

#[test]
fn message_names() {
    let msg = InterfaceMsg {
        ifname: "eth0".to_owned(),
        ifindex: Some(CARRIER_IFINDEX),
        hw_type: 1,
        flags: InterfaceFlags::empty(),
    };
    let add = SouthboundMsg::InterfaceAdd(msg.clone());
    let down = SouthboundMsg::InterfaceDown(msg);
    assert_eq!(add.to_string(), "if-add");
    assert_eq!(down.to_string(), "if-down");
}
