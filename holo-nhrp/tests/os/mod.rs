//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use const_addrs::ip4;
use holo_nhrp::os::TunnelConfig;
use netlink_packet_core::DefaultNla;
use netlink_packet_route::link::{
    InfoData, InfoGreTun, InfoKind, LinkAttribute, LinkInfo, LinkMessage,
};

fn link_msg(infos: Vec<LinkInfo>) -> LinkMessage {
    let mut msg = LinkMessage::default();
    msg.header.index = 10;
    msg.attributes.push(LinkAttribute::IfName("gre1".to_owned()));
    msg.attributes.push(LinkAttribute::LinkInfo(infos));
    msg
}

fn gre_link_msg(attrs: Vec<(u16, Vec<u8>)>) -> LinkMessage {
    let attrs = attrs
        .into_iter()
        .map(|(kind, value)| InfoGreTun::Other(DefaultNla::new(kind, value)))
        .collect();
    link_msg(vec![
        LinkInfo::Kind(InfoKind::GreTun),
        LinkInfo::Data(InfoData::GreTun(attrs)),
    ])
}

#[test]
fn gre_tunnel_params() {
    let msg = gre_link_msg(vec![
        // IFLA_GRE_LINK
        (1, 2u32.to_ne_bytes().to_vec()),
        // IFLA_GRE_IKEY
        (4, 0x1234u32.to_be_bytes().to_vec()),
        // IFLA_GRE_LOCAL
        (6, vec![192, 0, 2, 1]),
        // IFLA_GRE_TTL
        (8, vec![64]),
    ]);
    assert_eq!(
        TunnelConfig::from_link_msg(&msg),
        Some(TunnelConfig::new(0x1234, Some(2), Some(ip4!("192.0.2.1"))))
    );
}

#[test]
fn gre_tunnel_unset_params() {
    let msg = gre_link_msg(vec![
        (1, 0u32.to_ne_bytes().to_vec()),
        (4, 0u32.to_be_bytes().to_vec()),
        (6, vec![0, 0, 0, 0]),
    ]);
    assert_eq!(
        TunnelConfig::from_link_msg(&msg),
        Some(TunnelConfig::default())
    );

    // GRE link without attributes.
    let msg = gre_link_msg(vec![]);
    assert_eq!(
        TunnelConfig::from_link_msg(&msg),
        Some(TunnelConfig::default())
    );
}

#[test]
fn gre_tunnel_malformed_attribute() {
    let msg = gre_link_msg(vec![(1, vec![2, 0]), (4, vec![0, 0, 0, 7])]);
    assert_eq!(
        TunnelConfig::from_link_msg(&msg),
        Some(TunnelConfig::new(7, None, None))
    );
}

#[test]
fn non_gre_link() {
    let msg = link_msg(vec![LinkInfo::Kind(InfoKind::Dummy)]);
    assert_eq!(TunnelConfig::from_link_msg(&msg), None);

    let mut msg = LinkMessage::default();
    msg.attributes.push(LinkAttribute::IfName("eth0".to_owned()));
    assert_eq!(TunnelConfig::from_link_msg(&msg), None);
}
