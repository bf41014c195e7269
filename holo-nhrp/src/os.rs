//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use capctl::caps::CapState;
use derive_new::new;
use netlink_packet_core::{
    NLA_TYPE_MASK, NLM_F_REQUEST, Nla, NetlinkHeader, NetlinkMessage,
    NetlinkPayload,
};
use netlink_packet_route::RouteNetlinkMessage;
use netlink_packet_route::link::{
    InfoData, InfoGreTun, LinkAttribute, LinkInfo, LinkMessage,
};
use netlink_sys::protocols::NETLINK_ROUTE;
use netlink_sys::{Socket, SocketAddr};
use serde::{Deserialize, Serialize};
use sysctl::{Ctl, Sysctl, SysctlError};
use tracing::error;

use crate::error::{Error, OsError};
use crate::ip::AddressFamily;

// GRE link attributes (IFLA_GRE_*).
const IFLA_GRE_LINK: u16 = 1;
const IFLA_GRE_IKEY: u16 = 4;
const IFLA_GRE_LOCAL: u16 = 6;

// GRE tunnel parameters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct TunnelConfig {
    // GRE key.
    pub key: u32,
    // Underlying link ifindex.
    pub link_ifindex: Option<u32>,
    // Configured local (source) address.
    pub local_addr: Option<Ipv4Addr>,
}

/// Operating system services needed by NHRP.
///
/// Both operations are synchronous and expected to be idempotent.
pub trait OsApi: std::fmt::Debug + Send {
    /// Reads the parameters of the given GRE tunnel interface.
    fn tunnel_config(&mut self, ifname: &str) -> Option<TunnelConfig>;

    /// Prepares the given interface for DMVPN operation on the given address
    /// family.
    fn configure_dmvpn(
        &mut self,
        ifindex: u32,
        ifname: &str,
        af: AddressFamily,
    ) -> Result<(), OsError>;
}

/// Linux implementation of [`OsApi`].
#[derive(Debug, Default)]
pub struct Kernel;

// ===== impl TunnelConfig =====

impl TunnelConfig {
    /// Extracts the GRE tunnel parameters from a link message.
    ///
    /// Returns `None` if the link isn't a GRE tunnel.
    pub fn from_link_msg(msg: &LinkMessage) -> Option<TunnelConfig> {
        let gre_attrs = msg
            .attributes
            .iter()
            .filter_map(|attr| match attr {
                LinkAttribute::LinkInfo(infos) => Some(infos),
                _ => None,
            })
            .flatten()
            .find_map(|info| match info {
                LinkInfo::Data(InfoData::GreTun(attrs)) => Some(attrs),
                _ => None,
            })?;

        let mut tunnel = TunnelConfig::default();
        for attr in gre_attrs {
            let InfoGreTun::Other(nla) = attr else {
                continue;
            };
            let mut value = vec![0; nla.value_len()];
            nla.emit_value(&mut value);
            let Ok(value) = <[u8; 4]>::try_from(value.as_slice()) else {
                continue;
            };

            match nla.kind() & NLA_TYPE_MASK {
                IFLA_GRE_LINK => {
                    let link = u32::from_ne_bytes(value);
                    tunnel.link_ifindex = (link != 0).then_some(link);
                }
                IFLA_GRE_IKEY => {
                    tunnel.key = u32::from_be_bytes(value);
                }
                IFLA_GRE_LOCAL => {
                    let local = Ipv4Addr::from(value);
                    tunnel.local_addr =
                        (!local.is_unspecified()).then_some(local);
                }
                _ => (),
            }
        }

        Some(tunnel)
    }
}

// ===== impl Kernel =====

impl Kernel {
    // Fetches the link with the given name using RTM_GETLINK.
    fn link_get(ifname: &str) -> Result<LinkMessage, OsError> {
        let mut socket = Socket::new(NETLINK_ROUTE).map_err(OsError::IoError)?;
        socket.bind_auto().map_err(OsError::IoError)?;
        socket
            .connect(&SocketAddr::new(0, 0))
            .map_err(OsError::IoError)?;

        // Send request.
        let mut link_msg = LinkMessage::default();
        link_msg
            .attributes
            .push(LinkAttribute::IfName(ifname.to_owned()));
        let mut header = NetlinkHeader::default();
        header.flags = NLM_F_REQUEST;
        let payload = RouteNetlinkMessage::GetLink(link_msg);
        let mut msg =
            NetlinkMessage::new(header, NetlinkPayload::InnerMessage(payload));
        msg.finalize();
        let mut buf = vec![0; msg.buffer_len()];
        msg.serialize(&mut buf);
        socket.send(&buf, 0).map_err(OsError::IoError)?;

        // Receive reply.
        let (buf, _) = socket.recv_from_full().map_err(OsError::IoError)?;
        let msg = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&buf)
            .map_err(OsError::NetlinkDecodeError)?;
        match msg.payload {
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewLink(msg)) => {
                Ok(msg)
            }
            NetlinkPayload::Error(error) => {
                Err(OsError::IoError(error.to_io()))
            }
            _ => Err(OsError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "unexpected netlink reply",
            ))),
        }
    }
}

impl OsApi for Kernel {
    fn tunnel_config(&mut self, ifname: &str) -> Option<TunnelConfig> {
        match Kernel::link_get(ifname) {
            Ok(msg) => TunnelConfig::from_link_msg(&msg),
            Err(error) => {
                Error::TunnelConfigError(ifname.to_owned(), error).log();
                None
            }
        }
    }

    fn configure_dmvpn(
        &mut self,
        _ifindex: u32,
        ifname: &str,
        af: AddressFamily,
    ) -> Result<(), OsError> {
        match af {
            AddressFamily::Ipv4 => {
                // NHRP redirects replace ICMP redirects.
                let name = format!("net.ipv4.conf.{ifname}.send_redirects");
                sysctl_set(&name, "0").map_err(OsError::SysctlError)
            }
            AddressFamily::Ipv6 => Ok(()),
        }
    }
}

// ===== helper functions =====

fn sysctl_set(name: &str, value: &str) -> Result<(), SysctlError> {
    raise_capabilities(|| {
        let ctl = Ctl::new(name)?;
        ctl.set_value_string(value)?;
        Ok(())
    })
}

// Runs the provided closure with elevated capabilities.
fn raise_capabilities<F, R>(cb: F) -> R
where
    F: FnOnce() -> R,
{
    let mut caps = match CapState::get_current() {
        Ok(caps) => caps,
        Err(error) => {
            error!("failed to get current capabilities: {}", error);
            return cb();
        }
    };

    // Raise capabilities.
    caps.effective = caps.permitted;
    if let Err(error) = caps.set_current() {
        error!("failed to update current capabilities: {}", error);
    }

    // Run closure.
    let ret = cb();

    // Drop capabilities.
    caps.effective.clear();
    if let Err(error) = caps.set_current() {
        error!("failed to update current capabilities: {}", error);
    }

    ret
}
