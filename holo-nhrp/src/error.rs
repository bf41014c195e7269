//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use netlink_packet_core::DecodeError;
use sysctl::SysctlError;
use tracing::{error, info, warn, warn_span};

use crate::ip::AddressFamily;

// NHRP errors.
#[derive(Debug)]
pub enum Error {
    // Interfaces
    NotHostPrefix(String, IpNetwork),
    DmvpnConfigError(String, AddressFamily, OsError),
    TunnelConfigError(String, OsError),
    // Notifications
    NotifyLoop(String),
}

// Errors reported by the operating system.
#[derive(Debug)]
pub enum OsError {
    SysctlError(SysctlError),
    IoError(std::io::Error),
    NetlinkDecodeError(DecodeError),
}

// Configuration file errors.
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String, std::io::Error),
    ParseError(String, toml::de::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::NotHostPrefix(name, addr) => {
                // On NHRP interfaces a host prefix is required.
                warn_span!("interface", %name).in_scope(|| {
                    info!(%addr, "{}", self);
                });
            }
            Error::DmvpnConfigError(name, af, error) => {
                warn_span!("interface", %name).in_scope(|| {
                    warn!(%af, error = %with_source(error), "{}", self);
                });
            }
            Error::TunnelConfigError(name, error) => {
                warn_span!("interface", %name).in_scope(|| {
                    warn!(error = %with_source(error), "{}", self);
                });
            }
            Error::NotifyLoop(name) => {
                error!(%name, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotHostPrefix(..) => {
                write!(f, "selected address is not a host prefix")
            }
            Error::DmvpnConfigError(..) => {
                write!(f, "failed to configure interface for DMVPN operation")
            }
            Error::TunnelConfigError(..) => {
                write!(f, "failed to read tunnel parameters")
            }
            Error::NotifyLoop(..) => {
                write!(f, "tunnel/carrier dependency cycle detected")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DmvpnConfigError(_, _, error) => Some(error),
            Error::TunnelConfigError(_, error) => Some(error),
            _ => None,
        }
    }
}

// ===== impl OsError =====

impl std::fmt::Display for OsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsError::SysctlError(..) => {
                write!(f, "failed to update sysctl parameter")
            }
            OsError::IoError(..) => {
                write!(f, "failed to query interface parameter")
            }
            OsError::NetlinkDecodeError(..) => {
                write!(f, "failed to decode netlink message")
            }
        }
    }
}

impl std::error::Error for OsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OsError::SysctlError(error) => Some(error),
            OsError::IoError(error) => Some(error),
            OsError::NetlinkDecodeError(error) => Some(error),
        }
    }
}

// ===== impl ConfigError =====

impl ConfigError {
    pub fn log(&self) {
        match self {
            ConfigError::ReadError(path, error) => {
                error!(%path, error = %with_source(error), "{}", self);
            }
            ConfigError::ParseError(path, error) => {
                error!(%path, error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(..) => {
                write!(f, "failed to read configuration file")
            }
            ConfigError::ParseError(..) => {
                write!(f, "failed to parse configuration file")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError(_, error) => Some(error),
            ConfigError::ParseError(_, error) => Some(error),
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
