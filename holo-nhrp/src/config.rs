//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::Deserialize;

use crate::consts::{DFLT_CONFIG_FILEPATH, DFLT_HOLDTIME};
use crate::error::ConfigError;
use crate::ip::AddressFamily;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub interfaces: BTreeMap<String, InterfaceCfg>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct InterfaceCfg {
    pub ipv4: InterfaceAfCfg,
    pub ipv6: InterfaceAfCfg,
    pub ipsec_profile: Option<String>,
    pub ipsec_fallback_profile: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct InterfaceAfCfg {
    pub network_id: u32,
    pub holdtime: u16,
    pub nhs: Vec<NhsCfg>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct NhsCfg {
    #[serde(default)]
    pub protocol_address: Option<IpAddr>,
    pub nbma: String,
}

// ===== impl Config =====

impl Config {
    // Loads the configuration from the given file, or from the default
    // location if none is given.
    pub fn load(config_file: Option<&str>) -> Result<Config, ConfigError> {
        let config_file = config_file.unwrap_or(DFLT_CONFIG_FILEPATH);

        let config_str = std::fs::read_to_string(config_file).map_err(
            |error| ConfigError::ReadError(config_file.to_owned(), error),
        )?;
        toml::from_str(&config_str).map_err(|error| {
            ConfigError::ParseError(config_file.to_owned(), error)
        })
    }

    // Returns the configuration of the given interface, if any.
    pub fn interface(&self, ifname: &str) -> Option<&InterfaceCfg> {
        self.interfaces.get(ifname)
    }
}

// ===== impl InterfaceCfg =====

impl InterfaceCfg {
    pub fn af(&self, af: AddressFamily) -> &InterfaceAfCfg {
        match af {
            AddressFamily::Ipv4 => &self.ipv4,
            AddressFamily::Ipv6 => &self.ipv6,
        }
    }
}

// ===== impl InterfaceAfCfg =====

impl Default for InterfaceAfCfg {
    fn default() -> InterfaceAfCfg {
        InterfaceAfCfg {
            network_id: 0,
            holdtime: DFLT_HOLDTIME,
            nhs: Default::default(),
        }
    }
}
