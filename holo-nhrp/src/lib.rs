//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod cache;
pub mod config;
pub mod consts;
pub mod debug;
pub mod error;
mod events;
pub mod instance;
pub mod interface;
pub mod ip;
pub mod nhs;
pub mod notification;
pub mod os;
pub mod southbound;
