//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use generational_arena::Index;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_NOTIFY_DEPTH;
use crate::debug::Debug;
use crate::error::Error;
use crate::events;
use crate::instance::Instance;
use crate::interface::{Interface, InterfaceIndex};

// Events published on an interface notification channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NotifyEvent {
    AddressChange,
    NbmaChange,
    Up,
    Down,
}

/// Opaque handle identifying one subscription to an interface notification
/// channel.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionId(pub(crate) Index);

/// Per-interface notification channel.
///
/// Only the subscription handles are stored here, in registration order. The
/// subscribers themselves live in a side table owned by the interface table.
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Vec<SubscriptionId>,
}

/// Capability of receiving interface notifications.
///
/// Subscribers are invoked synchronously, in registration order, every time
/// an event is published on the channel they subscribed to. The publishing
/// interface is passed along so that no back-reference is needed.
pub trait Subscriber: Send {
    fn notify(
        &mut self,
        id: SubscriptionId,
        event: NotifyEvent,
        iface: &Interface,
    );
}

// Subscription entry (side table).
#[derive(Debug)]
pub(crate) struct Subscription {
    // Interface whose channel this subscription is attached to.
    pub publisher: InterfaceIndex,
    pub kind: SubscriberKind,
}

pub(crate) enum SubscriberKind {
    // Tunnel interface depending on the publisher for its NBMA address.
    Carrier { tunnel: InterfaceIndex },
    // Other daemon subsystems.
    External(Box<dyn Subscriber>),
}

// ===== impl NotifyEvent =====

impl NotifyEvent {
    // Returns whether this event is relevant to tunnels bound to the
    // publishing interface.
    pub(crate) fn affects_carrier(&self) -> bool {
        matches!(self, NotifyEvent::AddressChange | NotifyEvent::NbmaChange)
    }
}

impl std::fmt::Display for NotifyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyEvent::AddressChange => write!(f, "address-changed"),
            NotifyEvent::NbmaChange => write!(f, "nbma-changed"),
            NotifyEvent::Up => write!(f, "up"),
            NotifyEvent::Down => write!(f, "down"),
        }
    }
}

// ===== impl Notifier =====

impl Notifier {
    pub(crate) fn add(&mut self, id: SubscriptionId) {
        self.subscribers.push(id);
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|sub_id| *sub_id != id);
    }

    // Returns an iterator visiting all subscriptions in registration order.
    pub fn subscribers(&self) -> impl Iterator<Item = SubscriptionId> + '_ {
        self.subscribers.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

// ===== impl Subscriber =====

impl<F> Subscriber for F
where
    F: FnMut(SubscriptionId, NotifyEvent, &Interface) + Send,
{
    fn notify(
        &mut self,
        id: SubscriptionId,
        event: NotifyEvent,
        iface: &Interface,
    ) {
        self(id, event, iface)
    }
}

// ===== impl SubscriberKind =====

impl std::fmt::Debug for SubscriberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriberKind::Carrier { tunnel } => {
                f.debug_struct("Carrier").field("tunnel", tunnel).finish()
            }
            SubscriberKind::External(..) => f.write_str("External"),
        }
    }
}

// ===== global functions =====

// Publishes an event on the notification channel of the given interface.
//
// Subscribers registered or removed by an earlier subscriber of the same
// publication are honored: removed ones are skipped, new ones are not
// invoked until the next publication.
pub(crate) fn notify(
    instance: &mut Instance,
    iface_idx: InterfaceIndex,
    event: NotifyEvent,
    depth: usize,
) -> Result<(), Error> {
    let iface = &instance.interfaces[iface_idx];
    if depth >= MAX_NOTIFY_DEPTH {
        return Err(Error::NotifyLoop(iface.name.clone()));
    }
    Debug::Notify(&iface.name, event).log();

    let subscribers = iface.notifier.subscribers().collect::<Vec<_>>();
    for sub_id in subscribers {
        if let Some(tunnel_idx) = instance.interfaces.deliver(sub_id, event) {
            // Re-run the NBMA binding of the dependent tunnel.
            events::update_nbma(instance, tunnel_idx, depth + 1)?;
        }
    }

    Ok(())
}
