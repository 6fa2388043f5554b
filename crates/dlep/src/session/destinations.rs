// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The destination table: every remote peer the modem currently reaches.
//!
//! Keyed by MAC. Address and subnet changes apply with set semantics, so
//! replaying the same validated update leaves the table unchanged. The
//! table lives and dies with the session.

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

use crate::protocol::items::{AddressItem, AddressOp, MacAddress, MetricSet, SubnetItem};

/// IP addresses and attached subnets belonging to one destination (or to
/// the modem itself, for session-level state).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddressSet {
    addresses: BTreeSet<IpAddr>,
    subnets: BTreeSet<(IpAddr, u8)>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one Address item. Add of a present address and drop of an
    /// absent one are no-ops, which is what makes replays idempotent.
    pub fn apply_address(&mut self, item: &AddressItem) {
        match item.op {
            AddressOp::Add => {
                self.addresses.insert(item.addr);
            }
            AddressOp::Drop => {
                self.addresses.remove(&item.addr);
            }
        }
    }

    /// Apply one Attached Subnet item.
    pub fn apply_subnet(&mut self, item: &SubnetItem) {
        match item.op {
            AddressOp::Add => {
                self.subnets.insert((item.addr, item.prefix));
            }
            AddressOp::Drop => {
                self.subnets.remove(&(item.addr, item.prefix));
            }
        }
    }

    pub fn apply_all(&mut self, addresses: &[AddressItem], subnets: &[SubnetItem]) {
        for item in addresses {
            self.apply_address(item);
        }
        for item in subnets {
            self.apply_subnet(item);
        }
    }

    pub fn addresses(&self) -> impl Iterator<Item = &IpAddr> {
        self.addresses.iter()
    }

    pub fn subnets(&self) -> impl Iterator<Item = &(IpAddr, u8)> {
        self.subnets.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.subnets.is_empty()
    }
}

impl std::fmt::Display for AddressSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        let mut sep = "";
        for addr in &self.addresses {
            write!(f, "{}{}", sep, addr)?;
            sep = " ";
        }
        for (addr, prefix) in &self.subnets {
            write!(f, "{}{}/{}", sep, addr, prefix)?;
            sep = " ";
        }
        Ok(())
    }
}

/// One reachable remote peer.
#[derive(Debug, Default, Clone)]
pub struct Destination {
    pub reach: AddressSet,
    pub metrics: MetricSet,
}

/// All destinations announced by the modem, keyed by MAC address.
#[derive(Debug, Default)]
pub struct DestinationTable {
    entries: HashMap<MacAddress, Destination>,
}

impl DestinationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.entries.contains_key(mac)
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&Destination> {
        self.entries.get(mac)
    }

    /// Insert a destination announced by Destination Up.
    ///
    /// Returns false (and leaves the table untouched) when the MAC is
    /// already present.
    pub fn insert(
        &mut self,
        mac: MacAddress,
        addresses: &[AddressItem],
        subnets: &[SubnetItem],
        metrics: &MetricSet,
    ) -> bool {
        if self.entries.contains_key(&mac) {
            return false;
        }
        let mut dest = Destination::default();
        dest.reach.apply_all(addresses, subnets);
        dest.metrics = *metrics;
        self.entries.insert(mac, dest);
        true
    }

    /// Apply a Destination Update. Returns false when the MAC is unknown.
    pub fn update(
        &mut self,
        mac: &MacAddress,
        addresses: &[AddressItem],
        subnets: &[SubnetItem],
        metrics: &MetricSet,
    ) -> bool {
        match self.entries.get_mut(mac) {
            Some(dest) => {
                dest.reach.apply_all(addresses, subnets);
                dest.metrics.merge(metrics);
                true
            }
            None => false,
        }
    }

    /// Remove a destination taken down by the modem. Returns false when the
    /// MAC is unknown.
    pub fn remove(&mut self, mac: &MacAddress) -> bool {
        self.entries.remove(mac).is_some()
    }
}
