//! Device groups: attributing host addresses to named subnets.
//!
//! Grouping is a read-time projection. The recorder stores per-device data
//! only, and [`GroupClassifier::fold`] turns a stored period into per-group
//! totals, so history can be regrouped after the configuration changes.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::core::address::NetworkBinding;
use crate::core::stats::PeriodStats;

/// A named, ordered set of subnet bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceGroup {
    pub name: String,
    pub bindings: Vec<NetworkBinding>,
}

impl DeviceGroup {
    pub fn new(name: impl Into<String>, bindings: Vec<NetworkBinding>) -> Self {
        Self {
            name: name.into(),
            bindings,
        }
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.bindings.iter().any(|b| b.matches(address))
    }
}

/// Aggregated traffic for one device group within a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub name: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets: u64,
    /// Number of distinct addresses attributed to the group.
    pub devices: usize,
}

/// Resolves addresses to group names. Groups are checked in configuration
/// order and the first match wins; unmatched addresses fall into the default
/// group.
#[derive(Debug, Clone)]
pub struct GroupClassifier {
    groups: Vec<DeviceGroup>,
    default_group: String,
}

impl GroupClassifier {
    pub fn new(groups: Vec<DeviceGroup>, default_group: impl Into<String>) -> Self {
        Self {
            groups,
            default_group: default_group.into(),
        }
    }

    pub fn groups(&self) -> &[DeviceGroup] {
        &self.groups
    }

    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    pub fn classify(&self, address: Ipv4Addr) -> &str {
        classify(address, &self.groups, &self.default_group)
    }

    /// Fold a period's per-device counters into per-group totals.
    ///
    /// One entry per configured group in configuration order, followed by
    /// the default group. Groups with no traffic are reported with zeros.
    pub fn fold(&self, stats: &PeriodStats) -> Vec<GroupStats> {
        let mut folded: Vec<GroupStats> = self
            .groups
            .iter()
            .map(|g| g.name.as_str())
            .chain(std::iter::once(self.default_group.as_str()))
            .map(|name| GroupStats {
                name: name.to_string(),
                ..GroupStats::default()
            })
            .collect();
        let default_idx = folded.len() - 1;

        for (address, device) in &stats.devices {
            let idx = self
                .groups
                .iter()
                .position(|g| g.contains(*address))
                .unwrap_or(default_idx);
            let group = &mut folded[idx];
            group.bytes_in += device.bytes_in;
            group.bytes_out += device.bytes_out;
            group.packets += device.packets;
            group.devices += 1;
        }

        folded
    }
}

/// Name of the first group in `groups` with a binding matching `address`, or
/// `default_group` when none does.
pub fn classify<'a>(address: Ipv4Addr, groups: &'a [DeviceGroup], default_group: &'a str) -> &'a str {
    groups
        .iter()
        .find(|g| g.contains(address))
        .map(|g| g.name.as_str())
        .unwrap_or(default_group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn group(name: &str, subnets: &[&str]) -> DeviceGroup {
        DeviceGroup::new(name, subnets.iter().map(|s| s.parse().unwrap()).collect())
    }

    fn classifier() -> GroupClassifier {
        GroupClassifier::new(
            vec![group("A", &["10.0.0.0/24"]), group("B", &["10.0.0.0/8"])],
            "Other",
        )
    }

    #[test]
    fn test_first_matching_group_wins() {
        let c = classifier();
        assert_eq!(c.classify(addr("10.0.0.5")), "A");
        assert_eq!(c.classify(addr("10.1.0.5")), "B");
    }

    #[test]
    fn test_order_is_significant() {
        let reversed = GroupClassifier::new(
            vec![group("B", &["10.0.0.0/8"]), group("A", &["10.0.0.0/24"])],
            "Other",
        );
        assert_eq!(reversed.classify(addr("10.0.0.5")), "B");
    }

    #[test]
    fn test_unmatched_address_falls_into_default_group() {
        assert_eq!(classifier().classify(addr("192.168.1.1")), "Other");
    }

    #[test]
    fn test_default_group_with_no_configured_groups() {
        let c = GroupClassifier::new(Vec::new(), "Everything");
        assert_eq!(c.classify(addr("1.2.3.4")), "Everything");
    }

    #[test]
    fn test_any_binding_in_group_matches() {
        let c = GroupClassifier::new(
            vec![group("Office", &["192.168.1.0/24", "192.168.2.0/24"])],
            "Other",
        );
        assert_eq!(c.classify(addr("192.168.2.40")), "Office");
        assert_eq!(c.classify(addr("192.168.3.40")), "Other");
    }

    #[test]
    fn test_free_function_matches_method() {
        let c = classifier();
        for a in ["10.0.0.1", "10.200.0.1", "8.8.8.8"] {
            assert_eq!(
                classify(addr(a), c.groups(), c.default_group()),
                c.classify(addr(a))
            );
        }
    }

    #[test]
    fn test_fold_attributes_devices_in_configuration_order() {
        let mut stats = PeriodStats::new(Utc::now());
        {
            let d = stats.device_mut(addr("10.0.0.5"));
            d.bytes_out = 100;
            d.packets = 2;
        }
        {
            let d = stats.device_mut(addr("10.0.0.6"));
            d.bytes_in = 50;
            d.packets = 1;
        }
        {
            let d = stats.device_mut(addr("10.9.0.1"));
            d.bytes_in = 7;
            d.packets = 1;
        }
        {
            let d = stats.device_mut(addr("8.8.8.8"));
            d.bytes_in = 3;
            d.bytes_out = 4;
            d.packets = 2;
        }

        let folded = classifier().fold(&stats);
        let names: Vec<&str> = folded.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "Other"]);

        assert_eq!(
            folded[0],
            GroupStats {
                name: "A".into(),
                bytes_in: 50,
                bytes_out: 100,
                packets: 3,
                devices: 2
            }
        );
        assert_eq!(folded[1].bytes_in, 7);
        assert_eq!(folded[1].devices, 1);
        assert_eq!(folded[2].bytes_in, 3);
        assert_eq!(folded[2].bytes_out, 4);
    }

    #[test]
    fn test_fold_reports_empty_groups_with_zeros() {
        let stats = PeriodStats::new(Utc::now());
        let folded = classifier().fold(&stats);
        assert_eq!(folded.len(), 3);
        assert!(folded.iter().all(|g| g.packets == 0 && g.devices == 0));
    }
}
