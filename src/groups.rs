//! Comparison-group partitioning by SIC classification code.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::models::{EntityRecord, GroupName};

/// SIC code sets defining the code-based comparison groups. Kept as data so a
/// reclassification is a configuration change, not a code change.
#[derive(Debug, Clone)]
pub struct GroupCodes {
    pub broker_dealer: Vec<u32>,
    pub banks: Vec<u32>,
}

impl Default for GroupCodes {
    fn default() -> Self {
        Self {
            broker_dealer: vec![6211, 6221],
            banks: vec![6011, 6020, 6021, 6022, 6029, 6081, 6082],
        }
    }
}

/// Split the linked universe into the three comparison groups, each excluding
/// any entity already in the target group.
///
/// Groups are independent views: if configured code sets overlap, an entity
/// may appear in more than one comparison group, and `Compustat` is always
/// the full "everyone but the target" set.
pub fn partition(
    universe: &[EntityRecord],
    target: &[EntityRecord],
    codes: &GroupCodes,
) -> BTreeMap<GroupName, Vec<EntityRecord>> {
    let target_keys: HashSet<i64> = target.iter().map(|e| e.gvkey).collect();
    let outside_target = |e: &&EntityRecord| !target_keys.contains(&e.gvkey);
    let in_codes = |e: &EntityRecord, set: &[u32]| e.sic.is_some_and(|sic| set.contains(&sic));

    let mut groups = BTreeMap::new();
    groups.insert(GroupName::PrimaryDealers, target.to_vec());
    groups.insert(
        GroupName::BrokerDealers,
        universe
            .iter()
            .filter(|e| in_codes(e, &codes.broker_dealer))
            .filter(outside_target)
            .cloned()
            .collect(),
    );
    groups.insert(
        GroupName::Banks,
        universe
            .iter()
            .filter(|e| in_codes(e, &codes.banks))
            .filter(outside_target)
            .cloned()
            .collect(),
    );
    groups.insert(
        GroupName::Compustat,
        universe.iter().filter(outside_target).cloned().collect(),
    );

    for (group, members) in &groups {
        debug!("{}: {} entities", group, members.len());
    }
    groups
}
