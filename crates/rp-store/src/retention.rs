//! Time-decayed retention of automatic restore points.
//!
//! Restore points are grouped by title, each group is split into one-hour
//! subgroups, and each older subgroup gets a smaller allowance:
//!
//! ```text
//! subgroup index (newest first):  0  1  2  3  4  5 ...
//! restore points kept at most:    4  3  2  1  1  1 ...
//! ```
//!
//! On top of that each title keeps at most 12 and all titles together keep
//! at most 24. Manual restore points never count and are never evicted.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use rp_types::{Metadata, RestorePointId};

use crate::error::StoreResult;
use crate::gc::{self, GcReport};
use crate::tables;

/// Tunable constants of the retention policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Width of a subgroup, in seconds.
    pub subgroup_period_secs: u64,
    /// Allowance of the newest subgroup; each older one gets one less, min 1.
    pub max_first_subgroup: usize,
}

impl RetentionPolicy {
    /// Per-title cap: `n + (n - 1) + ... + 1`, plus two so that a few old
    /// restore points survive past the decaying subgroups.
    pub fn max_per_group(&self) -> usize {
        let n = self.max_first_subgroup;
        (n + 1) * n / 2 + 2
    }

    /// Cap across all titles: two full groups.
    pub fn max_total(&self) -> usize {
        self.max_per_group() * 2
    }

    /// Allowance of the subgroup discovered at `index` (0 = newest).
    pub fn subgroup_capacity(&self, index: usize) -> usize {
        self.max_first_subgroup.saturating_sub(index).max(1)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            subgroup_period_secs: 60 * 60,
            max_first_subgroup: 4,
        }
    }
}

#[derive(Debug, Default)]
struct GroupState {
    kept: usize,
    subgroups: HashMap<i64, SubgroupState>,
}

#[derive(Debug)]
struct SubgroupState {
    kept: usize,
    /// Number of subgroups of this title discovered before this one.
    index: usize,
}

/// Single-pass eviction decision over restore points fed newest first.
#[derive(Debug)]
pub struct RetentionPlanner {
    policy: RetentionPolicy,
    groups: HashMap<String, GroupState>,
    kept: usize,
}

impl RetentionPlanner {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            groups: HashMap::new(),
            kept: 0,
        }
    }

    /// Decide whether the next (older) restore point should be evicted.
    ///
    /// Records that are kept are counted against their subgroup, their group
    /// and the global cap; evicted ones count against nothing.
    pub fn should_evict(&mut self, metadata: &Metadata) -> bool {
        if !metadata.kind.is_automatic() {
            return false;
        }

        if self.kept >= self.policy.max_total() {
            return true;
        }

        let max_per_group = self.policy.max_per_group();
        let group = self.groups.entry(metadata.title.clone()).or_default();
        if group.kept >= max_per_group {
            return true;
        }

        let bucket = metadata.created.bucket(self.policy.subgroup_period_secs);
        let next_index = group.subgroups.len();
        let subgroup = group
            .subgroups
            .entry(bucket)
            .or_insert(SubgroupState {
                kept: 0,
                index: next_index,
            });
        if subgroup.kept >= self.policy.subgroup_capacity(subgroup.index) {
            return true;
        }

        subgroup.kept += 1;
        group.kept += 1;
        self.kept += 1;
        false
    }

    /// Number of automatic restore points kept so far.
    pub fn kept(&self) -> usize {
        self.kept
    }
}

/// Ids to evict from `records`, which must be ordered newest first.
pub fn plan<'a, I>(policy: RetentionPolicy, records: I) -> Vec<RestorePointId>
where
    I: IntoIterator<Item = (RestorePointId, &'a Metadata)>,
{
    let mut planner = RetentionPlanner::new(policy);
    records
        .into_iter()
        .filter_map(|(id, metadata)| planner.should_evict(metadata).then_some(id))
        .collect()
}

/// Result of one retention pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Metadata records examined.
    pub scanned: usize,
    /// Restore points evicted, newest first.
    pub evicted: Vec<RestorePointId>,
    /// What the follow-up referential GC removed.
    pub gc: GcReport,
}

/// Evict restore points per `policy`, then collect garbage.
///
/// Must run inside one read-write transaction so the eviction and the GC
/// commit or roll back together.
pub fn prune(conn: &Connection, policy: RetentionPolicy) -> StoreResult<PruneReport> {
    let records = tables::metadata_newest_first(conn)?;
    let evicted = plan(policy, records.iter().map(|(id, m)| (*id, m)));

    for id in &evicted {
        tables::delete_metadata(conn, *id)?;
    }
    let gc = gc::collect_garbage(conn)?;

    if evicted.is_empty() {
        debug!(scanned = records.len(), "retention kept every restore point");
    } else {
        info!(
            scanned = records.len(),
            evicted = evicted.len(),
            bytes_freed = gc.bytes_freed,
            "evicted old restore points"
        );
    }

    Ok(PruneReport {
        scanned: records.len(),
        evicted,
        gc,
    })
}
