//! Tag-dependency and scheduled invalidation bookkeeping (§4.6).
//!
//! Redis models these as a hash (`cache:invalidation:rules`) and a sorted
//! set (`cache:invalidation:schedule`). [`ai_orchestrator_core::KeyValueStore`]
//! exposes counters, a sorted-set *count*, and plain get/set, but no
//! range-read over a sorted set's members — so both structures are kept as a
//! single JSON blob under their Redis key name instead of a real hash/zset.
//! Same key names, same semantics, simpler storage given the KV surface this
//! crate can actually use.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub(crate) const RULES_KEY: &str = "cache:invalidation:rules";
pub(crate) const SCHEDULE_KEY: &str = "cache:invalidation:schedule";

/// A tag-dependency rule: invalidate `pattern` whenever any key in
/// `dependencies` is invalidated; if `cascade`, recurse using `pattern` as
/// the new source key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationRule {
    pub pattern: String,
    pub dependencies: Vec<String>,
    pub cascade: bool,
}

pub(crate) type RuleSet = HashMap<String, InvalidationRule>;

/// An entry on the invalidation schedule, due at `due_at` (Unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ScheduledInvalidation {
    pub key: String,
    pub reason: Option<String>,
    pub source: String,
    pub due_at: i64,
}

/// Maximum cascade recursion depth for `InvalidateDependents` (a malformed
/// or cyclic rule set must not recurse forever).
pub(crate) const MAX_CASCADE_DEPTH: usize = 16;
