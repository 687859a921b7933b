use ai_orchestrator_core::OrchestratorEvent;
use std::time::Instant;

/// Which tier served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    L1,
    L2,
    L3,
}

/// What kind of invalidation occurred (mirrors §4.6's
/// `{type∈{key,tag,pattern,clear}}` pub/sub message shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationKind {
    Key,
    Tag,
    Pattern,
    Clear,
}

/// Events emitted by the multi-tier cache.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Hit {
        key: String,
        tier: CacheTier,
        timestamp: Instant,
    },
    Miss {
        key: String,
        timestamp: Instant,
    },
    Write {
        key: String,
        timestamp: Instant,
    },
    Eviction {
        key: String,
        timestamp: Instant,
    },
    Invalidated {
        target: String,
        kind: InvalidationKind,
        source: String,
        timestamp: Instant,
    },
}

impl OrchestratorEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "cache.hit",
            CacheEvent::Miss { .. } => "cache.miss",
            CacheEvent::Write { .. } => "cache.write",
            CacheEvent::Eviction { .. } => "cache.eviction",
            CacheEvent::Invalidated { .. } => "cache.invalidated",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Write { timestamp, .. }
            | CacheEvent::Eviction { timestamp, .. }
            | CacheEvent::Invalidated { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_variant() {
        let event = CacheEvent::Hit {
            key: "k".into(),
            tier: CacheTier::L1,
            timestamp: Instant::now(),
        };
        assert_eq!(event.event_type(), "cache.hit");
    }
}
