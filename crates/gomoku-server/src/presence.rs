//! In-process presence registry for lobby listings.
//!
//! Rooms report their occupant count whenever it changes; the lobby surface
//! reads back the live set. Reporting is advisory and infallible from the
//! room's point of view, so a presence write can never fail or roll back a
//! room mutation.

use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Entries not refreshed within this window are treated as absent.
const STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Entry {
    count: usize,
    updated_at: SystemTime,
}

/// One live room as seen by the lobby.
// Read side of the registry; the game server only writes.
#[allow(dead_code)]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPresence {
    pub id: String,
    pub count: usize,
    /// Unix millis of the last report
    pub updated_at: u64,
}

/// Registry of room occupancy, keyed by room id.
pub struct PresenceRegistry {
    entries: DashMap<String, Entry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Record a room's occupant count. A count of zero removes the entry.
    pub fn report(&self, room_id: &str, count: usize) {
        if count == 0 {
            self.entries.remove(room_id);
        } else {
            self.entries.insert(
                room_id.to_string(),
                Entry { count, updated_at: SystemTime::now() },
            );
        }
    }

    /// The currently live rooms, pruning anything stale on the way out.
    /// Consumed by the lobby-listing surface, not by gameplay.
    #[allow(dead_code)]
    pub fn live(&self) -> Vec<RoomPresence> {
        let now = SystemTime::now();
        self.entries.retain(|_, entry| {
            entry.count > 0
                && now
                    .duration_since(entry.updated_at)
                    .map(|age| age <= STALE_AFTER)
                    .unwrap_or(true)
        });

        self.entries
            .iter()
            .map(|e| RoomPresence {
                id: e.key().clone(),
                count: e.count,
                updated_at: e
                    .updated_at
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or_default(),
            })
            .collect()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_list() {
        let registry = PresenceRegistry::new();
        registry.report("alpha", 2);
        registry.report("beta", 1);

        let mut rooms = registry.live();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].id, "alpha");
        assert_eq!(rooms[0].count, 2);
    }

    #[test]
    fn test_zero_count_removes_entry() {
        let registry = PresenceRegistry::new();
        registry.report("alpha", 3);
        registry.report("alpha", 0);
        assert!(registry.live().is_empty());
    }

    #[test]
    fn test_stale_entries_dropped() {
        let registry = PresenceRegistry::new();
        registry.entries.insert(
            "old".to_string(),
            Entry {
                count: 2,
                updated_at: SystemTime::now() - Duration::from_secs(60),
            },
        );
        registry.report("fresh", 1);

        let rooms = registry.live();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, "fresh");
    }

    #[test]
    fn test_re_report_refreshes() {
        let registry = PresenceRegistry::new();
        registry.entries.insert(
            "room".to_string(),
            Entry {
                count: 2,
                updated_at: SystemTime::now() - Duration::from_secs(60),
            },
        );
        registry.report("room", 2);
        assert_eq!(registry.live().len(), 1);
    }
}
