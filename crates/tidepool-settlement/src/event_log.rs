//! Append-only event log with sequential ids.

use tidepool_types::{Event, EventKind, EventStatus, TxId};

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its id. Ids start at 1.
    pub fn append(&mut self, height: u64, in_hash: TxId, status: EventStatus, kind: EventKind) -> u64 {
        let id = self.events.len() as u64 + 1;
        tracing::debug!(id, height, %in_hash, kind = kind.type_name(), "event");
        self.events.push(Event {
            id,
            height,
            in_hash,
            status,
            kind,
        });
        id
    }

    /// Events with id `>= from_id`, oldest first.
    #[must_use]
    pub fn since(&self, from_id: u64) -> &[Event] {
        let start = usize::try_from(from_id.saturating_sub(1)).unwrap_or(usize::MAX);
        self.events.get(start..).unwrap_or(&[])
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Event> {
        self.since(id).first().filter(|e| e.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tidepool_types::{Asset, PoolStatus};

    use super::*;

    fn pool_event() -> EventKind {
        EventKind::Pool {
            pool: Asset::bnb(),
            status: PoolStatus::Enabled,
        }
    }

    #[test]
    fn ids_are_sequential() {
        let mut log = EventLog::new();
        let in_hash = TxId::random();
        assert_eq!(log.append(1, in_hash.clone(), EventStatus::Success, pool_event()), 1);
        assert_eq!(log.append(1, in_hash.clone(), EventStatus::Success, pool_event()), 2);
        assert_eq!(log.append(2, in_hash, EventStatus::Success, pool_event()), 3);

        assert_eq!(log.since(0).len(), 3);
        assert_eq!(log.since(1).len(), 3);
        assert_eq!(log.since(3).len(), 1);
        assert!(log.since(4).is_empty());
        assert_eq!(log.get(2).unwrap().id, 2);
        assert!(log.get(9).is_none());
    }
}
