//! Traffic event pipeline: per-session tables of traffic records.
//!
//! Records are upserted by id, so repeated pushes for one transaction
//! advance its row in place. The backend's sequencing is trusted; a push
//! that moves a row backwards is still applied, only logged.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use ezs_core::{SessionId, TrafficId, TrafficRecord};

/// One session's rows, ordered by id.
pub type TrafficTable = BTreeMap<TrafficId, TrafficRecord>;

#[derive(Debug, Default)]
pub struct TrafficPipeline {
    tables: HashMap<SessionId, TrafficTable>,
}

impl TrafficPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the record for its `(session, id)`.
    ///
    /// Returns true if the id was new to that session.
    pub fn upsert(&mut self, record: TrafficRecord) -> bool {
        let table = self.tables.entry(record.session_id.clone()).or_default();
        match table.insert(record.id, record) {
            Some(previous) => {
                if let Some(current) = table.get(&previous.id) {
                    if previous.state().is_regression_to(current.state()) {
                        debug!(
                            session_id = %current.session_id,
                            traffic_id = %current.id,
                            from = %previous.state(),
                            to = %current.state(),
                            "traffic state moved backwards"
                        );
                    }
                }
                false
            }
            None => true,
        }
    }

    /// Upserts every record into `session`'s table, whatever session the
    /// records themselves name. Returns the number of rows written.
    pub fn insert_all(
        &mut self,
        session: &SessionId,
        records: impl IntoIterator<Item = TrafficRecord>,
    ) -> usize {
        let table = self.tables.entry(session.clone()).or_default();
        let mut count = 0;
        for mut record in records {
            record.session_id = session.clone();
            table.insert(record.id, record);
            count += 1;
        }
        count
    }

    pub fn table(&self, session: &SessionId) -> Option<&TrafficTable> {
        self.tables.get(session)
    }

    pub fn get(&self, session: &SessionId, id: TrafficId) -> Option<&TrafficRecord> {
        self.tables.get(session).and_then(|t| t.get(&id))
    }

    /// Number of rows in `session`'s table.
    pub fn len(&self, session: &SessionId) -> usize {
        self.tables.get(session).map_or(0, BTreeMap::len)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionId> {
        self.tables.keys()
    }

    /// Removes the given ids from `session`'s table. Returns how many existed.
    pub fn delete(&mut self, session: &SessionId, ids: &[TrafficId]) -> usize {
        let Some(table) = self.tables.get_mut(session) else {
            return 0;
        };
        ids.iter().filter(|id| table.remove(*id).is_some()).count()
    }

    /// Drops a whole session's table.
    pub fn drop_session(&mut self, session: &SessionId) -> Option<TrafficTable> {
        self.tables.remove(session)
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezs_core::{PhaseFields, TrafficPhase, TransactionState};

    fn record(session: &str, id: u64, state: TransactionState) -> TrafficRecord {
        TrafficRecord {
            id: TrafficId::new(id),
            session_id: SessionId::new(session),
            method: "GET".to_string(),
            uri: format!("https://example.com/{id}"),
            host: Some("example.com".to_string()),
            path: Some(format!("/{id}")),
            start_time: None,
            phase: TrafficPhase::assemble(
                state,
                PhaseFields {
                    status: Some(200),
                    ..PhaseFields::default()
                },
            ),
        }
    }

    #[test]
    fn test_same_id_is_upserted_not_duplicated() {
        let mut pipeline = TrafficPipeline::new();
        let session = SessionId::new("1");

        assert!(pipeline.upsert(record("1", 7, TransactionState::Pending)));
        assert!(!pipeline.upsert(record("1", 7, TransactionState::Completed)));

        assert_eq!(pipeline.len(&session), 1);
        let row = pipeline.get(&session, TrafficId::new(7)).unwrap();
        assert_eq!(row.state(), TransactionState::Completed);
    }

    #[test]
    fn test_last_event_wins_even_backwards() {
        let mut pipeline = TrafficPipeline::new();
        let states = [
            TransactionState::Pending,
            TransactionState::Requesting,
            TransactionState::Completed,
            TransactionState::Responding,
        ];
        for state in states {
            pipeline.upsert(record("1", 3, state));
        }
        let row = pipeline.get(&SessionId::new("1"), TrafficId::new(3)).unwrap();
        assert_eq!(row.state(), TransactionState::Responding);
        assert_eq!(pipeline.len(&SessionId::new("1")), 1);
    }

    #[test]
    fn test_tables_are_scoped_by_session() {
        let mut pipeline = TrafficPipeline::new();
        pipeline.upsert(record("1", 1, TransactionState::Pending));
        pipeline.upsert(record("2", 1, TransactionState::Failed));

        assert_eq!(pipeline.len(&SessionId::new("1")), 1);
        assert_eq!(pipeline.len(&SessionId::new("2")), 1);
        assert_eq!(pipeline.len(&SessionId::new("3")), 0);
        assert_eq!(pipeline.sessions().count(), 2);
    }

    #[test]
    fn test_insert_all_rescopes_records() {
        let mut pipeline = TrafficPipeline::new();
        let imported = SessionId::new("1718000000000");
        let written = pipeline.insert_all(
            &imported,
            vec![
                record("other", 1, TransactionState::Completed),
                record("other", 2, TransactionState::Completed),
            ],
        );
        assert_eq!(written, 2);
        assert_eq!(pipeline.len(&imported), 2);
        assert!(pipeline.table(&SessionId::new("other")).is_none());
    }

    #[test]
    fn test_delete_and_drop() {
        let mut pipeline = TrafficPipeline::new();
        let session = SessionId::new("1");
        for id in 1..=3 {
            pipeline.upsert(record("1", id, TransactionState::Completed));
        }

        let removed = pipeline.delete(&session, &[TrafficId::new(1), TrafficId::new(9)]);
        assert_eq!(removed, 1);
        assert_eq!(pipeline.len(&session), 2);
        assert_eq!(pipeline.delete(&SessionId::new("none"), &[TrafficId::new(2)]), 0);

        assert_eq!(pipeline.drop_session(&session).map(|t| t.len()), Some(2));
        assert_eq!(pipeline.len(&session), 0);
    }
}
