//! Search overlay: highlighted copies of the rows a backend search matched.
//!
//! The overlay never touches the pipeline's tables. It keeps one table per
//! session, rebuilt from scratch on every search, with `uri`, `method` and
//! the status text wrapped in highlight markup around each keyword match.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use ezs_core::{SessionId, TrafficId, TrafficRecord};
use ezs_protocol::{SearchQuery, SearchResult};

use crate::backend::Backend;
use crate::error::BackendError;
use crate::traffic::TrafficPipeline;

pub const HIGHLIGHT_OPEN: &str =
    r#"<span style="background-color: yellow; color: black; font-weight: bold;">"#;
pub const HIGHLIGHT_CLOSE: &str = "</span>";

/// One matched row with its display fields highlighted.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow {
    /// Untouched copy of the pipeline's record.
    pub record: TrafficRecord,
    pub uri: String,
    pub method: String,
    pub status: String,
}

impl SearchRow {
    pub fn new(record: &TrafficRecord, keyword: &str) -> Self {
        Self {
            uri: highlight(&record.uri, keyword),
            method: highlight(&record.method, keyword),
            status: highlight(&record.status_text(), keyword),
            record: record.clone(),
        }
    }
}

pub type SearchTable = BTreeMap<TrafficId, SearchRow>;

#[derive(Debug, Default)]
pub struct SearchOverlay {
    tables: HashMap<SessionId, SearchTable>,
    active: bool,
    keyword: Option<String>,
}

impl SearchOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while results are shown in place of the live table.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    pub fn table(&self, session: &SessionId) -> Option<&SearchTable> {
        self.tables.get(session)
    }

    /// Runs `keyword` against `session` and rebuilds its overlay table.
    ///
    /// A blank keyword clears the overlay and leaves search mode. Zero hits
    /// empty the table but stay in search mode. Returns the number of rows.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the overlay is left as it was.
    pub async fn search(
        &mut self,
        backend: &dyn Backend,
        pipeline: &TrafficPipeline,
        session: &SessionId,
        keyword: &str,
    ) -> Result<usize, BackendError> {
        if keyword.trim().is_empty() {
            self.clear();
            return Ok(0);
        }

        let result = match backend
            .search(session, &SearchQuery::everywhere(keyword))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(session_id = %session, keyword, error = %e, "search failed");
                return Err(e);
            }
        };
        Ok(self.apply(pipeline, session, keyword, &result))
    }

    /// Replaces `session`'s overlay table with the rows `result` names.
    ///
    /// Ids the pipeline does not know are skipped.
    pub fn apply(
        &mut self,
        pipeline: &TrafficPipeline,
        session: &SessionId,
        keyword: &str,
        result: &SearchResult,
    ) -> usize {
        let table: SearchTable = result
            .ids()
            .map(TrafficId::new)
            .filter_map(|id| pipeline.get(session, id))
            .map(|record| (record.id, SearchRow::new(record, keyword)))
            .collect();

        debug!(
            session_id = %session,
            keyword,
            hits = result.search_data.len(),
            rows = table.len(),
            "search overlay rebuilt"
        );
        let rows = table.len();
        self.tables.insert(session.clone(), table);
        self.active = true;
        self.keyword = Some(keyword.to_string());
        rows
    }

    /// Removes deleted rows from `session`'s overlay table.
    pub fn forget(&mut self, session: &SessionId, ids: &[TrafficId]) {
        if let Some(table) = self.tables.get_mut(session) {
            for id in ids {
                table.remove(id);
            }
        }
    }

    /// Drops every overlay table and leaves search mode.
    pub fn clear(&mut self) {
        self.tables.clear();
        self.active = false;
        self.keyword = None;
    }
}

/// Wraps every case-insensitive occurrence of `keyword` in `text` with the
/// highlight markup, keeping the original casing.
pub fn highlight(text: &str, keyword: &str) -> String {
    let needle: Vec<char> = keyword.chars().collect();
    if needle.is_empty() || text.is_empty() {
        return text.to_string();
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |(b, _)| *b);

    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    while i + needle.len() <= chars.len() {
        let matched = chars.get(i..i + needle.len()).is_some_and(|window| {
            window
                .iter()
                .zip(&needle)
                .all(|((_, c), k)| chars_match(*c, *k))
        });
        if !matched {
            i += 1;
            continue;
        }

        let start = byte_at(i);
        let end = byte_at(i + needle.len());
        out.push_str(text.get(copied..start).unwrap_or_default());
        out.push_str(HIGHLIGHT_OPEN);
        out.push_str(text.get(start..end).unwrap_or_default());
        out.push_str(HIGHLIGHT_CLOSE);
        copied = end;
        i += needle.len();
    }
    out.push_str(text.get(copied..).unwrap_or_default());
    out
}

fn chars_match(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezs_core::{PhaseFields, TrafficPhase, TransactionState};
    use ezs_protocol::SearchData;

    fn wrap(s: &str) -> String {
        format!("{HIGHLIGHT_OPEN}{s}{HIGHLIGHT_CLOSE}")
    }

    fn record(id: u64, uri: &str, status: u16) -> TrafficRecord {
        TrafficRecord {
            id: TrafficId::new(id),
            session_id: SessionId::default_session(),
            method: "POST".to_string(),
            uri: uri.to_string(),
            host: None,
            path: None,
            start_time: None,
            phase: TrafficPhase::assemble(
                TransactionState::Completed,
                PhaseFields {
                    status: Some(status),
                    ..PhaseFields::default()
                },
            ),
        }
    }

    fn result(text: &str, ids: &[u64]) -> SearchResult {
        SearchResult {
            text: text.to_string(),
            search_data: ids
                .iter()
                .map(|id| SearchData {
                    id: *id,
                    url: String::new(),
                    search_item: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_highlight_is_case_insensitive_and_keeps_casing() {
        assert_eq!(
            highlight("https://Example.com/example", "EXAMPLE"),
            format!("https://{}.com/{}", wrap("Example"), wrap("example"))
        );
        assert_eq!(highlight("GET", "post"), "GET");
        assert_eq!(highlight("", "x"), "");
        assert_eq!(highlight("abc", ""), "abc");
    }

    #[test]
    fn test_highlight_multibyte_text() {
        assert_eq!(
            highlight("/café/CAFÉ", "café"),
            format!("/{}/{}", wrap("café"), wrap("CAFÉ"))
        );
    }

    #[test]
    fn test_highlight_does_not_treat_keyword_as_pattern() {
        assert_eq!(highlight("a.b", "."), format!("a{}b", wrap(".")));
        assert_eq!(highlight("ab", "a|b"), "ab");
    }

    #[test]
    fn test_apply_builds_parallel_table() {
        let mut pipeline = TrafficPipeline::new();
        pipeline.upsert(record(1, "https://a/login", 200));
        pipeline.upsert(record(2, "https://a/logout", 404));
        pipeline.upsert(record(3, "https://a/home", 200));
        let session = SessionId::default_session();

        let mut overlay = SearchOverlay::new();
        let rows = overlay.apply(&pipeline, &session, "log", &result("log", &[1, 2, 99]));

        assert_eq!(rows, 2);
        assert!(overlay.is_active());
        let table = overlay.table(&session).unwrap();
        let row = table.get(&TrafficId::new(2)).unwrap();
        assert_eq!(row.uri, format!("https://a/{}out", wrap("log")));
        assert_eq!(row.status, "404");
        // The live table is untouched.
        assert_eq!(pipeline.get(&session, TrafficId::new(2)).unwrap().uri, "https://a/logout");
    }

    #[test]
    fn test_zero_hits_empty_table_but_stay_in_search_mode() {
        let mut pipeline = TrafficPipeline::new();
        pipeline.upsert(record(1, "https://a/login", 200));
        let session = SessionId::default_session();

        let mut overlay = SearchOverlay::new();
        overlay.apply(&pipeline, &session, "login", &result("login", &[1]));
        overlay.apply(&pipeline, &session, "nothing", &result("nothing", &[]));

        assert!(overlay.is_active());
        assert!(overlay.table(&session).unwrap().is_empty());

        overlay.clear();
        assert!(!overlay.is_active());
        assert!(overlay.table(&session).is_none());
    }
}
