use crate::domain::record::{AnalysisRecord, RecordQuery};
use crate::source::RecordSource;

/// In-process record store applying the same filter/sort/limit semantics as the real ones.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    records: Vec<AnalysisRecord>,
}

impl MemoryRecordSource {
    pub fn new(records: Vec<AnalysisRecord>) -> Self {
        Self { records }
    }

    pub fn query(&self, query: &RecordQuery) -> Vec<AnalysisRecord> {
        let mut out: Vec<AnalysisRecord> = self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        out.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        out
    }
}

#[async_trait::async_trait]
impl RecordSource for MemoryRecordSource {
    fn source_name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, query: &RecordQuery) -> anyhow::Result<Vec<AnalysisRecord>> {
        Ok(self.query(query))
    }
}
