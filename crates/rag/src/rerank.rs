//! Keyword and structure based reranking of retrieved chunks.

use {
    serde::Serialize,
    serde_json::{Map, Value},
};

use crate::{text::CORE_VALUES, vector_store::ScoredPoint};

/// A retrieved chunk: its text and the metadata stored at index time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl RetrievedChunk {
    pub fn new(content: impl Into<String>, metadata: Value) -> Self {
        Self {
            content: content.into(),
            metadata: match metadata {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    pub fn source(&self) -> &str {
        self.str_field("source").unwrap_or("unknown")
    }

    pub fn content_type(&self) -> &str {
        self.str_field("content_type").unwrap_or("")
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.metadata.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

impl From<ScoredPoint> for RetrievedChunk {
    fn from(point: ScoredPoint) -> Self {
        let content = point.payload["page_content"].as_str().unwrap_or_default().to_string();
        let metadata = point.payload.get("metadata").cloned().unwrap_or(Value::Null);
        Self::new(content, metadata)
    }
}

const CORE_VALUE_QUERY_TERMS: [&str; 9] = [
    "core value",
    "nilai inti",
    "humble",
    "customer focused",
    "employee satisfaction",
    "speed",
    "passion",
    "integrity",
    "discipline",
];

pub fn is_core_values_query(query: &str) -> bool {
    let q = query.to_lowercase();
    CORE_VALUE_QUERY_TERMS.iter().any(|t| q.contains(t))
}

fn score(chunk: &RetrievedChunk, query_lower: &str, words: &[&str], core_query: bool) -> u64 {
    let content = chunk.content.to_lowercase();
    let mut score = 0u64;

    for word in words {
        score += content.matches(word).count() as u64 * 10;
    }

    let content_type = chunk.content_type();
    if core_query {
        if content_type.contains("core_values") || chunk.flag("is_core_values") {
            score += 500;
        }
        if chunk.flag("is_comprehensive") {
            score += 300;
        }
        score += CORE_VALUES.iter().filter(|cv| content.contains(*cv)).count() as u64 * 100;
        if content.contains("core values") || content.contains("nilai inti") {
            score += 200;
        }
    }

    if chunk.flag("is_complete_section") {
        score += 50;
    }
    if content_type.contains("table_of_contents")
        && ["daftar", "isi", "contents"].iter().any(|w| query_lower.contains(w))
    {
        score += 100;
    }
    if content_type.contains("table") && ["tabel", "table", "data"].iter().any(|w| query_lower.contains(w)) {
        score += 30;
    }
    if chunk.content.chars().count() > 500 {
        score += 20;
    }
    score
}

/// Order chunks by keyword hits and structural bonuses, best first, keeping
/// the retrieval order among equal scores, and keep at most `max_docs`.
pub fn rerank(chunks: Vec<RetrievedChunk>, query: &str, max_docs: usize) -> Vec<RetrievedChunk> {
    let query_lower = query.to_lowercase();
    let mut words: Vec<&str> = query_lower.split_whitespace().collect();
    words.sort_unstable();
    words.dedup();
    let core_query = is_core_values_query(query);

    let mut scored: Vec<(u64, RetrievedChunk)> = chunks
        .into_iter()
        .map(|c| (score(&c, &query_lower, &words, core_query), c))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(max_docs).map(|(_, c)| c).collect()
}
