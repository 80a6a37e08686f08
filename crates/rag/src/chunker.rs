//! Structure-aware chunking of extracted documents.

use std::collections::HashSet;

use {
    serde_json::{Map, Value, json},
    sha2::{Digest, Sha256},
};

use crate::{
    extract::{ExtractedDocument, RawTable, Section, SectionPart},
    text::{CORE_VALUES, count_tokens},
};

/// Sections up to this many tokens stay whole.
pub const SECTION_TARGET_TOKENS: usize = 3500;
/// Tables up to this many tokens stay whole.
pub const TABLE_TARGET_TOKENS: usize = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub chunk_type: String,
    pub metadata: Map<String, Value>,
    pub tokens: usize,
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn mentions_core_values(section: &Section) -> bool {
    if section.content_type.contains("core") || section.header.to_lowercase().contains("core") {
        return true;
    }
    section.parts.iter().any(|part| {
        let lower = part.content.to_lowercase();
        CORE_VALUES.iter().any(|cv| lower.contains(cv)) || lower.contains("core values")
    })
}

fn core_value_mentions(text: &str) -> usize {
    let lower = text.to_lowercase();
    CORE_VALUES.iter().filter(|cv| lower.contains(*cv)).count()
}

/// Split a document into chunks: one comprehensive core-values chunk (when
/// the document has any), then sections, then tables. Identical chunks are
/// dropped.
pub fn create_chunks(doc: &ExtractedDocument) -> Vec<Chunk> {
    let (core, other): (Vec<&Section>, Vec<&Section>) =
        doc.sections.iter().partition(|s| mentions_core_values(s));

    let mut chunks = Vec::new();
    if !core.is_empty()
        && let Some(chunk) = core_values_chunk(&core, &other)
    {
        chunks.push(chunk);
    }

    for section in other {
        chunks.extend(section_chunks(section));
    }

    for table in &doc.tables {
        if table.tokens > TABLE_TARGET_TOKENS {
            chunks.extend(split_table(table));
        } else {
            chunks.push(Chunk {
                content: format!("=== TABLE ===\n{}", table.content),
                chunk_type: "table".into(),
                metadata: object(json!({
                    "table_id": table.table_id,
                    "headers": table.headers,
                    "row_count": table.row_count,
                })),
                tokens: table.tokens,
            });
        }
    }

    deduplicate(chunks)
}

fn core_values_chunk(core: &[&Section], other: &[&Section]) -> Option<Chunk> {
    let mut lines: Vec<String> = Vec::new();
    let mut tokens = 0;

    for section in core {
        if !section.header.is_empty() && section.header.to_lowercase().contains("core") {
            lines.push(format!("=== {} ===", section.header));
        }
        for part in section.parts.iter().filter(|p| !p.content.is_empty()) {
            lines.push(part.content.clone());
            tokens += part.tokens;
        }
    }

    for section in other {
        for part in &section.parts {
            if core_value_mentions(&part.content) >= 2 {
                lines.push(part.content.clone());
                tokens += part.tokens;
            }
        }
    }

    if lines.is_empty() {
        return None;
    }

    Some(Chunk {
        content: lines.join("\n\n"),
        chunk_type: "core_values_comprehensive".into(),
        metadata: object(json!({
            "is_core_values": true,
            "is_comprehensive": true,
            "content_type": "core_values_comprehensive",
        })),
        tokens,
    })
}

fn section_chunk(section: &Section, parts: &[&SectionPart], metadata: Value, tokens: usize) -> Chunk {
    let body = parts
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    Chunk {
        content: format!("=== {} ===\n{body}", section.header),
        chunk_type: section.content_type.into(),
        metadata: object(metadata),
        tokens,
    }
}

fn section_chunks(section: &Section) -> Vec<Chunk> {
    if section.total_tokens <= SECTION_TARGET_TOKENS {
        let parts: Vec<&SectionPart> = section.parts.iter().collect();
        return vec![section_chunk(
            section,
            &parts,
            json!({
                "section_header": section.header,
                "section_id": section.section_id,
                "is_complete_section": true,
            }),
            section.total_tokens,
        )];
    }

    let header_tokens = count_tokens(&format!("=== {} ===\n", section.header));
    let partial = |done: usize| {
        json!({
            "section_header": section.header,
            "section_id": section.section_id,
            "is_partial_section": true,
            "chunk_part": done + 1,
        })
    };

    let mut chunks = Vec::new();
    let mut current: Vec<&SectionPart> = Vec::new();
    let mut current_tokens = header_tokens;

    for part in &section.parts {
        if current_tokens + part.tokens > SECTION_TARGET_TOKENS {
            if !current.is_empty() {
                let meta = partial(chunks.len());
                chunks.push(section_chunk(section, &current, meta, current_tokens));
            }
            current = vec![part];
            current_tokens = header_tokens + part.tokens;
        } else {
            current.push(part);
            current_tokens += part.tokens;
        }
    }
    if !current.is_empty() {
        let meta = partial(chunks.len());
        chunks.push(section_chunk(section, &current, meta, current_tokens));
    }
    chunks
}

/// Split an oversized table into parts that each repeat the header line.
fn split_table(table: &RawTable) -> Vec<Chunk> {
    let lines: Vec<&str> = table.content.split('\n').collect();
    let header = lines.first().copied().unwrap_or_default();
    let header_tokens = count_tokens(header);

    let mut bodies: Vec<(Vec<&str>, usize)> = Vec::new();
    let mut current = vec![header];
    let mut current_tokens = header_tokens;

    for &line in lines.iter().skip(1) {
        let line_tokens = count_tokens(line);
        if current_tokens + line_tokens > TABLE_TARGET_TOKENS {
            bodies.push((std::mem::replace(&mut current, vec![header, line]), current_tokens));
            current_tokens = header_tokens + line_tokens;
        } else {
            current.push(line);
            current_tokens += line_tokens;
        }
    }
    if current.len() > 1 {
        bodies.push((current, current_tokens));
    }

    let total_parts = bodies.len();
    bodies
        .into_iter()
        .enumerate()
        .map(|(i, (rows, tokens))| Chunk {
            content: format!("=== TABLE (Part {}) ===\n{}", i + 1, rows.join("\n")),
            chunk_type: "table".into(),
            metadata: object(json!({
                "table_id": table.table_id,
                "headers": table.headers,
                "is_partial_table": true,
                "part": i + 1,
                "row_count": table.row_count,
                "total_parts": total_parts,
            })),
            tokens,
        })
        .collect()
}

fn deduplicate(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|c| seen.insert(Sha256::digest(c.content.as_bytes())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(content: &str, tokens: usize) -> SectionPart {
        SectionPart {
            content: content.into(),
            content_type: "content",
            role: None,
            position: 0,
            tokens,
        }
    }

    fn section(id: usize, header: &str, parts: Vec<SectionPart>) -> Section {
        Section {
            header: header.into(),
            content_type: "heading",
            total_tokens: parts.iter().map(|p| p.tokens).sum(),
            parts,
            section_id: id,
        }
    }

    #[test]
    fn small_section_is_one_complete_chunk() {
        let doc = ExtractedDocument {
            sections: vec![section(0, "Cuti", vec![part("Cuti", 1), part("Cuti tahunan 12 hari", 5)])],
            tables: vec![],
        };
        let chunks = create_chunks(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "=== Cuti ===\nCuti\n\nCuti tahunan 12 hari");
        assert_eq!(chunks[0].chunk_type, "heading");
        assert_eq!(chunks[0].metadata["is_complete_section"], true);
        assert_eq!(chunks[0].tokens, 6);
    }

    #[test]
    fn large_section_is_split_into_parts() {
        let doc = ExtractedDocument {
            sections: vec![section(3, "Panduan", vec![
                part("satu", 2000),
                part("dua", 2000),
                part("tiga", 2000),
            ])],
            tables: vec![],
        };
        let chunks = create_chunks(&doc);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "=== Panduan ===\nsatu");
        assert_eq!(chunks[0].metadata["chunk_part"], 1);
        assert_eq!(chunks[2].metadata["chunk_part"], 3);
        assert_eq!(chunks[1].metadata["is_partial_section"], true);
        assert_eq!(chunks[1].metadata["section_id"], 3);
    }

    #[test]
    fn core_value_sections_are_combined() {
        let doc = ExtractedDocument {
            sections: vec![
                section(0, "Core Values", vec![part("Core Values", 2), part("Humble: rendah hati", 4)]),
                section(1, "Jam Kerja", vec![part("Jam Kerja", 2), part("Masuk pukul 8", 4)]),
                section(2, "Budaya", vec![part("Kami menjunjung integrity", 4)]),
            ],
            tables: vec![],
        };
        let chunks = create_chunks(&doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_type, "core_values_comprehensive");
        assert_eq!(
            chunks[0].content,
            "=== Core Values ===\n\nCore Values\n\nHumble: rendah hati\n\nKami menjunjung integrity"
        );
        assert_eq!(chunks[0].tokens, 10);
        assert_eq!(chunks[0].metadata["is_core_values"], true);
        assert!(chunks[1].content.starts_with("=== Jam Kerja ==="));
    }

    #[test]
    fn tables_and_duplicates() {
        let table = RawTable {
            content: "No | Nama\n1 | Ani".into(),
            headers: vec!["No".into(), "Nama".into()],
            table_id: 0,
            tokens: 8,
            row_count: 2,
        };
        let doc = ExtractedDocument {
            sections: vec![],
            tables: vec![table.clone(), table],
        };
        let chunks = create_chunks(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "=== TABLE ===\nNo | Nama\n1 | Ani");
        assert_eq!(chunks[0].metadata["row_count"], 2);
        assert_eq!(chunks[0].metadata["headers"][1], "Nama");
    }

    #[test]
    fn huge_table_parts_repeat_header() {
        let row = vec!["data"; 400].join(" ");
        let mut lines = vec!["Kolom A | Kolom B".to_string()];
        lines.extend((0..60).map(|_| row.clone()));
        let content = lines.join("\n");
        let table = RawTable {
            tokens: count_tokens(&content),
            content,
            headers: vec!["Kolom A".into(), "Kolom B".into()],
            table_id: 7,
            row_count: 61,
        };
        let chunks = split_table(&table);
        assert!(chunks.len() > 1);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.content.starts_with(&format!("=== TABLE (Part {}) ===\nKolom A | Kolom B\n", i + 1)));
            assert_eq!(chunk.metadata["total_parts"], total);
            assert!(chunk.tokens <= TABLE_TARGET_TOKENS);
        }
    }
}
