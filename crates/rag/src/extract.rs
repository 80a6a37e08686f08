//! Turn an analysed layout into sections and rendered tables.

use std::collections::BTreeMap;

use {serde::Serialize, tracing::debug};

use crate::{
    layout::AnalyzedDocument,
    tables::merge_multi_page_tables,
    text::{classify_content_type, clean_text, count_tokens, is_heading_type},
};

#[derive(Debug, Clone, Serialize)]
pub struct SectionPart {
    pub content: String,
    pub content_type: &'static str,
    pub role: Option<String>,
    pub position: usize,
    pub tokens: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub header: String,
    pub content_type: &'static str,
    pub parts: Vec<SectionPart>,
    pub section_id: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RawTable {
    /// Rows rendered as `a | b | c`, one per line.
    pub content: String,
    pub headers: Vec<String>,
    pub table_id: usize,
    pub tokens: usize,
    pub row_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractedDocument {
    pub sections: Vec<Section>,
    pub tables: Vec<RawTable>,
}

impl ExtractedDocument {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.tables.is_empty()
    }
}

/// Group paragraphs into sections and render (merged) tables.
pub fn extract(doc: &AnalyzedDocument) -> ExtractedDocument {
    let mut out = ExtractedDocument::default();
    let mut current: Option<Section> = None;
    let mut next_id = 0;

    for (position, para) in doc.paragraphs.iter().enumerate() {
        let text = clean_text(&para.content);
        if text.is_empty() {
            continue;
        }
        let content_type = classify_content_type(&text, para.role.as_deref());
        let tokens = count_tokens(&text);
        let part = SectionPart {
            content: text.clone(),
            content_type,
            role: para.role.clone(),
            position,
            tokens,
        };

        if is_heading_type(content_type) {
            if let Some(done) = current.take() {
                out.sections.push(done);
            }
            current = Some(Section {
                header: text,
                content_type,
                parts: vec![part],
                section_id: next_id,
                total_tokens: tokens,
            });
            next_id += 1;
        } else if let Some(section) = current.as_mut() {
            section.parts.push(part);
            section.total_tokens += tokens;
        } else {
            current = Some(Section {
                header: "Document Content".into(),
                content_type: "content",
                parts: vec![part],
                section_id: next_id,
                total_tokens: tokens,
            });
            next_id += 1;
        }
    }
    if let Some(done) = current {
        out.sections.push(done);
    }

    let merged = merge_multi_page_tables(&doc.tables);
    debug!(raw = doc.tables.len(), merged = merged.len(), "tables after merging");

    for (table_id, table) in merged.iter().enumerate() {
        if table.cells.is_empty() {
            debug!(table_id, "table has no cells, skipping");
            continue;
        }
        let mut rows: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();
        let mut headers = Vec::new();
        for cell in &table.cells {
            let content = clean_text(&cell.content);
            if cell.row_index == 0 {
                headers.push(content.clone());
            }
            rows.entry(cell.row_index)
                .or_default()
                .insert(cell.column_index, content);
        }
        let content = rows
            .values()
            .map(|cols| cols.values().map(String::as_str).collect::<Vec<_>>().join(" | "))
            .collect::<Vec<_>>()
            .join("\n");
        out.tables.push(RawTable {
            tokens: count_tokens(&content),
            content,
            headers,
            table_id,
            row_count: rows.len(),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::layout::{Paragraph, Table, TableCell},
    };

    fn para(content: &str, role: Option<&str>) -> Paragraph {
        Paragraph {
            content: content.into(),
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn paragraphs_become_sections() {
        let doc = AnalyzedDocument {
            paragraphs: vec![
                para("Karyawan wajib hadir", None),
                para("   ", None),
                para("BAB 1 Ketentuan Umum", None),
                para("Jam kerja dimulai pukul 08.00", None),
                para("Employee Handbook", Some("title")),
            ],
            ..Default::default()
        };
        let out = extract(&doc);
        assert_eq!(out.sections.len(), 3);
        assert_eq!(out.sections[0].header, "Document Content");
        assert_eq!(out.sections[0].section_id, 0);
        assert_eq!(out.sections[1].header, "BAB 1 Ketentuan Umum");
        assert_eq!(out.sections[1].content_type, "chapter");
        assert_eq!(out.sections[1].parts.len(), 2);
        assert_eq!(out.sections[1].parts[1].position, 3);
        assert_eq!(out.sections[2].content_type, "title");
        assert!(out.tables.is_empty());
    }

    #[test]
    fn tables_render_rows() {
        let cell = |r, c, s: &str| TableCell {
            row_index: r,
            column_index: c,
            content: s.into(),
        };
        let doc = AnalyzedDocument {
            tables: vec![
                Table {
                    row_count: 2,
                    column_count: 2,
                    cells: vec![cell(0, 0, "No"), cell(0, 1, "Nama"), cell(1, 0, "1"), cell(1, 1, "Ani")],
                    bounding_regions: vec![],
                },
                Table::default(),
            ],
            ..Default::default()
        };
        let out = extract(&doc);
        assert_eq!(out.tables.len(), 1);
        assert_eq!(out.tables[0].content, "No | Nama\n1 | Ani");
        assert_eq!(out.tables[0].headers, ["No", "Nama"]);
        assert_eq!(out.tables[0].row_count, 2);
        assert!(!out.is_empty());
    }
}
