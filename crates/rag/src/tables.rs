//! Detection and merging of tables that continue across pages.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    layout::{Table, TableCell},
    text::{clean_text, static_regex},
};

static_regex!(data_pattern, r"\d+[.,]\d+|\d{4}|IDR|Rp|%");
static_regex!(digit, r"\d");
static_regex!(letter, r"[a-zA-Z]");

/// Cleaned contents of row 0, ordered by column.
pub fn table_headers(table: &Table) -> Vec<String> {
    let mut header: Vec<&TableCell> = table.cells.iter().filter(|c| c.row_index == 0).collect();
    header.sort_by_key(|c| c.column_index);
    header.into_iter().map(|c| clean_text(&c.content)).collect()
}

/// Share of positions whose headers match case-insensitively. Header rows of
/// different widths never match.
pub fn header_similarity(a: &[String], b: &[String]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let matches = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.to_lowercase() == y.to_lowercase())
        .count();
    matches as f64 / a.len() as f64
}

/// `number`, `text`, `mixed` or `empty` for every column, judged on the data rows.
pub fn column_types(table: &Table) -> Vec<&'static str> {
    if table.cells.is_empty() || table.column_count == 0 {
        return Vec::new();
    }
    (0..table.column_count)
        .map(|col| {
            let cells: Vec<&TableCell> = table
                .cells
                .iter()
                .filter(|c| c.column_index == col && c.row_index > 0)
                .collect();
            if cells.is_empty() {
                return "empty";
            }
            let total = cells.len() as f64;
            let numbers = cells.iter().filter(|c| digit().is_match(&c.content)).count() as f64;
            let texts = cells.iter().filter(|c| letter().is_match(&c.content)).count() as f64;
            if numbers > total * 0.7 {
                "number"
            } else if texts > total * 0.7 {
                "text"
            } else {
                "mixed"
            }
        })
        .collect()
}

/// Whether `next` continues `prev`, `distance` tables later in the document.
pub fn is_table_continuation(prev: &Table, next: &Table, distance: usize) -> bool {
    if distance > 2 || prev.column_count != next.column_count {
        return false;
    }

    if let (Some(p1), Some(p2)) = (prev.page_number(), next.page_number())
        && p1 > 0
        && p2 > p1 + 1
    {
        return false;
    }

    let h1 = table_headers(prev);
    let h2 = table_headers(next);
    if !h1.is_empty() && !h2.is_empty() {
        if h1 == h2 {
            debug!("identical table headers");
            return true;
        }
        let similarity = header_similarity(&h1, &h2);
        if similarity > 0.8 {
            debug!(similarity, "similar table headers");
            return true;
        }
    }

    let first_row: Vec<&TableCell> = next.cells.iter().filter(|c| c.row_index == 0).collect();
    if !first_row.is_empty() {
        let avg_len = first_row
            .iter()
            .map(|c| c.content.chars().count())
            .sum::<usize>() as f64
            / first_row.len() as f64;
        if avg_len > 30.0 {
            debug!("first row of next table looks like data");
            return true;
        }
        if first_row.iter().any(|c| data_pattern().is_match(&c.content)) {
            debug!("first row of next table contains data patterns");
            return true;
        }
    }

    let t1 = column_types(prev);
    let t2 = column_types(next);
    if !t1.is_empty() && t1.len() == t2.len() {
        let same = t1.iter().zip(&t2).filter(|(a, b)| a == b).count();
        let ratio = same as f64 / t1.len() as f64;
        if ratio > 0.7 {
            debug!(ratio, "column types match");
            return true;
        }
    }

    false
}

/// Concatenate `tables` into one. Every table after the first loses its
/// header row and the rows are renumbered.
pub fn merge_tables(tables: &[Table]) -> Table {
    if let [only] = tables {
        return only.clone();
    }

    let mut rows: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();
    let mut offset = 0;
    for (idx, table) in tables.iter().enumerate() {
        let start_row = usize::from(idx > 0);
        for cell in table.cells.iter().filter(|c| c.row_index >= start_row) {
            rows.entry(cell.row_index - start_row + offset)
                .or_default()
                .insert(cell.column_index, clean_text(&cell.content));
        }
        let max_row = table.cells.iter().map(|c| c.row_index).max().unwrap_or(0);
        offset += (max_row + 1).saturating_sub(start_row);
    }

    let first = tables.first().cloned().unwrap_or_default();
    Table {
        row_count: rows.len(),
        column_count: first.column_count,
        bounding_regions: first.bounding_regions,
        cells: rows
            .into_iter()
            .flat_map(|(row_index, cols)| {
                cols.into_iter().map(move |(column_index, content)| TableCell {
                    row_index,
                    column_index,
                    content,
                })
            })
            .collect(),
    }
}

/// Greedily merge runs of continuation tables.
pub fn merge_multi_page_tables(tables: &[Table]) -> Vec<Table> {
    if tables.len() < 2 {
        return tables.to_vec();
    }

    let mut merged = Vec::new();
    let mut i = 0;
    while i < tables.len() {
        let mut run = vec![tables[i].clone()];
        let mut j = i + 1;
        while j < tables.len() {
            let last = &run[run.len() - 1];
            if is_table_continuation(last, &tables[j], j - i) {
                debug!(table = j, of = i, "table continues previous");
                run.push(tables[j].clone());
                j += 1;
            } else {
                break;
            }
        }
        if run.len() > 1 {
            debug!(count = run.len(), "merging tables");
        }
        merged.push(merge_tables(&run));
        i = j;
    }
    merged
}

#[cfg(test)]
mod tests {
    use {super::*, crate::layout::BoundingRegion};

    fn table(page: u32, rows: &[&[&str]]) -> Table {
        let cells = rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| {
                row.iter().enumerate().map(move |(c, content)| TableCell {
                    row_index: r,
                    column_index: c,
                    content: content.to_string(),
                })
            })
            .collect();
        Table {
            row_count: rows.len(),
            column_count: rows.first().map_or(0, |r| r.len()),
            cells,
            bounding_regions: vec![BoundingRegion { page_number: page }],
        }
    }

    #[test]
    fn headers_are_cleaned_and_ordered() {
        let mut t = table(1, &[&["Nama", "Jabatan  Baru"]]);
        t.cells.reverse();
        assert_eq!(table_headers(&t), ["Nama", "Jabatan Baru"]);
    }

    #[test]
    fn similarity_is_positional() {
        let a = vec!["No".to_string(), "Nama".into(), "Unit".into()];
        let b = vec!["no".to_string(), "NAMA".into(), "Divisi".into()];
        assert!((header_similarity(&a, &b) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(header_similarity(&a, &b[..2]), 0.0);
    }

    #[test]
    fn column_types_from_data_rows() {
        let t = table(1, &[&["Item", "Qty", "Note"], &["Pen", "3", ""], &["Book", "12", ""]]);
        assert_eq!(column_types(&t), ["text", "number", "mixed"]);
    }

    #[test]
    fn identical_headers_continue() {
        let a = table(1, &[&["No", "Nama"], &["1", "Ani"]]);
        let b = table(2, &[&["No", "Nama"], &["2", "Budi"]]);
        assert!(is_table_continuation(&a, &b, 1));
    }

    #[test]
    fn distant_or_different_tables_do_not_continue() {
        let a = table(1, &[&["No", "Nama"], &["1", "Ani"]]);
        let far = table(3, &[&["No", "Nama"], &["2", "Budi"]]);
        let wide = table(2, &[&["No", "Nama", "Unit"]]);
        assert!(!is_table_continuation(&a, &far, 1));
        assert!(!is_table_continuation(&a, &wide, 1));
        assert!(!is_table_continuation(&a, &a, 3));
    }

    #[test]
    fn data_first_row_continues() {
        let a = table(1, &[&["Periode", "Biaya"], &["Jan", "x"]]);
        let b = table(2, &[&["Feb", "Rp 1.500"]]);
        assert!(is_table_continuation(&a, &b, 1));
    }

    #[test]
    fn merges_runs_and_drops_repeated_header() {
        let a = table(1, &[&["No", "Nama"], &["1", "Ani"]]);
        let b = table(2, &[&["No", "Nama"], &["2", "Budi"], &["3", "Cici"]]);
        let c = table(5, &[&["Kode", "Harga"], &["A", "10"]]);
        let merged = merge_multi_page_tables(&[a, b, c]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].row_count, 4);
        let names: Vec<_> = merged[0]
            .cells
            .iter()
            .filter(|c| c.column_index == 1)
            .map(|c| c.content.as_str())
            .collect();
        assert_eq!(names, ["Nama", "Ani", "Budi", "Cici"]);
        assert_eq!(merged[1].cells[0].content, "Kode");
    }
}
