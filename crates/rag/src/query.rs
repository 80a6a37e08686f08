//! Detection of "which/how many documents do you have" questions.

use std::collections::HashMap;

use tracing::debug;

use crate::text::static_regex;

const TARGET_PHRASES: &[&str] = &[
    "berapa dokumen yang ada",
    "dokumen apa saja tersedia",
    "daftar semua dokumen",
    "jumlah file yang tersimpan",
    "ada dokumen apa",
    "tunjukkan dokumen yang ada",
    "berapa banyak berkas",
    "sebutkan dokumen internal",
    "dokumen apa saja",
    "ada berapa dokumen",
    "berapa jumlah dokumen",
    "dokumen yang tersedia",
    "list dokumen",
    "cek dokumen apa saja",
    "kasih tau dokumen yang ada",
    "berapa file tersimpan",
    "dokumen internal apa saja",
    "arsip apa yang ada",
    "data apa saja tersedia",
    "laporan apa yang ada",
    "berkas apa yang tersimpan",
    "how many documents available",
    "what documents do you have",
    "list all documents",
    "show me the documents",
    "count of files stored",
    "available document list",
    "what files are available",
    "document inventory",
    "tell me about documents",
    "give me list of documents",
    "what documents exist",
    "show available files",
    "how many files do you have",
    "what records are stored",
];

const QUANTITY_WORDS: &[&str] = &[
    "berapa", "ada berapa", "jumlah", "total", "banyak", "sejumlah", "sekitar", "kurang lebih",
    "kira-kira", "berapa banyak", "berapa jumlah", "how many", "number of", "count", "amount",
    "quantity", "approximately", "how much",
];

const LISTING_WORDS: &[&str] = &[
    "daftar", "list", "apa saja", "apa aja", "yang mana", "mana saja", "sebutkan", "tunjukkan",
    "tampilkan", "lihat", "cek", "show me", "kasih tau", "kasih tahu", "informasikan", "what",
    "which", "show", "display", "check", "see", "tell me", "give me", "provide",
];

const DOCUMENT_WORDS: &[&str] = &[
    "dokumen", "file", "berkas", "arsip", "data", "laporan", "catatan", "rekaman", "informasi",
    "referensi", "document", "record", "archive", "report", "information", "pdf", "doc",
    "reference",
];

const AVAILABILITY_WORDS: &[&str] = &[
    "tersedia", "ada", "punya", "miliki", "simpan", "tersimpan", "exist", "ready", "available",
    "yang ada", "yang tersedia", "have", "stored", "saved", "present", "accessible",
];

const COLLOQUIAL_PAIRS: &[(&str, &str)] = &[
    ("dokumen", "apa"),
    ("file", "apa"),
    ("berkas", "mana"),
    ("ada", "dokumen"),
    ("punya", "dokumen"),
    ("simpan", "file"),
    ("internal", "dokumen"),
    ("company", "dokumen"),
    ("have", "document"),
    ("got", "file"),
    ("stored", "document"),
    ("internal", "document"),
    ("company", "file"),
];

static_regex!(
    listing_patterns,
    r"(?i)\b(berapa|ada berapa|jumlah)\s+\w*\s*(dokumen|file|berkas|arsip|data)|\b(dokumen|file|berkas|arsip)\s+\w*\s*(apa saja|yang ada|tersedia|available)|\b(daftar|list|tunjukkan|sebutkan|kasih tau)\s+\w*\s*(dokumen|file|berkas)|\b(cek|lihat|show)\s+\w*\s*(dokumen|file|berkas)|\b(ada)\s+\w*\s*(dokumen|file|berkas)\s+\w*\s*(apa|what)|\b(how many|number of|count of)\s+\w*\s*(document|file|record)|\b(what|which)\s+\w*\s*(document|file|record)|\b(show|list|display|give me)\s+\w*\s*(document|file|record)|\b(available|existing)\s+\w*\s*(document|file|record)|\b(document|file|record)\s+\w*\s*(available|exist|stored)"
);

/// Similarity in `[0, 1]` computed the Ratcliff/Obershelp way: twice the
/// number of matched characters over the total length, where matches are
/// found by recursively taking the longest common block.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(&a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    2.0 * matched as f64 / total as f64
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a`
/// then in `b` on ties.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best) = (alo, blo, 0);
    let mut run: HashMap<usize, usize> = HashMap::new();
    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next = HashMap::new();
        for &j in b2j.get(c).map(Vec::as_slice).unwrap_or_default() {
            if j < blo {
                continue;
            }
            if j >= bhi {
                break;
            }
            let k = j.checked_sub(1).and_then(|p| run.get(&p)).copied().unwrap_or(0) + 1;
            next.insert(j, k);
            if k > best {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best = k;
            }
        }
        run = next;
    }
    (best_i, best_j, best)
}

fn contains_any(query: &str, words: &[&str]) -> bool {
    words.iter().any(|w| query.contains(w))
}

/// Whether the user asks how many or which documents exist, in Indonesian or
/// English, including informal phrasing.
pub fn is_document_listing_query(query: &str) -> bool {
    let q = query.to_lowercase();
    let q = q.trim();

    if let Some(phrase) = TARGET_PHRASES.iter().find(|p| sequence_ratio(q, p) > 0.80) {
        debug!(query = q, phrase, "listing query: fuzzy match");
        return true;
    }

    let groups: [(&str, &[&str], &[&str]); 3] = [
        ("quantity+document", QUANTITY_WORDS, DOCUMENT_WORDS),
        ("listing+document", LISTING_WORDS, DOCUMENT_WORDS),
        ("document+availability", DOCUMENT_WORDS, AVAILABILITY_WORDS),
    ];
    for (name, first, second) in groups {
        if contains_any(q, first) && contains_any(q, second) {
            debug!(query = q, groups = name, "listing query: synonym match");
            return true;
        }
    }

    if listing_patterns().is_match(q) {
        debug!(query = q, "listing query: pattern match");
        return true;
    }

    if let Some((a, b)) = COLLOQUIAL_PAIRS
        .iter()
        .find(|(a, b)| q.contains(a) && q.contains(b))
    {
        debug!(query = q, first = a, second = b, "listing query: colloquial match");
        return true;
    }

    false
}
