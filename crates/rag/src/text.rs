//! Text helpers shared by extraction, chunking and indexing.

use std::sync::OnceLock;

use {
    base64::{Engine, engine::general_purpose::URL_SAFE},
    tiktoken_rs::CoreBPE,
    tracing::warn,
};

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        #[allow(clippy::expect_used, unused_qualifications)]
        pub(crate) fn $name() -> &'static ::regex::Regex {
            static RE: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            RE.get_or_init(|| ::regex::Regex::new($pattern).expect("static regex"))
        }
    };
}
pub(crate) use static_regex;

static_regex!(bullets, "[•●▪∙◦]");
static_regex!(blanks, r"[ \t]+");
static_regex!(many_newlines, r"\n{4,}");
static_regex!(numbering, r"(\d+)\.(\s*)");
static_regex!(sub_numbering, r"(\d+\.\d+)\.(\s*)");
static_regex!(chapter, r"^(BAB|CHAPTER|SECTION|BAGIAN)\s*\d+");
static_regex!(numbered, r"^\d+\.");
static_regex!(sub_numbered, r"^\d+\.\d+");

/// Names of the core values the handbook documents revolve around.
pub const CORE_VALUES: [&str; 7] = [
    "humble",
    "customer focused",
    "employee satisfaction",
    "speed",
    "passion",
    "integrity",
    "discipline",
];

fn tokenizer() -> Option<&'static CoreBPE> {
    static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
    BPE.get_or_init(|| match tiktoken_rs::cl100k_base() {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            warn!(error = %e, "cl100k_base unavailable, estimating tokens");
            None
        },
    })
    .as_ref()
}

/// Token count under the `cl100k_base` encoding.
pub fn count_tokens(text: &str) -> usize {
    match tokenizer() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.len().div_ceil(4),
    }
}

/// URL-safe base64 of a blob name, used to derive stable point ids.
pub fn safe_doc_id(blob_name: &str) -> String {
    URL_SAFE.encode(blob_name.as_bytes())
}

/// Normalise whitespace, bullets and numbering while keeping the layout.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let txt = text.replace('\u{a0}', " ");
    let txt = bullets().replace_all(&txt, "- ");
    let txt = blanks().replace_all(&txt, " ");
    let txt = many_newlines().replace_all(&txt, "\n\n\n");
    let txt = numbering().replace_all(&txt, "${1}. ");
    let txt = sub_numbering().replace_all(&txt, "${1}. ");
    txt.trim().to_string()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify a paragraph by its layout role and wording.
///
/// The checks run in a fixed order and the first hit wins.
pub fn classify_content_type(text: &str, role: Option<&str>) -> &'static str {
    let upper = text.to_uppercase();

    if let Some(role) = role.map(str::to_lowercase) {
        if role.contains("title") {
            return "title";
        }
        if role.contains("heading") {
            return "heading";
        }
    }

    if contains_any(&upper, &["CORE VALUES", "NILAI INTI"]) {
        return "core_values_header";
    }

    if CORE_VALUES
        .iter()
        .any(|cv| upper.contains(&cv.to_uppercase()))
    {
        return if text.split_whitespace().count() < 10 {
            "core_value_item"
        } else {
            "core_value_content"
        };
    }

    if contains_any(&upper, &[
        "DAFTAR ISI",
        "TABLE OF CONTENTS",
        "CONTENTS",
        "INDEX",
        "INDEKS",
    ]) {
        return "table_of_contents";
    }

    if chapter().is_match(&upper) {
        return "chapter";
    }

    let trimmed = text.trim();
    if numbered().is_match(trimmed) {
        return "section_header";
    }
    if sub_numbered().is_match(trimmed) {
        return "subsection_header";
    }

    if contains_any(&upper, &["APPENDIX", "LAMPIRAN", "ANNEX", "ATTACHMENT"]) {
        return "appendix";
    }

    if contains_any(&upper, &[
        "PURPOSE",
        "TUJUAN",
        "VISION",
        "VISI",
        "MISSION",
        "MISI",
        "OBJECTIVE",
        "SASARAN",
        "GOAL",
        "TARGET",
        "INTRODUCTION",
        "PENDAHULUAN",
        "OVERVIEW",
        "RINGKASAN",
        "SUMMARY",
        "CONCLUSION",
        "KESIMPULAN",
        "RECOMMENDATION",
        "REKOMENDASI",
    ]) {
        return "purpose_statement";
    }

    if contains_any(&upper, &[
        "PROCEDURE",
        "PROSEDUR",
        "PROCESS",
        "PROSES",
        "WORKFLOW",
        "LANGKAH",
        "TAHAP",
        "STEPS",
        "CARA",
    ]) || contains_any(&upper, &[
        "POLICY",
        "KEBIJAKAN",
        "RULE",
        "ATURAN",
        "REGULATION",
        "REGULASI",
        "GUIDELINE",
        "PANDUAN",
    ]) {
        return "detailed_content";
    }

    if text.split_whitespace().count() > 100 {
        return "detailed_content";
    }

    if contains_any(text, &["|", ":", "─", "┌", "└"]) {
        return "table_content";
    }

    "content"
}

/// Section-opening content types.
pub fn is_heading_type(content_type: &str) -> bool {
    matches!(
        content_type,
        "title" | "heading" | "section_header" | "chapter" | "subsection"
    )
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("  a\u{a0}b\t\tc  ", "a b c")]
    #[case("• one\n● two", "- one\n- two")]
    #[case("1.Intro", "1. Intro")]
    #[case("2.   Scope\n\n\n\n\nEnd", "2. Scope\n\n\nEnd")]
    #[case("1.1.Detail", "1. 1. Detail")]
    #[case("", "")]
    fn cleans_text(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_text(input), expected);
    }

    #[test]
    fn doc_id_is_padded_url_safe_base64() {
        assert_eq!(
            safe_doc_id("sop/Employee Handbook.pdf"),
            "c29wL0VtcGxveWVlIEhhbmRib29rLnBkZg=="
        );
        assert_eq!(safe_doc_id("sop/a?.pdf"), "c29wL2E_LnBkZg==");
    }

    #[test]
    fn counts_tokens() {
        assert_eq!(count_tokens("hello world"), 2);
        assert_eq!(count_tokens(""), 0);
    }

    #[rstest]
    #[case("Employee Handbook", Some("title"), "title")]
    #[case("Leave", Some("sectionHeading"), "heading")]
    #[case("OUR CORE VALUES", None, "core_values_header")]
    #[case("Humble", None, "core_value_item")]
    #[case(
        "We stay humble and listen to every colleague before we decide anything at all",
        None,
        "core_value_content"
    )]
    #[case("Daftar Isi", None, "table_of_contents")]
    #[case("BAB 2 Ketentuan", None, "chapter")]
    #[case("3. Cuti Tahunan", None, "section_header")]
    #[case("Lampiran A", None, "appendix")]
    #[case("Tujuan dokumen ini", None, "purpose_statement")]
    #[case("Prosedur pengajuan", None, "detailed_content")]
    #[case("Kebijakan kerja jarak jauh", None, "detailed_content")]
    #[case("Nama: Budi", None, "table_content")]
    #[case("Karyawan wajib hadir", None, "content")]
    fn classifies(#[case] text: &str, #[case] role: Option<&str>, #[case] expected: &str) {
        assert_eq!(classify_content_type(text, role), expected);
    }

    #[test]
    fn long_text_is_detailed() {
        let text = vec!["kata"; 101].join(" ");
        assert_eq!(classify_content_type(&text, None), "detailed_content");
    }
}
