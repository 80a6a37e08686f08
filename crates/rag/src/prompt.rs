//! Context and system prompt construction for document answers.

use std::collections::BTreeSet;

use {assistant_common::text::display_name, serde::Serialize};

use crate::rerank::RetrievedChunk;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentsInfo {
    pub unique_document_count: usize,
    /// Sorted source names.
    pub unique_sources: Vec<String>,
    pub total_chunks: usize,
}

pub fn documents_info(chunks: &[RetrievedChunk]) -> DocumentsInfo {
    let sources: BTreeSet<&str> = chunks.iter().map(RetrievedChunk::source).collect();
    DocumentsInfo {
        unique_document_count: sources.len(),
        unique_sources: sources.into_iter().map(str::to_string).collect(),
        total_chunks: chunks.len(),
    }
}

pub fn build_context(chunks: &[RetrievedChunk], info: &DocumentsInfo, listing: bool) -> String {
    let mut parts = Vec::with_capacity(chunks.len() + 1);

    if listing {
        let mut summary = format!(
            "=== INFORMASI DOKUMEN LENGKAP ===\nJumlah dokumen unik yang tersedia: {}\n\nDaftar semua dokumen:\n",
            info.unique_document_count
        );
        for (i, source) in info.unique_sources.iter().enumerate() {
            summary.push_str(&format!("{}. {}\n", i + 1, display_name(source)));
        }
        summary.push_str(&format!(
            "\n(Total chunks dalam sistem: {})\n=== AKHIR INFORMASI DOKUMEN ===\n\n",
            info.total_chunks
        ));
        parts.push(summary);
    }

    for chunk in chunks {
        let content_type = chunk.str_field("content_type").unwrap_or("content");
        let mut meta = format!("[SUMBER: {} | TIPE: {content_type}", chunk.source());
        if let Some(header) = chunk.str_field("section_header").filter(|h| !h.is_empty()) {
            meta.push_str(&format!(" | BAGIAN: {header}"));
        }
        meta.push(']');
        parts.push(format!("{meta}\n{}", chunk.content));
    }

    parts.join("\n\n")
}

const ID_MARKERS: &[&str] = &[
    "yang", "dan", "apa", "ini", "itu", "di", "ke", "dari", "untuk", "dengan", "ada", "tidak",
    "berapa", "bagaimana", "siapa", "kapan", "mana", "saya", "kami", "anda", "tolong", "jelaskan",
    "adalah", "dalam", "pada", "bisa", "saja", "apakah", "sebutkan", "dokumen", "kebijakan",
];

const EN_MARKERS: &[&str] = &[
    "the", "and", "what", "is", "are", "of", "to", "in", "for", "with", "how", "many", "which",
    "who", "when", "where", "do", "does", "can", "you", "please", "explain", "list", "about",
    "have", "there", "my", "our", "policy", "documents",
];

/// `"en"` when the start of the text reads as English, `"id"` otherwise.
pub fn detect_language(text: &str) -> &'static str {
    let head: String = text.chars().take(100).collect::<String>().to_lowercase();
    let words: Vec<&str> = head
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let id = words.iter().filter(|w| ID_MARKERS.contains(w)).count();
    let en = words.iter().filter(|w| EN_MARKERS.contains(w)).count();
    if en > id { "en" } else { "id" }
}

struct PromptSignals {
    core_query: bool,
    core_content: bool,
    has_tables: bool,
    contents_query: bool,
}

fn signals(query: &str, chunks: &[RetrievedChunk]) -> PromptSignals {
    let q = query.to_lowercase();
    const CORE_MARKERS: [&str; 3] = ["humble", "customer focused", "employee satisfaction"];
    PromptSignals {
        core_query: ["core value", "nilai inti", "7 core"]
            .iter()
            .chain(CORE_MARKERS.iter())
            .any(|t| q.contains(t)),
        core_content: chunks.iter().any(|c| {
            let lower = c.content.to_lowercase();
            c.content_type().contains("core_values")
                || c.flag("is_core_values")
                || CORE_MARKERS.iter().any(|m| lower.contains(m))
        }),
        has_tables: chunks.iter().any(|c| c.content_type().contains("table")),
        contents_query: q.contains("contents"),
    }
}

/// System prompt in Indonesian (`lang == "id"`) or English.
pub fn build_system_prompt(lang: &str, query: &str, chunks: &[RetrievedChunk], info: &DocumentsInfo) -> String {
    let s = signals(query, chunks);
    let q = query.to_lowercase();
    let count = info.unique_document_count;

    let (base, heading, lines) = if lang == "id" {
        let mut lines: Vec<String> = vec![
            "1. KHUSUS UNTUK PERTANYAAN TENTANG JUMLAH ATAU DAFTAR DOKUMEN:".into(),
            format!("   - Ada TEPAT {count} dokumen unik yang tersedia"),
            "   - JANGAN sebutkan kata 'chunks' atau 'bagian' kepada user".into(),
            "   - Berikan nama dokumen dengan format yang bersih (tanpa path/extension)".into(),
            "   - Sertakan penjelasan singkat tentang isi setiap dokumen".into(),
            String::new(),
        ];
        if s.core_query && s.core_content {
            lines.extend(
                [
                    "2. KHUSUS UNTUK PERTANYAAN CORE VALUES:",
                    "   - Berikan SEMUA 7 core values yang ada dalam konteks, yaitu:",
                    "   - 1. HUMBLE",
                    "   - 2. CUSTOMER FOCUSED",
                    "   - 3. EMPLOYEE SATISFACTION",
                    "   - 4. SPEED",
                    "   - 5. PASSION",
                    "   - 6. INTEGRITY",
                    "   - 7. DISCIPLINE",
                    "   - JANGAN tambahkan atau kurangi dari list ini",
                    "   - Sertakan nama core value DAN penjelasan lengkapnya",
                    "   - Gunakan informasi LENGKAP dari konteks, jangan ringkas",
                    "   - Format dengan jelas dan mudah dibaca",
                    "   - WAJIB menggunakan semua detail yang tersedia di konteks",
                    "",
                ]
                .map(String::from),
            );
        }
        lines.extend(
            [
                "3. Untuk pertanyaan UMUM (seperti sapaan), jawab dengan:",
                "   'Halo! Senang bisa membantu Anda. 😊\\n   Ingat, One Team One Solution!\\n   Saya adalah asisten internal perusahaan yang siap mendukung kebutuhan Anda terkait dokumen dan informasi internal.\\n   Bagaimana saya bisa membantu Anda lebih lanjut?'",
                "",
                "4. Berikan jawaban yang KOMPREHENSIF berdasarkan SEMUA informasi relevan dalam konteks",
                "5. Jika ada struktur hierarki (daftar, bab, sub-bab), tampilkan dengan format yang jelas",
                "6. Gunakan SEMUA detail yang tersedia - jangan ringkas atau potong informasi",
                "7. Jika ada tabel, tampilkan dengan format yang mudah dibaca",
                "8. JANGAN PERNAH menyuruh user membaca dokumen asli atau mereferensikan ke sumber lain",
                "9. Jika informasi tersebar di beberapa bagian, gabungkan menjadi jawaban yang koheren",
                "10. Berikan jawaban dalam bahasa Indonesia yang natural dan profesional",
                "11. Jika pertanyaan terkait kebijakan, prosedur, atau aturan, fokus pada bagian tersebut",
                "12. Jika pertanyaan spesifik, fokus hanya pada informasi yang relevan tanpa bertele-tele",
            ]
            .map(String::from),
        );
        if q.contains("daftar isi") || s.contents_query {
            lines.push("13. Untuk daftar isi: tampilkan SEMUA item dengan hierarki yang lengkap dan jelas".into());
        }
        if s.has_tables {
            lines.push("13. Format tabel dengan rapi menggunakan struktur yang mudah dibaca".into());
            lines.push(
                "14. Untuk tabel: Sebutkan jumlah rows jika metadata row_count tersedia. \
                 Jika tabel di-split menjadi beberapa bagian (is_partial_table=True), \
                 beri tahu user bahwa ini bagian dari tabel yang lebih besar."
                    .into(),
            );
        }
        (
            "Anda adalah asisten ahli dokumen internal yang memberikan jawaban AKURAT, JELAS, dan MUDAH DIPAHAMI. \
             Tugas Anda adalah menjawab pertanyaan berdasarkan konteks yang diberikan dengan ringkas tapi tetap lengkap. ",
            "INSTRUKSI",
            lines,
        )
    } else {
        let mut lines: Vec<String> = vec![
            "1. SPECIFICALLY FOR DOCUMENT COUNT/LISTING QUESTIONS:".into(),
            format!("   - There are EXACTLY {count} unique documents available"),
            "   - DO NOT mention 'chunks' or 'parts' to the user".into(),
            "   - Provide document names in clean format (without path/extension)".into(),
            "   - Include brief explanation of each document's contents".into(),
            String::new(),
        ];
        if s.core_query && s.core_content {
            lines.extend(
                [
                    "2. SPECIFICALLY FOR CORE VALUES QUESTIONS:",
                    "   - Provide ALL 7 core values found in context",
                    "   - Include each core value name AND complete explanation",
                    "   - Use COMPLETE information from context, don't summarize",
                    "   - Format clearly and readably",
                    "   - MUST use all available details from context",
                    "",
                ]
                .map(String::from),
            );
        }
        lines.extend(
            [
                "3. For GENERAL questions (like greetings), respond with:",
                "   'Hello! Glad to assist you. 😊\\n   Remember, One Team One Solution!\\n   I am your internal company assistant, here to support your needs regarding documents and internal information.\\n   How can I help you further?'",
                "",
                "4. Provide COMPREHENSIVE answers based on ALL relevant information in the context",
                "5. If there are hierarchical structures (lists, chapters, sub-chapters), display them clearly",
                "6. Use ALL available details - don't summarize or cut information",
                "7. If there are tables, display them in readable format",
                "8. NEVER direct users to read original documents or reference other sources",
                "9. If information is spread across sections, combine into coherent answer",
                "10. Provide answers in natural and professional language",
                "11. If the question relates to policies, procedures, or rules, focus on those sections",
                "12. If the question is specific, focus ONLY on relevant information without unnecessary explanations",
            ]
            .map(String::from),
        );
        if q.contains("table of contents") || s.contents_query {
            lines.push("13. For table of contents: display ALL items with complete and clear hierarchy".into());
        }
        if s.has_tables {
            lines.push("13. Format tables neatly using readable structure".into());
            lines.push(
                "14. For tables: State the number of rows if the metadata row_count is available. \
                 If the table is split into multiple parts (is_partial_table=True), inform the user that this is part of a larger table."
                    .into(),
            );
        }
        (
            "You are an expert internal document assistant that provides ACCURATE, CLEAR, and EASY-TO-UNDERSTAND answers. \
             Your task is to answer questions based on the given context in a concise but complete way. ",
            "INSTRUCTIONS",
            lines,
        )
    };

    format!("{base}\n\n{heading}:\n{}", lines.join("\n"))
}
