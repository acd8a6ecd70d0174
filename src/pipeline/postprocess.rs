//! Post-processing: deterministic cleanup of OCR markdown before it is
//! handed to the card generator.
//!
//! The OCR model returns faithful markdown, but a textbook page carries a lot
//! that only adds noise to a flashcard prompt: figure references, section
//! headings in Latin script, page furniture, and LaTeX used for arrows and
//! answer blanks. The rules below strip that noise so the prompt stays
//! focused on the Japanese content.
//!
//! ## Rule Order
//!
//! Symbol replacement and `<br>` expansion run on the whole text first, so
//! that the line-level filters see the final line boundaries.

use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder inserted for LaTeX answer blanks.
pub const BLANK_PLACEHOLDER: &str = "_____";

/// Apply all cleanup rules to raw OCR markdown.
///
/// Rules (applied in order):
/// 1. `$\rightarrow$`, `$\Rightarrow$` → `→`; `$\square$`, `$\qquad$` → blank
/// 2. `<br>` → newline
/// 3. Strip heading markers (`#`, `##`, … followed by whitespace)
/// 4. Strip parenthetical asides `( … )`
/// 5. Trim lines; drop empty lines, image references and pure-Latin lines
/// 6. Rejoin with `\n`
pub fn clean_ocr_markdown(input: &str) -> String {
    let s = replace_latex_symbols(input);
    let s = expand_line_breaks(&s);
    let s = strip_heading_markers(&s);
    let s = strip_parentheticals(&s);
    filter_lines(&s)
}

/// Join page markdowns, skipping pages that are nothing but an image.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    pages
        .into_iter()
        .filter(|p| !p.is_empty() && !is_image_reference(p))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 1: LaTeX symbols ────────────────────────────────────────────────────

fn replace_latex_symbols(input: &str) -> String {
    input
        .replace("$\\rightarrow$", "→")
        .replace("$\\Rightarrow$", "→")
        .replace("$\\square$", BLANK_PLACEHOLDER)
        .replace("$\\qquad$", BLANK_PLACEHOLDER)
}

// ── Rule 2: <br> tags ────────────────────────────────────────────────────────

fn expand_line_breaks(input: &str) -> String {
    input.replace("<br>", "\n")
}

// ── Rule 3: Heading markers ──────────────────────────────────────────────────

static RE_HEADING_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"#+\s").unwrap());

fn strip_heading_markers(input: &str) -> String {
    RE_HEADING_MARKER.replace_all(input, "").to_string()
}

// ── Rule 4: Parenthetical asides ─────────────────────────────────────────────

static RE_PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").unwrap());

fn strip_parentheticals(input: &str) -> String {
    RE_PARENTHETICAL.replace_all(input, "").to_string()
}

// ── Rule 5: Line filter ──────────────────────────────────────────────────────

static RE_LATIN_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z\s]+$").unwrap());

fn is_image_reference(line: &str) -> bool {
    line.starts_with("![")
}

fn filter_lines(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !is_image_reference(line))
        .filter(|line| !RE_LATIN_ONLY.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latex_symbols() {
        assert_eq!(
            replace_latex_symbols(r"行く $\rightarrow$ 行った $\Rightarrow$ x"),
            "行く → 行った → x"
        );
        assert_eq!(replace_latex_symbols(r"私は$\square$です"), "私は_____です");
        assert_eq!(replace_latex_symbols(r"$\qquad$"), BLANK_PLACEHOLDER);
    }

    #[test]
    fn test_heading_markers_removed() {
        assert_eq!(strip_heading_markers("## 第一課\n# 文法"), "第一課\n文法");
    }

    #[test]
    fn test_parentheticals_removed() {
        assert_eq!(strip_parentheticals("食べる(たべる)を使う"), "食べるを使う");
    }

    #[test]
    fn test_latin_only_lines_dropped() {
        let input = "Lesson One\n日本語\n  \nPage\n2 Exercises";
        assert_eq!(filter_lines(input), "日本語\n2 Exercises");
    }

    #[test]
    fn test_image_lines_dropped() {
        let input = "![img-0.jpeg](img-0.jpeg)\nこれはペンです";
        assert_eq!(filter_lines(input), "これはペンです");
    }

    #[test]
    fn test_join_pages_skips_image_pages() {
        let pages = ["![img](a.png)", "", "一ページ", "二ページ"];
        assert_eq!(join_pages(pages), "一ページ\n二ページ");
    }

    #[test]
    fn test_clean_full_pipeline() {
        let input = "# Chapter One\n## 第1課\n\n  私は学生です(I am a student)  <br>  行く $\\rightarrow$ 行きます\n![fig](fig.png)\n\nLesson\n";
        assert_eq!(
            clean_ocr_markdown(input),
            "第1課\n私は学生です\n行く → 行きます"
        );
    }

    #[test]
    fn test_clean_empty_input() {
        assert_eq!(clean_ocr_markdown(""), "");
        assert_eq!(clean_ocr_markdown("\n\n  \n"), "");
    }
}
