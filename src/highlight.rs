//! Phrase highlighting
//!
//! Matching runs over the page's glyph sequence, not over a separately
//! extracted string, so every text offset found maps straight back to the
//! glyph boxes that produced it. Case folding and whitespace collapsing keep
//! an origin map from each folded character to its glyph.

use crate::error::Result;
use crate::output::OutputStore;
use crate::pdf::{Glyph, HighlightColor, PdfBackend, PdfDocumentAccess, Rect};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::PathBuf;

/// Minimum vertical overlap for two glyphs to share a line rectangle
const SAME_LINE_OVERLAP: f32 = 0.5;

/// Result of a highlight run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightOutcome {
    /// Absolute path of the highlighted copy
    pub output_path: PathBuf,
    /// Occurrences across all phrases and pages
    pub match_count: u32,
    /// Occurrences per normalized phrase
    pub phrase_counts: BTreeMap<String, u32>,
    /// Number of pages scanned
    pub pages_scanned: u32,
}

/// Match counts before the document is written out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    pub match_count: u32,
    pub phrase_counts: BTreeMap<String, u32>,
    pub pages_scanned: u32,
    pub rects_added: u32,
}

/// Fold case and collapse whitespace runs to a single space
fn fold(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                folded.push(' ');
            }
            in_space = true;
        } else {
            folded.extend(ch.to_lowercase());
            in_space = false;
        }
    }
    folded
}

/// Trim, fold and deduplicate phrases; empty phrases are dropped
pub fn normalize_phrases<I, S>(phrases: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    phrases
        .into_iter()
        .map(|p| fold(p.as_ref().trim()))
        .filter(|p| !p.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Parse a JSON array of strings into normalized phrases
pub fn parse_phrases_json(json: &str) -> Result<Vec<String>> {
    let raw: Vec<String> = serde_json::from_str(json)?;
    Ok(normalize_phrases(raw))
}

/// Page text after folding, with each character's source glyph index
#[derive(Debug, Clone)]
pub struct FoldedText {
    chars: Vec<char>,
    origin: Vec<usize>,
}

impl FoldedText {
    pub fn from_glyphs(glyphs: &[Glyph]) -> Self {
        let mut chars = Vec::with_capacity(glyphs.len());
        let mut origin = Vec::with_capacity(glyphs.len());
        let mut in_space = false;

        for (index, glyph) in glyphs.iter().enumerate() {
            if glyph.ch.is_whitespace() {
                if !in_space {
                    chars.push(' ');
                    origin.push(index);
                }
                in_space = true;
            } else {
                for lower in glyph.ch.to_lowercase() {
                    chars.push(lower);
                    origin.push(index);
                }
                in_space = false;
            }
        }

        Self { chars, origin }
    }

    pub fn as_chars(&self) -> &[char] {
        &self.chars
    }

    /// Glyph index range covered by a folded character range
    pub fn glyph_span(&self, range: &Range<usize>) -> Range<usize> {
        if range.is_empty() {
            return 0..0;
        }
        self.origin[range.start]..self.origin[range.end - 1] + 1
    }
}

/// Every non-overlapping occurrence of `needle`, scanning left to right.
/// The scan resumes after the end of each match.
pub fn find_occurrences(haystack: &[char], needle: &[char]) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return found;
    }

    let mut start = 0;
    while start + needle.len() <= haystack.len() {
        if haystack[start..start + needle.len()] == *needle {
            found.push(start..start + needle.len());
            start += needle.len();
        } else {
            start += 1;
        }
    }

    found
}

/// One rectangle per text line covered by the glyph span.
///
/// A line ends at a generated line break or when the next glyph box does
/// not sit on the same baseline band to the right of the current one.
pub fn span_rects(glyphs: &[Glyph], span: Range<usize>) -> Vec<Rect> {
    let mut rects = Vec::new();
    let mut current: Option<Rect> = None;

    for glyph in &glyphs[span.start.min(glyphs.len())..span.end.min(glyphs.len())] {
        let bounds = match glyph.bounds {
            Some(b) => b,
            None => {
                if matches!(glyph.ch, '\n' | '\r') {
                    rects.extend(current.take());
                }
                continue;
            }
        };

        current = Some(match current {
            Some(line)
                if line.vertical_overlap(&bounds) >= SAME_LINE_OVERLAP
                    && bounds.left >= line.left =>
            {
                line.union(&bounds)
            }
            Some(line) => {
                rects.push(line);
                bounds
            }
            None => bounds,
        });
    }

    rects.extend(current);
    rects
}

/// Rectangles of every occurrence of an already-normalized phrase
pub fn locate_phrase(glyphs: &[Glyph], phrase: &str) -> Vec<Vec<Rect>> {
    let folded = FoldedText::from_glyphs(glyphs);
    let needle: Vec<char> = phrase.chars().collect();

    find_occurrences(folded.as_chars(), &needle)
        .iter()
        .map(|range| span_rects(glyphs, folded.glyph_span(range)))
        .collect()
}

/// Annotate every occurrence of every phrase on every page.
///
/// Counts one match per occurrence. An occurrence whose glyphs have no boxes
/// still counts but adds no annotation.
pub fn annotate_document(
    document: &mut dyn PdfDocumentAccess,
    phrases: &[String],
    color: HighlightColor,
) -> Result<MatchReport> {
    let mut report = MatchReport {
        phrase_counts: phrases.iter().map(|p| (p.clone(), 0)).collect(),
        ..MatchReport::default()
    };
    let page_count = document.page_count();
    report.pages_scanned = page_count;

    if phrases.is_empty() {
        return Ok(report);
    }

    for page in 1..=page_count {
        let glyphs = document.page_glyphs(page)?;
        let folded = FoldedText::from_glyphs(&glyphs);
        let mut page_rects = Vec::new();
        let mut page_matches = 0u32;

        for phrase in phrases {
            let needle: Vec<char> = phrase.chars().collect();
            let occurrences = find_occurrences(folded.as_chars(), &needle);
            if occurrences.is_empty() {
                continue;
            }

            let count = occurrences.len() as u32;
            page_matches += count;
            if let Some(total) = report.phrase_counts.get_mut(phrase) {
                *total += count;
            }
            for range in &occurrences {
                page_rects.extend(span_rects(&glyphs, folded.glyph_span(range)));
            }
        }

        if page_matches > 0 {
            tracing::debug!(page, matches = page_matches, rects = page_rects.len(), "page matched");
            document.add_highlights(page, &page_rects, color)?;
        }

        report.match_count += page_matches;
        report.rects_added += page_rects.len() as u32;
    }

    Ok(report)
}

/// Produce a highlighted copy of `data` in `store`.
///
/// The input bytes are not modified. The document is closed before the copy
/// is written; nothing is left on disk when an error is returned.
pub fn highlight<B, S>(
    backend: &B,
    data: &[u8],
    phrases: &[S],
    color: HighlightColor,
    store: &OutputStore,
) -> Result<HighlightOutcome>
where
    B: PdfBackend,
    S: AsRef<str>,
{
    let phrases = normalize_phrases(phrases);

    let (bytes, report) = backend.with_document(data, |document| {
        let report = annotate_document(document, &phrases, color)?;
        let bytes = document.save_to_bytes()?;
        Ok((bytes, report))
    })?;

    let output_path = store.write(&bytes)?;

    tracing::info!(
        path = %output_path.display(),
        phrases = phrases.len(),
        matches = report.match_count,
        rects = report.rects_added,
        "highlighted document"
    );

    Ok(HighlightOutcome {
        output_path,
        match_count: report.match_count,
        phrase_counts: report.phrase_counts,
        pages_scanned: report.pages_scanned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pdf::testing::{decode, fake_pdf, FakeBackend, CHAR_WIDTH};
    use pretty_assertions::assert_eq;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn boxed(text: &str) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| {
                let left = i as f32 * 5.0;
                Glyph::new(ch, Some(Rect::new(left, 100.0, left + 5.0, 110.0)))
            })
            .collect()
    }

    #[test]
    fn test_normalize_phrases() {
        let phrases = normalize_phrases(["Invoice", "  invoice ", "", "   ", "Total  Due"]);
        assert_eq!(phrases, vec!["invoice".to_string(), "total due".to_string()]);
    }

    #[test]
    fn test_parse_phrases_json() {
        assert_eq!(
            parse_phrases_json(r#"["Alpha","BETA"]"#).unwrap(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
        assert!(parse_phrases_json("[]").unwrap().is_empty());
        assert!(matches!(
            parse_phrases_json(r#"{"phrase": "x"}"#),
            Err(Error::InvalidPhrases(_))
        ));
        assert!(matches!(parse_phrases_json("[1, 2]"), Err(Error::InvalidPhrases(_))));
    }

    #[test]
    fn test_find_occurrences_non_overlapping() {
        assert_eq!(find_occurrences(&chars("aaaa"), &chars("aa")), vec![0..2, 2..4]);
        assert_eq!(find_occurrences(&chars("abcabc"), &chars("bc")), vec![1..3, 4..6]);
        assert!(find_occurrences(&chars("abc"), &chars("")).is_empty());
        assert!(find_occurrences(&chars("ab"), &chars("abc")).is_empty());
    }

    #[test]
    fn test_folded_text_case_and_whitespace() {
        let glyphs = vec![
            Glyph::new('A', None),
            Glyph::new(' ', None),
            Glyph::new('\r', None),
            Glyph::new('\n', None),
            Glyph::new('B', None),
        ];
        let folded = FoldedText::from_glyphs(&glyphs);
        assert_eq!(folded.as_chars(), chars("a b").as_slice());
        assert_eq!(folded.glyph_span(&(0..3)), 0..5);
        assert_eq!(folded.glyph_span(&(2..3)), 4..5);
    }

    #[test]
    fn test_folded_text_expanding_lowercase_maps_to_one_glyph() {
        // 'İ' lowercases to two chars
        let glyphs = vec![Glyph::new('İ', None), Glyph::new('x', None)];
        let folded = FoldedText::from_glyphs(&glyphs);
        assert_eq!(folded.as_chars().len(), 3);
        assert_eq!(folded.glyph_span(&(0..2)), 0..1);
        assert_eq!(folded.glyph_span(&(2..3)), 1..2);
    }

    #[test]
    fn test_case_insensitive_locate() {
        let glyphs = boxed("invoice INVOICE InVoIcE");
        let found = locate_phrase(&glyphs, "invoice");
        assert_eq!(found.len(), 3);
        for rects in &found {
            assert_eq!(rects.len(), 1);
            assert_eq!(rects[0].width(), 35.0);
        }
        assert_eq!(found[1][0].left, 40.0);
    }

    #[test]
    fn test_span_rects_single_line() {
        let glyphs = boxed("hello world");
        let rects = span_rects(&glyphs, 6..11);
        assert_eq!(rects, vec![Rect::new(30.0, 100.0, 55.0, 110.0)]);
    }

    #[test]
    fn test_span_rects_wraps_lines() {
        let mut glyphs = boxed("total");
        glyphs.push(Glyph::new('\r', None));
        glyphs.push(Glyph::new('\n', None));
        glyphs.extend("due".chars().enumerate().map(|(i, ch)| {
            let left = i as f32 * 5.0;
            Glyph::new(ch, Some(Rect::new(left, 86.0, left + 5.0, 96.0)))
        }));

        let found = locate_phrase(&glyphs, "total due");
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0],
            vec![
                Rect::new(0.0, 100.0, 25.0, 110.0),
                Rect::new(0.0, 86.0, 15.0, 96.0)
            ]
        );
    }

    #[test]
    fn test_span_rects_breaks_on_leftward_jump_without_newline() {
        let glyphs = vec![
            Glyph::new('a', Some(Rect::new(50.0, 100.0, 55.0, 110.0))),
            Glyph::new('b', Some(Rect::new(10.0, 100.0, 15.0, 110.0))),
        ];
        assert_eq!(span_rects(&glyphs, 0..2).len(), 2);
    }

    #[test]
    fn test_span_rects_skips_unboxed_glyphs() {
        let glyphs = vec![Glyph::new('a', None), Glyph::new('b', None)];
        assert!(span_rects(&glyphs, 0..2).is_empty());
    }

    #[test]
    fn test_highlight_counts_occurrences_across_pages() {
        let temp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(temp.path());
        let backend = FakeBackend::new();
        let data = fake_pdf(&["Invoice no. 7\nsee invoice", "Paid: INVOICE 7"]);

        let outcome = highlight(
            &backend,
            &data,
            &["invoice"],
            HighlightColor::YELLOW,
            &store,
        )
        .unwrap();

        assert_eq!(outcome.match_count, 3);
        assert_eq!(outcome.pages_scanned, 2);
        assert_eq!(outcome.phrase_counts.get("invoice"), Some(&3));

        let written = decode(&std::fs::read(&outcome.output_path).unwrap()).unwrap();
        assert_eq!(written.highlights.len(), 3);
        assert_eq!(written.highlights.iter().filter(|h| h.0 == 1).count(), 2);
        assert_eq!(written.highlights.iter().filter(|h| h.0 == 2).count(), 1);

        // First match: columns 0..7 of line 0
        let (_, first, color) = &written.highlights[0];
        assert_eq!(first[0], 72.0);
        assert_eq!(first[2], 72.0 + 7.0 * CHAR_WIDTH);
        assert_eq!(color, "#FFFF00");
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_each_phrase_counted_separately() {
        let temp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(temp.path());
        let backend = FakeBackend::new();
        let data = fake_pdf(&["red apple, green apple"]);

        let outcome = highlight(
            &backend,
            &data,
            &["apple", "green apple", "pear"],
            HighlightColor::YELLOW,
            &store,
        )
        .unwrap();

        assert_eq!(outcome.match_count, 3);
        assert_eq!(outcome.phrase_counts.get("apple"), Some(&2));
        assert_eq!(outcome.phrase_counts.get("green apple"), Some(&1));
        assert_eq!(outcome.phrase_counts.get("pear"), Some(&0));
    }

    #[test]
    fn test_multiline_occurrence_counts_once() {
        let temp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(temp.path());
        let backend = FakeBackend::new();
        let data = fake_pdf(&["amount\ndue now"]);

        let outcome = highlight(
            &backend,
            &data,
            &["Amount Due"],
            HighlightColor::YELLOW,
            &store,
        )
        .unwrap();

        assert_eq!(outcome.match_count, 1);
        let written = decode(&std::fs::read(&outcome.output_path).unwrap()).unwrap();
        assert_eq!(written.highlights.len(), 2);
    }

    #[test]
    fn test_empty_phrases_still_writes_copy() {
        let temp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(temp.path());
        let backend = FakeBackend::new();
        let data = fake_pdf(&["one", "two"]);
        let phrases: [&str; 0] = [];

        let outcome = highlight(&backend, &data, &phrases, HighlightColor::YELLOW, &store).unwrap();

        assert_eq!(outcome.match_count, 0);
        let written = decode(&std::fs::read(&outcome.output_path).unwrap()).unwrap();
        assert_eq!(written.pages, vec!["one".to_string(), "two".to_string()]);
        assert!(written.highlights.is_empty());
    }

    #[test]
    fn test_rerun_creates_new_file_with_same_count() {
        let temp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(temp.path());
        let backend = FakeBackend::new();
        let data = fake_pdf(&["alpha beta alpha"]);
        let original = data.clone();

        let first = highlight(&backend, &data, &["alpha"], HighlightColor::YELLOW, &store).unwrap();
        let second = highlight(&backend, &data, &["alpha"], HighlightColor::YELLOW, &store).unwrap();

        assert_ne!(first.output_path, second.output_path);
        assert_eq!(first.match_count, second.match_count);
        assert_eq!(data, original);
    }

    #[test]
    fn test_malformed_input_leaves_no_output() {
        let temp = tempfile::tempdir().unwrap();
        let store = OutputStore::new(temp.path().join("out"));
        let backend = FakeBackend::new();

        let result = highlight(&backend, b"%PDF-1", &["x"], HighlightColor::YELLOW, &store);
        assert_eq!(result.unwrap_err().kind(), crate::error::ErrorKind::DocumentParse);
        assert!(!temp.path().join("out").exists());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_unwritable_output_is_output_error_and_closes_document() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = OutputStore::new(blocker.join("sub"));
        let backend = FakeBackend::new();

        let result = highlight(
            &backend,
            &fake_pdf(&["x"]),
            &["x"],
            HighlightColor::YELLOW,
            &store,
        );
        assert!(matches!(result, Err(Error::OutputWrite { .. })));
        assert_eq!(backend.opened_total(), 1);
        assert_eq!(backend.open_handles(), 0);
    }
}
