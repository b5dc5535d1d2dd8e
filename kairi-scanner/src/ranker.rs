//! Parse language-model commentary into scored per-symbol blocks.
//!
//! The commentary has no fixed schema. The prompt asks the model to open each
//! symbol with a medal glyph and a bold symbol, and to include a
//! `Puan: X/10` line. Everything that depends on that layout lives behind
//! [`CommentaryParser`] so format drift is caught in one place.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use kairi_common::TieBreak;

/// Glyphs the model is asked to open each symbol block with.
pub const BLOCK_MARKERS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Glyph used for blocks in the delivered report.
pub const REPORT_MARKER: &str = "🔸";

/// Marker glyph, bold symbol, then a newline. Models sometimes emit the
/// two-character escape `\n` instead of a real newline; both are accepted.
static BLOCK_HEADER: Lazy<Regex> = Lazy::new(|| {
    let markers = BLOCK_MARKERS
        .iter()
        .map(|m| regex::escape(m))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?:{})\s*<b>(.*?)</b>(?:\\n|\n)", markers))
        .expect("block header pattern is valid")
});

static SCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Puan:\s*(\d+)/10").expect("score pattern is valid"));

/// One symbol's commentary with its extracted score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedBlock {
    pub score: u32,
    pub symbol: String,
    pub display_text: String,
}

impl RankedBlock {
    pub fn new(symbol: &str, detail: &str) -> Self {
        Self {
            score: extract_score(detail),
            symbol: symbol.to_string(),
            display_text: format!("{} <b>{}</b>\n{}", REPORT_MARKER, symbol, detail.trim()),
        }
    }
}

/// First `Puan: N/10` in the text, or 0.
pub fn extract_score(detail: &str) -> u32 {
    SCORE
        .captures(detail)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Splits commentary text into blocks in extraction order.
pub trait CommentaryParser: Send + Sync {
    fn parse_blocks(&self, text: &str) -> Vec<RankedBlock>;
}

/// Parser for the medal-glyph block layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerBlockParser;

impl CommentaryParser for MarkerBlockParser {
    fn parse_blocks(&self, text: &str) -> Vec<RankedBlock> {
        // Each header owns the text up to the next header (or the end).
        let headers: Vec<(String, usize, usize)> = BLOCK_HEADER
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let symbol = caps.get(1)?.as_str().trim().to_string();
                Some((symbol, whole.start(), whole.end()))
            })
            .collect();

        headers
            .iter()
            .enumerate()
            .map(|(i, (symbol, _, body_start))| {
                let body_end = headers
                    .get(i + 1)
                    .map(|(_, next_start, _)| *next_start)
                    .unwrap_or(text.len());
                RankedBlock::new(symbol, &text[*body_start..body_end])
            })
            .collect()
    }
}

/// Extracts blocks and orders them by score, highest first.
pub struct ResponseRanker {
    parser: Box<dyn CommentaryParser>,
    tie_break: TieBreak,
}

impl Default for ResponseRanker {
    fn default() -> Self {
        Self::new(TieBreak::Stable)
    }
}

impl ResponseRanker {
    pub fn new(tie_break: TieBreak) -> Self {
        Self::with_parser(Box::new(MarkerBlockParser), tie_break)
    }

    pub fn with_parser(parser: Box<dyn CommentaryParser>, tie_break: TieBreak) -> Self {
        Self { parser, tie_break }
    }

    pub fn rank(&self, commentary: &str) -> Vec<RankedBlock> {
        let mut blocks = self.parser.parse_blocks(commentary);

        // `sort_by` is stable, so equal scores keep extraction order.
        match self.tie_break {
            TieBreak::Stable => blocks.sort_by(|a, b| b.score.cmp(&a.score)),
            TieBreak::TextDescending => blocks.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then_with(|| b.display_text.cmp(&a.display_text))
            }),
        }

        tracing::debug!(
            blocks = blocks.len(),
            tie_break = ?self.tie_break,
            "Ranked commentary blocks"
        );

        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Bugünün değerlendirmesi:\n\n\
🥈 <b>MSFT</b>\nGüçlü bilanço.\nPuan: 7/10\n\n\
🥇 <b>AAPL</b>\nNakit akışı sağlam.\nPuan: 9/10\n\n\
🥉 <b>TSLA</b>\nDeğerleme yüksek.\nPuan: 4/10\n";

    fn symbols(blocks: &[RankedBlock]) -> Vec<&str> {
        blocks.iter().map(|b| b.symbol.as_str()).collect()
    }

    #[test]
    fn test_parse_blocks_in_extraction_order() {
        let blocks = MarkerBlockParser.parse_blocks(SAMPLE);
        assert_eq!(symbols(&blocks), vec!["MSFT", "AAPL", "TSLA"]);
        assert_eq!(blocks[0].score, 7);
        assert_eq!(
            blocks[0].display_text,
            "🔸 <b>MSFT</b>\nGüçlü bilanço.\nPuan: 7/10"
        );
    }

    #[test]
    fn test_rank_sorts_by_score_descending() {
        let blocks = ResponseRanker::default().rank(SAMPLE);
        assert_eq!(symbols(&blocks), vec!["AAPL", "MSFT", "TSLA"]);
        assert_eq!(
            blocks.iter().map(|b| b.score).collect::<Vec<_>>(),
            vec![9, 7, 4]
        );
    }

    #[test]
    fn test_preamble_is_discarded() {
        let blocks = MarkerBlockParser.parse_blocks(SAMPLE);
        assert!(blocks.iter().all(|b| !b.display_text.contains("değerlendirmesi")));
    }

    #[test]
    fn test_escaped_newline_is_accepted() {
        let text = r"🥇 <b>NVDA</b>\nPuan: 8/10";
        let blocks = MarkerBlockParser.parse_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].symbol, "NVDA");
        assert_eq!(blocks[0].score, 8);
    }

    #[test]
    fn test_missing_score_defaults_to_zero_and_sinks() {
        let text = "🥇 <b>AAA</b>\nYorum yok.\n🥈 <b>BBB</b>\nPuan: 1/10\n";
        let blocks = ResponseRanker::default().rank(text);
        assert_eq!(symbols(&blocks), vec!["BBB", "AAA"]);
        assert_eq!(blocks[1].score, 0);
    }

    #[test]
    fn test_first_score_wins() {
        assert_eq!(extract_score("Puan: 6/10 ... Puan: 9/10"), 6);
        assert_eq!(extract_score("Puan:8/10"), 8);
        assert_eq!(extract_score("Puan: yok"), 0);
        assert_eq!(extract_score("Puan: 99999999999999999999/10"), 0);
    }

    #[test]
    fn test_no_blocks_yields_empty() {
        let ranker = ResponseRanker::default();
        assert!(ranker.rank("").is_empty());
        assert!(ranker.rank("⚠️ Yorum üretilemedi: timeout").is_empty());
        assert!(ranker.rank("<b>AAPL</b>\nPuan: 9/10").is_empty());
    }

    #[test]
    fn test_stable_ties_keep_extraction_order() {
        let text = "🥉 <b>AAA</b>\nPuan: 5/10\n🥇 <b>ZZZ</b>\nPuan: 5/10\n🥈 <b>MMM</b>\nPuan: 5/10\n";
        let blocks = ResponseRanker::new(TieBreak::Stable).rank(text);
        assert_eq!(symbols(&blocks), vec!["AAA", "ZZZ", "MMM"]);
    }

    #[test]
    fn test_text_descending_ties() {
        let text = "🥉 <b>AAA</b>\nPuan: 5/10\n🥇 <b>ZZZ</b>\nPuan: 5/10\n🥈 <b>MMM</b>\nPuan: 6/10\n";
        let blocks = ResponseRanker::new(TieBreak::TextDescending).rank(text);
        assert_eq!(symbols(&blocks), vec!["MMM", "ZZZ", "AAA"]);
    }

    struct FixedParser;

    impl CommentaryParser for FixedParser {
        fn parse_blocks(&self, _text: &str) -> Vec<RankedBlock> {
            vec![
                RankedBlock::new("LOW", "Puan: 2/10"),
                RankedBlock::new("HIGH", "Puan: 10/10"),
            ]
        }
    }

    #[test]
    fn test_custom_parser_is_used() {
        let ranker = ResponseRanker::with_parser(Box::new(FixedParser), TieBreak::Stable);
        let blocks = ranker.rank("ignored");
        assert_eq!(symbols(&blocks), vec!["HIGH", "LOW"]);
    }
}
