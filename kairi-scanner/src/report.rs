//! Final report text delivered to Telegram (HTML parse mode).

use crate::ranker::RankedBlock;

/// Separator between ranked blocks.
const BLOCK_SEPARATOR: &str = "\n\n";

/// Header line naming the exchange.
pub fn header(exchange: &str) -> String {
    format!("📊 <b>{} KAIRI + Alış Sinyali Raporu</b>", exchange)
}

/// Trailer listing matched symbols that were not analysed in detail.
pub fn overflow_trailer(overflow: &[String]) -> String {
    format!("📋 <b>Diğer eşleşen hisseler:</b> {}", overflow.join(", "))
}

/// Short notice sent when nothing matched.
pub fn no_match_notice(exchange: &str, threshold: f64) -> String {
    format!(
        "🔍 {}: KAIRI ≤ {} ve alış sinyali olan hisse bulunamadı.",
        exchange, threshold
    )
}

/// Assemble header, ranked blocks and the overflow trailer.
pub fn assemble(exchange: &str, blocks: &[RankedBlock], overflow: &[String]) -> String {
    let mut sections = vec![header(exchange)];

    if !blocks.is_empty() {
        sections.push(
            blocks
                .iter()
                .map(|b| b.display_text.as_str())
                .collect::<Vec<_>>()
                .join(BLOCK_SEPARATOR),
        );
    }

    if !overflow.is_empty() {
        sections.push(overflow_trailer(overflow));
    }

    sections.join(BLOCK_SEPARATOR)
}
