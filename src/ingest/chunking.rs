//! Fixed-size overlapping character windows.

/// Split `text` into windows of `size` characters overlapping by `overlap`.
///
/// Boundaries land on character boundaries, never inside a multi-byte
/// sequence. Windows are trimmed and whitespace-only windows are dropped.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);

    let offsets: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    let total = offsets.len();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + size).min(total);
        let byte_start = offsets[start];
        let byte_end = if end == total { text.len() } else { offsets[end] };
        let window = text[byte_start..byte_end].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end == total {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("hello world", 1200, 150), vec!["hello world"]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(split_text("   \n\t ", 1200, 150).is_empty());
        assert!(split_text("", 1200, 150).is_empty());
    }

    #[test]
    fn windows_overlap_by_the_configured_amount() {
        let text: String = ('a'..='z').cycle().take(25).collect();
        let chunks = split_text(&text, 10, 4);
        // step of 6: windows start at 0, 6, 12, 18
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], &text[0..10]);
        assert_eq!(chunks[1], &text[6..16]);
        assert_eq!(chunks[3], &text[18..25]);
        // adjacent windows share the 4-character overlap
        assert_eq!(&chunks[0][6..], &chunks[1][..4]);
    }

    #[test]
    fn multibyte_text_splits_on_character_boundaries() {
        let text = "äöü".repeat(10); // 30 chars, 60 bytes
        let chunks = split_text(&text, 12, 3);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 12);
        }
        assert_eq!(chunks[0].chars().count(), 12);
    }

    #[test]
    fn overlap_larger_than_size_still_advances() {
        let chunks = split_text("abcdefghij", 4, 10);
        // degenerate configuration falls back to a step of one
        assert!(chunks.len() > 2);
        assert_eq!(chunks[0], "abcd");
        assert_eq!(chunks[1], "bcde");
    }
}
