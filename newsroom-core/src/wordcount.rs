//! Word and character counts of item bodies.

use crate::html::extract_text;
use crate::types::NewsItem;

/// Words in an item body.
///
/// A precomputed `wordcount` is trusted as is. Otherwise the body text is
/// split on single spaces and non-blank pieces are counted, so a block
/// boundary without a space next to it does not separate words.
pub fn word_count(item: &NewsItem) -> u64 {
    if let Some(count) = item.wordcount {
        return count;
    }
    let Some(html) = item.body_html.as_deref() else {
        return 0;
    };
    extract_text(html)
        .split(' ')
        .filter(|word| !word.trim().is_empty())
        .count() as u64
}

/// Characters in an item body, not counting line breaks.
pub fn char_count(item: &NewsItem) -> u64 {
    if let Some(count) = item.charcount {
        return count;
    }
    let Some(html) = item.body_html.as_deref() else {
        return 0;
    };
    extract_text(html)
        .chars()
        .filter(|c| *c != '\n')
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precomputed_count_wins() {
        let item = NewsItem {
            wordcount: Some(5),
            ..NewsItem::with_body("<p>ignored text here</p>")
        };
        assert_eq!(word_count(&item), 5);
    }

    #[test]
    fn test_no_body_counts_zero() {
        assert_eq!(word_count(&NewsItem::default()), 0);
        assert_eq!(word_count(&NewsItem::with_body("")), 0);
        assert_eq!(word_count(&NewsItem::with_body("<p> </p>")), 0);
    }

    #[test]
    fn test_extra_spaces_are_collapsed() {
        assert_eq!(word_count(&NewsItem::with_body("<p>one two  three</p>")), 3);
    }

    #[test]
    fn test_block_boundaries_without_spaces_join_words() {
        // "Hello\nWorld\n" has no space to split on
        assert_eq!(word_count(&NewsItem::with_body("<p>Hello</p><p>World</p>")), 1);
        assert_eq!(word_count(&NewsItem::with_body("<p>Hello there</p> <p>big World</p>")), 4);
    }

    #[test]
    fn test_inline_markup_counts_words() {
        let item = NewsItem::with_body("<p>The <b>quick</b> brown <a href=\"#\">fox</a></p>");
        assert_eq!(word_count(&item), 4);
    }

    #[test]
    fn test_char_count() {
        assert_eq!(char_count(&NewsItem::with_body("<p>ab</p><p>c d</p>")), 5);
        let item = NewsItem {
            charcount: Some(99),
            ..NewsItem::with_body("<p>ab</p>")
        };
        assert_eq!(char_count(&item), 99);
        assert_eq!(char_count(&NewsItem::default()), 0);
    }
}
