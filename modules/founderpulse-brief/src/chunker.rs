/// Character budget per chunk fed to embedding/summarization calls.
pub const MAX_CHUNK_CHARS: usize = 8000;

/// Split text into chunks on word boundaries, each at most `max_chars`
/// characters. Text under the budget comes back as a single chunk. A single
/// word longer than the budget becomes its own oversized chunk rather than
/// being split mid-word.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.len() + 1; // +1 for the joining space

        if current_len + word_len > max_chars && !current.is_empty() {
            chunks.push(current.join(" "));
            current = vec![word];
            current_len = word_len;
        } else {
            current.push(word);
            current_len += word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("a short post", 100);
        assert_eq!(chunks, vec!["a short post".to_string()]);
    }

    #[test]
    fn splits_on_word_boundaries_within_budget() {
        let text = "alpha beta gamma delta epsilon";
        let chunks = chunk_text(text, 12);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 12, "chunk over budget: {chunk:?}");
            // No word was split
            for word in chunk.split(' ') {
                assert!(text.contains(word));
            }
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn oversized_word_stays_whole() {
        let text = format!("{} tail", "x".repeat(50));
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "x".repeat(50));
        assert_eq!(chunks[1], "tail");
    }

    #[test]
    fn empty_text() {
        assert_eq!(chunk_text("", 100), vec![String::new()]);
    }
}
