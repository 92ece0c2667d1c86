use super::*;

fn reconstruct(chunks: &[String], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(chunk);
        } else {
            out.extend(chunk.chars().skip(overlap));
        }
    }
    out
}

#[test]
fn short_narrative_yields_single_chunk() {
    let config = ChunkingConfig::default();
    let narrative = "  The bank charged me a fee I never agreed to.  ";

    let chunks = split_narrative(narrative, &config);

    assert_eq!(chunks, vec![narrative.trim().to_string()]);
}

#[test]
fn narrative_exactly_window_size_yields_single_chunk() {
    let config = ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 3,
    };
    let narrative = "abcdefghij";

    let chunks = split_narrative(narrative, &config);

    assert_eq!(chunks, vec![narrative.to_string()]);
}

#[test]
fn empty_narrative_yields_no_chunks() {
    let config = ChunkingConfig::default();

    assert!(split_narrative("", &config).is_empty());
    assert!(split_narrative("   \n\t ", &config).is_empty());
}

#[test]
fn consecutive_chunks_share_exact_overlap() {
    let config = ChunkingConfig {
        chunk_size: 50,
        chunk_overlap: 10,
    };
    let narrative = "I opened a savings account and the advertised interest rate was never \
                     applied. Customer service kept transferring me between departments.";

    let chunks = split_narrative(narrative, &config);
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        let prev: Vec<char> = pair[0].chars().collect();
        let tail: String = prev[prev.len() - config.chunk_overlap..].iter().collect();
        let head: String = pair[1].chars().take(config.chunk_overlap).collect();
        assert_eq!(tail, head);
    }
}

#[test]
fn overlap_removed_concatenation_reconstructs_narrative() {
    let config = ChunkingConfig {
        chunk_size: 37,
        chunk_overlap: 9,
    };
    let narrative = "Repeated unauthorized charges appeared on my credit card statement over \
                     three consecutive months and the dispute process went nowhere each time.";

    let chunks = split_narrative(narrative, &config);
    assert!(chunks.len() > 1);

    assert_eq!(reconstruct(&chunks, config.chunk_overlap), narrative);
}

#[test]
fn reconstruction_holds_for_multibyte_text() {
    let config = ChunkingConfig {
        chunk_size: 12,
        chunk_overlap: 4,
    };
    let narrative = "Überweisung fehlgeschlagen, Geld wurde trotzdem abgebucht, zweimal sogar";

    let chunks = split_narrative(narrative, &config);
    assert!(chunks.len() > 1);

    for chunk in &chunks {
        assert!(chunk.chars().count() <= config.chunk_size);
    }
    assert_eq!(reconstruct(&chunks, config.chunk_overlap), narrative);
}

#[test]
fn every_chunk_is_bounded_by_window_size() {
    let config = ChunkingConfig {
        chunk_size: 200,
        chunk_overlap: 40,
    };
    let narrative = "complaint text ".repeat(100);

    let chunks = split_narrative(&narrative, &config);

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(chunk.chars().count() <= config.chunk_size);
    }
}

#[test]
fn zero_overlap_partitions_narrative() {
    let config = ChunkingConfig {
        chunk_size: 8,
        chunk_overlap: 0,
    };
    let narrative = "abcdefghijklmnopqrstuvwxyz";

    let chunks = split_narrative(narrative, &config);

    assert_eq!(chunks.concat(), narrative);
}
