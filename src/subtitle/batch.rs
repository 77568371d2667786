//! Duration-bounded batching and reassembly.
//!
//! Each batch covers at most `max_duration_ms` of source audio so one LLM
//! call has a roughly constant prompt size regardless of lecture length.

use log::debug;

use crate::subtitle::types::{Cue, VttFile};

/// Default audio window per batch (10 minutes)
pub const DEFAULT_BATCH_DURATION_MS: u64 = 600_000;

/// Span of a group: last cue's end minus first cue's start
fn span_ms(first: &Cue, last: &Cue) -> u64 {
    last.end_ms().saturating_sub(first.start_ms())
}

/// Partition cues into consecutive groups whose span stays within
/// `max_duration_ms`.
///
/// A cue that is longer than the limit on its own gets a group to itself.
/// Every cue lands in exactly one group and order is preserved.
pub fn split(file: &VttFile, max_duration_ms: u64) -> Vec<VttFile> {
    let mut groups: Vec<Vec<Cue>> = Vec::new();
    let mut current: Vec<Cue> = Vec::new();

    for cue in &file.cues {
        let fits = match current.first() {
            Some(first) => span_ms(first, cue) <= max_duration_ms,
            None => true,
        };
        if !fits {
            groups.push(std::mem::take(&mut current));
        }
        current.push(cue.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }

    debug!(
        "Split {} cues into {} batches of at most {} ms",
        file.cues.len(),
        groups.len(),
        max_duration_ms
    );

    groups.into_iter().map(|cues| file.with_cues(cues)).collect()
}

/// Concatenate cues of several files in the given order.
///
/// Header and blocks come from the first file; batches produced by [`split`]
/// all share them.
pub fn merge(files: &[VttFile]) -> VttFile {
    let cues = files.iter().flat_map(|f| f.cues.iter().cloned()).collect();
    match files.first() {
        Some(first) => first.with_cues(cues),
        None => VttFile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evenly_spaced(count: u64, step_ms: u64) -> VttFile {
        let cues = (0..count)
            .map(|i| Cue::new(i * step_ms, (i + 1) * step_ms, format!("cue {}", i)))
            .collect();
        VttFile::default().with_cues(cues)
    }

    fn assert_covers(original: &VttFile, batches: &[VttFile]) {
        let rejoined: Vec<Cue> = batches.iter().flat_map(|b| b.cues.clone()).collect();
        assert_eq!(rejoined, original.cues);
    }

    #[test]
    fn test_twenty_five_minutes_makes_three_batches() {
        // 300 cues of 5 s each = 25 minutes
        let file = evenly_spaced(300, 5_000);
        let batches = split(&file, DEFAULT_BATCH_DURATION_MS);

        assert_eq!(batches.len(), 3);
        for batch in &batches {
            let span = span_ms(batch.cues.first().unwrap(), batch.cues.last().unwrap());
            assert!(span <= DEFAULT_BATCH_DURATION_MS);
        }
        assert_eq!(batches.iter().map(|b| b.cues.len()).sum::<usize>(), 300);
        assert_covers(&file, &batches);
    }

    #[test]
    fn test_oversized_cue_gets_its_own_batch() {
        let file = VttFile::default().with_cues(vec![
            Cue::new(0, 1_000, "short"),
            Cue::new(1_000, 20_000, "very long"),
            Cue::new(20_000, 21_000, "after"),
        ]);
        let batches = split(&file, 5_000);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1].cues.len(), 1);
        assert_eq!(batches[1].cues[0].text, "very long");
        assert_covers(&file, &batches);
    }

    #[test]
    fn test_split_coverage_over_many_limits() {
        let file = VttFile::default().with_cues(vec![
            Cue::new(0, 2_000, "a"),
            Cue::new(1_500, 4_000, "b"),
            Cue::new(4_000, 4_000, "c"),
            Cue::new(9_000, 30_000, "d"),
            Cue::new(30_500, 31_000, "e"),
        ]);
        for limit in [1, 500, 2_000, 4_000, 10_000, 60_000] {
            let batches = split(&file, limit);
            assert_covers(&file, &batches);
            for batch in &batches {
                let span = span_ms(batch.cues.first().unwrap(), batch.cues.last().unwrap());
                assert!(span <= limit || batch.cues.len() == 1, "limit {} span {}", limit, span);
            }
        }
    }

    #[test]
    fn test_empty_file_has_no_batches() {
        assert!(split(&VttFile::default(), DEFAULT_BATCH_DURATION_MS).is_empty());
        assert!(merge(&[]).cues.is_empty());
    }

    #[test]
    fn test_merge_restores_split() {
        let mut file = evenly_spaced(50, 30_000);
        file.header = Some("Kind: captions".to_string());
        let batches = split(&file, 120_000);
        assert!(batches.len() > 1);
        assert_eq!(merge(&batches), file);
    }
}
