use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmissionStats {
    pub accepted: usize,
    pub skipped: usize,
}

/// Drops files whose (name, size) matches an earlier file in the submission.
///
/// This is a cheap heuristic, not a content hash: two different files with the
/// same name and size are treated as duplicates.
pub fn filter_duplicate_submissions<T>(
    files: Vec<T>,
    key: impl Fn(&T) -> (String, u64),
) -> (Vec<T>, SubmissionStats) {
    let mut seen = HashSet::new();
    let mut stats = SubmissionStats::default();
    let kept = files
        .into_iter()
        .filter(|file| {
            let fresh = seen.insert(key(file));
            if fresh {
                stats.accepted += 1;
            } else {
                stats.skipped += 1;
            }
            fresh
        })
        .collect();
    (kept, stats)
}
