//! Winner selection from hashtag popularity.

use crate::types::{Meme, MemeMetric};

/// Pick the winning meme index from per-meme media counts.
///
/// The scan keeps the running best only while it is strictly greater than
/// the next candidate, so ties go to the later meme. The returned index is
/// the first meme in `memes` sharing the winner's hashtag; two memes with the
/// same hashtag therefore always resolve to the earlier one.
///
/// Returns `None` when `metrics` is empty or no meme carries the winning
/// hashtag.
#[must_use]
pub fn pick_winner(memes: &[Meme], metrics: &[MemeMetric]) -> Option<usize> {
    let best = metrics
        .iter()
        .reduce(|prev, current| if prev.media_count > current.media_count { prev } else { current })?;

    memes.iter().position(|m| m.hashtag == best.hashtag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memes(tags: &[&str]) -> Vec<Meme> {
        tags.iter()
            .enumerate()
            .map(|(i, t)| Meme::new(format!("meme{i}"), "img", *t))
            .collect()
    }

    fn metrics(memes: &[Meme], counts: &[u64]) -> Vec<MemeMetric> {
        memes
            .iter()
            .zip(counts)
            .enumerate()
            .map(|(i, (m, c))| MemeMetric {
                meme_index: i,
                hashtag: m.hashtag.clone(),
                media_count: *c,
            })
            .collect()
    }

    #[test]
    fn highest_count_wins() {
        let m = memes(&["a", "b", "c"]);
        assert_eq!(pick_winner(&m, &metrics(&m, &[10, 300, 20])), Some(1));
    }

    #[test]
    fn ties_go_to_later_meme() {
        let m = memes(&["a", "b", "c"]);
        assert_eq!(pick_winner(&m, &metrics(&m, &[50, 50, 10])), Some(1));
        assert_eq!(pick_winner(&m, &metrics(&m, &[0, 0, 0])), Some(2));
    }

    #[test]
    fn duplicate_hashtag_resolves_to_first() {
        let m = memes(&["dup", "other", "dup"]);
        assert_eq!(pick_winner(&m, &metrics(&m, &[1, 2, 99])), Some(0));
    }

    #[test]
    fn empty_battle_has_no_winner() {
        assert_eq!(pick_winner(&[], &[]), None);
    }

    #[test]
    fn single_meme_always_wins() {
        let m = memes(&["solo"]);
        assert_eq!(pick_winner(&m, &metrics(&m, &[0])), Some(0));
    }
}
