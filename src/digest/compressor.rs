//! The compression pass: sort the working array, then greedily re-merge it
//! so no cluster spans more than one unit in the scale coordinate.
//!
//! Contract:
//! - Operates on the digest's single working array (established prefix of
//!   `watermark` elements + appended tail), never on a second buffer.
//! - Non-forced passes alternate sort direction by `merge_count` parity.
//!   With many repeated keys a fixed direction biases which cluster absorbs
//!   the duplicates until the k-limit breaks; alternation removes the bias.
//! - Whenever the coming direction disagrees with how the established prefix
//!   is currently stored, that prefix is reversed in place first, so
//!   previously established centroids keep their relative order across
//!   passes. The sort itself is stable.
//! - The greedy merge never writes into slot 0 and always forces the final
//!   element into a fresh slot: the first and last centroids stay
//!   singletons, which the query paths rely on for exact min/max behavior.
//! - When the sample log is enabled, every permutation and every cluster
//!   merge is mirrored onto it.

use crate::digest::merging::MergingDigest;
use crate::error::{SketchError, SketchResult};

impl MergingDigest {
    /// Run one compression pass at the given level. `force` pins the sort
    /// ascending and disables the under-full shortcut; it is used ahead of
    /// queries and serialization.
    pub(crate) fn compress_at(&mut self, compression: f64, force: bool) -> SketchResult<()> {
        let len = self.centroids.len();
        if len < 2 {
            self.watermark = len;
            self.reversed = false;
            return Ok(());
        }

        let descending = !force && self.merge_count % 2 == 1;

        if descending != self.reversed {
            let prefix = self.watermark.min(len);
            self.centroids[..prefix].reverse();
            if let Some(log) = &mut self.samples {
                log[..prefix].reverse();
            }
        }

        self.sort_working(descending);
        self.reversed = descending;

        // An ascending, under-full sequence already is a valid digest.
        if !descending && !force && (len as f64) < compression {
            self.watermark = len;
            return Ok(());
        }

        let total = self.total_weight;
        let norm = self.scale.normalizer(compression, total);

        // Greedy k-limited merge. `to` is the write cursor, `from` the read
        // cursor; slot 0 is never a merge target. `w_so_far` is the weight
        // of slots 0..=to, `limit` the largest cumulative weight the current
        // cell may reach before k(q) has climbed a full unit past the cell's
        // left edge.
        let mut to = 1usize;
        let mut w_so_far = self.centroids[0].count() + self.centroids[1].count();
        let mut k_lo = self.scale.k_norm(self.centroids[0].count() / total, norm);
        let mut limit = total * self.scale.q_norm(k_lo + 1.0, norm);

        for from in 2..len {
            if from <= to {
                return Err(SketchError::Invariant {
                    what: "compression cursors crossed",
                });
            }
            let incoming = self.centroids[from];
            // The last element always opens a new cell so the top edge stays
            // a singleton.
            if w_so_far + incoming.count() > limit || from == len - 1 {
                to += 1;
                k_lo = self.scale.k_norm(w_so_far / total, norm);
                limit = total * self.scale.q_norm(k_lo + 1.0, norm);
                self.centroids[to] = incoming;
                if let Some(log) = &mut self.samples {
                    let moved = std::mem::take(&mut log[from]);
                    log[to] = moved;
                }
            } else {
                self.centroids[to].absorb(incoming);
                if let Some(log) = &mut self.samples {
                    let moved = std::mem::take(&mut log[from]);
                    log[to].extend(moved);
                }
            }
            w_so_far += incoming.count();
        }

        let new_len = to + 1;
        self.centroids.truncate(new_len);
        if let Some(log) = &mut self.samples {
            log.truncate(new_len);
        }

        if new_len > self.max_size {
            return Err(SketchError::Invariant {
                what: "compression failed to shrink the digest",
            });
        }
        if !self.centroids[0].is_singleton() || !self.centroids[new_len - 1].is_singleton() {
            return Err(SketchError::Invariant {
                what: "edge centroid is not a singleton",
            });
        }

        self.watermark = new_len;
        self.merge_count += 1;
        Ok(())
    }

    /// Stable sort of the working array by mean, in the requested direction.
    /// With the sample log enabled, a sort permutation is computed once and
    /// applied to both arrays.
    fn sort_working(&mut self, descending: bool) {
        if self.samples.is_none() {
            if descending {
                self.centroids.sort_by(|a, b| b.cmp(a));
            } else {
                self.centroids.sort();
            }
            return;
        }

        let mut perm: Vec<usize> = (0..self.centroids.len()).collect();
        {
            let cs = &self.centroids;
            if descending {
                perm.sort_by(|&a, &b| cs[b].cmp(&cs[a]));
            } else {
                perm.sort_by(|&a, &b| cs[a].cmp(&cs[b]));
            }
        }

        let sorted: Vec<_> = perm.iter().map(|&i| self.centroids[i]).collect();
        self.centroids = sorted;
        if let Some(log) = &mut self.samples {
            let mut sorted_log = Vec::with_capacity(perm.len());
            for &i in &perm {
                sorted_log.push(std::mem::take(&mut log[i]));
            }
            *log = sorted_log;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::digest::scale::ScaleFunction;
    use crate::digest::MergingDigest;

    fn weights(td: &MergingDigest) -> Vec<f64> {
        td.centroids().iter().map(|c| c.count()).collect()
    }

    #[test]
    fn small_inputs_stay_singletons() {
        let mut td = MergingDigest::new(100.0);
        td.fit_all(&[5.0, 1.0, 3.0, 4.0, 2.0]).unwrap();
        td.compress().unwrap();
        assert_eq!(td.len(), 5);
        assert!(weights(&td).iter().all(|&w| w == 1.0));
        let means: Vec<f64> = td.centroids().iter().map(|c| c.mean()).collect();
        assert_eq!(means, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn edges_survive_heavy_compression() {
        let mut td = MergingDigest::new(20.0);
        for i in 0..50_000 {
            td.fit(i as f64).unwrap();
        }
        td.compress().unwrap();
        let cs = td.centroids();
        assert!(cs.len() <= td.max_size());
        assert_eq!(cs[0].count(), 1.0);
        assert_eq!(cs[cs.len() - 1].count(), 1.0);
        assert_eq!(cs[0].mean(), 0.0);
        assert_eq!(cs[cs.len() - 1].mean(), 49_999.0);
    }

    #[test]
    fn compression_shrinks_below_working_budget() {
        let mut td = MergingDigest::new(100.0);
        for i in 0..1_000_000u32 {
            td.fit((i % 10_007) as f64).unwrap();
        }
        // buffer is bounded the whole way through
        assert!(td.len() <= td.max_size());
        td.check_weights().unwrap();
    }

    #[test]
    fn repeated_keys_survive_alternating_directions() {
        // many compression passes over heavily duplicated keys
        let mut td = MergingDigest::with_scale(30.0, ScaleFunction::K2);
        for round in 0..200 {
            for _ in 0..50 {
                td.fit((round % 7) as f64).unwrap();
            }
        }
        td.check_weights().unwrap();
        let med = td.quantile(0.5).unwrap();
        assert!((0.0..=6.0).contains(&med), "median {med} out of key range");
    }

    #[test]
    fn weight_is_conserved_through_many_passes() {
        let mut td = MergingDigest::new(40.0);
        for i in 0..123_457 {
            td.fit((i as f64).sin()).unwrap();
        }
        let sum: f64 = td.centroids().iter().map(|c| c.count()).sum();
        assert!(
            (sum - 123_457.0).abs() < 1e-6,
            "weight drifted: {sum} vs 123457"
        );
    }
}
