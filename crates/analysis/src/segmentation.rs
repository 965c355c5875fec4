use std::collections::BTreeMap;

use model::Reading;

/// Concentric samples of one rep, in buffer arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RepWindow<'a> {
    pub rep_number: u32,
    pub samples: Vec<&'a Reading>,
}

/// Partitions a set buffer into per-rep concentric windows.
///
/// Readings at or below `start_rep_offset` are pre-set noise. Windows are keyed
/// by the device rep counter, so out-of-order arrival across rep boundaries
/// still lands in the right window. Reps without a single upward sample do not
/// produce a window.
pub fn segment_reps(buffer: &[Reading], start_rep_offset: u32) -> Vec<RepWindow<'_>> {
    let mut groups: BTreeMap<u32, Vec<&Reading>> = BTreeMap::new();
    for r in buffer {
        let rep = match r.rep_id.checked_sub(start_rep_offset) {
            Some(n) if n > 0 => n,
            _ => continue,
        };
        if !r.is_concentric() {
            continue;
        }
        groups.entry(rep).or_default().push(r);
    }

    groups
        .into_iter()
        .map(|(rep_number, samples)| RepWindow { rep_number, samples })
        .collect()
}
