use rand::Rng;

/// In-place Fisher-Yates shuffle.
///
/// Walks `i` from the last index down to 1 and swaps with a uniform `j` in
/// `[0, i]`, so every permutation is equally likely for an unbiased `rng`.
pub fn shuffle_entries<T, R: Rng + ?Sized>(entries: &mut [T], rng: &mut R) {
    for i in (1..entries.len()).rev() {
        let j = rng.gen_range(0..=i);
        entries.swap(i, j);
    }
}
