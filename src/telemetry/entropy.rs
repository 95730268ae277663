//! Byte-histogram Shannon entropy.

/// Shannon entropy of `bytes` in bits per byte, in `[0.0, 8.0]`.
/// Empty input has zero entropy.
pub fn shannon_entropy(bytes: &[u8]) -> f64 {
    let n = bytes.len();
    if n == 0 {
        return 0.0;
    }

    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }

    // H = log2(n) - (1/n) * sum(c * log2(c))
    let sum_c_log2_c: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let c = c as f64;
            c * c.log2()
        })
        .sum();

    ((n as f64).log2() - sum_c_log2_c / n as f64).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn uniform_input_has_zero_entropy() {
        assert_eq!(shannon_entropy(b""), 0.0);
        assert_eq!(shannon_entropy(&[0x41; 500]), 0.0);
    }

    #[test]
    fn two_symbols_give_one_bit() {
        let data: Vec<u8> = (0..1000).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        assert!((shannon_entropy(&data) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn every_byte_value_once_gives_eight_bits() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert!((shannon_entropy(&data) - 8.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn entropy_is_bounded(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let h = shannon_entropy(&data);
            prop_assert!((0.0..=8.0 + 1e-9).contains(&h));
        }
    }
}
