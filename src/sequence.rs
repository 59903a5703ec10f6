use ndarray::Array2;

use crate::tokenizer::PAD_INDEX;

/// Which end of a sequence padding or truncation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy)]
pub struct PadOptions {
    pub padding: Side,
    pub truncating: Side,
    pub value: usize,
}

impl Default for PadOptions {
    fn default() -> Self {
        Self { padding: Side::Post, truncating: Side::Pre, value: PAD_INDEX }
    }
}

pub fn max_len(sequences: &[Vec<usize>]) -> usize {
    sequences.iter().map(Vec::len).max().unwrap_or(0)
}

/// Packs variable-length sequences into a `(n, maxlen)` matrix.
///
/// Sequences longer than `maxlen` lose elements from the `truncating` side,
/// shorter ones are filled with `options.value` on the `padding` side.
pub fn pad_sequences(sequences: &[Vec<usize>], maxlen: usize, options: PadOptions) -> Array2<usize> {
    let mut padded = Array2::from_elem((sequences.len(), maxlen), options.value);

    for (row, sequence) in sequences.iter().enumerate() {
        let kept: &[usize] = if sequence.len() > maxlen {
            match options.truncating {
                Side::Pre => &sequence[sequence.len() - maxlen..],
                Side::Post => &sequence[..maxlen],
            }
        } else {
            sequence
        };

        let offset = match options.padding {
            Side::Post => 0,
            Side::Pre => maxlen - kept.len(),
        };
        for (col, &token) in kept.iter().enumerate() {
            padded[[row, offset + col]] = token;
        }
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_post_padding() {
        let padded = pad_sequences(&[vec![1, 2], vec![3, 4, 5]], 4, PadOptions::default());
        assert_eq!(padded, array![[1, 2, 0, 0], [3, 4, 5, 0]]);
    }

    #[test]
    fn test_pre_padding_and_post_truncation() {
        let options = PadOptions { padding: Side::Pre, truncating: Side::Post, value: 0 };
        let padded = pad_sequences(&[vec![7], vec![1, 2, 3, 4]], 3, options);
        assert_eq!(padded, array![[0, 0, 7], [1, 2, 3]]);
    }

    #[test]
    fn test_default_truncation_drops_leading_tokens() {
        let padded = pad_sequences(&[vec![1, 2, 3, 4, 5]], 3, PadOptions::default());
        assert_eq!(padded, array![[3, 4, 5]]);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(max_len(&[]), 0);
        let padded = pad_sequences(&[vec![]], 2, PadOptions::default());
        assert_eq!(padded, array![[0, 0]]);
        assert_eq!(pad_sequences(&[], 3, PadOptions::default()).dim(), (0, 3));
    }

    proptest! {
        #[test]
        fn prop_padding_keeps_non_pad_tokens(
            sequences in proptest::collection::vec(proptest::collection::vec(1usize..50, 0..12), 1..8),
            pre in any::<bool>(),
        ) {
            let maxlen = max_len(&sequences);
            let options = PadOptions {
                padding: if pre { Side::Pre } else { Side::Post },
                ..PadOptions::default()
            };
            let padded = pad_sequences(&sequences, maxlen, options);

            for (row, sequence) in sequences.iter().enumerate() {
                let kept: Vec<usize> = padded.row(row).iter().copied().filter(|&t| t != PAD_INDEX).collect();
                prop_assert_eq!(&kept, sequence);
            }
        }
    }
}
