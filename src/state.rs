// state.rs
use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::CounterError;

/// Data layout of a counter account owned by the counter program.
///
/// A single little-endian `u32`, no header, no padding.
#[derive(BorshSerialize, BorshDeserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterAccount {
    pub count: u32,
}

impl CounterAccount {
    pub const SIZE: usize = 4;

    /// Space to allocate for a new counter account.
    pub const fn size_of() -> usize {
        Self::SIZE
    }

    pub fn encode(count: u32) -> [u8; Self::SIZE] {
        count.to_le_bytes()
    }

    /// Decodes raw account data. The data must be exactly `SIZE` bytes long.
    pub fn decode(data: &[u8]) -> Result<u32, CounterError> {
        if data.len() != Self::SIZE {
            return Err(CounterError::MalformedAccount {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let account =
            CounterAccount::try_from_slice(data).map_err(|_| CounterError::MalformedAccount {
                expected: Self::SIZE,
                actual: data.len(),
            })?;
        Ok(account.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_little_endian() {
        assert_eq!(CounterAccount::encode(0), [0, 0, 0, 0]);
        assert_eq!(CounterAccount::encode(1), [1, 0, 0, 0]);
        assert_eq!(CounterAccount::encode(0x0403_0201), [1, 2, 3, 4]);
        assert_eq!(CounterAccount::encode(u32::MAX), [0xff; 4]);
    }

    #[test]
    fn decode_reverses_encode() {
        for count in [0, 1, 255, 256, 65_535, 1_000_000, u32::MAX - 1, u32::MAX] {
            assert_eq!(CounterAccount::decode(&CounterAccount::encode(count)).unwrap(), count);
        }
    }

    #[test]
    fn encode_matches_borsh_layout() {
        for count in [0, 7, 0x0102_0304, u32::MAX] {
            assert_eq!(
                borsh::to_vec(&CounterAccount { count }).unwrap(),
                CounterAccount::encode(count).to_vec()
            );
        }
    }

    #[test]
    fn size_does_not_depend_on_value() {
        assert_eq!(CounterAccount::size_of(), 4);
        assert_eq!(borsh::to_vec(&CounterAccount::default()).unwrap().len(), 4);
        assert_eq!(
            borsh::to_vec(&CounterAccount { count: u32::MAX }).unwrap().len(),
            CounterAccount::size_of()
        );
    }

    #[test]
    fn decode_rejects_wrong_lengths() {
        for len in [0usize, 1, 3, 5, 8, 165] {
            let data = vec![0u8; len];
            match CounterAccount::decode(&data) {
                Err(CounterError::MalformedAccount { expected, actual }) => {
                    assert_eq!(expected, 4);
                    assert_eq!(actual, len);
                }
                other => panic!("expected malformed account for {len} bytes, got {other:?}"),
            }
        }
    }
}
