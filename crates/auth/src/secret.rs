//! Opaque secret generation.
//!
//! Bearer values are random alphanumeric strings drawn from the thread-local
//! CSPRNG. Uniqueness is probabilistic: nothing checks a fresh value against
//! previously issued ones. At 24 characters that is ~142 bits of entropy.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Default length of an access token value.
pub const ACCESS_TOKEN_LENGTH: usize = 24;

/// Default length of a refresh token value.
pub const REFRESH_TOKEN_LENGTH: usize = 32;

/// Produce an opaque alphanumeric string of `length` characters.
pub fn make_bearer(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_lengths_are_honoured() {
        assert_eq!(make_bearer(ACCESS_TOKEN_LENGTH).len(), 24);
        assert_eq!(make_bearer(REFRESH_TOKEN_LENGTH).len(), 32);
    }

    #[test]
    fn zero_length_is_empty() {
        assert!(make_bearer(0).is_empty());
    }

    #[test]
    fn consecutive_values_differ() {
        assert_ne!(make_bearer(ACCESS_TOKEN_LENGTH), make_bearer(ACCESS_TOKEN_LENGTH));
    }

    #[test]
    fn concurrent_generation_does_not_block() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| make_bearer(32)).collect::<Vec<_>>()))
            .collect();

        let mut all = std::collections::HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(all.insert(value));
            }
        }
        assert_eq!(all.len(), 800);
    }

    proptest! {
        #[test]
        fn output_is_alphanumeric_of_requested_length(len in 0usize..256) {
            let value = make_bearer(len);
            prop_assert_eq!(value.len(), len);
            prop_assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}
