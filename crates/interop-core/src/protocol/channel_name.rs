//! Random channel names.
//!
//! A channel name is also the only secret protecting a channel: any local
//! process that learns it can connect and call the published service. Names
//! are therefore drawn from the operating system's CSPRNG, never from a
//! seeded general-purpose generator.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Shortest name [`generate_channel_name`] produces.
pub const MIN_NAME_LEN: usize = 20;
/// Longest name [`generate_channel_name`] produces.
pub const MAX_NAME_LEN: usize = 29;

/// Generates a fresh channel name of 20 to 29 characters from `[0-9A-Za-z]`.
///
/// Both the length and every character come from [`OsRng`].
///
/// # Panics
///
/// Panics only if the operating system's entropy source is unavailable, which
/// is treated as a fatal startup condition.
pub fn generate_channel_name() -> String {
    let mut rng = OsRng;
    let len = rng.gen_range(MIN_NAME_LEN..=MAX_NAME_LEN);
    (&mut rng).sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

/// Returns `true` if `name` could have come from [`generate_channel_name`].
///
/// Channel names also become path components, so anything outside the
/// alphabet is rejected before it reaches the transport.
pub fn is_valid_channel_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 128 && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ten_thousand_names_are_unique_and_well_formed() {
        // Arrange
        let mut seen = HashSet::with_capacity(10_000);

        // Act / Assert
        for _ in 0..10_000 {
            let name = generate_channel_name();
            assert!(
                (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.len()),
                "bad length {} for {name}",
                name.len()
            );
            assert!(name.bytes().all(|b| b.is_ascii_alphanumeric()), "bad char in {name}");
            assert!(seen.insert(name), "duplicate channel name");
        }
    }

    #[test]
    fn test_lengths_cover_more_than_one_value() {
        let lengths: HashSet<usize> = (0..500).map(|_| generate_channel_name().len()).collect();
        assert!(lengths.len() > 1);
    }

    #[test]
    fn test_validation_accepts_generated_names_and_rejects_path_characters() {
        assert!(is_valid_channel_name(&generate_channel_name()));
        assert!(is_valid_channel_name("HostChannel"));
        assert!(!is_valid_channel_name(""));
        assert!(!is_valid_channel_name("../etc"));
        assert!(!is_valid_channel_name("a b"));
    }
}
