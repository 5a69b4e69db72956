//! Parcel identification numbers: `A-B-C-D-NNN`, where the last segment is a
//! zero-padded sequence within the `A-B-C-D` block.

pub const PIN_SEGMENTS: usize = 5;

/// The block part of a well-formed PIN (its first four segments).
pub fn pin_prefix(pin: &str) -> Option<&str> {
    if pin.split('-').count() != PIN_SEGMENTS {
        return None;
    }
    pin.rsplit_once('-').map(|(prefix, _)| prefix)
}

pub fn format_pin(prefix: &str, sequence: u32) -> String {
    format!("{}-{:03}", prefix, sequence)
}

/// Highest sequence already used under `prefix`, or 0.
/// Identifiers whose trailing segment is not a number are ignored.
pub fn highest_sequence<'a, I>(prefix: &str, existing: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let block = format!("{}-", prefix);

    existing
        .into_iter()
        .filter(|pin| pin.starts_with(&block))
        .filter_map(|pin| pin.rsplit('-').next())
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Next free PIN in the block of `base`, or `None` if `base` is not a
/// five-segment PIN.
pub fn suggest_next<'a, I>(base: &str, existing: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    suggest_sequence(base, existing, 1).and_then(|mut pins| pins.pop())
}

/// `count` consecutive free PINs in the block of `base`. `None` when the
/// block has no room left for all of them.
pub fn suggest_sequence<'a, I>(base: &str, existing: I, count: usize) -> Option<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = pin_prefix(base)?;
    let next = highest_sequence(prefix, existing).checked_add(1)?;
    let count = u32::try_from(count).ok()?;
    if count > 0 {
        next.checked_add(count - 1)?;
    }

    Some(
        (0..count)
            .map(|offset| format_pin(prefix, next + offset))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_requires_five_segments() {
        assert_eq!(pin_prefix("045-01-002-03-017"), Some("045-01-002-03"));
        assert_eq!(pin_prefix("045-01-002-017"), None);
        assert_eq!(pin_prefix("045-01-002-03-017-A"), None);
        assert_eq!(pin_prefix(""), None);
    }

    #[test]
    fn skips_past_gaps_to_the_highest() {
        let existing = ["12-3-4-5-001", "12-3-4-5-003"];
        assert_eq!(
            suggest_next("12-3-4-5-001", existing).as_deref(),
            Some("12-3-4-5-004")
        );
    }

    #[test]
    fn starts_block_at_one() {
        let existing = ["99-9-9-9-007"];
        assert_eq!(
            suggest_next("12-3-4-5-000", existing).as_deref(),
            Some("12-3-4-5-001")
        );
    }

    #[test]
    fn only_exact_block_counts() {
        // "12-3-4-50-..." shares the text prefix "12-3-4-5" but not the block
        let existing = ["12-3-4-50-900", "12-3-4-5-002", "12-3-4-5-XYZ"];
        assert_eq!(highest_sequence("12-3-4-5", existing), 2);
    }

    #[test]
    fn sequence_is_consecutive() {
        let existing = ["1-2-3-4-010"];
        assert_eq!(
            suggest_sequence("1-2-3-4-010", existing, 3).unwrap(),
            vec!["1-2-3-4-011", "1-2-3-4-012", "1-2-3-4-013"]
        );
    }

    #[test]
    fn malformed_base_gives_nothing() {
        assert!(suggest_next("LOT-7", ["LOT-7"]).is_none());
    }

    #[test]
    fn full_block_gives_nothing() {
        let existing = ["1-2-3-4-4294967295"];
        assert!(suggest_next("1-2-3-4-001", existing).is_none());

        let existing = ["1-2-3-4-4294967293"];
        assert_eq!(
            suggest_sequence("1-2-3-4-001", existing, 2).unwrap(),
            vec!["1-2-3-4-4294967294", "1-2-3-4-4294967295"]
        );
        assert!(suggest_sequence("1-2-3-4-001", existing, 3).is_none());
    }
}
