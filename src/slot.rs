//! Pure-function slot-range policy: range parsing, slot classification,
//! and tunnel-name derivation.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// An inclusive integer range parsed from a `"a-b"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u32,
    pub end: u32,
}

impl SlotRange {
    fn contains(&self, slot: u32) -> bool {
        slot >= self.start && slot <= self.end
    }
}

/// Parse `"a-b"` into an inclusive range. Malformed input (missing
/// dash, non-numeric bounds, extra components) falls back to `(1, 5)`.
pub fn parse_range(range_str: &str) -> SlotRange {
    let parsed = range_str.split_once('-').and_then(|(start, end)| {
        let start: u32 = start.trim().parse().ok()?;
        let end: u32 = end.trim().parse().ok()?;
        Some((start, end))
    });

    match parsed {
        Some((start, end)) => SlotRange { start, end },
        None => SlotRange { start: 1, end: 5 },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClass {
    Named,
    Random,
    Invalid,
}

/// Configured slot policy derived from the two range strings.
#[derive(Debug, Clone)]
pub struct SlotPolicy {
    pub named: SlotRange,
    pub random: SlotRange,
    pub max_slot: u32,
}

impl SlotPolicy {
    pub fn new(named_range: &str, random_range: &str) -> Self {
        let named = parse_range(named_range);
        let random = parse_range(random_range);
        let max_slot = named.end.max(random.end);
        Self {
            named,
            random,
            max_slot,
        }
    }

    /// Classify a slot. Named range wins on overlap; a slot outside
    /// both ranges but `<= max_slot` is treated as named.
    pub fn classify(&self, slot: u32) -> SlotClass {
        if slot < 1 || slot > self.max_slot {
            return SlotClass::Invalid;
        }
        if self.named.contains(slot) {
            SlotClass::Named
        } else if self.random.contains(slot) {
            SlotClass::Random
        } else {
            SlotClass::Named
        }
    }

    /// Derive the tunnel name for `username` requesting `slot`.
    /// Returns `None` when `classify(slot) == Invalid`.
    pub fn name(&self, username: &str, slot: u32) -> Option<String> {
        match self.classify(slot) {
            SlotClass::Invalid => None,
            SlotClass::Named => Some(named_form(username, slot)),
            SlotClass::Random => Some(format!("{}-{}", username, random_suffix())),
        }
    }
}

fn named_form(username: &str, slot: u32) -> String {
    if slot == 1 {
        username.to_string()
    } else {
        format!("{}-{}", username, slot)
    }
}

/// A fresh six-character lowercase-alphanumeric suffix, drawn uniformly.
pub fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_lowercase())
        .take(6)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_range_valid() {
        assert_eq!(parse_range("1-3"), SlotRange { start: 1, end: 3 });
        assert_eq!(parse_range("4-5"), SlotRange { start: 4, end: 5 });
    }

    #[test]
    fn parse_range_malformed_falls_back_to_1_5() {
        assert_eq!(parse_range(""), SlotRange { start: 1, end: 5 });
        assert_eq!(parse_range("nope"), SlotRange { start: 1, end: 5 });
        assert_eq!(parse_range("3"), SlotRange { start: 1, end: 5 });
    }

    #[test]
    fn max_slot_is_max_of_both_ends() {
        let policy = SlotPolicy::new("1-3", "4-10");
        assert_eq!(policy.max_slot, 10);
    }

    #[test]
    fn classify_named_and_random() {
        let policy = SlotPolicy::new("1-3", "4-5");
        assert_eq!(policy.classify(1), SlotClass::Named);
        assert_eq!(policy.classify(3), SlotClass::Named);
        assert_eq!(policy.classify(4), SlotClass::Random);
        assert_eq!(policy.classify(5), SlotClass::Random);
        assert_eq!(policy.classify(0), SlotClass::Invalid);
        assert_eq!(policy.classify(6), SlotClass::Invalid);
    }

    #[test]
    fn named_wins_on_overlap() {
        let policy = SlotPolicy::new("1-5", "3-7");
        assert_eq!(policy.classify(4), SlotClass::Named);
    }

    #[test]
    fn slot_outside_both_ranges_but_within_max_is_named() {
        // named 1-2, random 5-6 -> max_slot = 6, slots 3-4 fall in neither.
        let policy = SlotPolicy::new("1-2", "5-6");
        assert_eq!(policy.classify(3), SlotClass::Named);
        assert_eq!(policy.name("alice", 3).as_deref(), Some("alice-3"));
    }

    #[test]
    fn named_name_slot_one_is_bare_username() {
        let policy = SlotPolicy::new("1-3", "4-5");
        assert_eq!(policy.name("alice", 1).as_deref(), Some("alice"));
        assert_eq!(policy.name("bob", 3).as_deref(), Some("bob-3"));
    }

    #[test]
    fn random_name_matches_expected_shape() {
        let policy = SlotPolicy::new("1-3", "4-5");
        let name = policy.name("carol", 4).unwrap();
        let suffix = name.strip_prefix("carol-").expect("carol- prefix");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn invalid_slot_yields_no_name() {
        let policy = SlotPolicy::new("1-3", "4-5");
        assert_eq!(policy.name("dave", 9), None);
    }

    #[test]
    fn random_suffix_is_six_lowercase_alphanumeric_chars() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
