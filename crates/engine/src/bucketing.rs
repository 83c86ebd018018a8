//! Deterministic subject to variant assignment
//!
//! A subject's arm is a pure function of the experiment id, the subject id
//! and the traffic split. No lookup table is kept, so assignment is stable
//! across processes and safe to call concurrently.

use abtest_types::Variant;
use sha2::{Digest, Sha256};

/// Map `(experiment_id, subject_id)` to a point in `[0, 1)`
///
/// The experiment id is part of the hashed input, so assignments in
/// different experiments are independent.
pub fn bucket_position(experiment_id: &str, subject_id: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(experiment_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(subject_id.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bits = u64::from_be_bytes(prefix) >> 11;

    // 53 bits fill an f64 mantissa exactly, keeping the result below 1.0
    bits as f64 / (1u64 << 53) as f64
}

/// Assign a subject to an arm
///
/// Returns `Treatment` iff the subject's bucket position is below
/// `traffic_split`. A split of 0 always yields `Baseline`, a split of 1
/// always yields `Treatment`.
pub fn assign_variant(experiment_id: &str, subject_id: &str, traffic_split: f64) -> Variant {
    let split = traffic_split.clamp(0.0, 1.0);

    if bucket_position(experiment_id, subject_id) < split {
        Variant::Treatment
    } else {
        Variant::Baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EXPERIMENT: &str = "6f1c2a9e-3b4d-4e5f-8a7b-9c0d1e2f3a4b";

    #[test]
    fn test_position_in_unit_interval() {
        for i in 0..1000 {
            let position = bucket_position(EXPERIMENT, &format!("user-{}", i));
            assert!((0.0..1.0).contains(&position));
        }
    }

    #[test]
    fn test_split_edges() {
        for i in 0..200 {
            let subject = format!("user-{}", i);
            assert_eq!(assign_variant(EXPERIMENT, &subject, 0.0), Variant::Baseline);
            assert_eq!(assign_variant(EXPERIMENT, &subject, 1.0), Variant::Treatment);
        }
    }

    #[test]
    fn test_coverage_converges_to_split() {
        let treated = (0..10_000)
            .filter(|i| {
                assign_variant(EXPERIMENT, &format!("subject-{}", i), 0.5) == Variant::Treatment
            })
            .count();

        let fraction = treated as f64 / 10_000.0;
        assert!(fraction > 0.48 && fraction < 0.52, "fraction = {}", fraction);
    }

    #[test]
    fn test_uneven_split() {
        let treated = (0..10_000)
            .filter(|i| {
                assign_variant(EXPERIMENT, &format!("subject-{}", i), 0.2) == Variant::Treatment
            })
            .count();

        let fraction = treated as f64 / 10_000.0;
        assert!(fraction > 0.18 && fraction < 0.22, "fraction = {}", fraction);
    }

    #[test]
    fn test_experiments_assign_independently() {
        // Agreement between two experiments should sit near 50% at a 0.5 split
        let other = "0a1b2c3d-4e5f-4a6b-8c7d-8e9f0a1b2c3d";
        let agree = (0..10_000)
            .filter(|i| {
                let subject = format!("subject-{}", i);
                assign_variant(EXPERIMENT, &subject, 0.5) == assign_variant(other, &subject, 0.5)
            })
            .count();

        let fraction = agree as f64 / 10_000.0;
        assert!(fraction > 0.47 && fraction < 0.53, "agreement = {}", fraction);
    }

    #[test]
    fn test_separator_prevents_concatenation_collisions() {
        assert_ne!(bucket_position("ab", "c"), bucket_position("a", "bc"));
    }

    proptest! {
        #[test]
        fn prop_assignment_is_deterministic(
            experiment in "[a-z0-9-]{1,36}",
            subject in ".{0,64}",
            split in 0.0f64..=1.0,
        ) {
            let first = assign_variant(&experiment, &subject, split);
            let second = assign_variant(&experiment, &subject, split);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_assignment_is_monotone_in_split(
            subject in "[a-z0-9]{1,16}",
            low in 0.0f64..=1.0,
            high in 0.0f64..=1.0,
        ) {
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            if assign_variant(EXPERIMENT, &subject, low) == Variant::Treatment {
                prop_assert_eq!(assign_variant(EXPERIMENT, &subject, high), Variant::Treatment);
            }
        }
    }
}
