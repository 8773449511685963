use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn stable_hash(id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

fn unit_from_bits(bits: u64) -> f32 {
    ((bits & 0xffff_ffff) as f64 / u32::MAX as f64) as f32
}

/// Two values in `[-1, 1]` derived from the id, stable across runs.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let hash = stable_hash(id);
    let x = unit_from_bits(hash);
    let y = unit_from_bits(hash >> 32);
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Like [`stable_pair`] with a third axis, for seeding 3D layouts.
pub fn stable_triple(id: &str) -> (f32, f32, f32) {
    let (x, y) = stable_pair(id);
    let z = unit_from_bits(stable_hash(id).rotate_left(17) ^ 0x9e37_79b9_7f4a_7c15);
    (x, y, (z * 2.0) - 1.0)
}

/// Phase in `[0, TAU)` used to desynchronise per-node ambient motion.
pub fn stable_phase(id: &str) -> f32 {
    let hash = stable_hash(id).rotate_right(11);
    unit_from_bits(hash) * std::f32::consts::TAU
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }

    let mut shortened = label
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_values_are_repeatable_and_bounded() {
        let first = stable_triple("PN-4411-A");
        let second = stable_triple("PN-4411-A");
        assert_eq!(first, second);
        for value in [first.0, first.1, first.2] {
            assert!((-1.0..=1.0).contains(&value));
        }
        let phase = stable_phase("PN-4411-A");
        assert!((0.0..std::f32::consts::TAU + 0.001).contains(&phase));
    }

    #[test]
    fn truncate_label_keeps_short_labels() {
        assert_eq!(truncate_label("LM741", 12), "LM741");
        assert_eq!(truncate_label("Operational amplifier", 6), "Opera…");
    }
}
