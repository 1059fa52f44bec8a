//! Published platform configurations for the `ru-central1` region.

use crate::types::PlatformId;

use super::{CoreFraction, PlatformProfile, TierRule};

const QUARTER_GIB_MIB: u32 = 256;
const HALF_GIB_MIB: u32 = 512;
const GIB_MIB: u32 = 1024;

/// `0.5, 1.0, ... , max_gib` GiB per core.
fn half_gib_steps(max_gib: u32) -> Vec<u32> {
    (1..=max_gib.saturating_mul(2))
        .map(|halves| halves.saturating_mul(HALF_GIB_MIB))
        .collect()
}

/// `1, 2, ... , max_gib` GiB per core.
fn whole_gib_steps(max_gib: u32) -> Vec<u32> {
    (1..=max_gib).map(|gib| gib.saturating_mul(GIB_MIB)).collect()
}

/// `2, 4, ... , 16` then `20, 24, ... , max`.
fn dedicated_vcpus(max: u32) -> Vec<u32> {
    (2..=16)
        .step_by(2)
        .chain((20..=max).step_by(4))
        .collect()
}

fn tier(fraction: CoreFraction, vcpus: Vec<u32>, memory_per_core_mib: Vec<u32>) -> TierRule {
    TierRule {
        fraction,
        vcpus,
        memory_per_core_mib,
    }
}

fn profile(platform: &str, can_be_discounted: bool, tiers: Vec<TierRule>) -> PlatformProfile {
    PlatformProfile {
        platform: PlatformId::from(platform),
        tiers,
        can_be_discounted,
    }
}

/// Returns the built-in profile table.
#[must_use]
pub fn ru_central1() -> Vec<PlatformProfile> {
    vec![
        profile(
            "gpu-standard-v3i",
            true,
            vec![tier(
                CoreFraction::FULL,
                vec![18, 36, 72, 180],
                vec![8 * GIB_MIB],
            )],
        ),
        profile(
            "gpu-standard-v3",
            true,
            vec![tier(
                CoreFraction::FULL,
                vec![28, 56, 112, 224],
                vec![4 * GIB_MIB + QUARTER_GIB_MIB],
            )],
        ),
        profile(
            "standard-v1",
            true,
            vec![
                tier(CoreFraction::BURST_5, vec![2, 4], half_gib_steps(2)),
                tier(CoreFraction::BURST_20, vec![2, 4], half_gib_steps(4)),
                tier(
                    CoreFraction::FULL,
                    vec![2, 4, 6, 8, 10, 12, 14, 16, 20, 24, 28, 32],
                    whole_gib_steps(8),
                ),
            ],
        ),
        profile(
            "gpu-standard-v1",
            true,
            vec![tier(
                CoreFraction::FULL,
                vec![8, 16, 32],
                vec![12 * GIB_MIB],
            )],
        ),
        profile(
            "standard-v2",
            true,
            vec![
                tier(
                    CoreFraction::BURST_5,
                    vec![2, 4],
                    [QUARTER_GIB_MIB]
                        .into_iter()
                        .chain(half_gib_steps(2))
                        .collect(),
                ),
                tier(CoreFraction::BURST_20, vec![2, 4], half_gib_steps(4)),
                tier(CoreFraction::BURST_50, vec![2, 4], half_gib_steps(4)),
                tier(CoreFraction::FULL, dedicated_vcpus(80), whole_gib_steps(16)),
            ],
        ),
        profile(
            "gpu-standard-v2",
            true,
            vec![tier(
                CoreFraction::FULL,
                vec![8, 16, 32, 64],
                vec![6 * GIB_MIB],
            )],
        ),
        profile(
            "standard-v3",
            true,
            vec![
                tier(CoreFraction::BURST_20, vec![2, 4], half_gib_steps(4)),
                tier(CoreFraction::BURST_50, vec![2, 4], half_gib_steps(4)),
                tier(CoreFraction::FULL, dedicated_vcpus(96), whole_gib_steps(16)),
            ],
        ),
        profile(
            "highfreq-v3",
            false,
            vec![tier(
                CoreFraction::FULL,
                dedicated_vcpus(56),
                whole_gib_steps(16),
            )],
        ),
        profile(
            "standard-v3-t4",
            true,
            vec![tier(
                CoreFraction::FULL,
                vec![4, 8, 16, 32],
                vec![4 * GIB_MIB],
            )],
        ),
        profile(
            "standard-v3-t4i",
            true,
            vec![tier(
                CoreFraction::FULL,
                vec![4, 8, 16, 32],
                vec![4 * GIB_MIB],
            )],
        ),
    ]
}
