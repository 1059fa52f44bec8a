//! Published hourly prices for the `ru-central1` region (RUB, VAT included).

use std::collections::BTreeMap;

use crate::catalog::CoreFraction;
use crate::disk::DiskType;
use crate::types::PlatformId;

use super::{DiskPriceTable, PlatformPrices, PriceTable};

fn tiers(entries: &[(CoreFraction, f64)]) -> BTreeMap<CoreFraction, f64> {
    entries.iter().copied().collect()
}

/// Instance prices per vCPU-hour and per GiB-hour of memory.
#[must_use]
pub fn ru_central1() -> PriceTable {
    let ice_lake = PlatformPrices {
        on_demand: tiers(&[
            (CoreFraction::BURST_20, 0.4752),
            (CoreFraction::BURST_50, 0.6912),
            (CoreFraction::FULL, 1.1340),
        ]),
        discounted: tiers(&[
            (CoreFraction::BURST_20, 0.1512),
            (CoreFraction::BURST_50, 0.2160),
            (CoreFraction::FULL, 0.3132),
        ]),
        memory_gib: 0.3024,
        discounted_memory_gib: 0.0756,
    };

    let platforms = [
        ("amd-v1", ice_lake.clone()),
        (
            "highfreq-v4a",
            PlatformPrices {
                on_demand: tiers(&[
                    (CoreFraction::BURST_20, 0.4580),
                    (CoreFraction::BURST_50, 1.1450),
                    (CoreFraction::FULL, 2.2900),
                ]),
                discounted: tiers(&[
                    (CoreFraction::BURST_20, 0.1374),
                    (CoreFraction::BURST_50, 0.3435),
                    (CoreFraction::FULL, 1.6030),
                ]),
                memory_gib: 0.4200,
                discounted_memory_gib: 0.1260,
            },
        ),
        (
            "standard-v1",
            PlatformPrices {
                on_demand: tiers(&[
                    (CoreFraction::BURST_5, 0.3193),
                    (CoreFraction::BURST_20, 0.9064),
                    (CoreFraction::FULL, 1.1536),
                ]),
                discounted: tiers(&[
                    (CoreFraction::BURST_5, 0.1957),
                    (CoreFraction::BURST_20, 0.2781),
                    (CoreFraction::FULL, 0.3502),
                ]),
                memory_gib: 0.4017,
                discounted_memory_gib: 0.1236,
            },
        ),
        (
            "standard-v2",
            PlatformPrices {
                on_demand: tiers(&[
                    (CoreFraction::BURST_5, 0.1728),
                    (CoreFraction::BURST_20, 0.5292),
                    (CoreFraction::BURST_50, 0.7776),
                    (CoreFraction::FULL, 1.2852),
                ]),
                discounted: tiers(&[
                    (CoreFraction::BURST_5, 0.1080),
                    (CoreFraction::BURST_20, 0.1728),
                    (CoreFraction::BURST_50, 0.2376),
                    (CoreFraction::FULL, 0.3456),
                ]),
                memory_gib: 0.3348,
                discounted_memory_gib: 0.0756,
            },
        ),
        ("standard-v3", ice_lake),
        (
            "highfreq-v3",
            PlatformPrices {
                on_demand: tiers(&[(CoreFraction::FULL, 1.9008)]),
                discounted: BTreeMap::new(),
                memory_gib: 0.3456,
                discounted_memory_gib: 0.0,
            },
        ),
    ];

    PriceTable::new(
        platforms
            .into_iter()
            .map(|(platform, prices)| (PlatformId::from(platform), prices))
            .collect(),
    )
}

/// Disk prices per GiB-hour.
#[must_use]
pub fn ru_central1_disks() -> DiskPriceTable {
    DiskPriceTable::new(
        [
            (DiskType::NetworkSsd, 0.0179),
            (DiskType::NetworkHdd, 0.0044),
            (DiskType::NetworkSsdNonreplicated, 0.0132),
            (DiskType::NetworkSsdIoM3, 0.0297),
        ]
        .into_iter()
        .collect(),
    )
}
