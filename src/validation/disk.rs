//! Boot-disk size rules.

use crate::disk::DiskType;
use crate::node_class::NodeClassSpec;

use super::{ValidationResult, reasons};

const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;
const TIB: u64 = 1 << 40;

/// Size constraints of one disk type, in bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DiskRule {
    /// Smallest allowed size.
    pub min_bytes: u64,
    /// Sizes must be a multiple of this.
    pub step_bytes: u64,
    /// Largest allowed size.
    pub max_bytes: u64,
}

impl DiskRule {
    /// Rule for a disk type.
    #[must_use]
    pub const fn for_type(disk_type: DiskType) -> Self {
        match disk_type {
            // 4 KiB blocks cap replicated disks at 8 TiB.
            DiskType::NetworkSsd | DiskType::NetworkHdd => Self {
                min_bytes: 4 * MIB,
                step_bytes: 4 * MIB,
                max_bytes: 8 * TIB,
            },
            DiskType::NetworkSsdNonreplicated | DiskType::NetworkSsdIoM3 => Self {
                min_bytes: 93 * GIB,
                step_bytes: 93 * GIB,
                max_bytes: 256 * TIB,
            },
        }
    }
}

/// Renders a byte count in the largest binary unit that divides it.
#[must_use]
pub fn human_bytes(bytes: u64) -> String {
    for (unit, suffix) in [(TIB, "Ti"), (GIB, "Gi"), (MIB, "Mi")] {
        if let (Some(0), Some(count @ 1..)) = (bytes.checked_rem(unit), bytes.checked_div(unit)) {
            return format!("{count}{suffix}");
        }
    }
    bytes.to_string()
}

/// Checks disk type and size. Returns a failure, or success when valid.
#[must_use]
pub fn check(spec: &NodeClassSpec) -> ValidationResult {
    let size = spec.disk_size_bytes;
    if size == 0 {
        return ValidationResult::failure(reasons::INVALID_DISK_SIZE, "spec.diskSize must be > 0");
    }
    let Ok(disk_type) = DiskType::from_configured(&spec.disk_type) else {
        return ValidationResult::failure(
            reasons::INVALID_DISK_TYPE,
            format!("unsupported spec.diskType={:?}", spec.disk_type),
        );
    };
    let rule = DiskRule::for_type(disk_type);
    if size < rule.min_bytes {
        return ValidationResult::failure(
            reasons::INVALID_DISK_SIZE,
            format!(
                "spec.diskSize must be >= {} for diskType={disk_type}",
                human_bytes(rule.min_bytes)
            ),
        );
    }
    if size.checked_rem(rule.step_bytes) != Some(0) {
        return ValidationResult::failure(
            reasons::INVALID_DISK_SIZE,
            format!(
                "spec.diskSize must be a multiple of {} for diskType={disk_type}",
                human_bytes(rule.step_bytes)
            ),
        );
    }
    if size > rule.max_bytes {
        return ValidationResult::failure(
            reasons::INVALID_DISK_SIZE,
            format!(
                "spec.diskSize must be <= {} for diskType={disk_type}",
                human_bytes(rule.max_bytes)
            ),
        );
    }
    ValidationResult::success()
}
