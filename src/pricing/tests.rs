use super::*;
use crate::catalog::InstanceCatalog;
use rstest::{fixture, rstest};

const TOLERANCE: f64 = 1e-9;

#[fixture]
fn engine() -> PricingEngine {
    PricingEngine::builtin()
}

fn descriptor(name: &str) -> InstanceTypeDescriptor {
    name.parse()
        .unwrap_or_else(|err| panic!("fixture {name} should parse: {err}"))
}

#[rstest]
fn on_demand_price_combines_cpu_and_memory(engine: PricingEngine) {
    let price = engine
        .on_demand_price(&descriptor("standard-v3_2_4Gi_100"))
        .unwrap_or_else(|| panic!("standard-v3 full tier is priced"));
    assert!((price - (1.1340 * 2.0 + 0.3024 * 4.0)).abs() < TOLERANCE);
}

#[rstest]
fn discounted_price_uses_discounted_rates(engine: PricingEngine) {
    let price = engine
        .discounted_price(&descriptor("standard-v3_2_4Gi_100"))
        .unwrap_or_else(|| panic!("standard-v3 full tier has a discounted price"));
    assert!((price - (0.3132 * 2.0 + 0.0756 * 4.0)).abs() < TOLERANCE);
}

#[rstest]
fn sub_gib_memory_is_priced_fractionally(engine: PricingEngine) {
    let price = engine
        .on_demand_price(&descriptor("standard-v2_2_512Mi_5"))
        .unwrap_or_else(|| panic!("standard-v2 burst tier is priced"));
    assert!((price - (0.1728 * 2.0 + 0.3348 * 0.5)).abs() < TOLERANCE);
}

#[rstest]
#[case("gpu-standard-v2_8_48Gi_100")]
#[case("standard-v3_2_4Gi_5")]
#[case("standard-v1_2_4Gi_50")]
fn unpriced_shapes_are_absent_not_zero(engine: PricingEngine, #[case] name: &str) {
    let shape = descriptor(name);
    assert_eq!(engine.on_demand_price(&shape), None);
    assert_eq!(engine.discounted_price(&shape), None);
}

#[rstest]
fn highfreq_has_no_discounted_price(engine: PricingEngine) {
    let shape = descriptor("highfreq-v3_2_4Gi_100");
    assert!(engine.on_demand_price(&shape).is_some());
    assert_eq!(engine.discounted_price(&shape), None);
}

#[rstest]
fn catalog_prices_are_positive_and_discounts_are_cheaper(engine: PricingEngine) {
    for shape in InstanceCatalog::builtin().descriptors() {
        let on_demand = engine.on_demand_price(&shape);
        if let Some(price) = on_demand {
            assert!(price > 0.0, "{shape} priced at {price}");
        }
        if let (Some(full), Some(discounted)) = (on_demand, engine.discounted_price(&shape)) {
            assert!(discounted < full, "{shape}: {discounted} >= {full}");
        }
    }
}

#[rstest]
fn doubling_a_shape_roughly_doubles_its_price(engine: PricingEngine) {
    let small = engine
        .on_demand_price(&descriptor("standard-v3_4_8Gi_100"))
        .unwrap_or_else(|| panic!("priced"));
    let large = engine
        .on_demand_price(&descriptor("standard-v3_8_16Gi_100"))
        .unwrap_or_else(|| panic!("priced"));
    let ratio = large / small;
    assert!((1.9..=2.1).contains(&ratio), "ratio {ratio}");
}

#[rstest]
#[case(DiskType::NetworkSsd, 0.0179)]
#[case(DiskType::NetworkHdd, 0.0044)]
#[case(DiskType::NetworkSsdNonreplicated, 0.0132)]
#[case(DiskType::NetworkSsdIoM3, 0.0297)]
fn disk_price_is_linear_in_size(engine: PricingEngine, #[case] kind: DiskType, #[case] per_gib: f64) {
    let price = engine
        .disk_price(kind, 93)
        .unwrap_or_else(|| panic!("{kind} is priced"));
    assert!((price - per_gib * 93.0).abs() < TOLERANCE);
    assert_eq!(engine.disk_price(kind, 0), Some(0.0));
}

#[test]
fn empty_disk_table_reports_absence() {
    let engine = PricingEngine::new(PriceTable::default(), DiskPriceTable::default());
    assert_eq!(engine.disk_price(DiskType::NetworkSsd, 10), None);
}
