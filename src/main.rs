//! Binary entry point for the nodeplan CLI.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nodeplan::{
    CapacityType, CatalogError, ConfigError, DEFAULT_ZONES, DiskType, InstanceCatalog,
    InstanceType, InstanceTypeProvider, LifecycleError, LifecycleManager, NodeClass,
    OfferingError, OfferingResolver, PricingEngine, ProviderConfig, RandomTieBreaker,
    Requirements, ResolvedSubnet, ResourceRequest, SelectionError, SelectionPolicy,
    SelectionRequest, SubnetId, UnknownDiskType, Zone, labels,
};

mod cli;

use cli::{CatalogCommand, Cli, OfferingArgs, PriceCommand, SelectCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Offering(#[from] OfferingError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    DiskType(#[from] UnknownDiskType),
    #[error("node group listing failed: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nodeplan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(&cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: &Cli) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    match cli {
        Cli::Catalog(command) => catalog(command, &mut stdout),
        Cli::Price(command) => price(command, &mut stdout),
        Cli::Select(command) => select(command, &mut stdout),
        Cli::NodeGroups => node_groups(&mut stdout).await,
    }
}

fn catalog(command: &CatalogCommand, out: &mut impl Write) -> Result<(), CliError> {
    let class = offline_class(&command.offering, 0);
    let instance_types = offline_provider(&command.offering).list(&class)?;
    writeln!(out, "INSTANCE TYPE\tCPU\tMEMORY\tON-DEMAND\tSPOT\tZONES")?;
    for instance_type in instance_types
        .iter()
        .filter(|instance_type| platform_matches(&command.offering, instance_type))
    {
        writeln!(
            out,
            "{}\t{}\t{}Mi\t{}\t{}\t{}",
            instance_type.name,
            instance_type.descriptor.cpu,
            instance_type.descriptor.memory_mib,
            format_price(cheapest(instance_type, CapacityType::OnDemand)),
            format_price(cheapest(instance_type, CapacityType::Discounted)),
            available_zones(instance_type),
        )?;
    }
    Ok(())
}

fn price(command: &PriceCommand, out: &mut impl Write) -> Result<(), CliError> {
    let descriptor = InstanceCatalog::builtin().by_name(&command.name)?;
    let pricing = PricingEngine::builtin();
    writeln!(out, "instance_type: {}", descriptor.name())?;
    writeln!(
        out,
        "on_demand: {}",
        format_price(pricing.on_demand_price(&descriptor))
    )?;
    writeln!(
        out,
        "spot: {}",
        format_price(pricing.discounted_price(&descriptor))
    )?;
    if let Some(size_gib) = command.disk_gib {
        let disk_type = DiskType::from_configured(command.disk_type.as_deref().unwrap_or(""))?;
        writeln!(
            out,
            "disk ({disk_type}, {size_gib}Gi): {}",
            format_price(pricing.disk_price(disk_type, size_gib))
        )?;
    }
    Ok(())
}

fn select(command: &SelectCommand, out: &mut impl Write) -> Result<(), CliError> {
    let class = offline_class(&command.offering, command.disk_gib);
    let candidates = offline_provider(&command.offering).list(&class)?;
    let mut requirements = Requirements::new();
    if let Some(platform) = &command.offering.platform {
        requirements.insert(labels::PLATFORM, [platform.as_str()]);
    }
    let request = SelectionRequest {
        requirements,
        resources: ResourceRequest {
            cpu: command.cpu,
            memory_mib: command.memory_gib.saturating_mul(1024),
            disk_gib: command.disk_gib,
        },
    };
    let selection = SelectionPolicy::new(RandomTieBreaker).select(&candidates, &request)?;
    writeln!(out, "instance_type: {}", selection.instance_type.name)?;
    writeln!(out, "zone: {}", selection.offering.zone)?;
    writeln!(out, "capacity_type: {}", selection.offering.capacity_type)?;
    writeln!(out, "price: {}", format_price(selection.offering.price))?;
    Ok(())
}

async fn node_groups(out: &mut impl Write) -> Result<(), CliError> {
    let config = ProviderConfig::load_without_cli_args()?;
    let api = Arc::new(config.api()?);
    let manager = LifecycleManager::new(api, config.lifecycle_settings());
    let groups = manager.list().await?;
    writeln!(out, "ID\tNAME\tINSTANCE TYPE\tZONE\tSTATE")?;
    for group in groups {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{:?}",
            group.id,
            group.name,
            group.shape.name(),
            group.zone.as_ref().map_or("-", |zone| zone.as_str()),
            group.state,
        )?;
    }
    Ok(())
}

fn offline_zones(args: &OfferingArgs) -> BTreeSet<Zone> {
    if args.zones.is_empty() {
        DEFAULT_ZONES.iter().map(|zone| Zone::from(*zone)).collect()
    } else {
        args.zones.iter().map(|zone| Zone::from(zone.as_str())).collect()
    }
}

fn offline_provider(args: &OfferingArgs) -> InstanceTypeProvider {
    InstanceTypeProvider::new(
        InstanceCatalog::builtin(),
        OfferingResolver::new(PricingEngine::builtin()),
        DEFAULT_ZONES.iter().map(|zone| Zone::from(*zone)).chain(offline_zones(args)).collect(),
    )
}

/// Node class with one placeholder subnet per requested zone and unknown
/// address headroom.
fn offline_class(args: &OfferingArgs, disk_gib: u64) -> NodeClass {
    let mut class = NodeClass::new("offline");
    class.spec.can_be_discounted = args.spot;
    class.spec.disk_size_bytes = disk_gib.saturating_mul(1 << 30);
    class.status.subnets = offline_zones(args)
        .into_iter()
        .map(|zone| ResolvedSubnet {
            id: SubnetId::new(format!("offline-{zone}")),
            zone,
            available_ips: None,
        })
        .collect();
    class
}

fn platform_matches(args: &OfferingArgs, instance_type: &InstanceType) -> bool {
    args.platform
        .as_deref()
        .is_none_or(|platform| instance_type.descriptor.platform.as_str() == platform)
}

fn cheapest(instance_type: &InstanceType, capacity_type: CapacityType) -> Option<f64> {
    instance_type.cheapest_available(|offering| offering.capacity_type == capacity_type)
}

fn available_zones(instance_type: &InstanceType) -> String {
    let zones: BTreeSet<&str> = instance_type
        .offerings
        .iter()
        .filter(|offering| offering.available)
        .map(|offering| offering.zone.as_str())
        .collect();
    if zones.is_empty() {
        "-".to_owned()
    } else {
        zones.into_iter().collect::<Vec<_>>().join(",")
    }
}

fn format_price(price: Option<f64>) -> String {
    price.map_or_else(|| "-".to_owned(), |value| format!("{value:.4}"))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
