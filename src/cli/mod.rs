//! Command-line interface definitions shared by the binary and build script.

use clap::{Args, Parser};

/// Top-level CLI for the nodeplan tool.
#[derive(Debug, Parser)]
#[command(
    name = "nodeplan",
    about = "Plan and inspect managed node groups",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List the instance types the built-in catalog offers.
    #[command(name = "catalog", about = "List instance types with their cheapest offering")]
    Catalog(CatalogCommand),
    /// Price one instance type.
    #[command(name = "price", about = "Show hourly prices for an instance type")]
    Price(PriceCommand),
    /// Choose an offering for a resource request.
    #[command(name = "select", about = "Choose the cheapest offering for a request")]
    Select(SelectCommand),
    /// List node groups this tool manages in the configured cluster.
    #[command(name = "node-groups", about = "List managed node groups")]
    NodeGroups,
}

/// Offline offering options shared by `catalog` and `select`.
#[derive(Debug, Args, Clone)]
pub(crate) struct OfferingArgs {
    /// Zones to offer in; repeat for several. Defaults to every region zone.
    #[arg(long = "zone", value_name = "ZONE")]
    pub(crate) zones: Vec<String>,
    /// Allow discounted (preemptible) capacity.
    #[arg(long)]
    pub(crate) spot: bool,
    /// Restrict to one platform.
    #[arg(long, value_name = "PLATFORM")]
    pub(crate) platform: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub(crate) struct CatalogCommand {
    #[command(flatten)]
    pub(crate) offering: OfferingArgs,
}

#[derive(Debug, Args, Clone)]
pub(crate) struct PriceCommand {
    /// Canonical name such as `standard-v3_2_4Gi_100`.
    #[arg(value_name = "INSTANCE_TYPE")]
    pub(crate) name: String,
    /// Boot disk type to price alongside the instance.
    #[arg(long, value_name = "TYPE", requires = "disk_gib")]
    pub(crate) disk_type: Option<String>,
    /// Boot disk size in GiB.
    #[arg(long, value_name = "GIB")]
    pub(crate) disk_gib: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub(crate) struct SelectCommand {
    /// Minimum vCPUs.
    #[arg(long, value_name = "N")]
    pub(crate) cpu: u32,
    /// Minimum memory in GiB.
    #[arg(long, value_name = "GIB")]
    pub(crate) memory_gib: u64,
    /// Minimum boot disk in GiB.
    #[arg(long, value_name = "GIB", default_value_t = 0)]
    pub(crate) disk_gib: u64,
    #[command(flatten)]
    pub(crate) offering: OfferingArgs,
}
