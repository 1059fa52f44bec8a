//! Node provisioning for a managed Kubernetes autoscaler on Yandex Cloud.
//!
//! The crate turns a resource request into a concrete node: the
//! [`InstanceCatalog`] enumerates instance shapes, the [`PricingEngine`]
//! prices them, the [`OfferingResolver`] expands them into per-zone offerings,
//! the [`SelectionPolicy`] picks one, the [`ValidationEngine`] gates node
//! classes against the cloud, and the [`LifecycleManager`] creates, finds and
//! deletes the single-node groups that back each node. [`Provisioner`] wires
//! the pieces together over any [`ComputeApi`]; [`YandexApi`] is the REST
//! implementation.

pub mod catalog;
pub mod compute;
pub mod config;
pub mod disk;
pub mod keyed_lock;
pub mod lifecycle;
pub mod node_class;
pub mod offering;
pub mod pricing;
pub mod provisioner;
pub mod selection;
pub mod test_support;
pub mod types;
pub mod validation;
pub mod yandex;

pub use catalog::{
    CatalogError, CoreFraction, DescriptorParseError, InstanceCatalog, InstanceTypeDescriptor,
    PlatformProfile, TierRule,
};
pub use compute::{
    ComputeApi, ComputeError, ComputeFuture, NodeGroupRecord, NodeGroupSpec, NodeGroupState,
    OperationRecord, SecurityGroupRecord, SubnetRecord,
};
pub use config::{ConfigError, DEFAULT_ZONES, ProviderConfig};
pub use disk::{DiskType, UnknownDiskType};
pub use keyed_lock::KeyedLock;
pub use lifecycle::{
    CreateRequest, DeleteOutcome, LifecycleError, LifecycleManager, LifecycleSettings,
    MANAGED_BY_LABEL, MANAGED_BY_VALUE,
};
pub use node_class::{ConditionStatus, NodeClass, NodeClassSpec, NodeClassStatus, ResolvedSubnet};
pub use offering::{
    CapacityType, InstanceType, InstanceTypeProvider, Offering, OfferingError, OfferingResolver,
    Overhead, Requirements, ResourceQuantities, Resources, ZoneInventory, labels,
};
pub use pricing::{DiskPriceTable, PlatformPrices, PriceTable, PricingEngine};
pub use provisioner::{ProvisionError, ProvisionRequest, ProvisionedNode, Provisioner};
pub use selection::{
    LexicalTieBreaker, RandomTieBreaker, ResourceRequest, Selection, SelectionError,
    SelectionPolicy, SelectionRequest, TieBreaker,
};
pub use types::{
    NetworkId, NodeGroupId, PROVIDER_ID_PREFIX, PlatformId, ProviderId, ProviderIdError,
    SecurityGroupId, SubnetId, Zone,
};
pub use validation::{
    ValidationCache, ValidationEngine, ValidationError, ValidationOutcome, ValidationResult,
    ValidationSettings, ValidationState, reasons,
};
pub use yandex::{Endpoints, YandexApi};
