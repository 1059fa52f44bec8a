use super::*;
use crate::catalog::CoreFraction;
use crate::test_support::{FakeComputeApi, node_group_record, ops};
use rstest::{fixture, rstest};

const CLUSTER: &str = "cluster-1";

#[fixture]
fn api() -> Arc<FakeComputeApi> {
    Arc::new(FakeComputeApi::new("net-1"))
}

#[fixture]
fn request() -> CreateRequest {
    CreateRequest {
        name: "default-abc12".to_owned(),
        shape: InstanceTypeDescriptor {
            platform: "standard-v3".into(),
            core_fraction: CoreFraction::FULL,
            cpu: 2,
            memory_mib: 4096,
        },
        zone: Zone::from("ru-central1-a"),
        subnet: SubnetId::from("subnet-a"),
        discounted: true,
        disk_type: DiskType::NetworkSsd,
        disk_size_bytes: 64 << 30,
        labels: BTreeMap::from([("team".to_owned(), "Platform".to_owned())]),
        security_groups: vec![SecurityGroupId::from("sg-1")],
        accelerated_network: true,
    }
}

fn manager(api: &Arc<FakeComputeApi>) -> LifecycleManager<FakeComputeApi> {
    LifecycleManager::new(Arc::clone(api), LifecycleSettings::for_cluster(CLUSTER))
}

async fn created(lifecycle: &LifecycleManager<FakeComputeApi>, request: &CreateRequest) -> NodeGroupId {
    lifecycle
        .create(request)
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"))
}

#[rstest]
#[tokio::test]
async fn create_stamps_management_labels(api: Arc<FakeComputeApi>, request: CreateRequest) {
    created(&manager(&api), &request).await;
    let specs = api.created_specs();
    let [spec] = specs.as_slice() else {
        panic!("expected one create, got {specs:?}");
    };
    assert_eq!(spec.cluster_id, CLUSTER);
    assert_eq!(spec.labels.get(MANAGED_BY_LABEL).map(String::as_str), Some(MANAGED_BY_VALUE));
    assert_eq!(spec.labels.get("team").map(String::as_str), Some("platform"));
    assert_eq!(spec.node_labels.get("team").map(String::as_str), Some("Platform"));
    assert!(spec.discounted);
    assert!(spec.accelerated_network);
}

#[rstest]
#[tokio::test]
async fn nodes_are_labelled_with_their_shape(api: Arc<FakeComputeApi>, mut request: CreateRequest) {
    request.shape.memory_mib = 1536;
    request.shape.core_fraction = CoreFraction::BURST_20;
    created(&manager(&api), &request).await;
    let specs = api.created_specs();
    let [spec] = specs.as_slice() else {
        panic!("expected one create, got {specs:?}");
    };
    let label = |key: &str| spec.node_labels.get(key).map(String::as_str);
    assert_eq!(label(labels::INSTANCE_CPU_PLATFORM), Some("standard-v3"));
    assert_eq!(label(labels::INSTANCE_CPU), Some("2"));
    assert_eq!(label(labels::INSTANCE_MEMORY), Some("1536Mi"));
    assert_eq!(label(labels::INSTANCE_CPU_FRACTION), Some("20"));
    assert_eq!(label("team"), Some("Platform"));
    assert!(!spec.labels.contains_key(labels::INSTANCE_CPU));
}

#[rstest]
#[tokio::test]
async fn burstable_shapes_never_get_accelerated_network(
    api: Arc<FakeComputeApi>,
    mut request: CreateRequest,
) {
    request.shape.core_fraction = CoreFraction::BURST_50;
    created(&manager(&api), &request).await;
    assert!(api.created_specs().iter().all(|spec| !spec.accelerated_network));
}

#[rstest]
#[tokio::test]
async fn repeated_create_reuses_existing_group(api: Arc<FakeComputeApi>, request: CreateRequest) {
    let lifecycle = manager(&api);
    let first = created(&lifecycle, &request).await;
    let second = created(&lifecycle, &request).await;
    assert_eq!(first, second);
    assert_eq!(api.call_count(ops::CREATE_NODE_GROUP), 1);
}

#[rstest]
#[tokio::test]
async fn concurrent_creates_issue_one_request(api: Arc<FakeComputeApi>, request: CreateRequest) {
    let lifecycle = manager(&api);
    let (left, right) = tokio::join!(lifecycle.create(&request), lifecycle.create(&request));
    assert_eq!(left, right);
    assert_eq!(api.call_count(ops::CREATE_NODE_GROUP), 1);
}

#[rstest]
#[tokio::test]
async fn unmanaged_groups_do_not_satisfy_idempotency(
    api: Arc<FakeComputeApi>,
    request: CreateRequest,
) {
    api.insert_node_group(node_group_record("ng-foreign", &request.name, "cluster-2", &[(
        MANAGED_BY_LABEL,
        MANAGED_BY_VALUE,
    )]));
    api.insert_node_group(node_group_record("ng-manual", &request.name, CLUSTER, &[]));
    let id = created(&manager(&api), &request).await;
    assert_ne!(id.as_str(), "ng-foreign");
    assert_ne!(id.as_str(), "ng-manual");
    assert_eq!(api.call_count(ops::CREATE_NODE_GROUP), 1);
}

#[rstest]
#[tokio::test]
async fn list_keeps_only_managed_groups_of_the_cluster(api: Arc<FakeComputeApi>) {
    api.insert_node_group(node_group_record("ng-1", "a", CLUSTER, &[(
        MANAGED_BY_LABEL,
        MANAGED_BY_VALUE,
    )]));
    api.insert_node_group(node_group_record("ng-2", "b", CLUSTER, &[]));
    api.insert_node_group(node_group_record("ng-3", "c", "cluster-2", &[(
        MANAGED_BY_LABEL,
        MANAGED_BY_VALUE,
    )]));
    let listed = manager(&api)
        .list()
        .await
        .unwrap_or_else(|err| panic!("list should succeed: {err}"));
    let ids: Vec<&str> = listed.iter().map(|group| group.id.as_str()).collect();
    assert_eq!(ids, ["ng-1"]);
}

#[rstest]
#[tokio::test]
async fn second_delete_sees_operation_in_flight(api: Arc<FakeComputeApi>, request: CreateRequest) {
    let lifecycle = manager(&api);
    let id = created(&lifecycle, &request).await;
    assert_eq!(lifecycle.delete(&id).await, Ok(DeleteOutcome::Requested));
    assert_eq!(lifecycle.delete(&id).await, Ok(DeleteOutcome::InFlight));
    assert_eq!(api.call_count(ops::DELETE_NODE_GROUP), 1);
}

#[rstest]
#[tokio::test]
async fn finished_delete_operations_do_not_block(api: Arc<FakeComputeApi>) {
    api.insert_node_group(node_group_record("ng-1", "a", CLUSTER, &[]));
    api.add_operation("ng-1", "yandex.cloud.k8s.v1.DeleteNodeGroupMetadata", true);
    api.add_operation("ng-1", "yandex.cloud.k8s.v1.UpdateNodeGroupMetadata", false);
    let outcome = manager(&api).delete(&NodeGroupId::from("ng-1")).await;
    assert_eq!(outcome, Ok(DeleteOutcome::Requested));
}

#[rstest]
#[tokio::test]
async fn deleting_missing_group_is_already_gone(api: Arc<FakeComputeApi>) {
    let outcome = manager(&api).delete(&NodeGroupId::from("ng-missing")).await;
    assert_eq!(outcome, Ok(DeleteOutcome::AlreadyGone));
    assert_eq!(api.call_count(ops::DELETE_NODE_GROUP), 0);
}

#[rstest]
#[tokio::test]
async fn group_vanishing_before_delete_is_already_gone(api: Arc<FakeComputeApi>) {
    api.insert_node_group(node_group_record("ng-1", "a", CLUSTER, &[]));
    api.fail_next(ops::DELETE_NODE_GROUP, ComputeError::not_found("node group", "ng-1"));
    let outcome = manager(&api).delete(&NodeGroupId::from("ng-1")).await;
    assert_eq!(outcome, Ok(DeleteOutcome::AlreadyGone));
}

#[rstest]
#[tokio::test]
async fn transient_delete_failure_is_retryable(api: Arc<FakeComputeApi>) {
    api.insert_node_group(node_group_record("ng-1", "a", CLUSTER, &[]));
    api.fail_next(
        ops::DELETE_NODE_GROUP,
        ComputeError::Api {
            status: 503,
            message: "unavailable".to_owned(),
        },
    );
    let result = manager(&api).delete(&NodeGroupId::from("ng-1")).await;
    assert!(result.is_err_and(|err| err.is_retryable()));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn resolves_instance_id_after_propagation(api: Arc<FakeComputeApi>, request: CreateRequest) {
    api.set_instance_delay_polls(3);
    let lifecycle = manager(&api);
    let id = created(&lifecycle, &request).await;
    let provider_id = lifecycle
        .resolve_external_id(&id)
        .await
        .unwrap_or_else(|err| panic!("resolution should succeed: {err}"));
    assert_eq!(provider_id.as_str(), "yandex://inst-1");
    assert_eq!(api.call_count(ops::NODE_GROUP_INSTANCE_ID), 4);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn transient_poll_failures_keep_polling(api: Arc<FakeComputeApi>, request: CreateRequest) {
    let lifecycle = manager(&api);
    let id = created(&lifecycle, &request).await;
    api.fail_next(
        ops::NODE_GROUP_INSTANCE_ID,
        ComputeError::Transport {
            message: "reset".to_owned(),
        },
    );
    let resolved = lifecycle.resolve_external_id(&id).await;
    assert!(resolved.is_ok());
    assert_eq!(api.call_count(ops::NODE_GROUP_INSTANCE_ID), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn resolution_times_out_with_last_error(api: Arc<FakeComputeApi>, request: CreateRequest) {
    api.set_instance_delay_polls(u32::MAX);
    let lifecycle = manager(&api);
    let id = created(&lifecycle, &request).await;
    api.fail_next(
        ops::NODE_GROUP_INSTANCE_ID,
        ComputeError::Transport {
            message: "reset".to_owned(),
        },
    );
    let err = lifecycle
        .resolve_external_id(&id)
        .await
        .err()
        .unwrap_or_else(|| panic!("resolution should time out"));
    let LifecycleError::ExternalIdTimeout {
        waited, last_error, ..
    } = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert!(*waited >= Duration::from_secs(300));
    assert!(last_error.as_deref().is_some_and(|message| message.contains("reset")));
    assert!(!err.is_retryable());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stalled_polls_never_overrun_the_resolve_timeout(
    api: Arc<FakeComputeApi>,
    request: CreateRequest,
) {
    let lifecycle = manager(&api);
    let id = created(&lifecycle, &request).await;
    api.delay(ops::NODE_GROUP_INSTANCE_ID, Duration::from_secs(3600));
    let err = lifecycle
        .resolve_external_id(&id)
        .await
        .err()
        .unwrap_or_else(|| panic!("resolution should time out"));
    let LifecycleError::ExternalIdTimeout {
        waited, last_error, ..
    } = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert!(*waited >= Duration::from_secs(300));
    assert!(*waited < Duration::from_secs(301), "overran the deadline: {waited:?}");
    assert!(last_error.as_deref().is_some_and(|message| message.contains("timed out")));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn resolution_honours_caller_cancellation(api: Arc<FakeComputeApi>, request: CreateRequest) {
    api.set_instance_delay_polls(u32::MAX);
    let lifecycle = manager(&api);
    let id = created(&lifecycle, &request).await;
    let bounded_wait =
        tokio::time::timeout(Duration::from_secs(5), lifecycle.resolve_external_id(&id)).await;
    assert!(bounded_wait.is_err());
    assert!(api.call_count(ops::NODE_GROUP_INSTANCE_ID) <= 6);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn external_id_lookup_round_trips(api: Arc<FakeComputeApi>, request: CreateRequest) {
    let lifecycle = manager(&api);
    let id = created(&lifecycle, &request).await;
    let provider_id = lifecycle
        .resolve_external_id(&id)
        .await
        .unwrap_or_else(|err| panic!("resolution should succeed: {err}"));
    let found = lifecycle
        .get_by_external_id(provider_id.as_str())
        .await
        .unwrap_or_else(|err| panic!("lookup should succeed: {err}"));
    assert_eq!(found.map(|group| group.id), Some(id));
}

#[rstest]
#[case::unknown_instance("yandex://inst-404")]
#[tokio::test]
async fn unknown_external_id_is_none(api: Arc<FakeComputeApi>, #[case] provider_id: &str) {
    let found = manager(&api).get_by_external_id(provider_id).await;
    assert_eq!(found, Ok(None));
}

#[rstest]
#[case::missing_scheme("inst-1")]
#[case::foreign_scheme("aws:///i-123")]
#[case::empty_instance("yandex://")]
#[tokio::test]
async fn malformed_external_id_is_rejected(api: Arc<FakeComputeApi>, #[case] provider_id: &str) {
    let found = manager(&api).get_by_external_id(provider_id).await;
    assert!(matches!(found, Err(LifecycleError::InvalidProviderId(_))));
    assert!(api.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn get_by_id_maps_not_found_to_none(api: Arc<FakeComputeApi>) {
    api.insert_node_group(node_group_record("ng-1", "a", CLUSTER, &[]));
    let lifecycle = manager(&api);
    let present = lifecycle.get_by_id(&NodeGroupId::from("ng-1")).await;
    assert!(present.is_ok_and(|group| group.is_some()));
    let absent = lifecycle.get_by_id(&NodeGroupId::from("ng-2")).await;
    assert_eq!(absent, Ok(None));
}
