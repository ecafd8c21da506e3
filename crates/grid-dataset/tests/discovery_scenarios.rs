//! Catalog discovery against in-memory endpoints.

use std::sync::Arc;

use grid_dataset::testdata::{
    regular_axis, thredds_catalog, Failure, MemoryCatalog, MemoryGrid, MemoryTransport,
    AUG_8_2006_NOON, SECONDS_PER_DAY,
};
use grid_dataset::{DatasetConfig, DatasetError, DiagnosticReason, GridDataset};

const CATALOG_URL: &str = "http://thredds.test/thredds/catalog/chla/catalog.xml";
const DODS: &str = "http://thredds.test/thredds/dodsC/satellite/MO/chla/";

fn grid(n_times: usize) -> MemoryGrid {
    let times = regular_axis(AUG_8_2006_NOON, SECONDS_PER_DAY, n_times);
    MemoryGrid::new(
        times,
        regular_axis(-40.0, 10.0, 9),
        regular_axis(0.0, 5.0, 72),
        |t, y, x| (t * 10_000 + x * 100 + y) as f32,
    )
}

fn catalog(tokens: &[&str]) -> MemoryCatalog {
    let paths: Vec<String> = tokens
        .iter()
        .map(|t| format!("satellite/MO/chla/{}", t))
        .collect();
    let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
    MemoryCatalog::new(thredds_catalog(Some("/thredds/dodsC/"), &paths))
}

fn url(token: &str) -> String {
    format!("{}{}", DODS, token)
}

#[tokio::test]
async fn test_unreachable_endpoint_does_not_abort_discovery() {
    let transport = MemoryTransport::new()
        .with_grid(url("hday"), grid(4))
        .with_grid(url("1day"), grid(4))
        .with_grid(url("3day"), grid(4))
        .with_failure(url("1day"), Failure::Hang);

    let mut config = DatasetConfig::new("TMBchla", CATALOG_URL);
    config.request_timeout_secs = 1;

    let dataset = GridDataset::open(config, &catalog(&["hday", "1day", "3day"]), Arc::new(transport))
        .await
        .expect("discovery should absorb the timeout");

    assert_eq!(dataset.active_periods(), vec!["1 observation", "3 day"]);

    let report = dataset.discovery_report();
    assert_eq!(report.entries, 3);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].url_path, "satellite/MO/chla/1day");
    match &report.diagnostics[0].reason {
        DiagnosticReason::Failed(DatasetError::EndpointUnavailable { message, .. }) => {
            assert!(message.contains("timed out"), "{}", message)
        }
        other => panic!("unexpected diagnostic {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_diagnosed() {
    let transport = MemoryTransport::new()
        .with_grid(url("8day"), grid(2))
        .with_failure(url("mday"), Failure::Unreachable);

    let dataset = GridDataset::open(
        DatasetConfig::new("TMBchla", CATALOG_URL),
        &catalog(&["8day", "mday"]),
        Arc::new(transport),
    )
    .await
    .unwrap();

    assert_eq!(dataset.active_periods(), vec!["8 day"]);
    assert!(matches!(
        dataset.discovery_report().diagnostics[0].reason,
        DiagnosticReason::Failed(DatasetError::EndpointUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_suffix_override_selects_25_hour_period() {
    let transport = MemoryTransport::new().with_grid(url("hday"), grid(3).end_times());

    let dataset = GridDataset::open(
        DatasetConfig::new("TGAssta25h", CATALOG_URL),
        &catalog(&["hday"]),
        Arc::new(transport),
    )
    .await
    .unwrap();

    assert_eq!(dataset.active_periods(), vec!["25 hour"]);
    let endpoint = dataset.endpoint("25 hour").unwrap();
    assert_eq!(endpoint.period.nominal_hours, 25);
    // 25 hour end times are centered by half the window, no midnight nudge
    assert_eq!(
        endpoint.temporal_index.timestamp(0),
        Some(AUG_8_2006_NOON - 12.5 * 3_600.0)
    );
}

#[tokio::test]
async fn test_suffix_override_selects_33_hour_period() {
    let transport = MemoryTransport::new().with_grid(url("hday"), grid(3));
    let dataset = GridDataset::open(
        DatasetConfig::new("TGAssta33h", CATALOG_URL),
        &catalog(&["hday"]),
        Arc::new(transport),
    )
    .await
    .unwrap();
    assert_eq!(dataset.active_periods(), vec!["33 hour"]);
}

#[tokio::test]
async fn test_unknown_period_token_is_skipped() {
    let transport = MemoryTransport::new().with_grid(url("1day"), grid(2));

    let dataset = GridDataset::open(
        DatasetConfig::new("TMBchla", CATALOG_URL),
        &catalog(&["2day", "1day"]),
        Arc::new(transport),
    )
    .await
    .unwrap();

    assert_eq!(dataset.active_periods(), vec!["1 day"]);
    assert_eq!(
        dataset.discovery_report().diagnostics[0].reason,
        DiagnosticReason::UnknownPeriod("2day".to_string())
    );
}

#[tokio::test]
async fn test_period_allow_list() {
    let transport = MemoryTransport::new()
        .with_grid(url("1day"), grid(2))
        .with_grid(url("8day"), grid(2));

    let mut config = DatasetConfig::new("TMBchla", CATALOG_URL);
    config.period_tokens = Some(vec!["8day".to_string()]);

    let dataset = GridDataset::open(config, &catalog(&["1day", "8day"]), Arc::new(transport))
        .await
        .unwrap();
    assert_eq!(dataset.active_periods(), vec!["8 day"]);
}

#[tokio::test]
async fn test_missing_service_is_fatal() {
    let catalog = MemoryCatalog::new(thredds_catalog(None, &["satellite/MO/chla/1day"]));
    let transport = MemoryTransport::new().with_grid(url("1day"), grid(2));

    let result = GridDataset::open(
        DatasetConfig::new("TMBchla", CATALOG_URL),
        &catalog,
        Arc::new(transport),
    )
    .await;

    assert!(matches!(result, Err(DatasetError::Configuration(_))));
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let result = GridDataset::open(
        DatasetConfig::new("", CATALOG_URL),
        &catalog(&["1day"]),
        Arc::new(MemoryTransport::new()),
    )
    .await;
    assert!(matches!(result, Err(DatasetError::Configuration(_))));
}

#[tokio::test]
async fn test_shared_metadata_fetched_once() {
    let transport = Arc::new(
        MemoryTransport::new()
            .with_grid(url("1day"), grid(2))
            .with_grid(url("3day"), grid(2))
            .with_grid(url("8day"), grid(2))
            .with_grid(url("mday"), grid(2)),
    );

    let dataset = GridDataset::open(
        DatasetConfig::new("TMBchla", CATALOG_URL),
        &catalog(&["1day", "3day", "8day", "mday"]),
        transport.clone(),
    )
    .await
    .unwrap();

    assert_eq!(dataset.active_periods().len(), 4);
    assert_eq!(transport.metadata_reads(), 1);

    let metadata = dataset.metadata().unwrap();
    assert_eq!(metadata.title, "Chlorophyll-a, Aqua MODIS");
    assert_eq!(metadata.summary, "Chlorophyll-a concentration.");
    assert_eq!(metadata.units, "mg m-3");
    assert_eq!(metadata.courtesy.as_deref(), Some("NOAA CoastWatch"));
}

#[tokio::test]
async fn test_endpoint_without_times_is_discarded() {
    let transport = MemoryTransport::new()
        .with_grid(url("1day"), grid(0))
        .with_grid(url("3day"), grid(2));

    let dataset = GridDataset::open(
        DatasetConfig::new("TMBchla", CATALOG_URL),
        &catalog(&["1day", "3day"]),
        Arc::new(transport),
    )
    .await
    .unwrap();

    assert_eq!(dataset.active_periods(), vec!["3 day"]);
    assert_eq!(
        dataset.discovery_report().diagnostics[0].reason,
        DiagnosticReason::NoTimes
    );
}

#[tokio::test]
async fn test_duplicate_period_label_keeps_first() {
    let transport = MemoryTransport::new()
        .with_grid(url("8day"), grid(2))
        .with_grid("http://thredds.test/thredds/dodsC/satellite/MO/other/8day", grid(3));

    let catalog = MemoryCatalog::new(thredds_catalog(
        Some("/thredds/dodsC/"),
        &["satellite/MO/chla/8day", "satellite/MO/other/8day"],
    ));

    let dataset = GridDataset::open(
        DatasetConfig::new("TMBchla", CATALOG_URL),
        &catalog,
        Arc::new(transport),
    )
    .await
    .unwrap();

    assert_eq!(dataset.active_periods(), vec!["8 day"]);
    assert_eq!(dataset.endpoint("8 day").unwrap().temporal_index.len(), 2);
    assert_eq!(
        dataset.discovery_report().diagnostics[0].reason,
        DiagnosticReason::DuplicateLabel("8 day")
    );
}

#[tokio::test]
async fn test_all_endpoints_failing_leaves_no_active_periods() {
    let transport = MemoryTransport::new().with_failure(url("1day"), Failure::Unreachable);

    let dataset = GridDataset::open(
        DatasetConfig::new("TMBchla", CATALOG_URL),
        &catalog(&["1day"]),
        Arc::new(transport),
    )
    .await
    .unwrap();

    assert!(dataset.active_periods().is_empty());
    assert!(dataset.metadata().is_none());
    assert!(matches!(
        dataset.endpoint("1 day"),
        Err(DatasetError::NotFound(_))
    ));
}
