#[path = "helpers/mod.rs"]
mod helpers;

use helpers::{reviewer, setup_test_app, uploader, viewer, PARCEL_1};
use parcelsync_core::models::{LogType, TransitionKind};
use parcelsync_core::SyncError;
use rust_decimal::Decimal;
use std::str::FromStr;

#[tokio::test]
async fn test_diff_compares_against_system_of_record() {
    let app = setup_test_app().await;
    let id = app
        .workflow
        .stage(&uploader(), "parcel1.xml", PARCEL_1)
        .await
        .unwrap()
        .record
        .upload_id;

    let report = app.workflow.diff(&reviewer(), id).await.unwrap();
    assert_eq!(report.upload_id, id);
    assert_eq!(report.property_id, "4500");

    let fields: Vec<_> = report.fields.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, vec!["building_value", "land_value", "owner", "tax_due"]);

    let land = &report.fields[1];
    assert_eq!(land.current_value.as_deref(), Some("150000"));
    assert_eq!(land.proposed_value.as_deref(), Some("165000"));
    assert_eq!(land.delta, Some(Decimal::from_str("15000").unwrap()));

    let owner = &report.fields[2];
    assert_eq!(owner.delta, None);
    assert!(!owner.is_change());

    let tax = &report.fields[3];
    assert_eq!(tax.proposed_value, None);
    assert_eq!(tax.delta, None);

    let changes: Vec<_> = report.changes().map(|f| f.field.as_str()).collect();
    assert_eq!(changes, vec!["land_value"]);

    // Retrieval is journaled but moves nothing.
    let history = app.workflow.history(&viewer(), id).await.unwrap();
    assert_eq!(history.last().unwrap().kind, TransitionKind::DiffViewed);
    assert_eq!(history.last().unwrap().from_status, None);
    assert_eq!(app.workflow.list_staging(&viewer()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_diff_for_unknown_property_has_only_proposed_values() {
    let app = setup_test_app().await;
    let id = app
        .workflow
        .stage(&uploader(), "tags.xml", b"<parcel><acreage>2.5</acreage></parcel>")
        .await
        .unwrap()
        .record
        .upload_id;

    let report = app.workflow.diff(&reviewer(), id).await.unwrap();
    assert_eq!(report.property_id, "UNKNOWN");
    assert_eq!(report.fields.len(), 1);
    assert_eq!(report.fields[0].current_value, None);
    assert_eq!(report.fields[0].proposed_value.as_deref(), Some("2.5"));
}

#[tokio::test]
async fn test_diff_requires_staged_record() {
    let app = setup_test_app().await;
    let id = app
        .workflow
        .stage(&uploader(), "parcel1.xml", PARCEL_1)
        .await
        .unwrap()
        .record
        .upload_id;
    app.workflow.approve(&reviewer(), id).await.unwrap();

    let err = app.workflow.diff(&reviewer(), id).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[tokio::test]
async fn test_export_after_full_lifecycle() {
    let app = setup_test_app().await;
    let id = app
        .workflow
        .stage(&uploader(), "parcel1.xml", PARCEL_1)
        .await
        .unwrap()
        .record
        .upload_id;
    app.workflow.approve(&reviewer(), id).await.unwrap();
    app.workflow.rollback(&reviewer(), id).await.unwrap();

    let rows = app.workflow.export(&viewer()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].upload_id, id);
    assert_eq!(rows[0].log_type, LogType::RolledBack);

    let csv = String::from_utf8(app.workflow.export_csv(&viewer()).await.unwrap()).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.ends_with(",log_type"));
    assert!(!header.contains("storage_path"));
    assert!(csv.contains(",rolled_back"));
}

#[tokio::test]
async fn test_export_orders_newest_first_across_tables() {
    let app = setup_test_app().await;
    let wf = &app.workflow;

    let first = wf.stage(&uploader(), "1.xml", PARCEL_1).await.unwrap().record;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = wf.stage(&uploader(), "2.xml", PARCEL_1).await.unwrap().record;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let third = wf.stage(&uploader(), "3.xml", PARCEL_1).await.unwrap().record;

    wf.approve(&reviewer(), first.upload_id).await.unwrap();
    wf.approve(&reviewer(), second.upload_id).await.unwrap();
    wf.rollback(&reviewer(), second.upload_id).await.unwrap();

    let rows = wf.export(&viewer()).await.unwrap();
    let order: Vec<_> = rows.iter().map(|r| (r.upload_id, r.log_type)).collect();
    assert_eq!(
        order,
        vec![
            (third.upload_id, LogType::Staged),
            (second.upload_id, LogType::RolledBack),
            (first.upload_id, LogType::Approved),
        ]
    );
    assert!(rows.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}
