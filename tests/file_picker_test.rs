//! Export file picker: which files are offered and how their text is read.

mod common;

use std::sync::atomic::Ordering;

use portal_import::import::files::{FileOption, list_export_files, read_export_file};
use common::*;

#[tokio::test]
async fn test_lists_module_and_friendly_name_exports() {
    let portal = setup_portal();

    let options = list_export_files(&portal, PORTAL_ID, &blog_desktop(), EXPORT_FOLDER_ID)
        .await
        .unwrap();

    assert_eq!(
        options,
        vec![
            FileOption {
                file_id: 70,
                label: "2024-05-01.xml".to_string(),
            },
            FileOption {
                file_id: 71,
                label: "legacy.xml".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_unknown_or_foreign_folder_lists_nothing() {
    let portal = setup_portal();

    assert!(list_export_files(&portal, PORTAL_ID, &blog_desktop(), 999).await.unwrap().is_empty());
    assert!(list_export_files(&portal, 3, &blog_desktop(), EXPORT_FOLDER_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reads_file_text_and_closes_stream() {
    let portal = setup_portal();

    let text = read_export_file(&portal, PORTAL_ID, 70).await;

    assert_eq!(text, r#"<content type="Blog" version="1.0"><entry/></content>"#);
    assert_eq!(portal.open_streams.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_read_failure_yields_empty_text_and_closes_stream() {
    let portal = setup_portal();

    assert_eq!(read_export_file(&portal, PORTAL_ID, 71).await, "");
    assert_eq!(portal.open_streams.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_or_foreign_file_yields_empty_text() {
    let portal = setup_portal();

    assert_eq!(read_export_file(&portal, PORTAL_ID, 73).await, "");
    assert_eq!(read_export_file(&portal, PORTAL_ID, 12345).await, "");
    assert_eq!(read_export_file(&portal, 3, 70).await, "");
}
