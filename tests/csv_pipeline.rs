use std::io::Write;

use httpmock::{Method::POST, MockServer};

use costdrop::{
    CsvFileSource, LineItem, Operation, RecordKind, RecordSource, StreamClient, read_raw_records,
    resolve_months, split_line_items, transform_records, write_line_items,
};

fn can_bind_localhost() -> bool {
    match std::net::TcpListener::bind(("127.0.0.1", 0)) {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(err) => panic!("failed to bind localhost for httpmock tests: {err}"),
    }
}

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create temp csv");
    file.write_all(contents.as_bytes()).expect("write temp csv");
    path
}

const USAGE_CSV: &str = "\
sku,instance_id,usage_date,cost,discount,region
Compute,i-1,2024-08-01,10.00,1.50,us-ashburn-1
Compute,i-2,2024-08-01,not-a-number,0,us-ashburn-1
Storage,s-1,2024-08-02,0.00001,0,us-phoenix-1
";

const DISCOUNTS_CSV: &str = "\
discount_id,discount_type,discount,usage_date
promo-1,PromoCredit,-4.25,2024-08-03
";

#[tokio::test]
async fn csv_files_flow_through_transform_and_side_channel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let usage_path = write_file(&dir, "usage.csv", USAGE_CSV);
    let discounts_path = write_file(&dir, "discounts.csv", DISCOUNTS_CSV);

    let sources: Vec<Box<dyn RecordSource>> = vec![
        Box::new(CsvFileSource::new(&usage_path, RecordKind::Usage)),
        Box::new(CsvFileSource::new(&discounts_path, RecordKind::Discount)),
    ];

    let mut items: Vec<LineItem> = Vec::new();
    let mut skipped = 0usize;
    for source in &sources {
        let records = source.fetch().await.expect("fetch raw records");
        let outcome = transform_records(&records, source.kind());
        skipped += outcome.failures.len();
        items.extend(outcome.items);
    }

    // The malformed usage row is skipped, everything else survives in order.
    assert_eq!(skipped, 1);
    let ids: Vec<&str> = items.iter().map(|item| item.resource_id.as_str()).collect();
    assert_eq!(ids, vec!["instance-i-1", "instance-s-1", "discount-promo-1"]);
    assert_eq!(items[1].cost, "0.00001");
    assert_eq!(items[0].discounted_cost, "8.5");

    let output_path = dir.path().join("cbf_output.csv");
    let file = std::fs::File::create(&output_path).expect("create output");
    write_line_items(file, &items).expect("write cbf csv");

    let written = std::fs::read_to_string(&output_path).expect("read output back");
    let mut lines = written.lines();
    let header = lines.next().expect("header");
    assert!(header.starts_with(
        "lineitem/type,resource/service,resource/id,time/usage_start,cost/cost,cost/discounted_cost"
    ));
    assert!(header.contains("resource/region"));
    assert_eq!(lines.count(), 3);

    let rows = read_raw_records(written.as_bytes()).expect("reparse output");
    assert_eq!(
        rows[2].get("lineitem/type").map(String::as_str),
        Some("Discount")
    );
}

#[tokio::test]
async fn transformed_csv_data_uploads_once_per_month() {
    if !can_bind_localhost() {
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let usage_path = write_file(&dir, "usage.csv", USAGE_CSV);

    let source = CsvFileSource::new(&usage_path, RecordKind::Usage);
    let records = source.fetch().await.expect("fetch raw records");
    let outcome = transform_records(&records, source.kind());
    assert_eq!(outcome.items.len(), 2);

    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v2/connections/billing/anycost/conn-1/billing_drops")
                .header("authorization", "cz-key")
                .json_body_includes(r#"{"operation": "replace_drop"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"status": "accepted"}"#);
        })
        .await;

    let client = StreamClient::new("cz-key", "conn-1").with_base_url(server.base_url());
    let split = split_line_items(outcome.items, client.max_payload_bytes()).expect("split");
    assert!(split.is_clean());
    assert_eq!(split.groups.len(), 1);

    let months = resolve_months("2024-08,2024-09").expect("valid list");
    let report = client
        .upload_months(&months, Operation::ReplaceDrop, &split.groups, false)
        .await;

    assert!(report.succeeded());
    assert_eq!(report.groups_succeeded(), 2);
    assert_eq!(mock.hits_async().await, 2);
}
