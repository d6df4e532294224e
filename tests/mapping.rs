use sitesync_tools::ToolError;
use sitesync_tools::mapping::{available_reports, resolve_mapping};
use sitesync_tools::model::{FieldType, Table};

const HEADER: [&str; 6] = [
    "Report Name",
    "Primary Key?",
    "Source File Column Name",
    "Sitetracker Field Name",
    "API Name",
    "Data Type",
];

fn mapping_table() -> Table {
    Table::from_text(
        &HEADER,
        &[
            ["Apollo 10G", "NO", "Site Name", "Site_Label__c", "API_SiteName", "Text"],
            ["Apollo 10G", "YES", "ProjectRef", "Site_Name__c", "Site_Name__c", "text"],
            ["Other Report", "YES", "Ref", "Ref__c", "Ref__c", "text"],
            ["Apollo 10G", "no", "GoLiveDate", "Go_Live__c", "API_GoLive", "DATE"],
            [" Apollo 10G ", "", "Owner", "Owner__c", "API_Owner", "picklist"],
        ],
    )
}

#[test]
fn resolves_primary_key_and_preserves_row_order() {
    let mapping = resolve_mapping(&mapping_table(), "Apollo 10G").expect("mapping resolved");

    assert_eq!(mapping.report_name, "Apollo 10G");
    assert_eq!(mapping.primary_key.source, "ProjectRef");
    assert_eq!(mapping.primary_key.target, "Site_Name__c");

    let sources: Vec<&str> = mapping
        .rules
        .iter()
        .map(|rule| rule.source_column.as_str())
        .collect();
    assert_eq!(sources, ["Site Name", "ProjectRef", "GoLiveDate", "Owner"]);

    let compared: Vec<&str> = mapping
        .field_rules()
        .map(|rule| rule.api_field.as_str())
        .collect();
    assert_eq!(compared, ["API_SiteName", "API_GoLive", "API_Owner"]);

    assert_eq!(mapping.rules[0].data_type, FieldType::Text);
    assert_eq!(mapping.rules[2].data_type, FieldType::Date);
    assert_eq!(mapping.rules[3].data_type, FieldType::Other("picklist".into()));
}

#[test]
fn unknown_report_is_mapping_not_found() {
    let error = resolve_mapping(&mapping_table(), "Gemini").expect_err("no rows for report");
    assert!(matches!(error, ToolError::MappingNotFound { ref report } if report == "Gemini"));
}

#[test]
fn report_without_flagged_row_has_no_primary_key() {
    let table = Table::from_text(
        &HEADER,
        &[["Apollo 10G", "NO", "ProjectRef", "Site_Name__c", "Site_Name__c", "text"]],
    );
    let error = resolve_mapping(&table, "Apollo 10G").expect_err("no primary key");
    assert!(matches!(error, ToolError::PrimaryKeyUndefined { .. }));
}

#[test]
fn missing_key_header_is_primary_key_undefined() {
    let table = Table::from_text(
        &["Report Name", "Source File Column Name", "Sitetracker Field Name"],
        &[["Apollo 10G", "ProjectRef", "Site_Name__c"]],
    );
    let error = resolve_mapping(&table, "Apollo 10G").expect_err("header missing");
    match error {
        ToolError::PrimaryKeyUndefined { reason } => assert!(reason.contains("Primary Key?")),
        other => panic!("unexpected error: {other}"),
    }
}

fn without_header(dropped: &str) -> Table {
    let columns: Vec<&str> = HEADER.iter().copied().filter(|c| *c != dropped).collect();
    let rows: Vec<Vec<&'static str>> = [
        ["Apollo 10G", "YES", "ProjectRef", "Site_Name__c", "Site_Name__c", "text"],
        ["Apollo 10G", "NO", "GoLiveDate", "Go_Live__c", "API_GoLive", "date"],
    ]
    .iter()
    .map(|row| {
        HEADER
            .iter()
            .zip(row)
            .filter(|(header, _)| **header != dropped)
            .map(|(_, cell)| *cell)
            .collect()
    })
    .collect();
    Table::from_text(&columns, &rows)
}

#[test]
fn missing_api_name_header_is_rejected() {
    let error = resolve_mapping(&without_header("API Name"), "Apollo 10G")
        .expect_err("api name header missing");
    assert!(matches!(
        error,
        ToolError::MissingColumn { ref table, ref column }
            if table == "mapping" && column == "API Name"
    ));
}

#[test]
fn missing_data_type_header_is_rejected() {
    let error = resolve_mapping(&without_header("Data Type"), "Apollo 10G")
        .expect_err("data type header missing");
    assert!(matches!(
        error,
        ToolError::MissingColumn { ref table, ref column }
            if table == "mapping" && column == "Data Type"
    ));
}

#[test]
fn two_flagged_rows_are_rejected() {
    let table = Table::from_text(
        &HEADER,
        &[
            ["Apollo 10G", "YES", "ProjectRef", "Site_Name__c", "Site_Name__c", "text"],
            ["Apollo 10G", "Yes", "Other", "Other__c", "Other__c", "text"],
        ],
    );
    let error = resolve_mapping(&table, "Apollo 10G").expect_err("ambiguous key");
    assert!(matches!(error, ToolError::PrimaryKeyAmbiguous { count: 2, .. }));
}

#[test]
fn lists_distinct_report_names() {
    let reports = available_reports(&mapping_table()).expect("reports listed");
    assert_eq!(reports, ["Apollo 10G", "Other Report"]);
}
