#![cfg(unix)]

mod common;

use calamine::{Reader, open_workbook_auto};
use common::{files_in, make_temp_dir, migcheck_cmd, write_config, write_fake_pwsh, write_file};
use migcheck::core::{Record, Table};

const CLEAN_AND_DOWN: &str = r#"
case "$MIGCHECK_OPERATION" in
  probe) echo '{"available":true}' ;;
  connect)
    case "$MIGCHECK_SITE_URL" in
      *unreachable*) echo "Connect-Site : The remote server returned an error: (404)" >&2; exit 1 ;;
    esac
    echo '{"title":"Some Site"}' ;;
  check) echo '{"title":"Some Site","warnings":0,"errors":0}' ;;
esac
"#;

fn sheet_len(path: &std::path::Path, sheet: &str) -> usize {
    let mut wb = open_workbook_auto(path).expect("open workbook");
    let range = wb.worksheet_range(sheet).expect("sheet");
    range.rows().count().saturating_sub(1)
}

#[test]
fn unreachable_site_is_skipped_and_clean_sites_produce_no_reports() {
    let dir = make_temp_dir("e2e");
    let pwsh = write_fake_pwsh(&dir, CLEAN_AND_DOWN);
    let config = write_config(&dir, &pwsh);
    write_file(
        &dir.join("sites.csv"),
        b"SiteUrl\nhttps://contoso.sharepoint.com/sites/hr\nhttps://unreachable.example/sites/old\nhttps://contoso.sharepoint.com/sites/it\n",
    );

    let out = migcheck_cmd(&dir)
        .args(["--json", "--config"])
        .arg(&config)
        .arg("run")
        .output()
        .expect("run migcheck");
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v.pointer("/precheck/attempted").and_then(|n| n.as_u64()), Some(3));
    assert_eq!(v.pointer("/precheck/succeeded").and_then(|n| n.as_u64()), Some(2));
    assert_eq!(v.pointer("/precheck/failed").and_then(|n| n.as_u64()), Some(1));
    assert_eq!(
        v.pointer("/precheck/sites/1/outcome/kind").and_then(|s| s.as_str()),
        Some("connect-failed")
    );
    assert!(files_in(&dir.join("reports")).is_empty());
    assert!(v.pointer("/aggregate/output").is_none());
    assert!(!dir.join("out/Consolidated.xlsx").exists());

    let log = std::fs::read_to_string(dir.join("logs/migcheck.log")).expect("read log");
    assert!(log.contains("[ERROR]") && log.contains("unreachable.example"), "log={log}");
    assert!(!log.contains("not-a-real-secret"), "log={log}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn destination_failure_exits_before_any_site() {
    let dir = make_temp_dir("e2e");
    let calls = dir.join("calls.txt");
    let pwsh = write_fake_pwsh(
        &dir,
        &format!(
            r#"
echo "$MIGCHECK_OPERATION $MIGCHECK_SITE_URL" >> "{}"
case "$MIGCHECK_OPERATION" in
  probe) echo '{{"available":true}}' ;;
  *) echo "Connect-Site : Access denied" >&2; exit 1 ;;
esac
"#,
            calls.display()
        ),
    );
    let config = write_config(&dir, &pwsh);
    write_file(
        &dir.join("sites.csv"),
        b"SiteUrl\nhttps://contoso.sharepoint.com/sites/hr\n",
    );

    let out = migcheck_cmd(&dir)
        .args(["--quiet", "--config"])
        .arg(&config)
        .arg("run")
        .output()
        .expect("run migcheck");
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Access denied"), "stderr={stderr}");

    let calls = std::fs::read_to_string(&calls).expect("read calls");
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(
        calls,
        vec![
            "probe ",
            "connect https://contoso.sharepoint.com/sites/target"
        ]
    );
    assert!(files_in(&dir.join("reports")).is_empty());
    assert!(!dir.join("out/Consolidated.xlsx").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sites_with_issues_are_exported_and_consolidated() {
    let dir = make_temp_dir("e2e");

    let fixture = dir.join("fixture.xlsx");
    let rows: Vec<Record> = vec![
        [("Type", "User"), ("Result", "Warning"), ("Name", "alice")],
        [("Type", "Group"), ("Result", "Error"), ("Name", "Owners")],
        [("Type", "List"), ("Result", "Success"), ("Name", "Docs")],
    ]
    .into_iter()
    .map(|r| r.into_iter().collect())
    .collect();
    migcheck::sheets::write_workbook(&fixture, &[("Report", &Table { rows })])
        .expect("write fixture");

    let pwsh = write_fake_pwsh(
        &dir,
        &format!(
            r#"
case "$MIGCHECK_OPERATION" in
  probe) echo '{{"available":true}}' ;;
  connect)
    case "$MIGCHECK_SITE_URL" in
      */hr) echo '{{"title":"HR & Payroll"}}' ;;
      *) echo '{{"title":"IT"}}' ;;
    esac ;;
  check)
    case "$MIGCHECK_SITE_URL" in
      */hr)
        cp "{}" "$MIGCHECK_EXPORT_PATH"
        echo '{{"title":"HR & Payroll","warnings":1,"errors":1}}' ;;
      *) echo '{{"title":"IT","warnings":0,"errors":0}}' ;;
    esac ;;
esac
"#,
            fixture.display()
        ),
    );
    let config = write_config(&dir, &pwsh);
    write_file(
        &dir.join("sites.csv"),
        b"SiteUrl\nhttps://contoso.sharepoint.com/sites/hr\nhttps://contoso.sharepoint.com/sites/it\n",
    );

    let out = migcheck_cmd(&dir)
        .args(["--json", "--config"])
        .arg(&config)
        .arg("run")
        .output()
        .expect("run migcheck");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let reports = files_in(&dir.join("reports"));
    assert_eq!(reports.len(), 1, "reports={reports:?}");
    assert!(reports[0].starts_with("HR___Payroll_PreCheck_"), "reports={reports:?}");
    assert!(reports[0].ends_with(".xlsx"));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v.pointer("/precheck/succeeded").and_then(|n| n.as_u64()), Some(2));
    assert_eq!(
        v.pointer("/aggregate/consolidated_rows").and_then(|n| n.as_u64()),
        Some(3)
    );

    let output = dir.join("out/Consolidated.xlsx");
    assert_eq!(sheet_len(&output, "ConsolidatedData"), 3);
    assert_eq!(sheet_len(&output, "FilteredUserWarnings"), 1);
    assert_eq!(sheet_len(&output, "FilteredGroup"), 1);

    let _ = std::fs::remove_dir_all(&dir);
}
