use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::core::SiteEntry;

/// Reads the site list. The header row is required; `column` is matched
/// case-insensitively, and a single-column file is accepted whatever its
/// header says. Blank cells are kept so they surface as per-site failures.
pub fn read_site_list(path: &Path, column: &str) -> Result<Vec<SiteEntry>> {
    if !path.is_file() {
        return Err(anyhow!("site list not found: {}", path.display()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open site list: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read site list header: {}", path.display()))?
        .clone();
    let names: Vec<String> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let idx = match names.iter().position(|h| h.eq_ignore_ascii_case(column)) {
        Some(idx) => idx,
        None if names.len() == 1 => 0,
        None => {
            return Err(anyhow!(
                "site list {} has no '{column}' column (found: {})",
                path.display(),
                names.join(", ")
            ));
        }
    };

    let mut sites = Vec::new();
    for (i, record) in reader.byte_records().enumerate() {
        let record = record
            .with_context(|| format!("failed to parse site list: {}", path.display()))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 2);
        let raw = record.get(idx).unwrap_or(b"");
        match std::str::from_utf8(raw) {
            Ok(url) => sites.push(SiteEntry::new(line, url)),
            Err(_) => sites.push(SiteEntry::invalid(
                line,
                String::from_utf8_lossy(raw),
                format!("site URL on line {line} is not valid UTF-8"),
            )),
        }
    }
    Ok(sites)
}

/// Rejects identifiers that cannot be a SharePoint site address.
pub fn validate_site_url(url: &str) -> std::result::Result<(), String> {
    let url = url.trim();
    if url.is_empty() {
        return Err("site URL is empty".to_string());
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| format!("site URL must start with http:// or https://: {url}"))?;
    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(format!("site URL has no valid host: {url}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "migcheck-sites-test-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write");
        path
    }

    #[test]
    fn reads_named_column_in_order_with_lines() {
        let path = temp_file(
            "sites.csv",
            "Owner,SiteUrl\nalice,https://contoso.sharepoint.com/sites/hr\nbob, https://contoso.sharepoint.com/sites/it \ncarol,\n",
        );
        let sites = read_site_list(&path, "siteurl").expect("read");
        let urls: Vec<&str> = sites.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://contoso.sharepoint.com/sites/hr",
                "https://contoso.sharepoint.com/sites/it",
                "",
            ]
        );
        assert_eq!(sites[0].line, 2);
        assert_eq!(sites[2].line, 4);
        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn single_column_is_used_whatever_its_header() {
        let path = temp_file("sites.csv", "\u{feff}Url\nhttps://a.example/sites/x\n");
        let sites = read_site_list(&path, "SiteUrl").expect("read");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].url, "https://a.example/sites/x");
        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn missing_column_and_missing_file_are_errors() {
        let path = temp_file("sites.csv", "A,B\n1,2\n");
        let err = read_site_list(&path, "SiteUrl").unwrap_err();
        assert!(err.to_string().contains("found: A, B"), "err={err}");

        let missing = path.with_file_name("nope.csv");
        let err = read_site_list(&missing, "SiteUrl").unwrap_err();
        assert!(err.to_string().contains("not found"), "err={err}");
        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn undecodable_row_becomes_an_invalid_entry() {
        let path = temp_file("sites.csv", "");
        let mut bytes = b"SiteUrl\nhttps://a.example/sites/one\n".to_vec();
        bytes.extend_from_slice(b"https://a.example/sites/\xff\xfe\n");
        bytes.extend_from_slice(b"https://a.example/sites/three\n");
        std::fs::write(&path, bytes).expect("write");

        let sites = read_site_list(&path, "SiteUrl").expect("read");
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[0].problem, None);
        assert_eq!(sites[2].url, "https://a.example/sites/three");
        let problem = sites[1].problem.as_deref().expect("problem");
        assert!(problem.contains("not valid UTF-8"), "problem={problem}");
        assert!(problem.contains("line 3"), "problem={problem}");
        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn validate_site_url_accepts_http_and_https_only() {
        assert!(validate_site_url("https://contoso.sharepoint.com/sites/hr").is_ok());
        assert!(validate_site_url("http://intranet/sites/legacy").is_ok());
        assert!(validate_site_url("").is_err());
        assert!(validate_site_url("contoso.sharepoint.com").is_err());
        assert!(validate_site_url("https:///sites/x").is_err());
    }
}
