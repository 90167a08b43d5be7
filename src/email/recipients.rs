use crate::config::SheetConfig;
use crate::email::EmailError;

use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const EMAIL_COLUMN: usize = 1;

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Reads the mailing list from a Google spreadsheet.
pub struct SheetRecipients {
    http_client: reqwest::Client,
    config: SheetConfig,
}

impl SheetRecipients {
    pub fn new(http_client: reqwest::Client, config: SheetConfig) -> Self {
        SheetRecipients {
            http_client,
            config,
        }
    }

    fn values_url(&self) -> Result<reqwest::Url, EmailError> {
        let mut url = reqwest::Url::parse(SHEETS_API)
            .map_err(|e| EmailError::Sheet(format!("invalid sheets url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| EmailError::Sheet("sheets url cannot have a path".to_string()))?
            .push(&self.config.sheet_id)
            .push("values")
            .push(&self.config.range);
        Ok(url)
    }

    pub async fn fetch(&self) -> Result<Vec<String>, EmailError> {
        let request = self
            .http_client
            .get(self.values_url()?)
            .query(&[("key", self.config.api_key.as_str())])
            .send();

        let response = tokio::time::timeout(FETCH_TIMEOUT, request)
            .await
            .map_err(|_| EmailError::Sheet("timed out reading the mailing list".to_string()))?
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| EmailError::Sheet(e.to_string()))?;

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| EmailError::Sheet(e.to_string()))?;

        let recipients = recipients_from_rows(&range.values);
        tracing::debug!("Mailing list has {} recipients", recipients.len());

        Ok(recipients)
    }
}

/// Extracts the addresses from column B, skipping the header row.
///
/// Addresses are trimmed and lower-cased, rows without an `@` are dropped and
/// duplicates keep their first position.
pub fn recipients_from_rows(rows: &[Vec<String>]) -> Vec<String> {
    let mut seen = HashSet::new();

    rows.iter()
        .skip(1)
        .filter_map(|row| row.get(EMAIL_COLUMN))
        .map(|cell| cell.trim().to_lowercase())
        .filter(|address| address.contains('@'))
        .filter(|address| seen.insert(address.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn rows_without_an_at_sign_are_dropped() {
        let rows = rows(&[
            &["Name", "Email"],
            &["name", "a@x.com"],
            &["name2", "not-an-email"],
        ]);

        assert_eq!(recipients_from_rows(&rows), vec!["a@x.com"]);
    }

    #[test]
    fn addresses_are_normalised_and_deduplicated() {
        let rows = rows(&[
            &["Name", "Email"],
            &["a", "  Alice@Example.com "],
            &["b", "bob@example.com"],
            &["a again", "alice@example.com"],
        ]);

        assert_eq!(
            recipients_from_rows(&rows),
            vec!["alice@example.com", "bob@example.com"]
        );
    }

    #[test]
    fn header_only_or_empty_sheet_has_no_recipients() {
        assert!(recipients_from_rows(&rows(&[&["Name", "Email"]])).is_empty());
        assert!(recipients_from_rows(&[]).is_empty());
    }

    #[test]
    fn short_rows_are_skipped() {
        let rows = rows(&[&["Name", "Email"], &["no email"], &["c", "c@x.com"]]);

        assert_eq!(recipients_from_rows(&rows), vec!["c@x.com"]);
    }

    #[test]
    fn missing_values_key_deserialises_as_empty() {
        let range: ValueRange = serde_json::from_str(r#"{"range": "Sheet1!A1:B1"}"#).unwrap();

        assert!(range.values.is_empty());
    }

    #[test]
    fn range_is_encoded_into_the_url_path() {
        let sheet = SheetRecipients::new(
            reqwest::Client::new(),
            SheetConfig {
                sheet_id: "abc123".to_string(),
                api_key: "key".to_string(),
                range: "Mailing List!A:B".to_string(),
            },
        );

        let url = sheet.values_url().unwrap();

        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Mailing%20List!A:B"
        );
    }
}
