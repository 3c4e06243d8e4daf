use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::normalize::is_plausible_org_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Insert unseen associations, leave existing ones alone
    New,
    /// Insert unseen associations, overwrite existing ones
    #[default]
    Update,
    /// Wipe the municipality first, then insert everything
    Replace,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::New => "new",
            ImportMode::Update => "update",
            ImportMode::Replace => "replace",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "new" => Ok(ImportMode::New),
            "update" => Ok(ImportMode::Update),
            "replace" => Ok(ImportMode::Replace),
            other => Err(format!("invalid import mode: {}", other)),
        }
    }
}

/// How an existing row was matched to an incoming record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    OrgNumber,
    DetailUrl,
    NameInMunicipality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingMatch {
    pub association_id: i64,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Insert,
    Update(i64),
    Skip(i64),
}

pub fn decide(mode: ImportMode, existing: Option<ExistingMatch>) -> Decision {
    match (mode, existing) {
        (_, None) => Decision::Insert,
        (ImportMode::Update, Some(found)) => Decision::Update(found.association_id),
        // replace mode cleared the municipality, so a hit means a row from
        // another municipality shares the org number or detail url
        (ImportMode::New | ImportMode::Replace, Some(found)) => Decision::Skip(found.association_id),
    }
}

// Lookup keys in the order they are tried against the database.
// Implausible org numbers ("-", "saknas", ...) are never used as keys.
pub fn match_order(org_number: Option<&str>, detail_url: Option<&str>) -> Vec<MatchKind> {
    let mut order = Vec::with_capacity(3);
    if org_number.is_some_and(is_plausible_org_number) {
        order.push(MatchKind::OrgNumber);
    }
    if detail_url.is_some() {
        order.push(MatchKind::DetailUrl);
    }
    order.push(MatchKind::NameInMunicipality);
    order
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveAssociation {
    pub association_id: i64,
    pub detail_url: Option<String>,
    pub name: String,
}

/// Remembers what one import batch has already touched
#[derive(Debug, Default)]
pub struct BatchTracker {
    seen_detail_urls: HashSet<String>,
    processed_detail_urls: HashSet<String>,
    processed_names: HashSet<String>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a detail url for this batch; a second claim is an error
    pub fn claim_detail_url(&mut self, detail_url: Option<&str>) -> Result<(), String> {
        if let Some(url) = detail_url {
            if !self.seen_detail_urls.insert(url.to_string()) {
                return Err(format!("duplicate detail_url in import: {}", url));
            }
        }
        Ok(())
    }

    pub fn mark_processed(&mut self, detail_url: Option<&str>, name: &str) {
        if let Some(url) = detail_url {
            self.processed_detail_urls.insert(url.to_string());
        }
        self.processed_names.insert(name.to_string());
    }

    /// Live associations that this import did not mention at all
    pub fn missing_from_import(&self, live: &[LiveAssociation]) -> Vec<i64> {
        live.iter()
            .filter(|row| {
                let by_url = row
                    .detail_url
                    .as_ref()
                    .map(|url| self.processed_detail_urls.contains(url))
                    .unwrap_or(false);
                !by_url && !self.processed_names.contains(&row.name)
            })
            .map(|row| row.association_id)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounters {
    pub total_records: usize,
    pub imported_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub deleted_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl ImportCounters {
    pub fn record(&mut self, decision: Decision) {
        match decision {
            Decision::Insert => self.imported_count += 1,
            Decision::Update(_) => self.updated_count += 1,
            Decision::Skip(_) => self.skipped_count += 1,
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_count += 1;
        self.errors.push(message.into());
    }

    // Failed only when errors occurred and nothing made it into the database
    pub fn status(&self) -> BatchStatus {
        if self.error_count > 0 && self.imported_count == 0 && self.updated_count == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(id: i64) -> Option<ExistingMatch> {
        Some(ExistingMatch {
            association_id: id,
            kind: MatchKind::DetailUrl,
        })
    }

    #[test]
    fn decisions_per_mode() {
        assert_eq!(decide(ImportMode::New, None), Decision::Insert);
        assert_eq!(decide(ImportMode::Update, None), Decision::Insert);
        assert_eq!(decide(ImportMode::Replace, None), Decision::Insert);
        assert_eq!(decide(ImportMode::Update, found(7)), Decision::Update(7));
        assert_eq!(decide(ImportMode::New, found(7)), Decision::Skip(7));
        assert_eq!(decide(ImportMode::Replace, found(7)), Decision::Skip(7));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("REPLACE".parse::<ImportMode>(), Ok(ImportMode::Replace));
        assert_eq!(" new ".parse::<ImportMode>(), Ok(ImportMode::New));
        assert!("merge".parse::<ImportMode>().is_err());
        assert_eq!(ImportMode::default(), ImportMode::Update);
    }

    #[test]
    fn match_order_prefers_org_number() {
        assert_eq!(
            match_order(Some("802000-0009"), Some("https://x")),
            vec![MatchKind::OrgNumber, MatchKind::DetailUrl, MatchKind::NameInMunicipality]
        );
        assert_eq!(match_order(None, None), vec![MatchKind::NameInMunicipality]);
    }

    #[test]
    fn placeholder_org_numbers_are_not_match_keys() {
        for placeholder in ["-", "saknas", "0", "802000-0001"] {
            assert_eq!(
                match_order(Some(placeholder), Some("https://x")),
                vec![MatchKind::DetailUrl, MatchKind::NameInMunicipality],
                "{}",
                placeholder
            );
        }
    }

    #[test]
    fn duplicate_detail_url_within_batch_is_rejected() {
        let mut tracker = BatchTracker::new();
        assert!(tracker.claim_detail_url(Some("https://a")).is_ok());
        assert!(tracker.claim_detail_url(None).is_ok());
        assert!(tracker.claim_detail_url(None).is_ok());
        let err = tracker.claim_detail_url(Some("https://a")).unwrap_err();
        assert!(err.contains("https://a"));
    }

    #[test]
    fn missing_associations_are_found_by_url_or_name() {
        let mut tracker = BatchTracker::new();
        tracker.mark_processed(Some("https://a"), "Alpha");
        tracker.mark_processed(None, "Beta");

        let live = vec![
            LiveAssociation { association_id: 1, detail_url: Some("https://a".into()), name: "Renamed".into() },
            LiveAssociation { association_id: 2, detail_url: None, name: "Beta".into() },
            LiveAssociation { association_id: 3, detail_url: Some("https://c".into()), name: "Gamma".into() },
            LiveAssociation { association_id: 4, detail_url: None, name: "Delta".into() },
        ];
        assert_eq!(tracker.missing_from_import(&live), vec![3, 4]);
    }

    #[test]
    fn batch_status_from_counters() {
        let mut counters = ImportCounters::default();
        assert_eq!(counters.status(), BatchStatus::Completed);

        counters.record_error("boom");
        assert_eq!(counters.status(), BatchStatus::Failed);

        counters.record(Decision::Update(1));
        assert_eq!(counters.status(), BatchStatus::Completed);
        assert_eq!(counters.errors, vec!["boom".to_string()]);
    }
}
