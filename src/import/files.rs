use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;

use chrono::NaiveDate;
use clap::ValueEnum;
use regex::Regex;
use walkdir::WalkDir;

/// Registry platforms the scrapers pull from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSystem {
    Actor,
    Rbok,
    Ibgo,
    Fri,
}

impl SourceSystem {
    // Marker the scrapers embed in output file names
    pub fn file_marker(&self) -> &'static str {
        match self {
            SourceSystem::Actor => "_ActorSmartbook_",
            SourceSystem::Rbok => "_RBOK_",
            SourceSystem::Ibgo => "_IBGO_",
            SourceSystem::Fri => "_FRI_",
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FileSelection {
    pub selected: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// All .json / .jsonl files below `dir`, sorted. Summary files and the
/// bulk scrapers' aggregate outputs are left out.
pub fn find_fixture_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_fixture_name(path))
        .collect();
    files.sort();
    files
}

fn is_fixture_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_lowercase();
    (lower.ends_with(".json") || lower.ends_with(".jsonl"))
        && !lower.contains("summary")
        && !lower.starts_with("bulk_")
}

/// Keeps the newest file per municipality for one source system.
/// Files are named `<Municipality><marker><YYYY-MM-DD_HH-MM>...`.
pub fn select_latest_per_municipality(files: &[PathBuf], source: SourceSystem) -> FileSelection {
    let marker = source.file_marker();
    let mut latest: HashMap<String, (PathBuf, i64)> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut skipped = Vec::new();

    for path in files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(municipality) = municipality_from_file_name(name, marker) else {
            continue;
        };

        let key = municipality.to_lowercase();
        let score = timestamp_score(name).unwrap_or_else(|| modified_score(path));

        match latest.get(&key) {
            Some((_, existing)) if *existing >= score => skipped.push(path.clone()),
            Some(_) => {
                if let Some((older, _)) = latest.insert(key, (path.clone(), score)) {
                    skipped.push(older);
                }
            }
            None => {
                order.push(key.clone());
                latest.insert(key, (path.clone(), score));
            }
        }
    }

    let selected = order
        .iter()
        .filter_map(|key| latest.remove(key).map(|(path, _)| path))
        .collect();

    FileSelection { selected, skipped }
}

pub fn municipality_from_file_name<'a>(name: &'a str, marker: &str) -> Option<&'a str> {
    let index = name.find(marker)?;
    let municipality = &name[..index];
    (!municipality.is_empty()).then_some(municipality)
}

// Seconds since epoch of the `_YYYY-MM-DD_HH-MM` stamp in a file name
pub fn timestamp_score(name: &str) -> Option<i64> {
    static STAMP: OnceLock<Regex> = OnceLock::new();
    let re = STAMP.get_or_init(|| {
        Regex::new(r"_(\d{4})-(\d{2})-(\d{2})_(\d{2})-(\d{2})").expect("valid timestamp pattern")
    });
    let caps = re.captures(name)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let date = NaiveDate::from_ymd_opt(part(1)? as i32, part(2)?, part(3)?)?;
    let stamp = date.and_hms_opt(part(4)?, part(5)?, 0)?;
    Some(stamp.and_utc().timestamp())
}

fn modified_score(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(i64::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn timestamps_are_parsed_from_names() {
        let early = timestamp_score("Gävle_ActorSmartbook_2025-01-10_08-30.json").unwrap();
        let late = timestamp_score("Gävle_ActorSmartbook_2025-01-10_09-00.json").unwrap();
        assert_eq!(late - early, 30 * 60);
        assert_eq!(timestamp_score("Gävle_ActorSmartbook.json"), None);
        assert_eq!(timestamp_score("x_2025-13-40_99-99.json"), None);
    }

    #[test]
    fn municipality_is_the_prefix_before_marker() {
        assert_eq!(
            municipality_from_file_name("Söderhamn_RBOK_2025-02-01_10-00.jsonl", "_RBOK_"),
            Some("Söderhamn")
        );
        assert_eq!(municipality_from_file_name("_RBOK_x.json", "_RBOK_"), None);
        assert_eq!(municipality_from_file_name("Söderhamn_IBGO_x.json", "_RBOK_"), None);
    }

    #[test]
    fn latest_file_wins_per_municipality() {
        let files: Vec<PathBuf> = [
            "json/Gävle_ActorSmartbook_2025-01-10_08-30.json",
            "json/gävle_ActorSmartbook_2025-02-10_08-30.json",
            "json/Borås_ActorSmartbook_2025-01-01_00-00.json",
            "json/Borås_RBOK_2025-05-01_00-00.json",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        let selection = select_latest_per_municipality(&files, SourceSystem::Actor);
        assert_eq!(
            selection.selected,
            vec![
                PathBuf::from("json/gävle_ActorSmartbook_2025-02-10_08-30.json"),
                PathBuf::from("json/Borås_ActorSmartbook_2025-01-01_00-00.json"),
            ]
        );
        assert_eq!(
            selection.skipped,
            vec![PathBuf::from("json/Gävle_ActorSmartbook_2025-01-10_08-30.json")]
        );
    }

    #[test]
    fn walk_finds_nested_fixtures_and_skips_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("2025");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Gävle_RBOK_2025-01-01_00-00.jsonl"), "").unwrap();
        fs::write(dir.path().join("a.JSON"), "[]").unwrap();
        fs::write(dir.path().join("run_summary.json"), "{}").unwrap();
        fs::write(dir.path().join("bulk_all.json"), "[]").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = find_fixture_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JSON", "Gävle_RBOK_2025-01-01_00-00.jsonl"]);
    }
}
