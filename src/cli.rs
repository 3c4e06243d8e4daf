use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use sqlx::MySqlPool;

use crate::config::Config;
use crate::import::files::{find_fixture_files, select_latest_per_municipality, SourceSystem};
use crate::import::tags::populate_tags;
use crate::import::{
    check_import_file, import_associations, parse_import_file, ImportError, ImportMode, ImportOptions,
    ParsedImportFile,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Municipal association CRM backend and importer.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Import scraped association files from a directory.
    Import(ImportArgs),
    /// Show which municipality a file targets and whether it already has data.
    Check {
        /// JSON or JSONL file to inspect.
        file: PathBuf,
    },
    /// Attach tags derived from types, activities and categories to existing associations.
    PopulateTags {
        /// Limit to one municipality.
        #[arg(long = "municipality-id")]
        municipality_id: Option<i64>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SourceArg {
    Actor,
    Rbok,
    Ibgo,
    Fri,
    All,
}

impl SourceArg {
    fn system(self) -> Option<SourceSystem> {
        match self {
            SourceArg::Actor => Some(SourceSystem::Actor),
            SourceArg::Rbok => Some(SourceSystem::Rbok),
            SourceArg::Ibgo => Some(SourceSystem::Ibgo),
            SourceArg::Fri => Some(SourceSystem::Fri),
            SourceArg::All => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Directory holding the scraped files. Defaults to SCRAPING_JSON_DIR.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// new, update or replace.
    #[arg(long, default_value = "update")]
    pub mode: ImportMode,

    /// Only the newest file per municipality for this platform; `all` imports every file.
    #[arg(long, value_enum, default_value = "all")]
    pub source: SourceArg,

    /// Import everything into this municipality instead of the one named in the files.
    #[arg(long = "municipality-id")]
    pub municipality_id: Option<i64>,

    /// Soft-delete associations that are missing from the files (update mode).
    #[arg(long = "remove-missing", action = ArgAction::SetTrue)]
    pub remove_missing: bool,

    /// Fail instead of creating municipalities that are not in the database yet.
    #[arg(long = "no-create-municipality", action = ArgAction::SetTrue)]
    pub no_create_municipality: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub municipality: String,
    pub status: String,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub errors: usize,
}

/// Files grouped by the single municipality they name
fn group_by_municipality(files: Vec<ParsedImportFile>) -> BTreeMap<String, Vec<ParsedImportFile>> {
    let mut groups: BTreeMap<String, Vec<ParsedImportFile>> = BTreeMap::new();
    for file in files {
        let names = file.municipality_names();
        match names.as_slice() {
            [] => warn!("Skipping {}: no municipality in file", file.name),
            [name] => groups.entry(name.clone()).or_default().push(file),
            _ => warn!("Skipping {}: several municipalities ({})", file.name, names.join(", ")),
        }
    }
    groups
}

fn read_files(paths: &[PathBuf]) -> Vec<ParsedImportFile> {
    let mut parsed = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        match parse_import_file(&name, &content) {
            Ok(file) if file.records.is_empty() => warn!("Skipping {}: no records", name),
            Ok(file) => parsed.push(file),
            Err(e) => warn!("Skipping {}", e),
        }
    }
    parsed
}

pub fn format_summary(rows: &[SummaryRow]) -> String {
    let width = rows
        .iter()
        .map(|row| row.municipality.chars().count())
        .max()
        .unwrap_or(0)
        .max("Municipality".len());

    let mut out = format!(
        "{:<width$}  {:<10} {:>8} {:>8} {:>8} {:>8} {:>7}\n",
        "Municipality", "Status", "Imported", "Updated", "Skipped", "Deleted", "Errors"
    );
    for row in rows {
        out.push_str(&format!(
            "{:<width$}  {:<10} {:>8} {:>8} {:>8} {:>8} {:>7}\n",
            row.municipality, row.status, row.imported, row.updated, row.skipped, row.deleted, row.errors
        ));
    }
    out
}

/// Returns how many municipalities failed to import
pub async fn run_import(pool: &MySqlPool, config: &Config, args: &ImportArgs) -> Result<usize, ImportError> {
    let dir = args.dir.clone().unwrap_or_else(|| config.scraping_json_dir.clone());
    if !dir.is_dir() {
        return Err(ImportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )));
    }

    let discovered = find_fixture_files(&dir);
    let paths = match args.source.system() {
        Some(system) => {
            let selection = select_latest_per_municipality(&discovered, system);
            for older in &selection.skipped {
                info!("Ignoring older file {}", older.display());
            }
            selection.selected
        }
        None => discovered,
    };
    info!("Found {} file(s) to import in {}", paths.len(), dir.display());
    if paths.is_empty() {
        return Err(ImportError::NoFiles);
    }

    let files = read_files(&paths);
    let groups = match args.municipality_id {
        Some(id) => BTreeMap::from([(format!("#{}", id), files)]),
        None => group_by_municipality(files),
    };

    let mut rows = Vec::new();
    let mut failed = 0;
    for (municipality, files) in &groups {
        let options = ImportOptions {
            mode: args.mode,
            municipality_id: args.municipality_id,
            remove_missing: args.remove_missing || config.remove_on_update,
            create_missing_municipality: !args.no_create_municipality,
            register_scrape_runs: true,
            ..ImportOptions::default()
        };

        match import_associations(pool, files, &options).await {
            Ok(result) => rows.push(SummaryRow {
                municipality: result.municipality_name,
                status: result.status.as_str().to_string(),
                imported: result.counters.imported_count,
                updated: result.counters.updated_count,
                skipped: result.counters.skipped_count,
                deleted: result.counters.deleted_count,
                errors: result.counters.error_count,
            }),
            Err(e) => {
                error!("Import of {} failed: {}", municipality, e);
                failed += 1;
                rows.push(SummaryRow {
                    municipality: municipality.clone(),
                    status: "error".into(),
                    imported: 0,
                    updated: 0,
                    skipped: 0,
                    deleted: 0,
                    errors: 1,
                });
            }
        }
    }

    print!("{}", format_summary(&rows));
    Ok(failed)
}

pub async fn run_check(pool: &MySqlPool, path: &Path) -> Result<(), ImportError> {
    let content = std::fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file = parse_import_file(&name, &content)?;
    let check = check_import_file(pool, &file).await?;
    match serde_json::to_string_pretty(&check) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to render check result: {}", e),
    }
    Ok(())
}

pub async fn run_populate_tags(pool: &MySqlPool, municipality_id: Option<i64>) -> Result<(), ImportError> {
    let summary = populate_tags(pool, municipality_id).await?;
    println!(
        "Tagged {} associations, {} new tag attachments",
        summary.associations, summary.attached
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn file(name: &str, municipalities: &[&str]) -> ParsedImportFile {
        let records: Vec<String> = municipalities
            .iter()
            .map(|m| {
                format!(
                    r#"{{"source_system":"RBOK","municipality":"{}","association":{{"name":"Förening {}"}}}}"#,
                    m, m
                )
            })
            .collect();
        parse_import_file(name, &format!("[{}]", records.join(","))).unwrap()
    }

    #[test]
    fn files_naming_several_municipalities_are_skipped() {
        let groups = group_by_municipality(vec![
            file("a.json", &["Gävle"]),
            file("b.json", &["Gävle", "Sandviken"]),
            file("c.json", &["Sandviken"]),
            file("d.json", &["Gävle"]),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["Gävle"].len(), 2);
        assert_eq!(groups["Sandviken"].len(), 1);
    }

    #[test]
    fn cli_parses_import_arguments() {
        let cli = Cli::try_parse_from([
            "municipal_crm",
            "import",
            "--dir",
            "fixtures",
            "--mode",
            "new",
            "--source",
            "rbok",
            "--remove-missing",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Import(args)) => {
                assert_eq!(args.mode, ImportMode::New);
                assert_eq!(args.source, SourceArg::Rbok);
                assert!(args.remove_missing);
                assert_eq!(args.dir, Some(PathBuf::from("fixtures")));
                assert!(!args.no_create_municipality);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn municipality_creation_can_be_disabled() {
        let cli = Cli::try_parse_from(["municipal_crm", "import", "--no-create-municipality"]).unwrap();
        match cli.command {
            Some(Command::Import(args)) => assert!(args.no_create_municipality),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn populate_tags_takes_an_optional_municipality() {
        let cli = Cli::try_parse_from(["municipal_crm", "populate-tags", "--municipality-id", "7"]).unwrap();
        match cli.command {
            Some(Command::PopulateTags { municipality_id }) => assert_eq!(municipality_id, Some(7)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["municipal_crm"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn summary_lines_up_columns() {
        let table = format_summary(&[SummaryRow {
            municipality: "Gävle".into(),
            status: "completed".into(),
            imported: 12,
            updated: 3,
            skipped: 0,
            deleted: 1,
            errors: 0,
        }]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Municipality"));
        assert!(lines[1].starts_with("Gävle"));
        assert!(lines[1].contains("completed"));
    }

    #[test]
    fn unreadable_and_empty_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("Gävle_RBOK_2025-01-10_08-30.json");
        let empty = dir.path().join("Empty_RBOK_2025-01-10_08-30.json");
        let broken = dir.path().join("Broken_RBOK_2025-01-10_08-30.json");
        fs::write(
            &good,
            r#"[{"source_system":"RBOK","municipality":"Gävle","association":{"name":"IK Sätra"}}]"#,
        )
        .unwrap();
        fs::write(&empty, "").unwrap();
        fs::write(&broken, "[{").unwrap();

        let parsed = read_files(&[good, empty, broken, dir.path().join("missing.json")]);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].records.len(), 1);
    }
}
