use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{MySqlConnection, MySqlPool, Row};

use super::error::{ImportError, Result};
use super::normalize::{normalize_record, NormalizedAssociation, NormalizedContact};
use super::parse::ParsedImportFile;
use super::reconcile::{
    decide, match_order, BatchStatus, BatchTracker, Decision, ExistingMatch, ImportCounters,
    ImportMode, LiveAssociation, MatchKind,
};
use super::record::DescriptionSection;
use super::tags::{attach_tags, derived_tag_names};
use crate::models::activity::Activity;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub mode: ImportMode,
    pub municipality_id: Option<i64>,
    pub remove_missing: bool,
    pub create_missing_municipality: bool,
    pub register_scrape_runs: bool,
    pub actor_id: String,
    pub actor_name: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            mode: ImportMode::Update,
            municipality_id: None,
            remove_missing: false,
            create_missing_municipality: true,
            register_scrape_runs: false,
            actor_id: "system".into(),
            actor_name: "System".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub municipality_id: i64,
    pub municipality_name: String,
    pub import_batch_id: i64,
    pub status: BatchStatus,
    #[serde(flatten)]
    pub counters: ImportCounters,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportCheck {
    pub has_data: bool,
    pub count: i64,
    pub municipality_name: String,
    pub municipality_id: Option<i64>,
}

pub async fn import_associations(
    pool: &MySqlPool,
    files: &[ParsedImportFile],
    options: &ImportOptions,
) -> Result<ImportResult> {
    if files.is_empty() {
        return Err(ImportError::NoFiles);
    }
    let total_records: usize = files.iter().map(|f| f.records.len()).sum();
    if total_records == 0 {
        return Err(ImportError::NoRecords);
    }

    let (municipality_id, municipality_name) = resolve_municipality(pool, files, options).await?;
    info!(
        "Importing {} records from {} file(s) into {} (mode {})",
        total_records,
        files.len(),
        municipality_name,
        options.mode
    );

    let now = Utc::now().naive_utc();
    let normalized: Vec<NormalizedAssociation> = files
        .iter()
        .flat_map(|f| f.records.iter())
        .map(|record| {
            let mut assoc = normalize_record(record, now);
            assoc.municipality = municipality_name.clone();
            assoc
        })
        .collect();

    let file_names = files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ");
    let batch = sqlx::query(
        "INSERT INTO ImportBatches_ (municipality_id, file_name, file_count, import_mode, status, imported_by, imported_by_name)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(municipality_id)
    .bind(&file_names)
    .bind(files.len() as i32)
    .bind(options.mode.as_str())
    .bind(BatchStatus::Processing.as_str())
    .bind(&options.actor_id)
    .bind(&options.actor_name)
    .execute(pool)
    .await?;
    let import_batch_id = batch.last_insert_id() as i64;

    let mut counters = ImportCounters {
        total_records,
        ..Default::default()
    };

    let run = run_batch(
        pool,
        &normalized,
        municipality_id,
        &municipality_name,
        import_batch_id,
        options,
        &mut counters,
    )
    .await;
    let closed = match run {
        Ok(()) => close_batch(pool, import_batch_id, counters.status(), &counters).await,
        Err(e) => Err(e),
    };

    // A batch never stays `processing`: any batch-level error marks it failed
    if let Err(e) = closed {
        error!("Import batch {} failed: {}", import_batch_id, e);
        counters.record_error(e.to_string());
        if let Err(close_err) = close_batch(pool, import_batch_id, BatchStatus::Failed, &counters).await {
            error!("Failed to mark import batch {} as failed: {}", import_batch_id, close_err);
        }
        return Err(e);
    }

    let status = counters.status();
    info!(
        "Import batch {} {}: {} imported, {} updated, {} skipped, {} deleted, {} errors",
        import_batch_id,
        status.as_str(),
        counters.imported_count,
        counters.updated_count,
        counters.skipped_count,
        counters.deleted_count,
        counters.error_count
    );

    Ok(ImportResult {
        municipality_id,
        municipality_name,
        import_batch_id,
        status,
        counters,
    })
}

async fn run_batch(
    pool: &MySqlPool,
    normalized: &[NormalizedAssociation],
    municipality_id: i64,
    municipality_name: &str,
    import_batch_id: i64,
    options: &ImportOptions,
    counters: &mut ImportCounters,
) -> Result<()> {
    // Registered before the replace wipe so a failure here leaves existing data alone
    if options.register_scrape_runs {
        register_scrape_runs(pool, municipality_id, normalized).await?;
    }

    if options.mode == ImportMode::Replace {
        let deleted = sqlx::query("DELETE FROM Associations_ WHERE municipality_id = ?")
            .bind(municipality_id)
            .execute(pool)
            .await?;
        info!(
            "Replace mode removed {} associations from {}",
            deleted.rows_affected(),
            municipality_name
        );
    }

    let mut tracker = BatchTracker::new();
    let mut scrape_runs: HashMap<String, Option<String>> = HashMap::new();

    for assoc in normalized {
        if let Err(message) = tracker.claim_detail_url(assoc.detail_url.as_deref()) {
            warn!("Skipping {}: {}", assoc.name, message);
            counters.record_error(message);
            continue;
        }

        let outcome = import_one(
            pool,
            assoc,
            municipality_id,
            import_batch_id,
            options,
            &mut scrape_runs,
        )
        .await;

        match outcome {
            Ok(decision) => {
                counters.record(decision);
                tracker.mark_processed(assoc.detail_url.as_deref(), &assoc.name);
            }
            Err(e) => {
                warn!("Failed to import association {}: {}", assoc.name, e);
                counters.record_error(format!("{}: {}", assoc.name, e));
            }
        }
    }

    if options.mode == ImportMode::Update && options.remove_missing {
        counters.deleted_count = soft_delete_missing(pool, municipality_id, &tracker).await?;
    }
    Ok(())
}

async fn close_batch(
    pool: &MySqlPool,
    import_batch_id: i64,
    status: BatchStatus,
    counters: &ImportCounters,
) -> Result<()> {
    let errors = if counters.errors.is_empty() {
        None
    } else {
        Some(Json(&counters.errors))
    };
    sqlx::query(
        "UPDATE ImportBatches_
         SET status = ?, total_records = ?, imported_count = ?, updated_count = ?, skipped_count = ?,
             deleted_count = ?, error_count = ?, errors = ?, completed_at = ?
         WHERE import_batch_id = ?",
    )
    .bind(status.as_str())
    .bind(counters.total_records as i32)
    .bind(counters.imported_count as i32)
    .bind(counters.updated_count as i32)
    .bind(counters.skipped_count as i32)
    .bind(counters.deleted_count as i32)
    .bind(counters.error_count as i32)
    .bind(errors)
    .bind(Utc::now().naive_utc())
    .bind(import_batch_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Which municipality a file targets and whether it already has data
pub async fn check_import_file(pool: &MySqlPool, file: &ParsedImportFile) -> Result<ImportCheck> {
    let name = file
        .records
        .first()
        .map(|r| r.municipality.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or(ImportError::MissingMunicipality)?;

    let found = find_municipality_by_name(pool, &name).await?;
    let Some((municipality_id, municipality_name)) = found else {
        return Ok(ImportCheck {
            has_data: false,
            count: 0,
            municipality_name: name,
            municipality_id: None,
        });
    };

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Associations_ WHERE municipality_id = ?")
        .bind(municipality_id)
        .fetch_one(pool)
        .await?;

    Ok(ImportCheck {
        has_data: count > 0,
        count,
        municipality_name,
        municipality_id: Some(municipality_id),
    })
}

async fn resolve_municipality(
    pool: &MySqlPool,
    files: &[ParsedImportFile],
    options: &ImportOptions,
) -> Result<(i64, String)> {
    let mut names: Vec<String> = Vec::new();
    for file in files {
        for name in file.municipality_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    if names.len() > 1 {
        return Err(ImportError::MixedMunicipalities(names.join(", ")));
    }

    if let Some(id) = options.municipality_id {
        let row = sqlx::query("SELECT name FROM Municipalities_ WHERE municipality_id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        return match row {
            Some(row) => Ok((id, row.try_get("name")?)),
            None => Err(ImportError::UnknownMunicipalityId(id)),
        };
    }

    let name = names.pop().ok_or(ImportError::MissingMunicipality)?;
    if let Some(found) = find_municipality_by_name(pool, &name).await? {
        return Ok(found);
    }
    if !options.create_missing_municipality {
        return Err(ImportError::UnknownMunicipality(name));
    }

    let created = sqlx::query("INSERT INTO Municipalities_ (name) VALUES (?)")
        .bind(&name)
        .execute(pool)
        .await?;
    info!("Created municipality {}", name);
    Ok((created.last_insert_id() as i64, name))
}

async fn find_municipality_by_name(pool: &MySqlPool, name: &str) -> Result<Option<(i64, String)>> {
    let row = sqlx::query("SELECT municipality_id, name FROM Municipalities_ WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(Some((row.try_get("municipality_id")?, row.try_get("name")?))),
        None => Ok(None),
    }
}

// Scraper files carry their own run ids; make sure a ScrapeRuns_ row exists for each
async fn register_scrape_runs(
    pool: &MySqlPool,
    municipality_id: i64,
    records: &[NormalizedAssociation],
) -> Result<()> {
    let mut runs: HashMap<&str, (NaiveDateTime, i32)> = HashMap::new();
    for record in records {
        if let Some(run_id) = record.scrape_run_id.as_deref() {
            let entry = runs.entry(run_id).or_insert((record.scraped_at, 0));
            entry.0 = entry.0.min(record.scraped_at);
            entry.1 += 1;
        }
    }

    for (run_id, (started_at, total_found)) in runs {
        let result = sqlx::query(
            "INSERT IGNORE INTO ScrapeRuns_ (scrape_run_id, municipality_id, status, started_at, completed_at, total_found, total_processed)
             VALUES (?, ?, 'completed', ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(municipality_id)
        .bind(started_at)
        .bind(started_at)
        .bind(total_found)
        .bind(total_found)
        .execute(pool)
        .await?;
        if result.rows_affected() > 0 {
            info!("Registered scrape run {} ({} records)", run_id, total_found);
        }
    }
    Ok(())
}

async fn import_one(
    pool: &MySqlPool,
    assoc: &NormalizedAssociation,
    municipality_id: i64,
    import_batch_id: i64,
    options: &ImportOptions,
    scrape_runs: &mut HashMap<String, Option<String>>,
) -> std::result::Result<Decision, sqlx::Error> {
    let scrape_run_id = match assoc.scrape_run_id.as_deref() {
        None => None,
        Some(run_id) => match scrape_runs.get(run_id) {
            Some(resolved) => resolved.clone(),
            None => {
                let resolved: Option<String> =
                    sqlx::query_scalar("SELECT scrape_run_id FROM ScrapeRuns_ WHERE scrape_run_id = ?")
                        .bind(run_id)
                        .fetch_optional(pool)
                        .await?;
                scrape_runs.insert(run_id.to_string(), resolved.clone());
                resolved
            }
        },
    };

    let mut tx = pool.begin().await?;

    let existing = find_existing(&mut *tx, assoc, municipality_id).await?;
    let decision = decide(options.mode, existing);

    let association_id = match decision {
        Decision::Skip(_) => {
            tx.rollback().await?;
            return Ok(decision);
        }
        Decision::Insert => {
            insert_association(&mut *tx, assoc, municipality_id, import_batch_id, scrape_run_id.as_deref()).await?
        }
        Decision::Update(id) => {
            update_association(&mut *tx, id, assoc, municipality_id, import_batch_id, scrape_run_id.as_deref())
                .await?;
            id
        }
    };

    replace_contacts(&mut *tx, association_id, &assoc.contacts).await?;
    replace_sections(&mut *tx, association_id, &assoc.sections).await?;
    let tag_names = derived_tag_names(&assoc.types, &assoc.activities, &assoc.categories);
    attach_tags(&mut *tx, association_id, &tag_names).await?;

    let (activity_type, description) = match decision {
        Decision::Update(_) => ("IMPORT_UPDATED", format!("Updated from import batch {}", import_batch_id)),
        _ => ("IMPORT_CREATED", format!("Created from import batch {}", import_batch_id)),
    };
    Activity::record(&mut *tx, association_id, activity_type, &description, &options.actor_name).await?;

    tx.commit().await?;
    Ok(decision)
}

async fn find_existing(
    conn: &mut MySqlConnection,
    assoc: &NormalizedAssociation,
    municipality_id: i64,
) -> std::result::Result<Option<ExistingMatch>, sqlx::Error> {
    for kind in match_order(assoc.org_number.as_deref(), assoc.detail_url.as_deref()) {
        let found: Option<i64> = match kind {
            MatchKind::OrgNumber => {
                sqlx::query_scalar("SELECT association_id FROM Associations_ WHERE org_number = ? ORDER BY association_id LIMIT 1")
                    .bind(&assoc.org_number)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            MatchKind::DetailUrl => {
                sqlx::query_scalar("SELECT association_id FROM Associations_ WHERE detail_url = ?")
                    .bind(&assoc.detail_url)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            MatchKind::NameInMunicipality => {
                sqlx::query_scalar(
                    "SELECT association_id FROM Associations_ WHERE municipality_id = ? AND name = ? ORDER BY association_id LIMIT 1",
                )
                .bind(municipality_id)
                .bind(&assoc.name)
                .fetch_optional(&mut *conn)
                .await?
            }
        };
        if let Some(association_id) = found {
            return Ok(Some(ExistingMatch { association_id, kind }));
        }
    }
    Ok(None)
}

async fn insert_association(
    conn: &mut MySqlConnection,
    assoc: &NormalizedAssociation,
    municipality_id: i64,
    import_batch_id: i64,
    scrape_run_id: Option<&str>,
) -> std::result::Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO Associations_ (
            municipality_id, municipality_name, import_batch_id, scrape_run_id, source_system, scraped_at,
            detail_url, name, org_number, types, activities, categories, homepage_url, email, phone,
            street_address, postal_code, city, description, description_free_text, list_page_index,
            position_on_page, pagination_model, filter_state, extras
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(municipality_id)
    .bind(&assoc.municipality)
    .bind(import_batch_id)
    .bind(scrape_run_id)
    .bind(&assoc.source_system)
    .bind(assoc.scraped_at)
    .bind(&assoc.detail_url)
    .bind(&assoc.name)
    .bind(&assoc.org_number)
    .bind(Json(&assoc.types))
    .bind(Json(&assoc.activities))
    .bind(Json(&assoc.categories))
    .bind(&assoc.homepage_url)
    .bind(&assoc.email)
    .bind(&assoc.phone)
    .bind(&assoc.street_address)
    .bind(&assoc.postal_code)
    .bind(&assoc.city)
    .bind(assoc.description.as_ref().map(Json))
    .bind(&assoc.description_free_text)
    .bind(assoc.list_page_index)
    .bind(assoc.position_on_page)
    .bind(&assoc.pagination_model)
    .bind(assoc.filter_state.as_ref().map(Json))
    .bind(Json(&assoc.extras))
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_id() as i64)
}

// Updating also revives a soft-deleted row
async fn update_association(
    conn: &mut MySqlConnection,
    association_id: i64,
    assoc: &NormalizedAssociation,
    municipality_id: i64,
    import_batch_id: i64,
    scrape_run_id: Option<&str>,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE Associations_ SET
            municipality_id = ?, municipality_name = ?, import_batch_id = ?, scrape_run_id = ?,
            source_system = ?, scraped_at = ?, detail_url = ?, name = ?, org_number = ?, types = ?,
            activities = ?, categories = ?, homepage_url = ?, email = ?, phone = ?, street_address = ?,
            postal_code = ?, city = ?, description = ?, description_free_text = ?, list_page_index = ?,
            position_on_page = ?, pagination_model = ?, filter_state = ?, extras = ?,
            is_deleted = FALSE, deleted_at = NULL
         WHERE association_id = ?",
    )
    .bind(municipality_id)
    .bind(&assoc.municipality)
    .bind(import_batch_id)
    .bind(scrape_run_id)
    .bind(&assoc.source_system)
    .bind(assoc.scraped_at)
    .bind(&assoc.detail_url)
    .bind(&assoc.name)
    .bind(&assoc.org_number)
    .bind(Json(&assoc.types))
    .bind(Json(&assoc.activities))
    .bind(Json(&assoc.categories))
    .bind(&assoc.homepage_url)
    .bind(&assoc.email)
    .bind(&assoc.phone)
    .bind(&assoc.street_address)
    .bind(&assoc.postal_code)
    .bind(&assoc.city)
    .bind(assoc.description.as_ref().map(Json))
    .bind(&assoc.description_free_text)
    .bind(assoc.list_page_index)
    .bind(assoc.position_on_page)
    .bind(&assoc.pagination_model)
    .bind(assoc.filter_state.as_ref().map(Json))
    .bind(Json(&assoc.extras))
    .bind(association_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// The scrape is the source of truth for contacts; first one listed is primary
async fn replace_contacts(
    conn: &mut MySqlConnection,
    association_id: i64,
    contacts: &[NormalizedContact],
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM Contacts_ WHERE association_id = ?")
        .bind(association_id)
        .execute(&mut *conn)
        .await?;

    for (index, contact) in contacts.iter().enumerate() {
        sqlx::query(
            "INSERT INTO Contacts_ (association_id, name, role, email, phone, is_primary) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(association_id)
        .bind(&contact.name)
        .bind(&contact.role)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(index == 0)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn replace_sections(
    conn: &mut MySqlConnection,
    association_id: i64,
    sections: &[DescriptionSection],
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM DescriptionSections_ WHERE association_id = ?")
        .bind(association_id)
        .execute(&mut *conn)
        .await?;

    for (index, section) in sections.iter().enumerate() {
        sqlx::query("INSERT INTO DescriptionSections_ (association_id, title, data, order_index) VALUES (?, ?, ?, ?)")
            .bind(association_id)
            .bind(&section.title)
            .bind(Json(&section.data))
            .bind(index as i32)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn soft_delete_missing(
    pool: &MySqlPool,
    municipality_id: i64,
    tracker: &BatchTracker,
) -> Result<usize> {
    let rows = sqlx::query(
        "SELECT association_id, detail_url, name FROM Associations_ WHERE municipality_id = ? AND is_deleted = FALSE",
    )
    .bind(municipality_id)
    .fetch_all(pool)
    .await?;

    let mut live = Vec::with_capacity(rows.len());
    for row in rows {
        live.push(LiveAssociation {
            association_id: row.try_get("association_id")?,
            detail_url: row.try_get("detail_url")?,
            name: row.try_get("name")?,
        });
    }

    let missing = tracker.missing_from_import(&live);
    let now = Utc::now().naive_utc();
    for association_id in &missing {
        sqlx::query("UPDATE Associations_ SET is_deleted = TRUE, deleted_at = ? WHERE association_id = ?")
            .bind(now)
            .bind(association_id)
            .execute(pool)
            .await?;
    }
    if !missing.is_empty() {
        info!("Soft-deleted {} associations missing from the import", missing.len());
    }
    Ok(missing.len())
}

// These need a MySQL server; `sqlx::test` creates a scratch database per test
// from DATABASE_URL and applies ./migrations.
// Run with: DATABASE_URL=mysql://... cargo test -- --ignored
#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::parse::parse_import_file;

    const MUNICIPALITY: &str = "Gävle";

    fn line(name: &str, detail_url: &str, extra: &str) -> String {
        format!(
            r#"{{"source_system":"RBOK","municipality":"{}","association":{{"name":"{}","detail_url":"{}"{}}}}}"#,
            MUNICIPALITY, name, detail_url, extra
        )
    }

    fn jsonl(lines: &[String]) -> Vec<ParsedImportFile> {
        vec![parse_import_file("Gävle_RBOK.jsonl", &lines.join("\n")).unwrap()]
    }

    fn options(mode: ImportMode) -> ImportOptions {
        ImportOptions {
            mode,
            ..Default::default()
        }
    }

    async fn live_count(pool: &MySqlPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM Associations_ WHERE is_deleted = FALSE")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn modes_insert_update_and_skip(pool: MySqlPool) -> Result<()> {
        let first = jsonl(&[line("Ridklubben", "https://rbok/1", ""), line("Skyttarna", "https://rbok/2", "")]);
        let created = import_associations(&pool, &first, &options(ImportMode::New)).await?;
        assert_eq!(created.counters.imported_count, 2);
        assert_eq!(created.status, BatchStatus::Completed);

        let again = import_associations(&pool, &first, &options(ImportMode::New)).await?;
        assert_eq!(again.counters.imported_count, 0);
        assert_eq!(again.counters.skipped_count, 2);

        let renamed = jsonl(&[line("Ridklubben Gävle", "https://rbok/1", "")]);
        let updated = import_associations(&pool, &renamed, &options(ImportMode::Update)).await?;
        assert_eq!(updated.counters.updated_count, 1);
        let name: String = sqlx::query_scalar("SELECT name FROM Associations_ WHERE detail_url = ?")
            .bind("https://rbok/1")
            .fetch_one(&pool)
            .await?;
        assert_eq!(name, "Ridklubben Gävle");
        assert_eq!(live_count(&pool).await, 2);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn first_listed_contact_is_primary(pool: MySqlPool) -> Result<()> {
        let record = format!(
            r#"{{"source_system":"FRI","municipality":"{}","association":{{"name":"Bridgeklubben"}},"contacts":[{{"contact_person_name":"Anna"}},{{"contact_person_name":"Per"}}]}}"#,
            MUNICIPALITY
        );
        import_associations(&pool, &jsonl(&[record]), &options(ImportMode::New)).await?;

        let primaries: Vec<(String, bool)> =
            sqlx::query_as("SELECT name, is_primary FROM Contacts_ ORDER BY contact_id")
                .fetch_all(&pool)
                .await?;
        assert_eq!(primaries, vec![("Anna".to_string(), true), ("Per".to_string(), false)]);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn update_revives_soft_deleted_association(pool: MySqlPool) -> Result<()> {
        let files = jsonl(&[line("Schackklubben", "https://rbok/9", "")]);
        import_associations(&pool, &files, &options(ImportMode::New)).await?;
        sqlx::query("UPDATE Associations_ SET is_deleted = TRUE, deleted_at = NOW()")
            .execute(&pool)
            .await?;

        let result = import_associations(&pool, &files, &options(ImportMode::Update)).await?;
        assert_eq!(result.counters.updated_count, 1);
        let revived: (bool, Option<NaiveDateTime>) =
            sqlx::query_as("SELECT is_deleted, deleted_at FROM Associations_ WHERE detail_url = ?")
                .bind("https://rbok/9")
                .fetch_one(&pool)
                .await?;
        assert_eq!(revived, (false, None));
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn remove_missing_soft_deletes_absent_rows(pool: MySqlPool) -> Result<()> {
        let both = jsonl(&[line("Kören", "https://rbok/1", ""), line("Orkestern", "https://rbok/2", "")]);
        import_associations(&pool, &both, &options(ImportMode::New)).await?;

        let only_first = jsonl(&[line("Kören", "https://rbok/1", "")]);
        let opts = ImportOptions {
            remove_missing: true,
            ..options(ImportMode::Update)
        };
        let result = import_associations(&pool, &only_first, &opts).await?;
        assert_eq!(result.counters.deleted_count, 1);

        let deleted: bool = sqlx::query_scalar("SELECT is_deleted FROM Associations_ WHERE name = 'Orkestern'")
            .fetch_one(&pool)
            .await?;
        assert!(deleted);
        assert_eq!(live_count(&pool).await, 1);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn replace_wipes_the_municipality_first(pool: MySqlPool) -> Result<()> {
        let old = jsonl(&[line("Gamla", "https://rbok/1", ""), line("Äldre", "https://rbok/2", "")]);
        import_associations(&pool, &old, &options(ImportMode::New)).await?;

        let fresh = jsonl(&[line("Nya", "https://rbok/3", "")]);
        let result = import_associations(&pool, &fresh, &options(ImportMode::Replace)).await?;
        assert_eq!(result.counters.imported_count, 1);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Associations_").fetch_one(&pool).await?;
        assert_eq!(total, 1);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn duplicate_detail_url_in_one_batch_is_an_error(pool: MySqlPool) -> Result<()> {
        let files = jsonl(&[line("Första", "https://rbok/1", ""), line("Andra", "https://rbok/1", "")]);
        let result = import_associations(&pool, &files, &options(ImportMode::New)).await?;
        assert_eq!(result.counters.imported_count, 1);
        assert_eq!(result.counters.error_count, 1);
        assert_eq!(result.status, BatchStatus::Completed);
        assert_eq!(live_count(&pool).await, 1);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn failing_record_rolls_back_alone(pool: MySqlPool) -> Result<()> {
        // Contacts_.role is VARCHAR(120); the contact insert fails after the association row was written
        let broken = format!(
            r#"{{"source_system":"FRI","municipality":"{}","association":{{"name":"Trasig","detail_url":"https://rbok/bad"}},"contacts":[{{"contact_person_name":"Anna","contact_person_role":"{}"}}]}}"#,
            MUNICIPALITY,
            "x".repeat(200)
        );
        let files = jsonl(&[line("Hel", "https://rbok/ok", ""), broken]);
        let result = import_associations(&pool, &files, &options(ImportMode::New)).await?;
        assert_eq!(result.counters.imported_count, 1);
        assert_eq!(result.counters.error_count, 1);
        assert!(result.counters.errors[0].starts_with("Trasig"));

        let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Associations_ WHERE name = 'Trasig'")
            .fetch_one(&pool)
            .await?;
        assert_eq!(leftover, 0);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn placeholder_org_number_does_not_merge_associations(pool: MySqlPool) -> Result<()> {
        let files = jsonl(&[
            line("Fotboll", "https://rbok/1", r#","org_number":"-""#),
            line("Handboll", "https://rbok/2", r#","org_number":"-""#),
        ]);
        let result = import_associations(&pool, &files, &options(ImportMode::Update)).await?;
        assert_eq!(result.counters.imported_count, 2);
        assert_eq!(result.counters.updated_count, 0);
        assert_eq!(live_count(&pool).await, 2);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn derived_tags_are_attached(pool: MySqlPool) -> Result<()> {
        let files = jsonl(&[line(
            "Idrottsföreningen",
            "https://rbok/1",
            r#","types":["Idrott"],"activities":["Fotboll","idrott"]"#,
        )]);
        import_associations(&pool, &files, &options(ImportMode::New)).await?;

        let tags: Vec<String> = sqlx::query_scalar(
            "SELECT t.tag_name FROM Tags_ t JOIN AssociationTagMapping_ m ON m.tag_id = t.tag_id ORDER BY t.tag_name",
        )
        .fetch_all(&pool)
        .await?;
        assert_eq!(tags, vec!["fotboll".to_string(), "idrott".to_string()]);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn unknown_municipality_is_rejected_when_creation_is_off(pool: MySqlPool) {
        let opts = ImportOptions {
            create_missing_municipality: false,
            ..options(ImportMode::New)
        };
        let err = import_associations(&pool, &jsonl(&[line("A", "https://rbok/1", "")]), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::UnknownMunicipality(ref name) if name == MUNICIPALITY));
        assert!(err.is_client_error());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn batch_level_failure_marks_batch_failed_and_keeps_data(pool: MySqlPool) -> Result<()> {
        import_associations(&pool, &jsonl(&[line("Kvar", "https://rbok/1", "")]), &options(ImportMode::New)).await?;

        // ScrapeRuns_.scrape_run_id is VARCHAR(64), so registering this run fails
        let record = format!(
            r#"{{"source_system":"RBOK","municipality":"{}","scrape_run_id":"{}","association":{{"name":"Ny"}}}}"#,
            MUNICIPALITY,
            "r".repeat(80)
        );
        let opts = ImportOptions {
            register_scrape_runs: true,
            ..options(ImportMode::Replace)
        };
        assert!(import_associations(&pool, &jsonl(&[record]), &opts).await.is_err());

        let statuses: Vec<String> = sqlx::query_scalar("SELECT status FROM ImportBatches_ ORDER BY import_batch_id")
            .fetch_all(&pool)
            .await?;
        assert_eq!(statuses, vec!["completed".to_string(), "failed".to_string()]);
        assert_eq!(live_count(&pool).await, 1);
        Ok(())
    }
}
