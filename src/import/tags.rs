use std::collections::HashSet;

use log::info;
use sqlx::types::Json;
use sqlx::{MySqlConnection, MySqlPool, Row};

use super::error::Result;

// Tags_.tag_name is VARCHAR(100)
const MAX_TAG_LEN: usize = 100;

/// Tag names derived from an association's types, activities and categories:
/// trimmed, lowercased, first occurrence wins.
pub fn derived_tag_names(types: &[String], activities: &[String], categories: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    types
        .iter()
        .chain(activities)
        .chain(categories)
        .map(|value| value.trim().to_lowercase())
        .filter(|name| !name.is_empty() && name.chars().count() <= MAX_TAG_LEN)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Upserts the tags and attaches them. Existing attachments, manual ones
/// included, are kept.
pub async fn attach_tags(
    conn: &mut MySqlConnection,
    association_id: i64,
    names: &[String],
) -> std::result::Result<usize, sqlx::Error> {
    let mut attached = 0;
    for name in names {
        sqlx::query("INSERT IGNORE INTO Tags_ (tag_name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await?;
        let tag_id: i64 = sqlx::query_scalar("SELECT tag_id FROM Tags_ WHERE tag_name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;
        let done = sqlx::query("INSERT IGNORE INTO AssociationTagMapping_ (association_id, tag_id) VALUES (?, ?)")
            .bind(association_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
        attached += done.rows_affected() as usize;
    }
    Ok(attached)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PopulateTagsSummary {
    pub associations: usize,
    pub attached: usize,
}

/// Backfills derived tags for every live association, optionally limited to one municipality
pub async fn populate_tags(pool: &MySqlPool, municipality_id: Option<i64>) -> Result<PopulateTagsSummary> {
    let rows = sqlx::query(
        "SELECT association_id, types, activities, categories FROM Associations_
         WHERE is_deleted = FALSE AND (? IS NULL OR municipality_id = ?)
         ORDER BY association_id",
    )
    .bind(municipality_id)
    .bind(municipality_id)
    .fetch_all(pool)
    .await?;

    let mut summary = PopulateTagsSummary::default();
    for row in rows {
        let association_id: i64 = row.try_get("association_id")?;
        let types: Json<Vec<String>> = row.try_get("types")?;
        let activities: Json<Vec<String>> = row.try_get("activities")?;
        let categories: Json<Vec<String>> = row.try_get("categories")?;

        let names = derived_tag_names(&types.0, &activities.0, &categories.0);
        if names.is_empty() {
            continue;
        }

        let mut tx = pool.begin().await?;
        summary.attached += attach_tags(&mut *tx, association_id, &names).await?;
        tx.commit().await?;
        summary.associations += 1;
    }

    info!(
        "Populated tags for {} associations ({} new attachments)",
        summary.associations, summary.attached
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn tags_are_lowercased_and_deduped_across_fields() {
        let names = derived_tag_names(
            &strings(&["Idrott", " Fotboll "]),
            &strings(&["fotboll", "Ungdom"]),
            &strings(&["IDROTT", "", "Kultur"]),
        );
        assert_eq!(names, strings(&["idrott", "fotboll", "ungdom", "kultur"]));
    }

    #[test]
    fn overlong_names_are_dropped() {
        let long = "x".repeat(MAX_TAG_LEN + 1);
        let names = derived_tag_names(&[long], &strings(&["Dans"]), &[]);
        assert_eq!(names, strings(&["dans"]));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a MySQL server (DATABASE_URL)"]
    async fn populate_tags_backfills_and_keeps_manual_tags(pool: MySqlPool) -> Result<()> {
        let municipality = sqlx::query("INSERT INTO Municipalities_ (name) VALUES ('Sandviken')")
            .execute(&pool)
            .await?
            .last_insert_id();
        let association = sqlx::query(
            "INSERT INTO Associations_ (municipality_id, municipality_name, source_system, scraped_at, name, types, activities, categories)
             VALUES (?, 'Sandviken', 'IBGO', NOW(), 'Bandyklubben', ?, ?, ?)",
        )
        .bind(municipality)
        .bind(Json(strings(&["Idrott"])))
        .bind(Json(strings(&["Bandy"])))
        .bind(Json(Vec::<String>::new()))
        .execute(&pool)
        .await?
        .last_insert_id();
        let manual = sqlx::query("INSERT INTO Tags_ (tag_name) VALUES ('viktig')")
            .execute(&pool)
            .await?
            .last_insert_id();
        sqlx::query("INSERT INTO AssociationTagMapping_ (association_id, tag_id) VALUES (?, ?)")
            .bind(association)
            .bind(manual)
            .execute(&pool)
            .await?;

        let first = populate_tags(&pool, Some(municipality as i64)).await?;
        assert_eq!(first, PopulateTagsSummary { associations: 1, attached: 2 });
        let second = populate_tags(&pool, None).await?;
        assert_eq!(second.attached, 0);

        let tags: Vec<String> = sqlx::query_scalar(
            "SELECT t.tag_name FROM Tags_ t JOIN AssociationTagMapping_ m ON m.tag_id = t.tag_id ORDER BY t.tag_name",
        )
        .fetch_all(&pool)
        .await?;
        assert_eq!(tags, strings(&["bandy", "idrott", "viktig"]));
        Ok(())
    }
}
