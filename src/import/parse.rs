use serde_json::Value;

use super::error::{ImportError, Result};
use super::record::ScrapedRecord;

#[derive(Debug, Clone)]
pub struct ParsedImportFile {
    pub name: String,
    pub records: Vec<ScrapedRecord>,
}

impl ParsedImportFile {
    /// Distinct, trimmed municipality names in file order
    pub fn municipality_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for record in &self.records {
            let name = record.municipality.trim().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

// .jsonl files hold one object per line; anything else is an array or a single object
pub fn parse_import_file(name: &str, content: &str) -> Result<ParsedImportFile> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(ParsedImportFile {
            name: name.to_string(),
            records: Vec::new(),
        });
    }

    let mut raw: Vec<(String, Value)> = Vec::new();

    if name.to_lowercase().ends_with(".jsonl") {
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let location = format!("line {}", index + 1);
            let value = serde_json::from_str(line).map_err(|source| ImportError::Json {
                file: name.to_string(),
                location: location.clone(),
                source,
            })?;
            raw.push((location, value));
        }
    } else {
        let value: Value = serde_json::from_str(trimmed).map_err(|source| ImportError::Json {
            file: name.to_string(),
            location: "document".into(),
            source,
        })?;
        match value {
            Value::Array(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    raw.push((format!("element {}", index + 1), item));
                }
            }
            other => raw.push(("element 1".into(), other)),
        }
    }

    let mut records = Vec::with_capacity(raw.len());
    for (location, value) in raw {
        let record: ScrapedRecord =
            serde_json::from_value(value).map_err(|source| ImportError::Json {
                file: name.to_string(),
                location: location.clone(),
                source,
            })?;
        record.validate().map_err(|reason| ImportError::InvalidRecord {
            file: name.to_string(),
            location,
            reason,
        })?;
        records.push(record);
    }

    Ok(ParsedImportFile {
        name: name.to_string(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD_A: &str = r#"{"source_system":"RBOK","municipality":"Söderhamn","association":{"name":"Ridklubben"}}"#;
    const RECORD_B: &str = r#"{"source_system":"RBOK","municipality":"Söderhamn","association":{"name":"Skytteföreningen"}}"#;

    #[test]
    fn empty_content_yields_no_records() {
        let parsed = parse_import_file("empty.json", "   \n").unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn jsonl_skips_blank_lines() {
        let content = format!("{}\n\n{}\n", RECORD_A, RECORD_B);
        let parsed = parse_import_file("Söderhamn_RBOK.JSONL", &content).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].association.name, "Skytteföreningen");
    }

    #[test]
    fn json_accepts_array_and_single_object() {
        let array = format!("[{},{}]", RECORD_A, RECORD_B);
        assert_eq!(parse_import_file("a.json", &array).unwrap().records.len(), 2);
        assert_eq!(parse_import_file("b.json", RECORD_A).unwrap().records.len(), 1);
    }

    #[test]
    fn bad_jsonl_line_reports_line_number() {
        let content = format!("{}\n{{not json\n", RECORD_A);
        let err = parse_import_file("broken.jsonl", &content).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("broken.jsonl"));
        assert!(message.contains("line 2"));
    }

    #[test]
    fn leading_blank_lines_count_towards_line_numbers() {
        let content = format!("\n\n{}\n{{broken\n", RECORD_A);
        let err = parse_import_file("x.jsonl", &content).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 4"), "{}", message);
    }

    #[test]
    fn blank_source_system_is_accepted() {
        let content = r#"[{"source_system":"","municipality":"Ockelbo","association":{"name":"Bygdegården"}}]"#;
        let parsed = parse_import_file("x.json", content).unwrap();
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn blank_municipality_is_rejected() {
        let content = r#"[{"source_system":"IBGO","municipality":" ","association":{"name":"X"}}]"#;
        let err = parse_import_file("x.json", content).unwrap_err();
        assert!(matches!(err, ImportError::InvalidRecord { .. }));
    }

    #[test]
    fn municipality_names_are_distinct_and_trimmed() {
        let content = r#"[
            {"source_system":"FRI","municipality":"Askersund ","association":{"name":"A"}},
            {"source_system":"FRI","municipality":"Askersund","association":{"name":"B"}}
        ]"#;
        let parsed = parse_import_file("x.json", content).unwrap();
        assert_eq!(parsed.municipality_names(), vec!["Askersund".to_string()]);
    }
}
