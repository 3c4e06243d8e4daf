use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};
use url::Url;

use super::record::{DescriptionSection, ScrapedDescription, ScrapedRecord};

// Canonical association shape shared by every source system
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAssociation {
    pub source_system: String,
    pub municipality: String,
    pub scrape_run_id: Option<String>,
    pub scraped_at: NaiveDateTime,
    pub detail_url: Option<String>,
    pub name: String,
    pub org_number: Option<String>,
    pub types: Vec<String>,
    pub activities: Vec<String>,
    pub categories: Vec<String>,
    pub homepage_url: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub description: Option<Value>,
    pub description_free_text: Option<String>,
    pub sections: Vec<DescriptionSection>,
    pub list_page_index: Option<i32>,
    pub position_on_page: Option<i32>,
    pub pagination_model: Option<String>,
    pub filter_state: Option<Value>,
    pub extras: Map<String, Value>,
    pub contacts: Vec<NormalizedContact>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedContact {
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub fn normalize_record(record: &ScrapedRecord, now: NaiveDateTime) -> NormalizedAssociation {
    let assoc = &record.association;

    let detail_url = null_if_empty(assoc.detail_url.as_deref())
        .or_else(|| null_if_empty(record.detail_url.as_deref()));

    let mut extras = record.extras.clone().unwrap_or_default();
    let org_number = null_if_empty(assoc.org_number.as_deref());
    if let Some(org) = &org_number {
        if !is_plausible_org_number(org) {
            extras.insert("invalid_org_number".into(), Value::Bool(true));
        }
    }

    let (description, description_free_text, sections) = match &assoc.description {
        None => (None, None, Vec::new()),
        Some(ScrapedDescription::Text(text)) => {
            let free_text = strip_html(text);
            let value = free_text.as_ref().map(|t| json!({ "free_text": t }));
            (value, free_text, Vec::new())
        }
        Some(ScrapedDescription::Structured { free_text, sections }) => {
            let free_text = free_text.as_deref().and_then(strip_html);
            let sections: Vec<DescriptionSection> = sections
                .iter()
                .flatten()
                .filter(|s| !s.title.trim().is_empty())
                .map(|s| DescriptionSection {
                    title: s.title.trim().to_string(),
                    data: s.data.clone(),
                })
                .collect();
            let value = if free_text.is_none() && sections.is_empty() {
                None
            } else {
                Some(json!({ "free_text": free_text, "sections": sections }))
            };
            (value, free_text, sections)
        }
    };

    let nav = record.source_navigation.clone().unwrap_or_default();

    NormalizedAssociation {
        source_system: record.source_system.trim().to_string(),
        municipality: record.municipality.trim().to_string(),
        scrape_run_id: null_if_empty(record.scrape_run_id.as_deref()),
        scraped_at: record
            .scraped_at
            .as_deref()
            .and_then(parse_scraped_at)
            .unwrap_or(now),
        detail_url,
        name: assoc.name.trim().to_string(),
        org_number,
        types: clean_list(assoc.types.as_deref()),
        activities: clean_list(assoc.activities.as_deref()),
        categories: clean_list(assoc.categories.as_deref()),
        homepage_url: normalize_url(assoc.homepage_url.as_deref()),
        email: normalize_email(assoc.email.as_deref()),
        phone: normalize_phone(assoc.phone.as_deref()),
        street_address: null_if_empty(assoc.street_address.as_deref()),
        postal_code: normalize_postal_code(assoc.postal_code.as_deref()),
        city: null_if_empty(assoc.city.as_deref()),
        description,
        description_free_text,
        sections,
        list_page_index: nav.list_page_index,
        position_on_page: nav.position_on_page,
        pagination_model: null_if_empty(nav.pagination_model.as_deref()),
        filter_state: nav.filter_state.filter(|v| !v.is_null()),
        extras,
        contacts: dedupe_contacts(record),
    }
}

pub fn null_if_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn clean_list(values: Option<&[String]>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values.unwrap_or_default() {
        let value = value.trim();
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}

pub fn normalize_email(value: Option<&str>) -> Option<String> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
    let lower = null_if_empty(value)?.to_lowercase();
    re.is_match(&lower).then_some(lower)
}

// Swedish numbers become E.164-like: 0 -> +46, 00 -> +, 46 -> +46
pub fn normalize_phone(value: Option<&str>) -> Option<String> {
    let raw = null_if_empty(value)?;
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '-') && !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        return None;
    }
    let normalized = if compact.starts_with('+') {
        compact
    } else if let Some(rest) = compact.strip_prefix("00") {
        format!("+{}", rest)
    } else if let Some(rest) = compact.strip_prefix('0') {
        format!("+46{}", rest)
    } else if compact.starts_with("46") {
        format!("+{}", compact)
    } else {
        compact
    };
    Some(normalized)
}

pub fn normalize_postal_code(value: Option<&str>) -> Option<String> {
    let raw = null_if_empty(value)?;
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 5 {
        Some(format!("{} {}", &digits[..3], &digits[3..]))
    } else {
        Some(raw)
    }
}

pub fn normalize_url(value: Option<&str>) -> Option<String> {
    let raw = null_if_empty(value)?;
    let lower = raw.to_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        raw
    } else {
        format!("https://{}", raw)
    };
    let mut url = Url::parse(&candidate).ok()?;
    url.host_str()?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| {
            let key = key.to_lowercase();
            !key.starts_with("utm_") && key != "fbclid"
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    Some(url.to_string())
}

/// Ten digits passing a Luhn-style mod 10 check. A signal filter, not a
/// full validation of Swedish organisation numbers.
pub fn is_plausible_org_number(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 10 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let mut n = if i % 2 == 0 { d * 2 } else { d };
            if n > 9 {
                n -= 9;
            }
            n
        })
        .sum();
    sum % 10 == 0
}

pub fn strip_html(value: &str) -> Option<String> {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let re = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
    let stripped = re.replace_all(value, "");
    null_if_empty(Some(stripped.as_ref()))
}

pub fn parse_scraped_at(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc).naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

// Same person listed twice (case or formatting differences) is kept once
fn dedupe_contacts(record: &ScrapedRecord) -> Vec<NormalizedContact> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for contact in record.contacts.iter().flatten() {
        let Some(name) = null_if_empty(contact.contact_person_name.as_deref()) else {
            continue;
        };
        let email = normalize_email(contact.contact_person_email.as_deref());
        let phone = normalize_phone(contact.contact_person_phone.as_deref());

        let key = format!(
            "{}|{}|{}",
            name.to_lowercase(),
            email.as_deref().unwrap_or(""),
            phone.as_deref().unwrap_or("")
        );
        if !seen.insert(key) {
            continue;
        }

        out.push(NormalizedContact {
            name,
            role: null_if_empty(contact.contact_person_role.as_deref()),
            email,
            phone,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn record(raw: &str) -> ScrapedRecord {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn phone_numbers_become_international() {
        assert_eq!(normalize_phone(Some("070-123 45 67")).as_deref(), Some("+46701234567"));
        assert_eq!(normalize_phone(Some("0046 70 123")).as_deref(), Some("+4670123"));
        assert_eq!(normalize_phone(Some("46701234567")).as_deref(), Some("+46701234567"));
        assert_eq!(normalize_phone(Some("+47 (22) 12")).as_deref(), Some("+472212"));
        assert_eq!(normalize_phone(Some("  ")), None);
    }

    #[test]
    fn postal_codes_get_a_space() {
        assert_eq!(normalize_postal_code(Some("80320")).as_deref(), Some("803 20"));
        assert_eq!(normalize_postal_code(Some("803 20")).as_deref(), Some("803 20"));
        assert_eq!(normalize_postal_code(Some("SE-1234")).as_deref(), Some("SE-1234"));
    }

    #[test]
    fn emails_are_lowercased_or_dropped() {
        assert_eq!(normalize_email(Some(" Info@Klubb.SE ")).as_deref(), Some("info@klubb.se"));
        assert_eq!(normalize_email(Some("not-an-email")), None);
    }

    #[test]
    fn urls_gain_scheme_and_lose_trackers() {
        assert_eq!(
            normalize_url(Some("www.klubb.se/om?utm_source=x&id=4&fbclid=abc")).as_deref(),
            Some("https://www.klubb.se/om?id=4")
        );
        assert_eq!(
            normalize_url(Some("http://klubb.se/?utm_medium=mail")).as_deref(),
            Some("http://klubb.se/")
        );
        assert_eq!(normalize_url(Some("http://")), None);
    }

    #[test]
    fn org_number_plausibility() {
        assert!(is_plausible_org_number("802000-0009"));
        assert!(!is_plausible_org_number("802000-0001"));
        assert!(!is_plausible_org_number("12345"));
    }

    #[test]
    fn scraped_at_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(parse_scraped_at("2025-01-10T09:00:00+01:00"), Some(expected));
        assert_eq!(parse_scraped_at("2025-01-10 08:00:00"), Some(expected));
        assert_eq!(parse_scraped_at("yesterday"), None);
    }

    #[test]
    fn string_description_is_wrapped_and_stripped() {
        let normalized = normalize_record(
            &record(
                r#"{"source_system":"ActorSmartbook","municipality":" Gävle ","association":{"name":" Schack ","description":"<p>Vi spelar</p>"}}"#,
            ),
            now(),
        );
        assert_eq!(normalized.municipality, "Gävle");
        assert_eq!(normalized.name, "Schack");
        assert_eq!(normalized.description_free_text.as_deref(), Some("Vi spelar"));
        assert_eq!(normalized.description, Some(json!({"free_text": "Vi spelar"})));
        assert_eq!(normalized.scraped_at, now());
    }

    #[test]
    fn detail_url_prefers_association_level() {
        let normalized = normalize_record(
            &record(
                r#"{"source_system":"RBOK","municipality":"M","detail_url":"https://top","association":{"name":"A","detail_url":" https://inner "}}"#,
            ),
            now(),
        );
        assert_eq!(normalized.detail_url.as_deref(), Some("https://inner"));

        let normalized = normalize_record(
            &record(
                r#"{"source_system":"RBOK","municipality":"M","detail_url":"https://top","association":{"name":"A","detail_url":""}}"#,
            ),
            now(),
        );
        assert_eq!(normalized.detail_url.as_deref(), Some("https://top"));
    }

    #[test]
    fn implausible_org_number_is_flagged() {
        let normalized = normalize_record(
            &record(
                r#"{"source_system":"IBGO","municipality":"M","association":{"name":"A","org_number":"123"},"extras":{"k":1}}"#,
            ),
            now(),
        );
        assert_eq!(normalized.org_number.as_deref(), Some("123"));
        assert_eq!(normalized.extras.get("invalid_org_number"), Some(&Value::Bool(true)));
        assert_eq!(normalized.extras.get("k"), Some(&json!(1)));
    }

    #[test]
    fn contacts_are_deduplicated_and_nameless_dropped() {
        let normalized = normalize_record(
            &record(
                r#"{"source_system":"FRI","municipality":"M","association":{"name":"A"},"contacts":[
                    {"contact_person_name":"Anna Berg","contact_person_email":"ANNA@x.se","contact_person_phone":"070-1"},
                    {"contact_person_name":"anna berg","contact_person_email":"anna@x.se","contact_person_phone":"0701"},
                    {"contact_person_name":"  ","contact_person_email":"ghost@x.se"},
                    {"contact_person_name":"Per","contact_person_role":" Kassör "}
                ]}"#,
            ),
            now(),
        );
        assert_eq!(normalized.contacts.len(), 2);
        assert_eq!(normalized.contacts[0].name, "Anna Berg");
        assert_eq!(normalized.contacts[0].phone.as_deref(), Some("+46701"));
        assert_eq!(normalized.contacts[1].role.as_deref(), Some("Kassör"));
    }

    #[test]
    fn structured_description_keeps_sections() {
        let normalized = normalize_record(
            &record(
                r#"{"source_system":"RBOK","municipality":"M","association":{"name":"A","description":{"sections":[{"title":"Fakta","data":{"a":1}},{"title":" ","data":{}}]}}}"#,
            ),
            now(),
        );
        assert_eq!(normalized.sections.len(), 1);
        assert!(normalized.description_free_text.is_none());
        assert!(normalized.description.is_some());
    }
}
