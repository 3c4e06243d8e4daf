use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct DefaultResponse {
    pub success: bool,
    pub message: String,
}

impl DefaultResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        DefaultResponse { success: true, message: message.into() }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        DefaultResponse { success: false, message: message.into() }
    }
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub id: i64,
}

#[derive(Serialize)]
pub struct ListResponse<T: Serialize> {
    pub items: Vec<T>,
}

#[derive(Serialize)]
pub struct PagedResponse<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Deserialize)]
pub struct AssociationScope {
    pub association_id: i64,
}

// Clamp paging input; returns (page, page_size, offset)
pub fn paging(page: Option<u32>, page_size: Option<u32>, default_size: u32, max_size: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = match page_size {
        Some(0) | None => default_size,
        Some(size) => size.min(max_size),
    };
    let offset = u64::from(page - 1).saturating_mul(u64::from(page_size));
    (page, page_size, offset)
}

// Trimmed, empty-as-none
pub fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_limits() {
        assert_eq!(paging(None, None, 20, 100), (1, 20, 0));
        assert_eq!(paging(Some(0), Some(0), 20, 100), (1, 20, 0));
        assert_eq!(paging(Some(3), Some(500), 20, 100), (3, 100, 200));
        assert_eq!(paging(Some(2), Some(10), 20, 100), (2, 10, 10));
    }

    #[test]
    fn huge_page_number_does_not_overflow() {
        let (page, size, offset) = paging(Some(u32::MAX), Some(100), 20, 100);
        assert_eq!(page, u32::MAX);
        assert_eq!(size, 100);
        assert_eq!(offset, u64::from(u32::MAX - 1) * 100);
    }

    #[test]
    fn clean_drops_blank_strings() {
        assert_eq!(clean(&Some("  x ".into())), Some("x".into()));
        assert_eq!(clean(&Some("   ".into())), None);
        assert_eq!(clean(&None), None);
    }
}
