//! Page requests and the serialized result envelope

use crate::settings::SearchSettings;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Upper bound of `page_size` when no settings are involved.
pub const MAX_PAGE_SIZE: u64 = 100;

/// A validated `(page, page_size)` pair. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Validate against the built-in limits (`page >= 1`, `1 <= page_size <= 100`).
    pub fn new(page: u64, page_size: u64) -> Result<Self> {
        Self::checked(page, page_size, MAX_PAGE_SIZE)
    }

    /// Build a page request from raw boundary parameters.
    ///
    /// Missing values fall back to page 1 and the configured default page size.
    pub fn from_params(
        page: Option<i64>,
        page_size: Option<i64>,
        settings: &SearchSettings,
    ) -> Result<Self> {
        let page = match page {
            None => 1,
            Some(p) => u64::try_from(p).map_err(|_| {
                Error::Validation(format!("Parameter \"page\" must be at least 1 (got {p})."))
            })?,
        };
        let page_size = match page_size {
            None => settings.default_page_size,
            Some(s) => u64::try_from(s).map_err(|_| {
                Error::Validation(format!(
                    "Parameter \"pageSize\" must be between 1 and {} (got {s}).",
                    settings.max_page_size
                ))
            })?,
        };
        Self::checked(page, page_size, settings.max_page_size)
    }

    fn checked(page: u64, page_size: u64, max_page_size: u64) -> Result<Self> {
        if page < 1 {
            return Err(Error::Validation(format!(
                "Parameter \"page\" must be at least 1 (got {page})."
            )));
        }
        if page_size < 1 || page_size > max_page_size {
            return Err(Error::Validation(format!(
                "Parameter \"pageSize\" must be between 1 and {max_page_size} (got {page_size})."
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of rows to skip. Saturates instead of overflowing.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of serialized search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage<T> {
    pub query: String,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn offsets() {
        assert_eq!(PageRequest::new(1, 100).unwrap().offset(), 0);
        assert_eq!(PageRequest::new(2, 100).unwrap().offset(), 100);
        assert_eq!(PageRequest::new(3, 7).unwrap().offset(), 14);
        assert_eq!(PageRequest::new(u64::MAX, 100).unwrap().offset(), u64::MAX);
    }

    #[test]
    fn new_enforces_limits() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, 101).is_err());
        assert!(PageRequest::new(1, 100).is_ok());
    }

    #[test]
    fn from_params_applies_defaults_and_settings() {
        let settings = SearchSettings {
            default_page_size: 25,
            max_page_size: 50,
        };
        let req = PageRequest::from_params(None, None, &settings).unwrap();
        assert_eq!((req.page(), req.page_size()), (1, 25));

        let req = PageRequest::from_params(Some(4), Some(50), &settings).unwrap();
        assert_eq!((req.page(), req.page_size()), (4, 50));

        let invalid = [
            (Some(0), None),
            (Some(-3), None),
            (None, Some(51)),
            (None, Some(-1)),
        ];
        for (page, size) in invalid {
            let err = PageRequest::from_params(page, size, &settings).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{page:?} {size:?}");
        }
    }

    #[test]
    fn envelope_uses_camel_case_keys() {
        let page = SearchPage {
            query: "sort:name".to_string(),
            page: 2,
            page_size: 10,
            total: 11,
            results: vec![json!({"name": "k"})],
        };
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({
                "query": "sort:name",
                "page": 2,
                "pageSize": 10,
                "total": 11,
                "results": [{"name": "k"}],
            })
        );
    }
}
