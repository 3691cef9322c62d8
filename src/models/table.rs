use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_PER_PAGE: usize = 100;

const INVALID_PAGINATION: &str = "page and per_page must be positive integers.";

/// Raw pagination query parameters, validated by [`PageRequest::from_params`].
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    /// `Ok(None)` means no pagination was asked for and the whole table is returned.
    pub fn from_params(
        page: Option<&str>,
        per_page: Option<&str>,
    ) -> Result<Option<Self>, AppError> {
        if page.is_none() && per_page.is_none() {
            return Ok(None);
        }
        let page = parse_positive(page, 1)?;
        let per_page = parse_positive(per_page, DEFAULT_PER_PAGE)?;
        Ok(Some(Self { page, per_page }))
    }

    /// Half-open row range of this page, clamped to `total`.
    pub fn bounds(&self, total: usize) -> (usize, usize) {
        let start = (self.page - 1).saturating_mul(self.per_page).min(total);
        let end = start.saturating_add(self.per_page).min(total);
        (start, end)
    }
}

fn parse_positive(raw: Option<&str>, default: usize) -> Result<usize, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(AppError::Validation(INVALID_PAGINATION.to_string())),
    }
}

/// One CSV record. Serialized as a JSON object keeping header order; missing
/// cells are `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<(String, Option<String>)>,
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Page {
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub columns: Vec<String>,
    pub data: Vec<Row>,
}
