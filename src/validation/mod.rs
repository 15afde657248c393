/// Request validation module
///
/// Field-level validators for dates, coordinates, notes and pagination.
/// Failures accumulate into a list of FieldError so the caller sees every
/// problem in one response.
use crate::error::{ApiError, ApiResult, FieldError};
use chrono::NaiveDate;

/// Maximum free-text note length in characters
pub const MAX_NOTES_LEN: usize = 500;

/// Maximum page size accepted by list endpoints
pub const MAX_PAGE_LIMIT: i64 = 100;

/// A geographic coordinate submitted with a check-in or check-out
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Validate a WGS84 coordinate pair
pub fn validate_location(location: &Location) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if !location.lat.is_finite() || location.lat < -90.0 || location.lat > 90.0 {
        errors.push(FieldError::new(
            "location.lat",
            "Latitude must be between -90 and 90",
        ));
    }

    if !location.lng.is_finite() || location.lng < -180.0 || location.lng > 180.0 {
        errors.push(FieldError::new(
            "location.lng",
            "Longitude must be between -180 and 180",
        ));
    }

    errors
}

/// Validate optional free-text notes
pub fn validate_notes(notes: Option<&str>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if let Some(text) = notes {
        let count = text.chars().count();
        if count > MAX_NOTES_LEN {
            errors.push(FieldError::new(
                "notes",
                format!(
                    "Notes exceed maximum length of {} characters: {}",
                    MAX_NOTES_LEN, count
                ),
            ));
        }
    }

    errors
}

/// Validate location and notes together, as every check-in/check-out does
pub fn validate_check_payload(location: &Location, notes: Option<&str>) -> ApiResult<()> {
    let mut errors = validate_location(location);
    errors.extend(validate_notes(notes));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Parse a `YYYY-MM-DD` date parameter
pub fn parse_date(field: &str, value: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(field, "Expected date in YYYY-MM-DD format"))
}

/// Parse an optional date parameter, passing None through
pub fn parse_optional_date(field: &str, value: Option<&str>) -> ApiResult<Option<NaiveDate>> {
    match value {
        Some(s) => parse_date(field, s).map(Some),
        None => Ok(None),
    }
}

/// Validate an inclusive date range
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> ApiResult<()> {
    if end < start {
        return Err(ApiError::invalid(
            "endDate",
            "End date must not be before start date",
        ));
    }
    Ok(())
}

/// Resolve an optional date range filter: both bounds together or neither
pub fn validate_optional_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> ApiResult<Option<(NaiveDate, NaiveDate)>> {
    match (start, end) {
        (Some(start), Some(end)) => {
            validate_date_range(start, end)?;
            Ok(Some((start, end)))
        }
        (None, None) => Ok(None),
        _ => Err(ApiError::invalid(
            "startDate",
            "startDate and endDate must be provided together",
        )),
    }
}

/// Normalized pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Validate pagination bounds: page >= 1, 1 <= limit <= 100
pub fn validate_pagination(page: Option<i64>, limit: Option<i64>) -> ApiResult<PageParams> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(10);

    let mut errors = Vec::new();
    if page < 1 {
        errors.push(FieldError::new("page", "Page must be at least 1"));
    }
    if limit < 1 || limit > MAX_PAGE_LIMIT {
        errors.push(FieldError::new(
            "limit",
            format!("Limit must be between 1 and {}", MAX_PAGE_LIMIT),
        ));
    }

    if errors.is_empty() {
        Ok(PageParams { page, limit })
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Pagination metadata attached to every list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(params: PageParams, total: i64) -> Self {
        Self {
            page: params.page,
            limit: params.limit,
            total,
            // ceil(total / limit)
            pages: (total + params.limit - 1) / params.limit,
        }
    }
}

/// Basic email shape check: one '@' with a dot in the domain part
pub fn validate_email(email: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !well_formed {
        errors.push(FieldError::new("email", "Invalid email address"));
    }

    errors
}
