//! Completeness checks for extracted records

use std::fmt;

use tracing::{debug, info};

use crate::models::{NewListing, PartialRecord};

/// A field that must be present before a listing can be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Title,
    Price,
    Location,
    Url,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Title => "title",
            Self::Price => "price",
            Self::Location => "location",
            Self::Url => "url",
        };
        f.write_str(name)
    }
}

fn is_blank(value: Option<&String>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Required fields missing from `record`, in a fixed order
pub fn missing_fields(record: &PartialRecord) -> Vec<RequiredField> {
    [
        (RequiredField::Title, &record.title),
        (RequiredField::Price, &record.price),
        (RequiredField::Location, &record.location),
        (RequiredField::Url, &record.url),
    ]
    .into_iter()
    .filter(|(_, value)| is_blank(value.as_ref()))
    .map(|(field, _)| field)
    .collect()
}

pub fn is_valid(record: &PartialRecord) -> bool {
    missing_fields(record).is_empty()
}

/// Validates records and reports rejections.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    /// Also report fragments that are missing every required field.
    /// These are usually ads or layout blocks, so they stay quiet by default.
    pub report_blank_fragments: bool,
}

impl Validator {
    pub fn new(report_blank_fragments: bool) -> Self {
        Self {
            report_blank_fragments,
        }
    }

    /// Promote a complete record to a listing ready for storage
    pub fn validate(&self, record: PartialRecord) -> Option<NewListing> {
        if is_valid(&record) {
            return into_listing(record);
        }

        let missing = missing_fields(&record);
        if missing.len() == 4 {
            if self.report_blank_fragments {
                info!("Fragment has no listing fields, skipping");
            } else {
                debug!("Skipping fragment with no listing fields");
            }
            return None;
        }

        let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
        info!(
            missing = %names.join(", "),
            title = record.title.as_deref().unwrap_or_default(),
            url = record.url.as_deref().unwrap_or_default(),
            "Invalid listing, skipping"
        );
        None
    }
}

fn into_listing(record: PartialRecord) -> Option<NewListing> {
    match record {
        PartialRecord {
            title: Some(title),
            price: Some(price),
            location: Some(location),
            url: Some(url),
            mileage,
            image,
        } => Some(NewListing {
            title: title.trim().to_string(),
            mileage,
            price,
            location,
            url,
            image,
        }),
        _ => None,
    }
}
