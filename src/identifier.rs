//! Identifier validation and column resolution.
//!
//! Every table or column name that ends up spliced into SQL text passes
//! through [`validate_identifier`]. The resolvers pick the regulator and
//! sample columns out of a table's field list using fixed priority lists, so
//! the same schema always resolves to the same column.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, TfscopeError};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Regulator columns in order of preference.
pub const REGULATOR_IDENTIFIER_CANDIDATES: [&str; 5] = [
    "regulator",
    "tf",
    "regulator_symbol",
    "regulator_locus_tag",
    "gene_symbol",
];

/// Sample columns used when joining tables whose schemas differ.
pub const SAMPLE_IDENTIFIER_CANDIDATES: [&str; 3] = ["sample_id", "sra_accession", "id"];

/// Sample columns used when counting samples of a single table.
pub const STRICT_SAMPLE_IDENTIFIER_CANDIDATES: [&str; 2] = ["sample_id", "sra_accession"];

const FIELD_PREVIEW_LIMIT: usize = 12;

pub fn validate_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(TfscopeError::InvalidIdentifier(name.to_string()))
    }
}

/// Comma separated preview of the first few fields, for error messages.
pub fn field_preview(fields: &[String]) -> String {
    if fields.is_empty() {
        return "<none>".to_string();
    }
    fields
        .iter()
        .take(FIELD_PREVIEW_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_present(fields: &[String], candidates: &[&'static str]) -> Option<&'static str> {
    candidates
        .iter()
        .copied()
        .find(|candidate| fields.iter().any(|field| field == candidate))
}

pub fn resolve_regulator_identifier(fields: &[String], table: &str) -> Result<&'static str> {
    first_present(fields, &REGULATOR_IDENTIFIER_CANDIDATES).ok_or_else(|| {
        TfscopeError::UnresolvedRegulatorField {
            scope: format!("'{table}'"),
            detail: format!("Available fields: {}", field_preview(fields)),
        }
    })
}

pub fn resolve_sample_identifier(fields: &[String], table: &str) -> Result<&'static str> {
    resolve_sample_identifier_in(fields, table, &SAMPLE_IDENTIFIER_CANDIDATES)
}

pub fn resolve_sample_identifier_in(
    fields: &[String],
    table: &str,
    candidates: &[&'static str],
) -> Result<&'static str> {
    first_present(fields, candidates).ok_or_else(|| TfscopeError::UnresolvedSampleField {
        table: table.to_string(),
        available: field_preview(fields),
    })
}

/// Keeps both sides of a join on the same column when the other side has it.
pub fn resolve_join_sample_identifier<'a>(
    fields: &[String],
    table: &str,
    preferred: Option<&'a str>,
) -> Result<&'a str> {
    match preferred {
        Some(preferred) if fields.iter().any(|field| field == preferred) => Ok(preferred),
        _ => resolve_sample_identifier(fields, table),
    }
}
