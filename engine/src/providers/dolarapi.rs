//! DolarAPI: array of rates keyed by a `fuente` code.
//!
//! ```json
//! [{"fuente": "oficial", "nombre": "Oficial", "promedio": 166.58, "fechaActualizacion": "..."}]
//! ```

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::{decode, RawNumber};
use crate::error::ParseError;

pub const URL: &str = "https://ve.dolarapi.com/v1/dolares";

/// Code of the official BCV entry.
pub const OFICIAL: &str = "oficial";

/// Code of the parallel-market entry.
pub const PARALELO: &str = "paralelo";

#[derive(Debug, Deserialize)]
struct Entry {
    fuente: String,
    promedio: Option<RawNumber>,
}

/// Rate of the entry whose `fuente` equals `code`.
pub fn parse(body: &Value, code: &str) -> Result<Decimal, ParseError> {
    let entries: Vec<Entry> = decode(body)?;

    let entry = entries
        .iter()
        .find(|e| e.fuente.eq_ignore_ascii_case(code))
        .ok_or_else(|| ParseError::EntryNotFound(code.to_string()))?;

    entry
        .promedio
        .as_ref()
        .ok_or_else(|| ParseError::InvalidNumber(format!("{code}: promedio is null")))?
        .to_decimal()
}
