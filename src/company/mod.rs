//! Company candidates found through the business-registry search API.

pub mod fields;
mod search;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::geo::Coordinates;

pub use search::{CompanyDirectory, DEFAULT_SEARCH_URL, MAX_PER_PAGE, SearchClient, SearchQuery};

#[cfg(test)]
pub use search::MockCompanyDirectory;

/// Distance given to candidates whose address could not be geocoded, so they
/// sort after every located candidate.
pub const UNRESOLVED_DISTANCE_KM: f64 = 1e9;

/// 9-digit French company registration identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Siren(String);

impl Siren {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Siren {
    type Err = anyhow::Error;

    /// Strips every non-digit character; what remains must be exactly 9 digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() != 9 {
            bail!("Invalid SIREN {:?}: expected 9 digits", s);
        }
        Ok(Siren(digits))
    }
}

impl TryFrom<String> for Siren {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Siren> for String {
    fn from(siren: Siren) -> Self {
        siren.0
    }
}

impl fmt::Display for Siren {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub siren: Siren,
    pub name: String,
    pub address: String,
    pub locality: String,
    /// Text sent to the geocoder (the address, or name + postcode + locality)
    pub query_address: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default = "unresolved")]
    pub distance_km: f64,
}

fn unresolved() -> f64 {
    UNRESOLVED_DISTANCE_KM
}

impl Company {
    /// Reads one raw search hit. Returns `None` when the identifier does not reduce
    /// to exactly 9 digits.
    pub fn from_search_hit(hit: &Value, postcode: &str) -> Option<Self> {
        let siren: Siren = fields::SIREN.text(hit)?.parse().ok()?;
        let name = fields::NAME.text(hit).unwrap_or_default();
        let address = fields::ADDRESS.text(hit).unwrap_or_default();
        let locality = fields::LOCALITY.text(hit).unwrap_or_default();

        let query_address = if address.is_empty() {
            [name.as_str(), postcode, locality.as_str()]
                .iter()
                .filter(|part| !part.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            address.clone()
        };

        Some(Self {
            siren,
            name,
            address,
            locality,
            query_address,
            coordinates: None,
            distance_km: UNRESOLVED_DISTANCE_KM,
        })
    }

    pub fn is_located(&self) -> bool {
        self.coordinates.is_some()
    }

    pub fn as_selected(&self) -> SelectedCompany {
        SelectedCompany {
            siren: self.siren.clone(),
            name: self.name.clone(),
        }
    }
}

/// What the statements pipeline needs to know about a chosen company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedCompany {
    pub siren: Siren,
    pub name: String,
}

/// Normalizes a NAF activity code: `5610A` and `56.10a` both become `56.10A`.
/// Unrecognised shapes are passed through upper-cased.
pub fn normalize_naf(code: &str) -> String {
    let code = code.trim().to_uppercase();
    let chars: Vec<char> = code.chars().collect();

    let dotted = chars.len() == 6
        && chars[..2].iter().all(char::is_ascii_digit)
        && chars[2] == '.'
        && chars[3..5].iter().all(char::is_ascii_digit)
        && chars[5].is_ascii_uppercase();
    if dotted {
        return code;
    }

    let compact = chars.len() == 5
        && chars[..4].iter().all(char::is_ascii_digit)
        && chars[4].is_ascii_uppercase();
    if compact {
        return format!("{}.{}", &code[..2], &code[2..]);
    }

    code
}
