//! Canonical records returned by the lookup providers.
//!
//! Every field is a string. Upstream fields that are missing stay empty, so
//! consumers never have to care which provider produced a record.

use serde::{Deserialize, Serialize};

/// Country/prefix information, as resolved by the HamNut provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Country (DXCC entity) name
    pub name: String,

    /// Matched callsign prefix
    pub prefix: String,

    /// ISO country code
    pub country_code: String,

    /// Two-letter continent designator
    pub continent: String,

    /// CQ zone, empty when unknown
    pub cq_zone: String,

    /// ITU zone, empty when unknown
    pub itu_zone: String,

    /// Primary DXCC prefix of the entity
    pub dxcc_prefix: String,

    /// UTC offset formatted as `±HH:MM`
    pub time_offset: String,
}

/// Station information, as resolved by the QRZ provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactedStation {
    /// Callsign, uppercase
    pub call: String,

    /// Operator name
    pub name: String,

    /// Mailing address on a single line
    pub address: String,

    /// City and state
    pub qth: String,

    pub country: String,

    /// Maidenhead locator, uppercase
    pub gridsquare: String,

    pub cq_zone: String,

    pub itu_zone: String,

    /// DXCC entity number
    pub dxcc: String,

    pub email: String,

    /// Previous callsign of the same operator, uppercase
    pub equivalent_call: String,

    pub web_url: String,

    pub latitude: String,

    pub longitude: String,

    /// Attention/care-of line of the mailing address
    pub contacted_operator: String,
}

/// Record returned by providers selected through the
/// [`ProviderFactory`](crate::ProviderFactory)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LookupRecord {
    Country(Country),
    Station(ContactedStation),
}

impl LookupRecord {
    /// Get the country record, if this came from a prefix lookup
    pub fn as_country(&self) -> Option<&Country> {
        match self {
            LookupRecord::Country(country) => Some(country),
            LookupRecord::Station(_) => None,
        }
    }

    /// Get the station record, if this came from a callsign lookup
    pub fn as_station(&self) -> Option<&ContactedStation> {
        match self {
            LookupRecord::Station(station) => Some(station),
            LookupRecord::Country(_) => None,
        }
    }
}

impl From<Country> for LookupRecord {
    fn from(country: Country) -> Self {
        Self::Country(country)
    }
}

impl From<ContactedStation> for LookupRecord {
    fn from(station: ContactedStation) -> Self {
        Self::Station(station)
    }
}
