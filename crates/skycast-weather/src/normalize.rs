//! City name folding and the special-city lookup table.
//!
//! Free-text names are folded to a canonical key (canonical decomposition,
//! combining marks stripped, lowercased, trimmed) so that "Hà Nội" and
//! "ha noi" share one state slot. The special-city table then maps a few
//! keys to the term the upstream API actually indexes.

use std::collections::HashMap;
use std::fmt;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Rendering of the device-location slot key
pub const CURRENT_LOCATION_SENTINEL: &str = "__current_location__";

const BUILTIN_SPECIAL_CITIES: &[(&str, &str)] = &[
    ("nghe an", "vinh"),
    ("ho chi minh", "Ho Chi Minh City"),
    ("hai phong", "Hai Phong"),
    ("thanh hoa", "Thanh Hoa"),
];

/// Key of one slot in the state store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CityKey {
    /// A normalized city name
    City(String),
    /// The device-location slot; never produced by [`normalize`]
    CurrentLocation,
}

impl CityKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::City(name) => name,
            Self::CurrentLocation => CURRENT_LOCATION_SENTINEL,
        }
    }

    pub fn is_current_location(&self) -> bool {
        matches!(self, Self::CurrentLocation)
    }
}

impl fmt::Display for CityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold a free-text city name into its canonical key.
///
/// Never fails; empty or whitespace-only input yields an empty key, which
/// callers must reject before fetching.
pub fn normalize(input: &str) -> CityKey {
    CityKey::City(fold(input))
}

fn fold(input: &str) -> String {
    // lowercase first: some lowercase mappings (İ -> i + U+0307) add marks
    let folded: String = input
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        // đ has no canonical decomposition
        .map(|c| if c == 'đ' { 'd' } else { c })
        .collect();
    folded.trim().to_string()
}

/// A resolved search: the slot key plus the term sent upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityQuery {
    pub key: CityKey,
    pub term: String,
}

/// Override table for cities the upstream indexes under another name.
#[derive(Debug, Clone)]
pub struct SpecialCities {
    table: HashMap<String, String>,
}

impl Default for SpecialCities {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SpecialCities {
    /// The built-in Vietnamese province table.
    pub fn builtin() -> Self {
        let table = BUILTIN_SPECIAL_CITIES
            .iter()
            .map(|(name, term)| (name.to_string(), term.to_string()))
            .collect();
        Self { table }
    }

    /// Built-in table with extra entries layered on top.
    pub fn with_overrides<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut cities = Self::builtin();
        for (name, term) in overrides {
            cities.insert(name.as_ref(), term);
        }
        cities
    }

    /// Add a mapping. The name is normalized, the term is kept verbatim.
    pub fn insert(&mut self, name: &str, term: impl Into<String>) {
        self.table.insert(fold(name), term.into());
    }

    pub fn lookup(&self, key: &CityKey) -> Option<&str> {
        match key {
            CityKey::City(name) => self.table.get(name).map(String::as_str),
            CityKey::CurrentLocation => None,
        }
    }

    /// Normalize `input` and pick the upstream query term for it.
    pub fn resolve(&self, input: &str) -> CityQuery {
        let key = normalize(input);
        let term = self
            .lookup(&key)
            .map(str::to_string)
            .unwrap_or_else(|| key.as_str().to_string());
        CityQuery { key, term }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
