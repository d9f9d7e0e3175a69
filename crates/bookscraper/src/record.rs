//! Catalog record representations
//!
//! A [`RawRecord`] is what the extractor hands over: every attribute as the
//! text found on the product page. A [`TypedRecord`] is the normalized form
//! that gets persisted. [`Field`] names the thirteen attributes and maps each
//! one to the [`Rule`] that turns its raw text into a typed value.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One extracted product attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Price,
    Category,
    Description,
    Upc,
    ProductType,
    PriceExclTax,
    PriceInclTax,
    Tax,
    Availability,
    NumReviews,
    Stars,
    Url,
}

impl Field {
    /// Every field, in column order
    pub const ALL: [Field; 13] = [
        Field::Title,
        Field::Price,
        Field::Category,
        Field::Description,
        Field::Upc,
        Field::ProductType,
        Field::PriceExclTax,
        Field::PriceInclTax,
        Field::Tax,
        Field::Availability,
        Field::NumReviews,
        Field::Stars,
        Field::Url,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Price => "price",
            Field::Category => "category",
            Field::Description => "description",
            Field::Upc => "upc",
            Field::ProductType => "product_type",
            Field::PriceExclTax => "price_excl_tax",
            Field::PriceInclTax => "price_incl_tax",
            Field::Tax => "tax",
            Field::Availability => "availability",
            Field::NumReviews => "num_reviews",
            Field::Stars => "stars",
            Field::Url => "url",
        }
    }

    /// The normalization rule applied to this field.
    pub fn rule(self) -> Rule {
        match self {
            Field::Title | Field::Upc => Rule::Trim,
            Field::Category | Field::ProductType => Rule::TrimLowercase,
            Field::Description => Rule::Verbatim,
            Field::Price | Field::PriceExclTax | Field::PriceInclTax | Field::Tax => {
                Rule::Currency
            },
            Field::Availability => Rule::Availability,
            Field::NumReviews => Rule::Count,
            Field::Stars => Rule::Stars,
            Field::Url => Rule::Url,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// A field name outside the thirteen known attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

/// Per-field transformation from raw text to a typed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Strip surrounding whitespace
    Trim,
    /// Strip surrounding whitespace, then lowercase
    TrimLowercase,
    /// Keep the text exactly as extracted
    Verbatim,
    /// Strip a currency symbol prefix and parse a decimal amount
    Currency,
    /// Pull the "(N available)" stock count out of free text
    Availability,
    /// Parse a non-negative integer
    Count,
    /// Map "Star rating <word>" to 0..=5
    Stars,
    /// Strip surrounding whitespace and enforce the URL column bound
    Url,
}

impl Rule {
    pub fn as_str(self) -> &'static str {
        match self {
            Rule::Trim => "trim",
            Rule::TrimLowercase => "trim_lowercase",
            Rule::Verbatim => "verbatim",
            Rule::Currency => "currency",
            Rule::Availability => "availability",
            Rule::Count => "count",
            Rule::Stars => "stars",
            Rule::Url => "url",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted product attributes, all still text, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(BTreeMap<String, String>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Set a field, returning the record for chaining.
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.0.insert(field.as_str().to_string(), value.into());
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(field.as_str()).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A normalized catalog item, ready for the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedRecord {
    pub title: String,
    pub price: BigDecimal,
    pub category: String,
    pub description: String,
    pub upc: String,
    pub product_type: String,
    pub price_excl_tax: BigDecimal,
    pub price_incl_tax: BigDecimal,
    pub tax: BigDecimal,
    pub availability: u32,
    pub num_reviews: u32,
    pub stars: u8,
    pub url: String,
}
