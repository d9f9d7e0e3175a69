//! Field normalization
//!
//! Turns a [`RawRecord`] into a [`TypedRecord`] by running every field through
//! the rule named by [`Field::rule`]. Normalization is pure: the same input
//! always produces the same record or the same [`ValidationError`].

use crate::error::ValidationError;
use crate::record::{Field, RawRecord, TypedRecord};
use bigdecimal::BigDecimal;
use std::str::FromStr;

/// Currency symbols accepted in front of a price
pub const CURRENCY_SYMBOLS: [char; 4] = ['£', '$', '€', '¥'];

/// Upper bound on stored URLs, matching the `url` column width
pub const MAX_URL_LEN: usize = 2083;

const STAR_WORDS: [(&str, u8); 6] = [
    ("zero", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
];

/// Normalize one extracted record.
///
/// Fails on the first field that is missing, unknown, or rejected by its rule.
pub fn normalize(raw: &RawRecord) -> Result<TypedRecord, ValidationError> {
    if let Some(unknown) = raw.keys().find(|key| key.parse::<Field>().is_err()) {
        return Err(ValidationError::UnexpectedField {
            field: unknown.to_string(),
        });
    }

    let fields = Fields(raw);

    Ok(TypedRecord {
        title: trim(fields.get(Field::Title)?),
        price: currency(Field::Price, fields.get(Field::Price)?)?,
        category: trim_lowercase(fields.get(Field::Category)?),
        description: fields.get(Field::Description)?.to_string(),
        upc: trim(fields.get(Field::Upc)?),
        product_type: trim_lowercase(fields.get(Field::ProductType)?),
        price_excl_tax: currency(Field::PriceExclTax, fields.get(Field::PriceExclTax)?)?,
        price_incl_tax: currency(Field::PriceInclTax, fields.get(Field::PriceInclTax)?)?,
        tax: currency(Field::Tax, fields.get(Field::Tax)?)?,
        availability: availability(fields.get(Field::Availability)?)?,
        num_reviews: count(Field::NumReviews, fields.get(Field::NumReviews)?)?,
        stars: stars(fields.get(Field::Stars)?)?,
        url: url(fields.get(Field::Url)?)?,
    })
}

struct Fields<'a>(&'a RawRecord);

impl<'a> Fields<'a> {
    fn get(&self, field: Field) -> Result<&'a str, ValidationError> {
        self.0
            .get(field)
            .ok_or(ValidationError::MissingField { field })
    }
}

fn trim(value: &str) -> String {
    value.trim().to_string()
}

fn trim_lowercase(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parse a price such as `"£51.77"` or `"51.77"` into a decimal.
pub fn currency(field: Field, value: &str) -> Result<BigDecimal, ValidationError> {
    let trimmed = value.trim();
    let amount = trimmed
        .strip_prefix(|c: char| CURRENCY_SYMBOLS.contains(&c))
        .unwrap_or(trimmed)
        .trim();

    // BigDecimal also accepts exponents; a catalog price never carries one.
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ValidationError::invalid(field, value, "not a decimal amount"));
    }

    BigDecimal::from_str(amount)
        .map_err(|e| ValidationError::invalid(field, value, format!("not a decimal amount: {}", e)))
}

/// Extract the stock count from text like `"In stock (19 available)"`.
///
/// Text without a parenthesis carries no stock information and yields 0.
pub fn availability(value: &str) -> Result<u32, ValidationError> {
    let Some((_, after_paren)) = value.trim().split_once('(') else {
        return Ok(0);
    };

    let token = after_paren.split_whitespace().next().ok_or_else(|| {
        ValidationError::invalid(Field::Availability, value, "no count after '('")
    })?;

    token.parse().map_err(|_| {
        ValidationError::invalid(
            Field::Availability,
            value,
            format!("'{}' is not a stock count", token),
        )
    })
}

/// Parse a non-negative integer count.
pub fn count(field: Field, value: &str) -> Result<u32, ValidationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ValidationError::invalid(field, value, "not a non-negative integer"))
}

/// Map `"Star rating Four"` or the class form `"star-rating Four"` to 4.
///
/// The rating word is the last whitespace-separated token and must follow
/// at least one marker token.
pub fn stars(value: &str) -> Result<u8, ValidationError> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let word = match tokens.as_slice() {
        [_, .., word] => word.to_lowercase(),
        _ => return Err(ValidationError::invalid(Field::Stars, value, "no rating word")),
    };

    STAR_WORDS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, stars)| *stars)
        .ok_or_else(|| {
            ValidationError::invalid(
                Field::Stars,
                value,
                format!("'{}' is not one of zero..five", word),
            )
        })
}

fn url(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_URL_LEN {
        return Err(ValidationError::invalid(
            Field::Url,
            value,
            format!("longer than {} characters", MAX_URL_LEN),
        ));
    }
    Ok(trimmed.to_string())
}
