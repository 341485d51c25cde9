//! Core data model: sales [`Record`]s and the in-memory [`DataSet`] handed to the engine.
//!
//! Optional columns are modeled with [`FieldValue`], which keeps "missing" and "present but not
//! parseable" apart. Neither state is an error; operations decide per row whether a record is
//! eligible.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

/// Date layouts accepted by [`FieldValue::parse_date`], tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];

/// A single cell of a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    /// Parsed value.
    Present(T),
    /// Empty / absent cell.
    Missing,
    /// The raw text could not be parsed into `T`.
    Invalid(String),
}

impl<T> Default for FieldValue<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<T> FieldValue<T> {
    /// Returns the parsed value, if any.
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl<T: Copy> FieldValue<T> {
    /// Returns a copy of the parsed value, if any.
    pub fn value(&self) -> Option<T> {
        self.get().copied()
    }
}

impl FieldValue<String> {
    /// Trimmed text; empty input is [`FieldValue::Missing`].
    pub fn parse_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Missing
        } else {
            Self::Present(trimmed.to_owned())
        }
    }
}

impl FieldValue<f64> {
    /// Lenient numeric parse: empty is missing, anything `f64` rejects is invalid.
    pub fn parse_number(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Present(v),
            _ => Self::Invalid(raw.to_owned()),
        }
    }
}

impl FieldValue<NaiveDate> {
    /// Lenient date parse over the supported layouts.
    pub fn parse_date(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
            .map(Self::Present)
            .unwrap_or_else(|| Self::Invalid(raw.to_owned()))
    }
}

/// Untyped row as it appears in a sales CSV, before lenient parsing.
///
/// Column names follow the sales export headers. Absent columns deserialize as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Item Type")]
    pub item_type: String,
    #[serde(rename = "Order Date")]
    pub order_date: String,
    #[serde(rename = "Units Sold")]
    pub units_sold: String,
    #[serde(rename = "Unit Price")]
    pub unit_price: String,
    #[serde(rename = "Unit Cost")]
    pub unit_cost: String,
    #[serde(rename = "Total Revenue")]
    pub total_revenue: String,
    #[serde(rename = "Total Profit")]
    pub total_profit: String,
}

/// One sales transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub country: FieldValue<String>,
    pub region: FieldValue<String>,
    pub item_type: FieldValue<String>,
    pub order_date: FieldValue<NaiveDate>,
    pub units_sold: FieldValue<f64>,
    pub unit_price: FieldValue<f64>,
    pub unit_cost: FieldValue<f64>,
    pub total_revenue: FieldValue<f64>,
    pub total_profit: FieldValue<f64>,
}

impl Record {
    /// Create a record with the two columns required for profit aggregation.
    pub fn new(country: impl Into<String>, total_profit: f64) -> Self {
        Self {
            country: FieldValue::Present(country.into()),
            total_profit: FieldValue::Present(total_profit),
            ..Self::default()
        }
    }

    /// Parse every column of `raw` leniently.
    pub fn parse(raw: &RawRecord) -> Self {
        Self {
            country: FieldValue::parse_text(&raw.country),
            region: FieldValue::parse_text(&raw.region),
            item_type: FieldValue::parse_text(&raw.item_type),
            order_date: FieldValue::parse_date(&raw.order_date),
            units_sold: FieldValue::parse_number(&raw.units_sold),
            unit_price: FieldValue::parse_number(&raw.unit_price),
            unit_cost: FieldValue::parse_number(&raw.unit_cost),
            total_revenue: FieldValue::parse_number(&raw.total_revenue),
            total_profit: FieldValue::parse_number(&raw.total_profit),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = FieldValue::Present(region.into());
        self
    }

    pub fn with_item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = FieldValue::Present(item_type.into());
        self
    }

    pub fn with_order_date(mut self, date: NaiveDate) -> Self {
        self.order_date = FieldValue::Present(date);
        self
    }

    pub fn with_units_sold(mut self, units: f64) -> Self {
        self.units_sold = FieldValue::Present(units);
        self
    }

    pub fn with_unit_price(mut self, price: f64) -> Self {
        self.unit_price = FieldValue::Present(price);
        self
    }

    pub fn with_unit_cost(mut self, cost: f64) -> Self {
        self.unit_cost = FieldValue::Present(cost);
        self
    }

    pub fn with_total_revenue(mut self, revenue: f64) -> Self {
        self.total_revenue = FieldValue::Present(revenue);
        self
    }

    /// Trimmed country name and total profit, when both are present.
    ///
    /// Records without either are ineligible for profit aggregation.
    pub fn profit_key(&self) -> Option<(&str, f64)> {
        let country = self.country.get()?.trim();
        let profit = self.total_profit.value()?;
        Some((country, profit))
    }

    /// Calendar year of the order date, if the date parsed.
    pub fn order_year(&self) -> Option<i32> {
        self.order_date.get().map(|d| d.year())
    }
}

/// In-memory, ordered collection of [`Record`]s.
///
/// Insertion order is preserved; it determines chunk boundaries. Operations never mutate a
/// dataset, they return new values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    pub records: Vec<Record>,
}

impl DataSet {
    /// Create a dataset from records.
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

}

impl FromIterator<Record> for DataSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{DataSet, FieldValue, RawRecord, Record};
    use chrono::NaiveDate;

    #[test]
    fn parse_number_distinguishes_missing_and_invalid() {
        assert_eq!(FieldValue::parse_number(" 12.5 "), FieldValue::Present(12.5));
        assert_eq!(FieldValue::parse_number("   "), FieldValue::Missing);
        assert_eq!(
            FieldValue::parse_number("n/a"),
            FieldValue::Invalid("n/a".to_string())
        );
    }

    #[test]
    fn parse_date_accepts_known_layouts() {
        let expected = NaiveDate::from_ymd_opt(2021, 6, 15).unwrap();
        assert_eq!(FieldValue::parse_date("2021-06-15"), FieldValue::Present(expected));
        assert_eq!(FieldValue::parse_date("6/15/2021"), FieldValue::Present(expected));
        assert_eq!(FieldValue::parse_date("15.06.2021"), FieldValue::Present(expected));
        assert!(matches!(FieldValue::parse_date("yesterday"), FieldValue::Invalid(_)));
    }

    #[test]
    fn parse_raw_record_keeps_invalid_profit_as_distinct_state() {
        let raw = RawRecord {
            country: " USA ".to_string(),
            total_profit: "lots".to_string(),
            order_date: "2021-06-15".to_string(),
            ..RawRecord::default()
        };
        let r = Record::parse(&raw);
        assert_eq!(r.country, FieldValue::Present("USA".to_string()));
        assert_eq!(r.total_profit, FieldValue::Invalid("lots".to_string()));
        assert_eq!(r.region, FieldValue::Missing);
        assert_eq!(r.order_year(), Some(2021));
        assert!(r.profit_key().is_none());
    }

    #[test]
    fn dataset_collects_records_in_order() {
        let ds: DataSet = vec![Record::new("USA", 1.0), Record::new("Canada", 2.0)]
            .into_iter()
            .collect();
        assert_eq!(ds.row_count(), 2);
        assert!(!ds.is_empty());
        assert_eq!(ds.records[1].total_profit.value(), Some(2.0));
        assert!(DataSet::default().is_empty());
    }
}
