//! The eight-column tracking spreadsheet row.
//!
//! | A | B | C | D | E | F | G | H |
//! |---|---|---|---|---|---|---|---|
//! | product id | variant id | product name | location | venue | show date | tickets bought | inventory |

use serde_json::Value;

use super::product::{EnrichedProduct, ProductDetails};

/// Number of columns in a tracking row.
pub const COLUMN_COUNT: usize = 8;

/// Zero-based index of the cumulative ticket count column (G).
const TICKETS_COLUMN: usize = 6;

/// One row of the tracking spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetRow {
    pub product_id: String,
    pub variant_id: String,
    pub product_name: String,
    pub location: String,
    pub venue: String,
    pub show_date: String,
    /// Cumulative tickets bought across every sync.
    pub tickets_bought: u64,
    pub inventory: Option<i64>,
}

impl SpreadsheetRow {
    /// Build the row for `product` with the given cumulative ticket count.
    #[must_use]
    pub fn new(product: &EnrichedProduct, details: &ProductDetails, tickets_bought: u64) -> Self {
        Self {
            product_id: product.product_id.to_string(),
            variant_id: product.variant_id.to_string(),
            product_name: product.product_name.clone(),
            location: details.location.clone(),
            venue: details.venue.clone(),
            show_date: details.show_date.clone(),
            tickets_bought,
            inventory: details.product_inventory,
        }
    }

    /// Cell values in column order, numbers kept numeric.
    #[must_use]
    pub fn to_cells(&self) -> Vec<Value> {
        vec![
            Value::from(self.product_id.as_str()),
            Value::from(self.variant_id.as_str()),
            Value::from(self.product_name.as_str()),
            Value::from(self.location.as_str()),
            Value::from(self.venue.as_str()),
            Value::from(self.show_date.as_str()),
            Value::from(self.tickets_bought),
            self.inventory.map_or_else(|| Value::from(""), Value::from),
        ]
    }
}

/// Read the cumulative ticket count (column G) out of a row of cell strings.
///
/// Blank, missing or non-numeric cells count as zero. Leading digits are
/// honoured (`"12 tickets"` is 12) and thousands separators are ignored.
#[must_use]
pub fn parse_ticket_count(cells: &[String]) -> u64 {
    let Some(cell) = cells.get(TICKETS_COLUMN) else {
        return 0;
    };

    let digits: String = cell
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .take_while(char::is_ascii_digit)
        .collect();

    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::id::{OrderId, ProductId, VariantId};
    use crate::types::order::{EnrichmentRecord, RecordKey};

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_ticket_count() {
        assert_eq!(parse_ticket_count(&cells(&["p", "v", "n", "l", "v", "d", "7", "3"])), 7);
        assert_eq!(parse_ticket_count(&cells(&["p", "v", "n", "l", "v", "d", " 12 "])), 12);
        assert_eq!(parse_ticket_count(&cells(&["p", "v", "n", "l", "v", "d", "1,204"])), 1204);
        assert_eq!(parse_ticket_count(&cells(&["p", "v", "n", "l", "v", "d", "5 sold"])), 5);
    }

    #[test]
    fn test_parse_ticket_count_defaults_to_zero() {
        assert_eq!(parse_ticket_count(&[]), 0);
        assert_eq!(parse_ticket_count(&cells(&["p", "v", "n", "l", "v", "d", ""])), 0);
        assert_eq!(parse_ticket_count(&cells(&["p", "v", "n", "l", "v", "d", "n/a"])), 0);
        assert_eq!(parse_ticket_count(&cells(&["p", "v", "n", "l", "v", "d", "-4"])), 0);
    }

    #[test]
    fn test_to_cells_column_order() {
        let record = EnrichmentRecord {
            key: RecordKey::new(OrderId::new("o1"), 0),
            variant_id: VariantId::new("v1"),
            product_id: ProductId::new("p1"),
            product_name: "GA".to_string(),
            tickets_bought: 2,
        };
        let details = ProductDetails {
            product_slug: "slug".to_string(),
            venue: "Venue".to_string(),
            location: "City".to_string(),
            show_date: "01-02-2025".to_string(),
            product_inventory: None,
        };
        let product = EnrichedProduct::fetched(&record, details.clone());
        let row = SpreadsheetRow::new(&product, &details, 9);

        let cells = row.to_cells();
        assert_eq!(cells.len(), COLUMN_COUNT);
        assert_eq!(
            cells,
            vec![
                Value::from("p1"),
                Value::from("v1"),
                Value::from("GA"),
                Value::from("City"),
                Value::from("Venue"),
                Value::from("01-02-2025"),
                Value::from(9_u64),
                Value::from(""),
            ]
        );
    }
}
