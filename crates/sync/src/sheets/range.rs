//! A1 notation helpers.

/// First and last column of the tracking table.
const FIRST_COLUMN: &str = "A";
const LAST_COLUMN: &str = "H";
const VARIANT_COLUMN: &str = "B";

/// Quote a sheet name for use in an A1 range when it needs it.
fn quote_sheet(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// `Sheet1!B:B`
pub(crate) fn variant_column_range(sheet: &str) -> String {
    format!("{}!{VARIANT_COLUMN}:{VARIANT_COLUMN}", quote_sheet(sheet))
}

/// `Sheet1!A{row}:H{row}`
pub(crate) fn row_range(sheet: &str, row: u32) -> String {
    format!("{}!{FIRST_COLUMN}{row}:{LAST_COLUMN}{row}", quote_sheet(sheet))
}

/// `Sheet1!A:H`
pub(crate) fn table_range(sheet: &str) -> String {
    format!("{}!{FIRST_COLUMN}:{LAST_COLUMN}", quote_sheet(sheet))
}

/// Start row of an A1 range as echoed back by the API.
///
/// `Sheet1!B1:B120` gives 1, `'Ticket Log'!B3:B9` gives 3. Whole-column
/// ranges such as `Sheet1!B:B` carry no row and give `None`.
#[must_use]
pub fn start_row_of(range: &str) -> Option<u32> {
    let cells = range.rsplit_once('!').map_or(range, |(_, cells)| cells);
    let start = cells.split(':').next()?;
    let digits: String = start
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '$')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Values of one column, positioned on the sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnValues {
    /// Sheet row of the first value (1-based).
    pub start_row: u32,
    pub values: Vec<String>,
}

impl ColumnValues {
    #[must_use]
    pub const fn new(start_row: u32, values: Vec<String>) -> Self {
        Self { start_row, values }
    }

    /// Sheet rows whose trimmed value equals the trimmed `needle`, in order.
    #[must_use]
    pub fn matching_rows(&self, needle: &str) -> Vec<u32> {
        let needle = needle.trim();
        self.values
            .iter()
            .enumerate()
            .filter(|(_, value)| value.trim() == needle)
            .filter_map(|(index, _)| {
                u32::try_from(index)
                    .ok()
                    .and_then(|i| self.start_row.checked_add(i))
            })
            .collect()
    }

    /// First sheet row holding `needle`.
    #[must_use]
    pub fn find_row(&self, needle: &str) -> Option<u32> {
        self.matching_rows(needle).first().copied()
    }
}
