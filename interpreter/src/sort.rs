use std::cmp::Reverse;

use xdra::{Element, ElementPath, PathError};

/// Stable sort of `records` by the text of their first `.//key` descendant,
/// compared case-insensitively.
///
/// Records without a `key` descendant compare as the empty string, so they
/// lead an ascending sort and trail a descending one.
pub fn sort_records(records: &mut [Element], key: &str, descending: bool) -> Result<(), PathError> {
    if records.len() < 2 {
        return Ok(());
    }
    let path = ElementPath::descendant(key)?;
    let sort_key = |record: &Element| path.first_text(record).unwrap_or("").to_lowercase();
    if descending {
        records.sort_by_cached_key(|record| Reverse(sort_key(record)));
    } else {
        records.sort_by_cached_key(sort_key);
    }
    Ok(())
}
