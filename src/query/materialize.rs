//! Conversion of driver rows into typed rows.

use super::buffer::RowBuffer;
use crate::db::{Cell, RawValue, Row, RowCursor};
use crate::error::Result;

/// Reads every remaining row from `cursor` into `buffer`.
///
/// On a fetch error, rows already pushed stay in the buffer and the error
/// is returned.
pub async fn materialize_rows<C>(cursor: &mut C, buffer: &mut RowBuffer) -> Result<()>
where
    C: RowCursor + ?Sized,
{
    let width = cursor.columns().len();

    while let Some(raw) = cursor.next_row().await? {
        buffer.push(materialize_row(raw, width));
    }

    Ok(())
}

/// Classifies one row of raw values, keeping column positions.
///
/// The result always has exactly `width` cells; a value missing from a
/// short driver row is classified as an absent value.
pub fn materialize_row(raw: Vec<RawValue>, width: usize) -> Row {
    let mut row: Row = Vec::with_capacity(width);
    row.extend(raw.into_iter().take(width).map(Cell::classify));
    while row.len() < width {
        row.push(Cell::classify(RawValue::unsupported("ABSENT")));
    }
    row
}
