//! Pure combination of decoded records into one derived value.

use crate::{CombinedResult, RawRecord, ScoreError};

/// Divisor applied after averaging.
pub const NORMALIZATION: i64 = 100;

/// Combine a key's records: `sum / count / NORMALIZATION`.
///
/// Both divisions are integer divisions, so the fractional part is dropped
/// before the value is widened to `f64`: `[700, 720]` gives `7.0`, not `7.1`.
pub fn combine(records: &[RawRecord]) -> Result<CombinedResult, ScoreError> {
    if records.is_empty() {
        return Err(ScoreError::empty_input());
    }

    let sum = records
        .iter()
        .try_fold(0i64, |acc, record| acc.checked_add(record.score))
        .ok_or_else(|| {
            ScoreError::decoding("score sum overflows i64")
                .with_detail("records", records.len().to_string())
        })?;
    let count = records.len() as i64;

    Ok(CombinedResult::new((sum / count / NORMALIZATION) as f64))
}
