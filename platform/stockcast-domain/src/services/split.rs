use crate::error::DomainError;
use serde::Serialize;
use std::ops::Range;

pub const DEFAULT_EMBARGO: usize = 3;

/// Row ranges for an in-sample / out-of-sample split with an embargo gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainTestSplit {
    pub train: Range<usize>,
    pub embargo: Range<usize>,
    pub test: Range<usize>,
}

impl TrainTestSplit {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn test_len(&self) -> usize {
        self.test.len()
    }
}

/// Train is `[0, floor(rows * train_ratio))`; test starts `embargo` rows after
/// train ends. Fails when either side would be empty.
pub fn train_test_split(
    rows: usize,
    train_ratio: f64,
    embargo: usize,
) -> Result<TrainTestSplit, DomainError> {
    if !train_ratio.is_finite() || train_ratio <= 0.0 || train_ratio >= 1.0 {
        return Err(DomainError::invalid(
            "train_ratio",
            format!("must be in (0, 1), got {train_ratio}"),
        ));
    }
    let train_end = (rows as f64 * train_ratio).floor() as usize;
    if train_end == 0 {
        return Err(DomainError::InsufficientData(format!(
            "{rows} rows leave an empty training window at ratio {train_ratio}"
        )));
    }
    let test_start = train_end.saturating_add(embargo);
    if test_start >= rows {
        return Err(DomainError::InsufficientData(format!(
            "{rows} rows leave an empty test window (train {train_end}, embargo {embargo})"
        )));
    }
    Ok(TrainTestSplit {
        train: 0..train_end,
        embargo: train_end..test_start,
        test: test_start..rows,
    })
}
