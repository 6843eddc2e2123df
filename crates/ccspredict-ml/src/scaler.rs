//! Per-column min-max scaling.

use serde::{Deserialize, Serialize};

use ccspredict_common::{CcsError, Result};

/// Maps each column into `[0, 1]` using the minimum and maximum seen at fit
/// time. Constant columns map to `0.0`. Values outside the fitted range are
/// not clipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    range: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(rows: &[&[f64]]) -> Result<Self> {
        let width = rows
            .first()
            .map(|r| r.len())
            .ok_or_else(|| CcsError::Data("cannot fit a scaler on zero rows".to_string()))?;

        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];
        for row in rows {
            if row.len() != width {
                return Err(CcsError::Data(format!(
                    "ragged input: expected {width} columns, got {}",
                    row.len()
                )));
            }
            for (col, &v) in row.iter().enumerate() {
                min[col] = min[col].min(v);
                max[col] = max[col].max(v);
            }
        }

        let range = min.iter().zip(&max).map(|(lo, hi)| hi - lo).collect();
        Ok(Self { min, range })
    }

    pub fn width(&self) -> usize {
        self.min.len()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            return Err(CcsError::Model(format!(
                "model expects {} features, got {}",
                self.width(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.min.iter().zip(&self.range))
            .map(|(&v, (&lo, &range))| if range == 0.0 { 0.0 } else { (v - lo) / range })
            .collect())
    }

    pub fn transform_all(&self, rows: &[&[f64]]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_scaled_independently() {
        let rows: Vec<&[f64]> = vec![&[0.0, 10.0, 5.0], &[2.0, 20.0, 5.0], &[1.0, 15.0, 5.0]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();

        assert_eq!(scaler.transform(&[0.0, 10.0, 5.0]).unwrap(), vec![0.0, 0.0, 0.0]);
        assert_eq!(scaler.transform(&[1.0, 15.0, 5.0]).unwrap(), vec![0.5, 0.5, 0.0]);
        assert_eq!(scaler.transform(&[4.0, 0.0, 7.0]).unwrap(), vec![2.0, -1.0, 0.0]);
    }

    #[test]
    fn test_width_is_enforced() {
        let rows: Vec<&[f64]> = vec![&[1.0, 2.0]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();
        assert!(scaler.transform(&[1.0]).is_err());

        let ragged: Vec<&[f64]> = vec![&[1.0, 2.0], &[1.0]];
        assert!(MinMaxScaler::fit(&ragged).is_err());
        assert!(MinMaxScaler::fit(&[]).is_err());
    }

    #[test]
    fn test_serde_round_trip_preserves_transform() {
        let rows: Vec<&[f64]> = vec![&[1.0, -3.0], &[3.0, 5.0]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();
        let restored: MinMaxScaler = serde_json::from_str(&serde_json::to_string(&scaler).unwrap()).unwrap();
        assert_eq!(restored.transform(&[2.0, 1.0]).unwrap(), scaler.transform(&[2.0, 1.0]).unwrap());
    }
}
