//! Prediction reassembly
//!
//! Expands per-quantity prediction matrices back into one row per
//! (subject, sample, placement), using the column layout of the training set.

use std::collections::BTreeMap;

use brainweb_tdcs_core::{ConductivitySample, FieldQuantity, Placement, SubjectId};
use nalgebra::DMatrix;

use super::tensor::ColumnLayout;
use crate::error::{SurrogateError, SurrogateResult};

/// One predicted row
#[derive(Clone, Debug, PartialEq)]
pub struct SurrogateRecord {
    /// Subject
    pub sub: SubjectId,
    /// Design point the prediction was made at
    pub sample: ConductivitySample,
    /// Placement
    pub placement: Placement,
    /// Predicted value per regressed quantity
    pub values: BTreeMap<FieldQuantity, f64>,
}

/// Reassemble predictions into records sorted by subject, sample id and
/// placement id.
///
/// Each matrix in `predictions` must be `samples.len() × layout.len()`, row
/// `i` belonging to `samples[i]`.
///
/// # Errors
///
/// Returns [`SurrogateError::LayoutMismatch`] for a prediction of the wrong
/// shape.
pub fn reassemble(
    layout: &ColumnLayout,
    samples: &[ConductivitySample],
    predictions: &BTreeMap<FieldQuantity, DMatrix<f64>>,
) -> SurrogateResult<Vec<SurrogateRecord>> {
    let expected = (samples.len(), layout.len());
    for (&quantity, matrix) in predictions {
        if matrix.shape() != expected {
            return Err(SurrogateError::LayoutMismatch { quantity, expected, got: matrix.shape() });
        }
    }

    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by_key(|&row| samples[row].id);

    let mut records = Vec::with_capacity(samples.len() * layout.len());
    for (s_idx, &sub) in layout.subjects().iter().enumerate() {
        for &row in &order {
            for (p_idx, &placement) in layout.placements().iter().enumerate() {
                let column = layout.column(p_idx, s_idx);
                let values = predictions
                    .iter()
                    .map(|(&quantity, matrix)| (quantity, matrix[(row, column)]))
                    .collect();
                records.push(SurrogateRecord { sub, sample: samples[row], placement, values });
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use brainweb_tdcs_core::Conductivities;

    use super::*;

    fn samples(n: u32) -> Vec<ConductivitySample> {
        (0..n)
            .map(|id| ConductivitySample::new(id, Conductivities([f64::from(id); 5])))
            .collect()
    }

    #[test]
    fn test_rows_sorted_and_values_routed() {
        let layout = ColumnLayout::new(vec![3, 8], vec![Placement::Reference, Placement::Anterior]);
        let samples = samples(3);
        let prediction =
            DMatrix::from_fn(3, 4, |row, column| (row * 10 + column) as f64);
        let predictions = BTreeMap::from([(FieldQuantity::E, prediction)]);

        let records = reassemble(&layout, &samples, &predictions).unwrap();
        assert_eq!(records.len(), 12);

        let keys: Vec<_> =
            records.iter().map(|r| (r.sub, r.sample.id, r.placement.id())).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);

        // Subject 8, sample 2, anterior -> column 1 * 2 + 1
        let record = records
            .iter()
            .find(|r| r.sub == 8 && r.sample.id == 2 && r.placement == Placement::Anterior)
            .unwrap();
        assert_eq!(record.values[&FieldQuantity::E], 23.0);
        assert_eq!(record.sample, samples[2]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let layout = ColumnLayout::new(vec![1], vec![Placement::Reference]);
        let predictions = BTreeMap::from([(FieldQuantity::Er, DMatrix::zeros(2, 2))]);
        assert!(matches!(
            reassemble(&layout, &samples(2), &predictions),
            Err(SurrogateError::LayoutMismatch { expected: (2, 1), got: (2, 2), .. })
        ));
    }

    #[test]
    fn test_no_quantities_still_lists_rows() {
        let layout = ColumnLayout::new(vec![1], vec![Placement::Central]);
        let records = reassemble(&layout, &samples(5), &BTreeMap::new()).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.values.is_empty()));
    }
}
