//! Training tensor construction
//!
//! Reshapes the flat record table into the regression inputs: a design matrix
//! with one conductivity profile per sample row, and per field quantity an
//! output matrix with one column per (placement, subject) pair.
//!
//! Column `c` belongs to `placements[c / n_sub]` and `subjects[c % n_sub]`.
//! Subjects and placements are enumerated in natural sort order of the values
//! observed in the table; the same [`ColumnLayout`] is used to reassemble
//! predictions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use brainweb_tdcs_core::{
    ConductivitySample, FieldQuantity, Placement, Record, SampleId, SubjectId, TISSUE_COUNT,
};
use nalgebra::DMatrix;

use crate::error::{RecordKey, SurrogateError, SurrogateResult};

/// Canonical enumeration of the output columns
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnLayout {
    subjects: Vec<SubjectId>,
    placements: Vec<Placement>,
}

impl ColumnLayout {
    /// Create a layout from explicit enumerations
    pub fn new(subjects: Vec<SubjectId>, placements: Vec<Placement>) -> Self {
        Self { subjects, placements }
    }

    /// Subjects in column order
    pub fn subjects(&self) -> &[SubjectId] {
        &self.subjects
    }

    /// Placements in column order
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Column of the `placement_idx`-th placement and `subject_idx`-th subject
    #[inline]
    pub fn column(&self, placement_idx: usize, subject_idx: usize) -> usize {
        placement_idx * self.subjects.len() + subject_idx
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.subjects.len() * self.placements.len()
    }

    /// Whether the layout has no columns
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(column, placement, subject)` for every column, in column order
    pub fn columns(&self) -> impl Iterator<Item = (usize, Placement, SubjectId)> + '_ {
        self.placements.iter().enumerate().flat_map(move |(p_idx, &placement)| {
            self.subjects
                .iter()
                .enumerate()
                .map(move |(s_idx, &subject)| (self.column(p_idx, s_idx), placement, subject))
        })
    }
}

/// Regression inputs built from one record table
#[derive(Clone, Debug)]
pub struct TrainingSet {
    /// Column enumeration shared with reassembly
    pub layout: ColumnLayout,
    /// Observed conductivity samples, ids `0..N` in order
    pub samples: Vec<ConductivitySample>,
    /// `N × 5` conductivity design
    pub design: DMatrix<f64>,
    /// `N × columns` outputs per quantity
    pub outputs: BTreeMap<FieldQuantity, DMatrix<f64>>,
}

impl TrainingSet {
    /// The observed reference profile (sample 0)
    pub fn reference(&self) -> &ConductivitySample {
        &self.samples[0]
    }
}

/// Build the training set for `vois` from a flat record table.
///
/// Every (sample, placement, subject) triple must occur exactly once and
/// sample ids must be contiguous from 0.
///
/// # Errors
///
/// Returns [`SurrogateError::EmptyTable`], [`SurrogateError::NonContiguousSamples`],
/// [`SurrogateError::DuplicateRecord`] or [`SurrogateError::MissingRecord`],
/// the latter two naming the offending key.
pub fn build_training_set(
    records: &[Record],
    vois: &[FieldQuantity],
) -> SurrogateResult<TrainingSet> {
    if records.is_empty() {
        return Err(SurrogateError::EmptyTable);
    }

    let subjects: Vec<SubjectId> =
        records.iter().map(|r| r.sub).collect::<BTreeSet<_>>().into_iter().collect();
    let placements: Vec<Placement> =
        records.iter().map(|r| r.p).collect::<BTreeSet<_>>().into_iter().collect();
    let layout = ColumnLayout::new(subjects, placements);

    // First record of each id carries the sample's conductivities
    let mut by_id: BTreeMap<SampleId, ConductivitySample> = BTreeMap::new();
    for record in records {
        by_id.entry(record.k_id).or_insert_with(|| record.sample());
    }
    for (expected, &id) in by_id.keys().enumerate() {
        let expected = expected as SampleId;
        if id != expected {
            return Err(SurrogateError::NonContiguousSamples { missing: expected });
        }
    }
    let samples: Vec<ConductivitySample> = by_id.into_values().collect();

    let subject_index: HashMap<SubjectId, usize> =
        layout.subjects().iter().enumerate().map(|(i, &s)| (s, i)).collect();
    let placement_index: HashMap<Placement, usize> =
        layout.placements().iter().enumerate().map(|(i, &p)| (p, i)).collect();

    // Row/column of every record, rejecting repeats
    let mut cells: Vec<Option<&Record>> = vec![None; samples.len() * layout.len()];
    for record in records {
        let column = layout.column(placement_index[&record.p], subject_index[&record.sub]);
        let cell = &mut cells[record.k_id as usize * layout.len() + column];
        if cell.is_some() {
            return Err(SurrogateError::DuplicateRecord { key: key_of(record) });
        }
        *cell = Some(record);
    }

    // Report the first hole in (sample, placement, subject) order
    for sample in &samples {
        for (column, placement, subject) in layout.columns() {
            if cells[sample.id as usize * layout.len() + column].is_none() {
                return Err(SurrogateError::MissingRecord {
                    key: RecordKey { sample: sample.id, placement, subject },
                });
            }
        }
    }

    let design = DMatrix::from_fn(samples.len(), TISSUE_COUNT, |row, tissue| {
        samples[row].conductivities.as_slice()[tissue]
    });

    let outputs = vois
        .iter()
        .map(|&quantity| {
            let matrix = DMatrix::from_fn(samples.len(), layout.len(), |row, column| {
                cells[row * layout.len() + column].map_or(f64::NAN, |r| r.quantity(quantity))
            });
            (quantity, matrix)
        })
        .collect();

    tracing::debug!(
        samples = samples.len(),
        subjects = layout.subjects().len(),
        placements = layout.placements().len(),
        "Built training tensor"
    );

    Ok(TrainingSet { layout, samples, design, outputs })
}

fn key_of(record: &Record) -> RecordKey {
    RecordKey { sample: record.k_id, placement: record.p, subject: record.sub }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use brainweb_tdcs_core::{sample_label, Record};

    use super::*;

    /// Synthetic record with field values derived from its key
    pub fn record(sub: SubjectId, k_id: SampleId, p: Placement) -> Record {
        let k = 0.1 + 0.05 * f64::from(k_id);
        let (p_x, p_y) = p.offset();
        let e = f64::from(sub) * 10.0 + f64::from(p.id()) + k;
        Record {
            sub,
            k: sample_label(k_id),
            k_id,
            k_wm: k,
            k_gm: 2.0 * k,
            k_csf: 1.5 + k,
            k_skl: 0.02 + 0.01 * k,
            k_sft: 0.4 + k,
            p,
            p_id: p.id(),
            p_x,
            p_y,
            v: 0.0,
            e,
            e_x: 0.0,
            e_y: 0.0,
            e_z: 0.0,
            e_r: -e,
            e_t: 0.0,
            j: 0.0,
            j_x: 0.0,
            j_y: 0.0,
            j_z: 0.0,
            j_r: 0.0,
            j_t: 0.0,
        }
    }

    /// Complete table over the given subjects, samples and placements
    pub fn table(subjects: &[SubjectId], samples: SampleId, placements: &[Placement]) -> Vec<Record> {
        let mut records = Vec::new();
        for &sub in subjects {
            for k_id in 0..samples {
                for &p in placements {
                    records.push(record(sub, k_id, p));
                }
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{record, table};
    use super::*;

    #[test]
    fn test_layout_column_order() {
        let layout = ColumnLayout::new(vec![4, 5, 6], vec![Placement::Reference, Placement::Central]);
        assert_eq!(layout.len(), 6);
        assert_eq!(layout.column(1, 2), 5);
        let columns: Vec<_> = layout.columns().collect();
        assert_eq!(columns[0], (0, Placement::Reference, 4));
        assert_eq!(columns[3], (3, Placement::Central, 4));
        assert_eq!(columns[5], (5, Placement::Central, 6));
    }

    #[test]
    fn test_build_from_shuffled_table() {
        let mut records = table(&[20, 4], 3, &[Placement::Posterior, Placement::Reference]);
        records.reverse();

        let set = build_training_set(&records, &[FieldQuantity::E, FieldQuantity::Er]).unwrap();
        assert_eq!(set.layout.subjects(), &[4, 20]);
        assert_eq!(set.layout.placements(), &[Placement::Reference, Placement::Posterior]);
        assert_eq!(set.design.shape(), (3, 5));
        assert_eq!(set.reference().id, 0);

        let e = &set.outputs[&FieldQuantity::E];
        assert_eq!(e.shape(), (3, 4));
        // Sample 2, posterior, subject 20 -> column 1 * 2 + 1
        let expected = record(20, 2, Placement::Posterior).e;
        assert_eq!(e[(2, 3)], expected);
        assert_eq!(set.outputs[&FieldQuantity::Er][(2, 3)], -expected);
        assert!((set.design[(1, 0)] - 0.15).abs() < 1e-15);
    }

    #[test]
    fn test_missing_record_named() {
        let mut records = table(&[1, 2], 2, &[Placement::Reference, Placement::Lateral]);
        records.retain(|r| !(r.sub == 2 && r.k_id == 1 && r.p == Placement::Lateral));

        match build_training_set(&records, &[FieldQuantity::E]) {
            Err(SurrogateError::MissingRecord { key }) => {
                assert_eq!(key, RecordKey { sample: 1, placement: Placement::Lateral, subject: 2 });
            }
            other => panic!("expected missing record, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_record_named() {
        let mut records = table(&[1], 2, &[Placement::Reference]);
        records.push(record(1, 1, Placement::Reference));

        match build_training_set(&records, &[FieldQuantity::E]) {
            Err(SurrogateError::DuplicateRecord { key }) => {
                assert_eq!(key, RecordKey { sample: 1, placement: Placement::Reference, subject: 1 });
            }
            other => panic!("expected duplicate record, got {other:?}"),
        }
    }

    #[test]
    fn test_non_contiguous_samples_rejected() {
        let mut records = table(&[1], 4, &[Placement::Reference]);
        records.retain(|r| r.k_id != 2);
        assert!(matches!(
            build_training_set(&records, &[FieldQuantity::E]),
            Err(SurrogateError::NonContiguousSamples { missing: 2 })
        ));

        let records = vec![record(1, 1, Placement::Reference)];
        assert!(matches!(
            build_training_set(&records, &[FieldQuantity::E]),
            Err(SurrogateError::NonContiguousSamples { missing: 0 })
        ));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(
            build_training_set(&[], &[FieldQuantity::E]),
            Err(SurrogateError::EmptyTable)
        ));
    }
}
