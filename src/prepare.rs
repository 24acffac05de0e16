//! Example-data preparation: filter, derive, group, aggregate.
//!
//! Rows of one region/parameter slice are reduced to one
//! [`SummaryRecord`] per (condition group, subject), where the condition
//! group says whether the row's stimulus is the target stimulus and the
//! metric is the mean of `correlation_by_condition - correlation_overall`.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{ColumnNames, PrepareConfig};
use crate::data::filter::{filtered_rows, Selection};
use crate::data::model::{
    CellValue, Observation, ObservationRecord, ObservationTable, SummaryRecord,
};

/// Malformed input found on a row that passed the filter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("row {row}: missing required field '{column}'")]
    MissingField { row: usize, column: String },

    #[error("row {row}: field '{column}' is not numeric: '{value}'")]
    NonNumeric {
        row: usize,
        column: String,
        value: String,
    },
}

/// Non-fatal conditions reported alongside the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareWarning {
    /// The region/parameter filter matched no rows.
    EmptyResult { region: String, parameter: String },
}

/// Outcome of a preparation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    /// One record per (condition group, subject), ordered by that key.
    pub records: Vec<SummaryRecord>,
    /// Number of input rows that passed the filter.
    pub rows_matched: usize,
    pub warning: Option<PrepareWarning>,
}

impl ObservationRecord {
    /// Validate a raw row. `row` is its index in the input, used in errors.
    pub fn from_observation(
        row: usize,
        obs: &Observation,
        columns: &ColumnNames,
    ) -> Result<Self, InputError> {
        let text = |column: &str| -> Result<String, InputError> {
            obs.get(column)
                .and_then(CellValue::as_text)
                .map(|t| t.into_owned())
                .ok_or_else(|| InputError::MissingField {
                    row,
                    column: column.to_string(),
                })
        };
        let number = |column: &str| -> Result<f64, InputError> {
            let cell = obs.get(column).ok_or_else(|| InputError::MissingField {
                row,
                column: column.to_string(),
            })?;
            cell.as_f64().ok_or_else(|| InputError::NonNumeric {
                row,
                column: column.to_string(),
                value: cell.to_string(),
            })
        };

        Ok(ObservationRecord {
            stimulus_type: text(&columns.stimulus_type)?,
            subject_id: text(&columns.subject_id)?,
            correlation_by_condition: number(&columns.correlation_by_condition)?,
            correlation_overall: number(&columns.correlation_overall)?,
        })
    }

    /// `correlation_by_condition - correlation_overall`
    #[inline]
    pub fn difference(&self) -> f64 {
        self.correlation_by_condition - self.correlation_overall
    }
}

/// Running sum for one group.
#[derive(Debug, Default, Clone, Copy)]
struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Group validated records by (is_target, subject) and average their
/// differences. Every group holds at least one record, so no division by
/// zero is possible.
pub fn summarize(records: &[ObservationRecord], target_stimulus: &str) -> Vec<SummaryRecord> {
    let mut groups: BTreeMap<(bool, &str), MeanAcc> = BTreeMap::new();

    for rec in records {
        let is_target = rec.stimulus_type == target_stimulus;
        groups
            .entry((is_target, rec.subject_id.as_str()))
            .or_default()
            .push(rec.difference());
    }

    groups
        .into_iter()
        .map(|((is_target, subject), acc)| SummaryRecord {
            subject_id: subject.to_string(),
            is_target_condition: is_target,
            difference_metric: acc.mean(),
        })
        .collect()
}

/// Filter `rows` to `region`/`parameter`, validate the survivors and reduce
/// them to per-subject, per-condition-group mean differences.
///
/// An empty selection is not an error: the result is empty and carries
/// [`PrepareWarning::EmptyResult`]. Defects on rows outside the selection are
/// ignored.
pub fn prepare_example_data(
    rows: &[Observation],
    region: &str,
    parameter: &str,
    target_stimulus: &str,
    columns: &ColumnNames,
) -> Result<Prepared, InputError> {
    let selection = Selection {
        region_column: &columns.region,
        region,
        parameter_column: &columns.parameter,
        parameter,
    };

    let records = filtered_rows(rows, &selection)
        .into_iter()
        .map(|(i, obs)| ObservationRecord::from_observation(i, obs, columns))
        .collect::<Result<Vec<_>, _>>()?;

    let rows_matched = records.len();
    debug!("{rows_matched} of {} rows match region={region} parameter={parameter}", rows.len());

    let warning = (rows_matched == 0).then(|| PrepareWarning::EmptyResult {
        region: region.to_string(),
        parameter: parameter.to_string(),
    });

    Ok(Prepared {
        records: summarize(&records, target_stimulus),
        rows_matched,
        warning,
    })
}

/// Run [`prepare_example_data`] over a loaded table using `config`, logging
/// the distinct region/parameter labels when the selection comes up empty.
pub fn prepare_table(
    table: &ObservationTable,
    config: &PrepareConfig,
) -> Result<Prepared, InputError> {
    let prepared = prepare_example_data(
        &table.rows,
        &config.region,
        &config.parameter,
        &config.target_stimulus,
        &config.columns,
    )?;

    match &prepared.warning {
        Some(PrepareWarning::EmptyResult { region, parameter }) => {
            warn!(
                "no rows with {}={region} and {}={parameter}; \
                 available {}: [{}], available {}: [{}]",
                config.columns.region,
                config.columns.parameter,
                config.columns.region,
                table.describe_values(&config.columns.region),
                config.columns.parameter,
                table.describe_values(&config.columns.parameter),
            );
        }
        None => info!(
            "summarised {} rows into {} records (target stimulus {})",
            prepared.rows_matched,
            prepared.records.len(),
            config.target_stimulus
        ),
    }

    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn obs(
        region: &str,
        parameter: &str,
        stimulus: &str,
        subject: &str,
        by_condition: f64,
        overall: f64,
    ) -> Observation {
        [
            ("region", CellValue::from(region)),
            ("parameter", CellValue::from(parameter)),
            ("stimulus_type", CellValue::from(stimulus)),
            ("subject_id", CellValue::from(subject)),
            ("correlation_by_condition", CellValue::from(by_condition)),
            ("correlation_overall", CellValue::from(overall)),
        ]
        .into_iter()
        .collect()
    }

    fn run(rows: &[Observation], region: &str) -> Result<Prepared, InputError> {
        prepare_example_data(rows, region, "flynet", "ring_expand", &ColumnNames::default())
    }

    fn find(records: &[SummaryRecord], subject: &str, is_target: bool) -> SummaryRecord {
        records
            .iter()
            .find(|r| r.subject_id == subject && r.is_target_condition == is_target)
            .cloned()
            .unwrap_or_else(|| panic!("no record for ({subject}, {is_target})"))
    }

    #[test]
    fn test_end_to_end_example() {
        let rows = vec![
            obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3),
            obs("SC", "flynet", "other", "S1", 0.2, 0.25),
        ];
        let prepared = run(&rows, "SC").unwrap();

        assert_eq!(prepared.records.len(), 2);
        assert_eq!(prepared.rows_matched, 2);
        assert!(prepared.warning.is_none());
        assert!((find(&prepared.records, "S1", true).difference_metric - 0.2).abs() < TOL);
        assert!((find(&prepared.records, "S1", false).difference_metric + 0.05).abs() < TOL);
    }

    #[test]
    fn test_mean_of_group() {
        let rows = vec![
            obs("SC", "flynet", "ring_expand", "S1", 0.2, 0.0),
            obs("SC", "flynet", "ring_expand", "S1", 0.4, 0.0),
            obs("SC", "flynet", "ring_expand", "S1", 0.6, 0.0),
        ];
        let prepared = run(&rows, "SC").unwrap();

        assert_eq!(prepared.records.len(), 1);
        assert!((prepared.records[0].difference_metric - 0.4).abs() < TOL);
    }

    #[test]
    fn test_single_row_group_keeps_its_value() {
        let rows = vec![obs("SC", "flynet", "looming", "S9", 0.71, 0.13)];
        let prepared = run(&rows, "SC").unwrap();

        assert_eq!(prepared.records.len(), 1);
        let rec = &prepared.records[0];
        assert_eq!(rec.subject_id, "S9");
        assert!(!rec.is_target_condition);
        assert!((rec.difference_metric - (0.71 - 0.13)).abs() < TOL);
    }

    #[test]
    fn test_empty_filter_is_not_an_error() {
        let rows = vec![obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3)];
        let prepared = run(&rows, "NONEXISTENT").unwrap();

        assert!(prepared.records.is_empty());
        assert_eq!(prepared.rows_matched, 0);
        assert_eq!(
            prepared.warning,
            Some(PrepareWarning::EmptyResult {
                region: "NONEXISTENT".into(),
                parameter: "flynet".into(),
            })
        );
    }

    #[test]
    fn test_rows_outside_filter_have_no_influence() {
        let base = vec![
            obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3),
            obs("SC", "flynet", "other", "S2", 0.1, 0.4),
        ];
        let mut noisy = base.clone();
        noisy.push(obs("LGN", "flynet", "ring_expand", "S1", 9.0, -9.0));
        noisy.push(obs("SC", "pixel", "other", "S3", 9.0, -9.0));
        // A malformed row outside the selection is ignored too.
        noisy.push([("region", "V1")].into_iter().collect());

        let clean = run(&base, "SC").unwrap();
        let with_noise = run(&noisy, "SC").unwrap();
        assert_eq!(clean.records, with_noise.records);
    }

    #[test]
    fn test_grouping_is_complete_and_unique() {
        let rows = vec![
            obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3),
            obs("SC", "flynet", "ring_expand", "S1", 0.4, 0.3),
            obs("SC", "flynet", "other", "S1", 0.2, 0.25),
            obs("SC", "flynet", "looming", "S1", 0.3, 0.25),
            obs("SC", "flynet", "other", "S2", 0.2, 0.1),
        ];
        let prepared = run(&rows, "SC").unwrap();

        let keys: Vec<(bool, &str)> = prepared
            .records
            .iter()
            .map(|r| (r.is_target_condition, r.subject_id.as_str()))
            .collect();
        assert_eq!(keys, vec![(false, "S1"), (false, "S2"), (true, "S1")]);

        // Uneven repeats: each group averages its own rows independently.
        assert!((find(&prepared.records, "S1", true).difference_metric - 0.15).abs() < TOL);
        assert!((find(&prepared.records, "S1", false).difference_metric - 0.0).abs() < TOL);
    }

    #[test]
    fn test_deterministic() {
        let rows = vec![
            obs("SC", "flynet", "other", "S2", 0.2, 0.1),
            obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3),
            obs("SC", "flynet", "other", "S1", 0.2, 0.25),
        ];
        assert_eq!(run(&rows, "SC").unwrap(), run(&rows, "SC").unwrap());
    }

    #[test]
    fn test_missing_field_on_retained_row() {
        let mut row = obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3);
        row.cells.remove("subject_id");
        let rows = vec![obs("SC", "flynet", "other", "S1", 0.2, 0.25), row];

        assert_eq!(
            run(&rows, "SC").unwrap_err(),
            InputError::MissingField {
                row: 1,
                column: "subject_id".into(),
            }
        );
    }

    #[test]
    fn test_null_correlation_is_missing() {
        let mut row = obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3);
        row.cells.insert("correlation_overall".into(), CellValue::Null);

        assert!(matches!(
            run(&[row], "SC"),
            Err(InputError::MissingField { row: 0, ref column }) if column == "correlation_overall"
        ));
    }

    #[test]
    fn test_non_numeric_correlation() {
        let mut row = obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3);
        row.cells
            .insert("correlation_by_condition".into(), CellValue::from("high"));

        assert_eq!(
            run(&[row], "SC").unwrap_err(),
            InputError::NonNumeric {
                row: 0,
                column: "correlation_by_condition".into(),
                value: "high".into(),
            }
        );
    }

    #[test]
    fn test_custom_column_names() {
        let row: Observation = [
            ("roi", CellValue::from("SC")),
            ("model", CellValue::from("flynet")),
            ("stim", CellValue::from("ring_expand")),
            ("subj", CellValue::Integer(4)),
            ("r_cond", CellValue::from("0.9")),
            ("r_all", CellValue::Integer(1)),
        ]
        .into_iter()
        .collect();
        let columns = ColumnNames {
            region: "roi".into(),
            parameter: "model".into(),
            stimulus_type: "stim".into(),
            subject_id: "subj".into(),
            correlation_by_condition: "r_cond".into(),
            correlation_overall: "r_all".into(),
        };

        let prepared =
            prepare_example_data(&[row], "SC", "flynet", "ring_expand", &columns).unwrap();
        assert_eq!(prepared.records.len(), 1);
        assert_eq!(prepared.records[0].subject_id, "4");
        assert!(prepared.records[0].is_target_condition);
        assert!((prepared.records[0].difference_metric + 0.1).abs() < TOL);
    }

    #[test]
    fn test_prepare_table_uses_config() {
        let table = ObservationTable::from_rows(vec![
            obs("SC", "flynet", "ring_expand", "S1", 0.5, 0.3),
            obs("LGN", "flynet", "ring_expand", "S1", 0.9, 0.3),
        ]);
        let config = PrepareConfig {
            region: "LGN".into(),
            ..PrepareConfig::default()
        };

        let prepared = prepare_table(&table, &config).unwrap();
        assert_eq!(prepared.rows_matched, 1);
        assert!((prepared.records[0].difference_metric - 0.6).abs() < TOL);
    }

    #[test]
    fn test_csv_labels_with_leading_zeros() -> anyhow::Result<()> {
        use crate::data::loader::load_file;
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
        writeln!(
            file,
            "region,parameter,stimulus_type,subject_id,correlation_by_condition,correlation_overall"
        )?;
        writeln!(file, "01,flynet,ring_expand,007,0.5,0.3")?;
        writeln!(file, "01,flynet,ring_expand,7,0.9,0.3")?;
        writeln!(file, "1,flynet,ring_expand,7,0.0,0.3")?;
        file.flush()?;

        let table = load_file(file.path())?;
        let prepared = prepare_example_data(
            &table.rows,
            "01",
            "flynet",
            "ring_expand",
            &ColumnNames::default(),
        )?;

        assert_eq!(prepared.rows_matched, 2);
        assert!(prepared.warning.is_none());
        assert_eq!(prepared.records.len(), 2);
        assert!((find(&prepared.records, "007", true).difference_metric - 0.2).abs() < TOL);
        assert!((find(&prepared.records, "7", true).difference_metric - 0.6).abs() < TOL);
        Ok(())
    }

    #[test]
    fn test_json_float_labels_keep_their_form() -> anyhow::Result<()> {
        use crate::data::loader::load_file;
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
        writeln!(
            file,
            r#"[
                {{"region": 2.0, "parameter": "flynet", "stimulus_type": "other",
                  "subject_id": 7.0, "correlation_by_condition": 0.4,
                  "correlation_overall": 0.1}},
                {{"region": 2, "parameter": "flynet", "stimulus_type": "other",
                  "subject_id": 7, "correlation_by_condition": 0.9,
                  "correlation_overall": 0.1}}
            ]"#
        )?;
        file.flush()?;

        let table = load_file(file.path())?;
        let columns = ColumnNames::default();

        let prepared = prepare_example_data(&table.rows, "2.0", "flynet", "x", &columns)?;
        assert_eq!(prepared.rows_matched, 1);
        assert_eq!(prepared.records[0].subject_id, "7.0");
        assert!((prepared.records[0].difference_metric - 0.3).abs() < TOL);

        let prepared = prepare_example_data(&table.rows, "2", "flynet", "x", &columns)?;
        assert_eq!(prepared.rows_matched, 1);
        assert_eq!(prepared.records[0].subject_id, "7");
        Ok(())
    }
}
