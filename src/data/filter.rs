use super::model::Observation;

// ---------------------------------------------------------------------------
// Filter predicate: which region/parameter slice is kept
// ---------------------------------------------------------------------------

/// Equality predicate on two categorical columns.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub region_column: &'a str,
    pub region: &'a str,
    pub parameter_column: &'a str,
    pub parameter: &'a str,
}

impl Selection<'_> {
    /// A row passes when both its region and parameter cells equal the
    /// selected labels. Rows lacking either cell never pass.
    pub fn matches(&self, row: &Observation) -> bool {
        row.text_equals(self.region_column, self.region)
            && row.text_equals(self.parameter_column, self.parameter)
    }
}

/// Return `(index, row)` pairs for rows passing the selection, in input order.
pub fn filtered_rows<'r>(
    rows: &'r [Observation],
    selection: &Selection<'_>,
) -> Vec<(usize, &'r Observation)> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| selection.matches(row))
        .collect()
}
