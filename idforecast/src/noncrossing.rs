//! Removal of quantile crossing
//!
//! Rows are grouped by (location, reference_date, horizon, target_end_date,
//! target, output_type). Inside a group the quantile labels are sorted by
//! their numeric level and the values ascending, and both are handed back
//! to the group's rows positionally: the k-th smallest value is paired with
//! the k-th smallest level. Which model produced a value is not preserved.

use crate::error::{ForecastError, Result};
use crate::hub::HubRow;
use chrono::NaiveDate;
use std::collections::HashMap;

type GroupKey = (String, NaiveDate, i64, NaiveDate, String, String);

fn group_key(row: &HubRow) -> GroupKey {
    (
        row.location.clone(),
        row.reference_date,
        row.horizon,
        row.target_end_date,
        row.target.clone(),
        row.output_type.clone(),
    )
}

/// Reorder values within each group so they are non-decreasing in quantile level.
///
/// Row order of the table is preserved.
pub fn sort_noncrossing(mut rows: Vec<HubRow>) -> Result<Vec<HubRow>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        let g = *index.entry(group_key(row)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[g].push(i);
    }

    for members in groups.iter().filter(|m| m.len() > 1) {
        let mut labels = members
            .iter()
            .map(|&i| {
                let label = &rows[i].output_type_id;
                label
                    .parse::<f64>()
                    .map(|level| (level, label.clone()))
                    .map_err(|_| {
                        ForecastError::DataError(format!(
                            "quantile label {:?} is not a number",
                            label
                        ))
                    })
            })
            .collect::<Result<Vec<(f64, String)>>>()?;
        labels.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut values: Vec<f64> = members.iter().map(|&i| rows[i].value).collect();
        values.sort_by(f64::total_cmp);

        for ((&i, (_, label)), value) in members.iter().zip(labels).zip(values) {
            rows[i].output_type_id = label;
            rows[i].value = value;
        }
    }

    Ok(rows)
}
