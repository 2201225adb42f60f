use chrono::NaiveDate;

use super::window::ObservationWindow;
use crate::core::dates::compact;
use crate::io::parquet::{Column, Table};

/// One pixel inside one reference event
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    pub x: f64,
    pub y: f64,
    pub idx_h5: usize,
    pub data_0: NaiveDate,
    pub data_1: Option<NaiveDate>,
    pub data_mid: NaiveDate,
    pub window: ObservationWindow,
    pub id: String,
    pub buffer_id: String,
}

fn date_columns<F>(table: &mut Table, rows: &[ObservationRow], prefix: &str, n: usize, pick: F)
where
    F: Fn(&ObservationRow) -> &Vec<NaiveDate>,
{
    for i in 0..n {
        let values = rows.iter().map(|r| pick(r).get(i).map(|d| compact(*d))).collect();
        table.push(format!("{}{}", prefix, i + 1), Column::Text(values));
    }
}

fn value_columns<F>(table: &mut Table, rows: &[ObservationRow], prefix: &str, n: usize, pick: F)
where
    F: Fn(&ObservationRow) -> Option<&Vec<i64>>,
{
    for i in 0..n {
        let values = rows
            .iter()
            .map(|r| pick(r).and_then(|v| v.get(i).copied()))
            .collect();
        table.push(format!("{}{}", prefix, i + 1), Column::Int(values));
    }
}

/// Flatten rows into the output table: fixed columns, then
/// `dts_a1..n, dts_d1..n` and `{band}_a1..n, {band}_d1..n` per band.
/// Event ids are not written.
pub fn observation_table(rows: &[ObservationRow], band_names: &[String], n_obs: usize) -> Table {
    let mut table = Table::default();
    table.push("x", Column::Float(rows.iter().map(|r| Some(r.x)).collect()));
    table.push("y", Column::Float(rows.iter().map(|r| Some(r.y)).collect()));
    table.push(
        "idx_h5",
        Column::Int(rows.iter().map(|r| Some(r.idx_h5 as i64)).collect()),
    );
    table.push(
        "data_0",
        Column::Text(rows.iter().map(|r| Some(compact(r.data_0))).collect()),
    );
    table.push(
        "data_1",
        Column::Text(rows.iter().map(|r| r.data_1.map(compact)).collect()),
    );
    table.push(
        "data_mid",
        Column::Text(rows.iter().map(|r| Some(compact(r.data_mid))).collect()),
    );

    date_columns(&mut table, rows, "dts_a", n_obs, |r| &r.window.dates_before);
    date_columns(&mut table, rows, "dts_d", n_obs, |r| &r.window.dates_after);
    for (b, name) in band_names.iter().enumerate() {
        value_columns(&mut table, rows, &format!("{}_a", name), n_obs, |r| {
            r.window.values_before.get(b)
        });
        value_columns(&mut table, rows, &format!("{}_d", name), n_obs, |r| {
            r.window.values_after.get(b)
        });
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_expanded_in_order() {
        let d = |day| NaiveDate::from_ymd_opt(2022, 5, day).unwrap();
        let row = ObservationRow {
            x: 1.0,
            y: 2.0,
            idx_h5: 7,
            data_0: d(10),
            data_1: None,
            data_mid: d(10),
            window: ObservationWindow {
                dates_before: vec![d(1), d(6)],
                dates_after: vec![d(11)],
                values_before: vec![vec![100, 200], vec![5]],
                values_after: vec![vec![300], vec![]],
            },
            id: "a".to_string(),
            buffer_id: "a".to_string(),
        };
        let bands = vec!["g".to_string(), "r".to_string()];
        let table = observation_table(&[row], &bands, 2);
        assert_eq!(
            table.names(),
            vec![
                "x", "y", "idx_h5", "data_0", "data_1", "data_mid", "dts_a1", "dts_a2", "dts_d1",
                "dts_d2", "g_a1", "g_a2", "g_d1", "g_d2", "r_a1", "r_a2", "r_d1", "r_d2"
            ]
        );
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column("dts_a2"), Some(&Column::Text(vec![Some("20220506".to_string())])));
        assert_eq!(table.column("dts_d2"), Some(&Column::Text(vec![None])));
        assert_eq!(table.column("g_a1"), Some(&Column::Int(vec![Some(100)])));
        assert_eq!(table.column("r_a2"), Some(&Column::Int(vec![None])));
        assert_eq!(table.column("data_1"), Some(&Column::Text(vec![None])));
    }
}
