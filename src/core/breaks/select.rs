//! Per-pixel break selection over the records of one file.
use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::core::dates::millis_from_date;
use crate::io::parquet::BreakRecord;
use crate::io::vector::Boundary;

/// Inclusive break-date window, bounds at UTC midnight
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateWindow {
    pub start_millis: Option<i64>,
    pub end_millis: Option<i64>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start_millis: start.map(millis_from_date),
            end_millis: end.map(millis_from_date),
        }
    }

    pub fn is_open(&self) -> bool {
        self.start_millis.is_none() && self.end_millis.is_none()
    }

    /// Records without a date never pass a bounded window
    pub fn contains(&self, t_break: Option<i64>) -> bool {
        if self.is_open() {
            return true;
        }
        let Some(t) = t_break else {
            return false;
        };
        self.start_millis.is_none_or(|s| t >= s) && self.end_millis.is_none_or(|e| t <= e)
    }
}

/// Pick the record of one pixel: the only one, or the one with the
/// second-highest break date. Among equal dates the record appearing later
/// ranks lower. Records without a date are left out of the ranking.
pub fn select_break(group: &[BreakRecord]) -> Option<BreakRecord> {
    match group {
        [] => None,
        [only] => Some(*only),
        _ => {
            let mut ranked: Vec<&BreakRecord> = group.iter().filter(|r| r.t_break.is_some()).collect();
            // stable sort keeps file order among ties
            ranked.sort_by(|a, b| b.t_break.cmp(&a.t_break));
            ranked.get(1).or_else(|| ranked.first()).map(|r| **r)
        }
    }
}

fn coord_order(a: &BreakRecord, b: &BreakRecord) -> Ordering {
    a.x_coord
        .total_cmp(&b.x_coord)
        .then(a.y_coord.total_cmp(&b.y_coord))
}

/// Apply the boundary, group by exact coordinates, window each group and
/// select one record per pixel. Output is ordered by `(x, y)`.
pub fn select_file_breaks(
    records: Vec<BreakRecord>,
    window: &DateWindow,
    boundary: Option<&Boundary>,
) -> Vec<BreakRecord> {
    let mut records: Vec<BreakRecord> = match boundary {
        Some(b) => records
            .into_iter()
            .filter(|r| b.within(r.x_coord, r.y_coord))
            .collect(),
        None => records,
    };
    records.sort_by(coord_order);

    let mut selected = Vec::new();
    for group in records.chunk_by(|a, b| coord_order(a, b) == Ordering::Equal) {
        let kept: Vec<BreakRecord> = group
            .iter()
            .filter(|r| window.contains(r.t_break))
            .copied()
            .collect();
        if let Some(choice) = select_break(&kept) {
            selected.push(choice);
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, polygon};

    fn rec(x: f64, y: f64, t: Option<i64>) -> BreakRecord {
        BreakRecord {
            x_coord: x,
            y_coord: y,
            t_break: t,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> i64 {
        millis_from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn single_record_is_kept_even_without_date() {
        assert_eq!(select_break(&[rec(1.0, 1.0, None)]), Some(rec(1.0, 1.0, None)));
    }

    #[test]
    fn second_highest_wins() {
        let group = [rec(0.0, 0.0, Some(10)), rec(0.0, 0.0, Some(30)), rec(0.0, 0.0, Some(20))];
        assert_eq!(select_break(&group).unwrap().t_break, Some(20));
    }

    #[test]
    fn missing_dates_are_not_ranked() {
        let group = [rec(0.0, 0.0, None), rec(0.0, 0.0, Some(5))];
        assert_eq!(select_break(&group).unwrap().t_break, Some(5));
        assert_eq!(select_break(&[rec(0.0, 0.0, None), rec(0.0, 0.0, None)]), None);
    }

    #[test]
    fn ties_pick_the_later_record() {
        let a = BreakRecord { x_coord: 0.0, y_coord: 0.0, t_break: Some(7) };
        let b = BreakRecord { x_coord: 0.0, y_coord: 0.0, t_break: Some(7) };
        let group = [a, rec(0.0, 0.0, Some(1)), b];
        // both candidates are equal; the second in file order is chosen
        assert_eq!(select_break(&group), Some(b));
    }

    #[test]
    fn window_is_inclusive_at_midnight() {
        let w = DateWindow::new(
            NaiveDate::from_ymd_opt(2020, 1, 1),
            NaiveDate::from_ymd_opt(2020, 12, 31),
        );
        assert!(w.contains(Some(day(2020, 1, 1))));
        assert!(w.contains(Some(day(2020, 12, 31))));
        assert!(!w.contains(Some(day(2020, 12, 31) + 1)));
        assert!(!w.contains(Some(day(2019, 12, 31))));
        assert!(!w.contains(None));
        assert!(DateWindow::default().contains(None));
    }

    #[test]
    fn file_groups_filtered_then_selected() {
        let records = vec![
            rec(20.0, 5.0, Some(day(2021, 3, 1))),
            rec(10.0, 5.0, Some(day(2019, 6, 1))),
            rec(10.0, 5.0, Some(day(2021, 6, 1))),
            rec(10.0, 5.0, Some(day(2022, 6, 1))),
            rec(20.0, 5.0, Some(day(2018, 3, 1))),
            rec(30.0, 5.0, Some(day(2018, 3, 1))),
        ];
        let window = DateWindow::new(NaiveDate::from_ymd_opt(2020, 1, 1), None);
        let out = select_file_breaks(records, &window, None);
        assert_eq!(
            out,
            vec![rec(10.0, 5.0, Some(day(2021, 6, 1))), rec(20.0, 5.0, Some(day(2021, 3, 1)))]
        );
    }

    #[test]
    fn boundary_applies_before_grouping() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 15.0, y: 0.0), (x: 15.0, y: 15.0), (x: 0.0, y: 15.0), (x: 0.0, y: 0.0)];
        let boundary = Boundary::new(MultiPolygon::new(vec![square]));
        let records = vec![rec(10.0, 5.0, Some(1)), rec(20.0, 5.0, Some(2)), rec(15.0, 5.0, Some(3))];
        let out = select_file_breaks(records, &DateWindow::default(), Some(&boundary));
        assert_eq!(out, vec![rec(10.0, 5.0, Some(1))]);
    }
}
