use chrono::NaiveDate;
use ndarray::ArrayView2;

/// Observations of one pixel on both sides of a reference date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationWindow {
    /// Valid dates of band 0 up to the reference date, ascending
    pub dates_before: Vec<NaiveDate>,
    /// Valid dates of band 0 after the reference date, ascending
    pub dates_after: Vec<NaiveDate>,
    /// Per band, values up to the reference date in date order
    pub values_before: Vec<Vec<i64>>,
    pub values_after: Vec<Vec<i64>>,
}

/// Split valid `(date, value)` pairs around `mid`: the `n` latest on or before
/// it and the `n` earliest after it, both ascending.
fn split_around(mut obs: Vec<(NaiveDate, i64)>, mid: NaiveDate, n: usize) -> (Vec<(NaiveDate, i64)>, Vec<(NaiveDate, i64)>) {
    obs.sort_by_key(|(d, _)| *d);
    let cut = obs.partition_point(|(d, _)| *d <= mid);
    let after: Vec<_> = obs[cut..].iter().take(n).copied().collect();
    let before: Vec<_> = obs[cut.saturating_sub(n)..cut].to_vec();
    (before, after)
}

/// Observation window of a pixel.
///
/// `series` is `(date, band)`; rows beyond `dates.len()` are ignored. Each band
/// uses its own validity (`value != nodata`). When band 0 has no valid value
/// every list stays empty.
pub fn pixel_window(
    series: ArrayView2<'_, i64>,
    dates: &[NaiveDate],
    mid: NaiveDate,
    n_obs: usize,
    nodata: i64,
) -> ObservationWindow {
    let bands = series.ncols();
    let valid = |band: usize| -> Vec<(NaiveDate, i64)> {
        dates
            .iter()
            .zip(series.column(band).iter())
            .filter(|(_, v)| **v != nodata)
            .map(|(d, v)| (*d, *v))
            .collect()
    };
    let mut window = ObservationWindow {
        values_before: vec![Vec::new(); bands],
        values_after: vec![Vec::new(); bands],
        ..ObservationWindow::default()
    };
    if bands == 0 {
        return window;
    }
    let base = valid(0);
    if base.is_empty() {
        return window;
    }
    let (before, after) = split_around(base, mid, n_obs);
    window.dates_before = before.iter().map(|(d, _)| *d).collect();
    window.dates_after = after.iter().map(|(d, _)| *d).collect();

    for b in 0..bands {
        let (before, after) = split_around(valid(b), mid, n_obs);
        window.values_before[b] = before.into_iter().map(|(_, v)| v).collect();
        window.values_after[b] = after.into_iter().map(|(_, v)| v).collect();
    }
    window
}
