//! Year/day-of-year colouring of break dates for the QGIS style.
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::core::dates::{date_from_yyyymmdd, day_of_year, yyyymmdd};
use crate::io::writers::qml::PaletteEntry;

/// The 20-colour categorical `tab20` palette
pub const TAB20: [[u8; 3]; 20] = [
    [0x1f, 0x77, 0xb4],
    [0xae, 0xc7, 0xe8],
    [0xff, 0x7f, 0x0e],
    [0xff, 0xbb, 0x78],
    [0x2c, 0xa0, 0x2c],
    [0x98, 0xdf, 0x8a],
    [0xd6, 0x27, 0x28],
    [0xff, 0x98, 0x96],
    [0x94, 0x67, 0xbd],
    [0xc5, 0xb0, 0xd5],
    [0x8c, 0x56, 0x4b],
    [0xc4, 0x9c, 0x94],
    [0xe3, 0x77, 0xc2],
    [0xf7, 0xb6, 0xd2],
    [0x7f, 0x7f, 0x7f],
    [0xc7, 0xc7, 0xc7],
    [0xbc, 0xbd, 0x22],
    [0xdb, 0xdb, 0x8d],
    [0x17, 0xbe, 0xcf],
    [0x9e, 0xda, 0xe5],
];

/// Colour `i` of `tab20` resampled to `n` colours
pub fn tab20_resampled(i: usize, n: usize) -> [f64; 3] {
    let x = if n <= 1 {
        0.0
    } else if i + 1 >= n {
        1.0
    } else {
        i as f64 * (1.0 / (n - 1) as f64)
    };
    let idx = ((x * 20.0).floor() as usize).min(19);
    TAB20[idx].map(|c| c as f64 / 255.0)
}

pub fn rgb_to_hsv([r, g, b]: [f64; 3]) -> [f64; 3] {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let v = maxc;
    if minc == maxc {
        return [0.0, 0.0, v];
    }
    let span = maxc - minc;
    let s = span / maxc;
    let rc = (maxc - r) / span;
    let gc = (maxc - g) / span;
    let bc = (maxc - b) / span;
    let h = if r == maxc {
        bc - gc
    } else if g == maxc {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    [(h / 6.0).rem_euclid(1.0), s, v]
}

pub fn hsv_to_rgb([h, s, v]: [f64; 3]) -> [f64; 3] {
    if s == 0.0 {
        return [v, v, v];
    }
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (i as i64).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Base colour darkened and saturated as the year advances
pub fn shade_for_day(base: [f64; 3], date: NaiveDate) -> [u8; 3] {
    let [h, s, _] = rgb_to_hsv(base);
    let (doy, days) = day_of_year(date);
    let position = (doy - 1) as f64 / (days - 1) as f64;
    let v = 0.9 - position * 0.4;
    let s = s * (0.5 + position * 0.5);
    hsv_to_rgb([h, s, v]).map(|c| (c * 255.0) as u8)
}

/// Palette with one entry per distinct `YYYYMMDD` value, years coloured from
/// `tab20`, followed by a transparent entry for `nodata`.
pub fn break_palette(values: impl IntoIterator<Item = i32>, nodata: i32) -> Vec<PaletteEntry> {
    let mut by_year: BTreeMap<i32, Vec<NaiveDate>> = BTreeMap::new();
    for v in values {
        if v == nodata {
            continue;
        }
        if let Some(date) = date_from_yyyymmdd(v) {
            by_year.entry(date.year()).or_default().push(date);
        }
    }
    let n = by_year.len();
    let mut entries = Vec::new();
    for (i, (_, mut dates)) in by_year.into_iter().enumerate() {
        let base = tab20_resampled(i, n);
        dates.sort();
        dates.dedup();
        for date in dates {
            entries.push(PaletteEntry {
                value: yyyymmdd(date) as i64,
                color: shade_for_day(base, date),
                label: date.format("%Y-%m-%d").to_string(),
                transparent: false,
            });
        }
    }
    entries.push(PaletteEntry {
        value: nodata as i64,
        color: [0, 0, 0],
        label: "No Data".to_string(),
        transparent: true,
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn resampling_spreads_over_palette() {
        assert_eq!(tab20_resampled(0, 1), tab20_resampled(0, 20));
        // two years: first and last colours
        assert_eq!(tab20_resampled(1, 2), TAB20[19].map(|c| c as f64 / 255.0));
        // five years: indices 0, 5, 10, 15, 19
        assert_eq!(tab20_resampled(1, 5), TAB20[5].map(|c| c as f64 / 255.0));
        assert_eq!(tab20_resampled(3, 5), TAB20[15].map(|c| c as f64 / 255.0));
    }

    #[test]
    fn hsv_round_trip() {
        for rgb in [[0.2, 0.4, 0.6], [1.0, 0.5, 0.0], [0.3, 0.3, 0.3], [0.9, 0.1, 0.7]] {
            let back = hsv_to_rgb(rgb_to_hsv(rgb));
            for k in 0..3 {
                assert_abs_diff_eq!(back[k], rgb[k], epsilon = 1e-12);
            }
        }
        let [h, s, v] = rgb_to_hsv([1.0, 0.0, 0.0]);
        assert_eq!((h, s, v), (0.0, 1.0, 1.0));
    }

    #[test]
    fn shading_follows_day_of_year() {
        let base = [1.0, 0.0, 0.0];
        let jan1 = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let dec31 = NaiveDate::from_ymd_opt(2021, 12, 31).unwrap();
        // start of year: v = 0.9, s = 0.5
        assert_eq!(shade_for_day(base, jan1), [229, 114, 114]);
        // end of year: v = 0.5, s = 1.0
        assert_eq!(shade_for_day(base, dec31), [127, 0, 0]);
    }

    #[test]
    fn palette_groups_years_and_ends_with_nodata() {
        let values = [20210305, -9999, 20200101, 20210305, 20210101];
        let palette = break_palette(values, -9999);
        let labels: Vec<_> = palette.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["2020-01-01", "2021-01-01", "2021-03-05", "No Data"]);
        assert_eq!(palette[0].value, 20200101);
        let last = palette.last().unwrap();
        assert!(last.transparent);
        assert_eq!(last.value, -9999);
    }
}
