use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use pretty_assertions::assert_eq;
use rstest::rstest;
use sales_forecast::data::{Exogenous, GroupKey, Observation};
use sales_forecast::features::{build_feature_frame, FeatureLayout};

fn series(store: u32, dept: u32, values: &[f64]) -> Vec<Observation> {
    let start = NaiveDate::from_ymd_opt(2010, 2, 5).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| Observation {
            store,
            dept,
            date: start + Duration::weeks(i as i64),
            weekly_sales: v,
            is_holiday: 0,
            exogenous: Exogenous::default(),
            store_type: None,
        })
        .collect()
}

fn layout() -> FeatureLayout {
    FeatureLayout::new(vec![1, 2, 4], vec![4, 8, 12])
}

#[rstest]
#[case(0, 1)]
#[case(1, 2)]
#[case(2, 4)]
fn test_lag_values(#[case] column: usize, #[case] lag: usize) {
    let values: Vec<f64> = (1..=15).map(f64::from).collect();
    let frame = build_feature_frame(&series(1, 1, &values), &layout()).unwrap();

    for (t, row) in frame.iter().enumerate() {
        let expected = if t >= lag { Some(values[t - lag]) } else { None };
        assert_eq!(row.lags[column], expected, "lag_{lag} at row {t}");
    }
}

#[rstest]
#[case(0, 4)]
#[case(1, 8)]
#[case(2, 12)]
fn test_rolling_means_exclude_current_row(#[case] column: usize, #[case] window: usize) {
    let values: Vec<f64> = (0..20).map(|i| (i * i) as f64).collect();
    let frame = build_feature_frame(&series(1, 1, &values), &layout()).unwrap();

    for (t, row) in frame.iter().enumerate() {
        match row.rolling_means[column] {
            Some(mean) => {
                assert!(t >= window, "rollmean_{window} defined too early at {t}");
                let expected = values[t - window..t].iter().sum::<f64>() / window as f64;
                assert_relative_eq!(mean, expected, epsilon = 1e-9);
            }
            None => assert!(t < window, "rollmean_{window} missing at {t}"),
        }
    }
}

#[test]
fn test_groups_never_mix() {
    let a = series(1, 1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let b = series(1, 2, &[100.0, 200.0, 300.0, 400.0, 500.0, 600.0]);
    let c = series(2, 1, &[-1.0, -2.0, -3.0, -4.0, -5.0, -6.0]);

    let ordered: Vec<Observation> = a.iter().chain(&b).chain(&c).cloned().collect();
    // interleave the groups and reverse time
    let mut shuffled = Vec::new();
    for i in (0..6).rev() {
        shuffled.push(c[i].clone());
        shuffled.push(a[i].clone());
        shuffled.push(b[i].clone());
    }

    let expected = build_feature_frame(&ordered, &layout()).unwrap();
    let actual = build_feature_frame(&shuffled, &layout()).unwrap();
    assert_eq!(actual, expected);

    let first_b = actual.iter().find(|r| r.key == GroupKey::new(1, 2)).unwrap();
    assert_eq!(first_b.lags, vec![None, None, None]);
    let last_b = actual.iter().rev().find(|r| r.key == GroupKey::new(1, 2)).unwrap();
    assert_eq!(last_b.lags[0], Some(500.0));
    assert_eq!(last_b.rolling_means[0], Some(350.0));
}

#[test]
fn test_output_sorted_by_group_and_date() {
    let mut rows = series(2, 1, &[1.0, 2.0]);
    rows.extend(series(1, 1, &[3.0, 4.0]));
    rows.reverse();

    let frame = build_feature_frame(&rows, &layout()).unwrap();
    let order: Vec<(GroupKey, NaiveDate)> = frame.iter().map(|r| (r.key, r.date)).collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
}
