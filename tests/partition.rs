use chrono::{Days, NaiveDate};

use gpiv::error::PartitionError;
use gpiv::model::GAME_TYPE_REGULAR;
use gpiv::partition::{DateCatalog, PartitionSelector, partition_dates};
use gpiv::store::Store;
use gpiv::synthetic::{SyntheticConfig, generate};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn season_dates() -> Vec<(NaiveDate, usize)> {
    // uneven schedule with gaps between game days
    let counts = [3, 1, 7, 2, 2, 9, 4, 1, 1, 6, 5, 3, 8, 2, 4];
    counts
        .iter()
        .enumerate()
        .map(|(i, n)| (d(2013, 10, 1) + Days::new(2 * i as u64), *n))
        .collect()
}

#[test]
fn segments_cover_the_season_contiguously() {
    let per_date = season_dates();
    let total: usize = per_date.iter().map(|(_, n)| n).sum();
    let first = per_date[0].0;
    let last = per_date[per_date.len() - 1].0;

    for count in 1..=6 {
        let segments = partition_dates(2013, &per_date, count).unwrap();
        assert_eq!(segments.len(), count as usize);
        assert_eq!(segments[0].start, first);
        assert_eq!(segments[segments.len() - 1].end, last);
        for pair in segments.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + Days::new(1));
        }
        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.index, i as u32 + 1);
            assert!(seg.start <= seg.end);
            let in_range: usize = per_date
                .iter()
                .filter(|(date, _)| *date >= seg.start && *date <= seg.end)
                .map(|(_, n)| n)
                .sum();
            assert_eq!(seg.games, in_range);
        }
        assert_eq!(segments.iter().map(|s| s.games).sum::<usize>(), total);
    }
}

#[test]
fn segment_sizes_stay_near_the_target() {
    let per_date = season_dates();
    let total: usize = per_date.iter().map(|(_, n)| n).sum();
    let largest_day = per_date.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let segments = partition_dates(2013, &per_date, 3).unwrap();
    let target = total as f64 / 3.0;
    for seg in &segments {
        assert!((seg.games as f64 - target).abs() <= largest_day as f64 * 1.5);
    }
}

#[test]
fn too_many_partitions_for_the_schedule() {
    let per_date = vec![(d(2013, 10, 1), 4), (d(2013, 10, 2), 4)];
    assert_eq!(
        partition_dates(2013, &per_date, 3),
        Err(PartitionError::TooManyPartitions {
            season: 2013,
            count: 3,
            dates: 2
        })
    );
    assert_eq!(
        partition_dates(2014, &[], 1),
        Err(PartitionError::EmptySeason { season: 2014 })
    );
}

#[test]
fn store_catalog_counts_distinct_games_per_date() {
    let corpus = generate(&SyntheticConfig {
        games: 12,
        games_per_day: 4,
        ..SyntheticConfig::default()
    });
    let mut store = Store::open_in_memory().unwrap();
    corpus.load_into(&mut store).unwrap();

    let per_date = store.games_per_date(2013, GAME_TYPE_REGULAR).unwrap();
    assert_eq!(
        per_date,
        vec![
            (d(2013, 10, 1), 4),
            (d(2013, 10, 2), 4),
            (d(2013, 10, 3), 4)
        ]
    );
    assert!(store.games_per_date(2014, GAME_TYPE_REGULAR).unwrap().is_empty());
}

#[test]
fn indexed_partition_resolves_to_a_date_bounded_query() {
    let corpus = generate(&SyntheticConfig {
        games: 30,
        games_per_day: 3,
        ..SyntheticConfig::default()
    });
    let mut store = Store::open_in_memory().unwrap();
    corpus.load_into(&mut store).unwrap();

    let selector = PartitionSelector::IndexedPartition {
        season: 2013,
        count: 2,
        index: 2,
    };
    let resolved = selector.resolve(&store).unwrap();
    assert_eq!(resolved.label, "2013_partition_2_part2");
    assert_eq!(resolved.suffix, "_2013_partition_2_part2");
    let segment = resolved.segment.expect("indexed partitions carry a segment");
    assert_eq!(segment.start, d(2013, 10, 6));
    assert_eq!(segment.end, d(2013, 10, 10));
    assert_eq!(segment.games, 15);
    assert_eq!(resolved.reference.dates, Some((segment.start, segment.end)));
    assert!(resolved.evaluation.is_none());

    let events = store.load_events(&resolved.reference).unwrap();
    assert!(!events.is_empty());
    assert!(
        events
            .iter()
            .all(|e| e.game_date.is_some_and(|date| date >= segment.start))
    );
}

#[test]
fn indexed_partition_out_of_range_fails_before_loading() {
    let store = Store::open_in_memory().unwrap();
    let selector = PartitionSelector::IndexedPartition {
        season: 2013,
        count: 2,
        index: 3,
    };
    let err = selector.resolve(&store).unwrap_err();
    assert!(err.to_string().contains("3"));
}

#[test]
fn multi_season_uses_prior_seasons_for_statistics() {
    let store = Store::open_in_memory().unwrap();
    let selector = PartitionSelector::MultiSeason {
        first_season: 2011,
        evaluation_season: 2013,
        playoffs: false,
    };
    let resolved = selector.resolve(&store).unwrap();
    assert_eq!(resolved.reference.seasons, Some((2011, 2012)));
    let eval = resolved.evaluation.expect("evaluation corpus");
    assert_eq!(eval.seasons, Some((2013, 2013)));
    assert_eq!(eval.game_type, GAME_TYPE_REGULAR);
    assert!(eval.dates.is_none());
}

#[test]
fn date_range_split_gives_disjoint_corpora() {
    let store = Store::open_in_memory().unwrap();
    let selector = PartitionSelector::DateRange {
        start: d(2013, 10, 1),
        end: d(2013, 12, 31),
        evaluation_start: Some(d(2013, 12, 1)),
        playoffs: false,
    };
    let resolved = selector.resolve(&store).unwrap();
    assert_eq!(resolved.reference.dates, Some((d(2013, 10, 1), d(2013, 11, 30))));
    let eval = resolved.evaluation.expect("split range has an evaluation corpus");
    assert_eq!(eval.dates, Some((d(2013, 12, 1), d(2013, 12, 31))));
    assert!(resolved.reference.seasons.is_none());
    assert!(eval.seasons.is_none());
}
