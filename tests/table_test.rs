//! Property tests for client-side sort and pagination

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use semi_atlas::models::{Company, PublishStatus};
use semi_atlas::table::{paginate, sort_rows, CompanySortField, PageRequest, SortOrder};

fn company(index: usize, name: String, market_cap: Option<u32>) -> Company {
    let at = Utc
        .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(i64::try_from(index % 7).unwrap());
    Company {
        id: Uuid::from_u128(index as u128),
        name,
        name_en: None,
        ticker: None,
        region: None,
        industry: None,
        description: None,
        website: None,
        headquarters: None,
        founded_year: None,
        employees: None,
        market_cap: market_cap.map(f64::from),
        revenue: None,
        status: PublishStatus::Published,
        created_at: at,
        updated_at: at,
    }
}

fn companies() -> impl Strategy<Value = Vec<Company>> {
    prop::collection::vec(("[a-c]{1,2}", prop::option::of(0u32..5)), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (name, cap))| company(i, name, cap))
            .collect()
    })
}

fn field() -> impl Strategy<Value = CompanySortField> {
    prop_oneof![
        Just(CompanySortField::Name),
        Just(CompanySortField::MarketCap),
        Just(CompanySortField::UpdatedAt),
    ]
}

fn order() -> impl Strategy<Value = SortOrder> {
    prop_oneof![Just(SortOrder::Asc), Just(SortOrder::Desc)]
}

proptest! {
    #[test]
    fn sorting_twice_equals_sorting_once(rows in companies(), field in field(), order in order()) {
        let mut once = rows.clone();
        sort_rows(&mut once, field, order);
        let mut twice = once.clone();
        sort_rows(&mut twice, field, order);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn equal_keys_keep_their_input_order(rows in companies(), order in order()) {
        let mut sorted = rows.clone();
        sort_rows(&mut sorted, CompanySortField::Name, order);

        // ids were assigned in input order
        for pair in sorted.windows(2) {
            if pair[0].name == pair[1].name {
                prop_assert!(pair[0].id < pair[1].id);
            }
        }
    }

    #[test]
    fn pages_cover_the_result_set_exactly(rows in companies(), page_size in 1usize..10) {
        let total = rows.len();
        let request = |page| PageRequest::new(page, page_size, 100).unwrap();

        let first = paginate(rows.clone(), request(1));
        let mut seen = Vec::new();
        for page in 1..=first.total_pages {
            let chunk = paginate(rows.clone(), request(page));
            prop_assert!(!chunk.is_empty());
            prop_assert!(chunk.data.len() <= page_size);
            seen.extend(chunk.data);
        }
        prop_assert_eq!(seen, rows.clone());

        let past_end = paginate(rows, request(first.total_pages + 1));
        prop_assert!(past_end.is_empty());
        prop_assert_eq!(past_end.total, total);
    }
}

#[test]
fn missing_market_caps_sort_last_when_descending() {
    let mut rows = vec![
        company(0, "a".to_string(), None),
        company(1, "b".to_string(), Some(3)),
        company(2, "c".to_string(), Some(9)),
    ];
    sort_rows(&mut rows, CompanySortField::MarketCap, SortOrder::Desc);
    let names: Vec<_> = rows.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["c", "b", "a"]);
}

#[test]
fn page_zero_is_empty_and_oversized_pages_are_rejected() {
    let rows: Vec<_> = (0..3).map(|i| company(i, format!("n{i}"), None)).collect();

    let page = paginate(rows, PageRequest::new(0, 2, 100).unwrap());
    assert!(page.is_empty());
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 2);

    assert!(PageRequest::new(1, 0, 100).is_err());
    assert!(PageRequest::new(1, 101, 100).is_err());
}
