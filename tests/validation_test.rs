//! Comprehensive unit tests for validation.rs module

use chrono::{Datelike, NaiveDate, Utc};
use std::path::Path;

use semi_atlas::models::{NewCompany, NewInsight, NewRoadmap, NewUser, RoadmapChanges};
use semi_atlas::validation::{InputValidator, MIN_FOUNDED_YEAR};
use uuid::Uuid;

#[test]
fn test_validate_company_name_valid() {
    assert!(InputValidator::validate_company_name("台积电").is_ok());
    assert!(InputValidator::validate_company_name("Applied Materials").is_ok());
}

#[test]
fn test_validate_company_name_empty() {
    assert!(InputValidator::validate_company_name("").is_err());
    assert!(InputValidator::validate_company_name("   ").is_err());
}

#[test]
fn test_validate_company_name_length_counts_characters() {
    let name = "晶".repeat(255);
    assert!(InputValidator::validate_company_name(&name).is_ok());
    let name = "晶".repeat(256);
    assert!(InputValidator::validate_company_name(&name).is_err());
}

#[test]
fn test_validate_company_name_with_control_characters() {
    assert!(InputValidator::validate_company_name("SMIC\0").is_err());
    assert!(InputValidator::validate_company_name("SMIC\nHK").is_err());
}

#[test]
fn test_validate_ticker() {
    for ticker in ["NVDA", "2330.TW", "688981.SH", "BRK-B", "TSE:8035"] {
        assert!(InputValidator::validate_ticker(ticker).is_ok(), "{ticker}");
    }
    assert!(InputValidator::validate_ticker("").is_err());
    assert!(InputValidator::validate_ticker("NV DA").is_err());
    assert!(InputValidator::validate_ticker(".TW").is_err());
}

#[test]
fn test_validate_email() {
    assert!(InputValidator::validate_email("admin@example.com").is_ok());
    assert!(InputValidator::validate_email("a.b+c@sub.example.org").is_ok());
    assert!(InputValidator::validate_email("").is_err());
    assert!(InputValidator::validate_email("no-at-sign").is_err());
    assert!(InputValidator::validate_email("two@@example.com").is_err());
    assert!(InputValidator::validate_email("user@localhost").is_err());
}

#[test]
fn test_validate_url() {
    assert!(InputValidator::validate_url("https://www.tsmc.com").is_ok());
    assert!(InputValidator::validate_url("http://example.com/a?b=c").is_ok());
    assert!(InputValidator::validate_url("www.tsmc.com").is_err());
    assert!(InputValidator::validate_url("ftp://example.com").is_err());
}

#[test]
fn test_validate_founded_year_bounds() {
    let current = Utc::now().year();
    assert!(InputValidator::validate_founded_year(MIN_FOUNDED_YEAR).is_ok());
    assert!(InputValidator::validate_founded_year(current).is_ok());
    assert!(InputValidator::validate_founded_year(MIN_FOUNDED_YEAR - 1).is_err());
    assert!(InputValidator::validate_founded_year(current + 1).is_err());
}

#[test]
fn test_validate_percentage_and_amounts() {
    assert!(InputValidator::validate_percentage(0.0).is_ok());
    assert!(InputValidator::validate_percentage(100.0).is_ok());
    assert!(InputValidator::validate_percentage(100.1).is_err());
    assert!(InputValidator::validate_non_negative("investment", 0.0).is_ok());
    assert!(InputValidator::validate_non_negative("investment", -1.0).is_err());
    assert!(InputValidator::validate_non_negative("investment", f64::NAN).is_err());
}

#[test]
fn test_validate_date_range() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1);
    let end = NaiveDate::from_ymd_opt(2025, 12, 31);
    assert!(InputValidator::validate_date_range(start, end).is_ok());
    assert!(InputValidator::validate_date_range(end, start).is_err());
    assert!(InputValidator::validate_date_range(None, end).is_ok());
    assert!(InputValidator::validate_date_range(start, start).is_ok());
}

#[test]
fn test_validate_page_size() {
    assert!(InputValidator::validate_page_size(10, 100).is_ok());
    assert!(InputValidator::validate_page_size(100, 100).is_ok());
    assert!(InputValidator::validate_page_size(0, 100).is_err());
    assert!(InputValidator::validate_page_size(101, 100).is_err());
}

#[test]
fn test_validate_file_path() {
    assert!(InputValidator::validate_file_path(Path::new("imports/companies.csv")).is_ok());
    assert!(InputValidator::validate_file_path(Path::new("")).is_err());
    assert!(InputValidator::validate_file_path(Path::new("../etc/passwd")).is_err());
    assert!(InputValidator::validate_file_path(Path::new("~/secrets.csv")).is_err());
}

#[test]
fn test_sanitize_text() {
    assert_eq!(InputValidator::sanitize_text("  hello\u{7}world \n"), "helloworld");
    assert_eq!(InputValidator::sanitize_text("line1\nline2"), "line1\nline2");
}

#[test]
fn test_validate_database_url() {
    assert!(InputValidator::validate_database_url("sqlite:data/semi-atlas.db").is_ok());
    assert!(InputValidator::validate_database_url("").is_err());
    assert!(InputValidator::validate_database_url(&"x".repeat(1001)).is_err());
}

#[test]
fn test_validate_new_company_checks_every_field() {
    let good = NewCompany {
        name: "阿斯麦".to_string(),
        ticker: Some("ASML".to_string()),
        website: Some("https://www.asml.com".to_string()),
        founded_year: Some(1984),
        employees: Some(42_000),
        market_cap: Some(2_500.0),
        ..NewCompany::default()
    };
    assert!(InputValidator::validate_new_company(&good).is_ok());

    let negative_staff = NewCompany {
        employees: Some(-5),
        ..good.clone()
    };
    assert!(InputValidator::validate_new_company(&negative_staff).is_err());

    let bad_site = NewCompany {
        website: Some("asml".to_string()),
        ..good
    };
    assert!(InputValidator::validate_new_company(&bad_site).is_err());
}

#[test]
fn test_validate_roadmap_forms() {
    let roadmap = NewRoadmap {
        node: Some("2nm".to_string()),
        yield_rate: Some(85.0),
        start_date: NaiveDate::from_ymd_opt(2023, 1, 1),
        end_date: NaiveDate::from_ymd_opt(2025, 12, 31),
        ..NewRoadmap::for_company(Uuid::new_v4())
    };
    assert!(InputValidator::validate_new_roadmap(&roadmap).is_ok());

    let reversed = NewRoadmap {
        start_date: roadmap.end_date,
        end_date: roadmap.start_date,
        ..roadmap.clone()
    };
    assert!(InputValidator::validate_new_roadmap(&reversed).is_err());

    let changes = RoadmapChanges {
        yield_rate: Some(120.0),
        ..RoadmapChanges::default()
    };
    assert!(InputValidator::validate_roadmap_changes(&changes).is_err());
}

#[test]
fn test_validate_insight_and_user_forms() {
    let insight = NewInsight {
        title: "HBM 供需展望".to_string(),
        cover_image: Some("https://cdn.example.com/hbm.png".to_string()),
        ..NewInsight::default()
    };
    assert!(InputValidator::validate_new_insight(&insight).is_ok());
    assert!(InputValidator::validate_new_insight(&NewInsight::default()).is_err());

    let user = NewUser {
        email: " editor@example.com ".to_string(),
        ..NewUser::default()
    };
    assert!(InputValidator::validate_new_user(&user).is_ok());
    let user = NewUser {
        email: "editor".to_string(),
        ..NewUser::default()
    };
    assert!(InputValidator::validate_new_user(&user).is_err());
}
