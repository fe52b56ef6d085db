//! Integration tests for the SQLite catalog and its repository

use std::sync::Arc;
use std::time::Duration;

use semi_atlas::db::Database;
use semi_atlas::error::AtlasError;
use semi_atlas::metrics::MetricsCollector;
use semi_atlas::models::{
    CompanyChanges, Industry, InsightChanges, NewCompany, NewInsight, NewRoadmap, NewUser,
    PublishStatus, Region, RoadmapStatus, UserRole,
};
use semi_atlas::query::{CompanyFilter, InsightFilter, RoadmapFilter, UserFilter};
use semi_atlas::repository::{Repository, SqliteRepository};
use tempfile::TempDir;

fn open_catalog() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("catalog.db");
    let db = Database::new(&format!("sqlite://{}", db_path.display())).expect("Failed to create database");
    (temp_dir, db)
}

fn repository(db: &Database) -> SqliteRepository {
    SqliteRepository::new(db.clone(), Arc::new(MetricsCollector::default()))
}

fn named(name: &str) -> NewCompany {
    NewCompany {
        name: name.to_string(),
        ..NewCompany::default()
    }
}

#[test]
fn test_database_creation_and_connection() {
    let (_dir, db) = open_catalog();
    let _conn = db.get_connection().expect("Failed to get database connection");
}

#[tokio::test]
async fn test_new_company_defaults_to_published_with_equal_timestamps() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let company = repo
        .create_company(&NewCompany {
            name: "中芯国际".to_string(),
            region: Some(Region::MainlandChina),
            industry: Some(Industry::Manufacturing),
            ..NewCompany::default()
        })
        .await
        .expect("Failed to create company");

    assert_eq!(company.name, "中芯国际");
    assert_eq!(company.region, Some(Region::MainlandChina));
    assert_eq!(company.industry, Some(Industry::Manufacturing));
    assert_eq!(company.status, PublishStatus::Published);
    assert_eq!(company.created_at, company.updated_at);
}

#[tokio::test]
async fn test_update_bumps_updated_at_and_keeps_other_columns() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let company = repo
        .create_company(&NewCompany {
            name: "台积电".to_string(),
            ticker: Some("2330.TW".to_string()),
            ..NewCompany::default()
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let updated = repo
        .update_company(
            company.id,
            &CompanyChanges {
                market_cap: Some(8000.0),
                ..CompanyChanges::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.market_cap, Some(8000.0));
    assert_eq!(updated.ticker.as_deref(), Some("2330.TW"));
    assert_eq!(updated.created_at, company.created_at);
    assert!(updated.updated_at > company.updated_at);
}

#[tokio::test]
async fn test_update_of_missing_row_is_not_found() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let result = repo
        .update_company(
            uuid::Uuid::new_v4(),
            &CompanyChanges {
                name: Some("ghost".to_string()),
                ..CompanyChanges::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AtlasError::NotFound { .. })));

    let result = repo.delete_company(uuid::Uuid::new_v4()).await;
    assert!(matches!(result, Err(AtlasError::NotFound { .. })));
}

#[tokio::test]
async fn test_deleting_company_cascades_to_roadmaps() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let intel = repo.create_company(&named("英特尔")).await.unwrap();
    let asml = repo.create_company(&named("阿斯麦")).await.unwrap();
    for node in ["20A", "18A"] {
        repo.create_roadmap(&NewRoadmap {
            node: Some(node.to_string()),
            ..NewRoadmap::for_company(intel.id)
        })
        .await
        .unwrap();
    }
    repo.create_roadmap(&NewRoadmap::for_company(asml.id)).await.unwrap();

    let before = repo.list_roadmaps(&RoadmapFilter::for_company(intel.id)).await.unwrap();
    assert_eq!(before.len(), 2);
    assert_eq!(before[0].company.as_ref().map(|c| c.name.as_str()), Some("英特尔"));

    repo.delete_company(intel.id).await.unwrap();

    let after = repo.list_roadmaps(&RoadmapFilter::for_company(intel.id)).await.unwrap();
    assert!(after.is_empty());
    let remaining = repo.list_roadmaps(&RoadmapFilter::default()).await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_roadmap_for_missing_company_is_constraint_violation() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let result = repo
        .create_roadmap(&NewRoadmap::for_company(uuid::Uuid::new_v4()))
        .await;
    assert!(matches!(result, Err(AtlasError::Constraint(_))));
}

#[tokio::test]
async fn test_new_roadmap_defaults_to_planning() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let company = repo.create_company(&named("三星电子")).await.unwrap();
    let roadmap = repo
        .create_roadmap(&NewRoadmap {
            sources: vec!["https://example.com/report".to_string()],
            ..NewRoadmap::for_company(company.id)
        })
        .await
        .unwrap();

    assert_eq!(roadmap.status, RoadmapStatus::Planning);
    assert_eq!(roadmap.sources, vec!["https://example.com/report".to_string()]);
}

#[tokio::test]
async fn test_duplicate_email_is_constraint_violation() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let user = NewUser {
        email: "analyst@example.com".to_string(),
        ..NewUser::default()
    };
    let created = repo.create_user(&user).await.unwrap();
    assert_eq!(created.role, UserRole::Editor);

    let result = repo.create_user(&user).await;
    assert!(matches!(result, Err(AtlasError::Constraint(_))));
}

#[tokio::test]
async fn test_empty_filter_returns_every_row() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    for name in ["A", "B", "C"] {
        repo.create_company(&named(name)).await.unwrap();
    }
    let all = repo.list_companies(&CompanyFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_filters_are_anded_and_search_ignores_case() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let company = |name: &str, region, description: &str| NewCompany {
        name: name.to_string(),
        region: Some(region),
        description: Some(description.to_string()),
        ..NewCompany::default()
    };
    repo.create_company(&company("Tokyo Electron", Region::Japan, "Etch and deposition"))
        .await
        .unwrap();
    repo.create_company(&company("Screen", Region::Japan, "Wafer cleaning"))
        .await
        .unwrap();
    repo.create_company(&company("Lam Research", Region::Usa, "ETCH equipment"))
        .await
        .unwrap();

    let etch = repo
        .list_companies(&CompanyFilter {
            search: Some("etch".to_string()),
            ..CompanyFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(etch.len(), 2);

    let japanese_etch = repo
        .list_companies(&CompanyFilter {
            search: Some("ETCH".to_string()),
            region: Some(Region::Japan),
            ..CompanyFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(japanese_etch.len(), 1);
    assert_eq!(japanese_etch[0].name, "Tokyo Electron");
}

#[tokio::test]
async fn test_founded_year_range() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    for (name, year) in [("old", 1968), ("mid", 1987), ("new", 2000)] {
        repo.create_company(&NewCompany {
            founded_year: Some(year),
            ..named(name)
        })
        .await
        .unwrap();
    }

    let rows = repo
        .list_companies(&CompanyFilter {
            founded_from: Some(1980),
            founded_to: Some(2000),
            ..CompanyFilter::default()
        })
        .await
        .unwrap();
    let mut names: Vec<_> = rows.iter().map(|c| c.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["mid", "new"]);
}

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let (_dir, db) = open_catalog();
    let repo = Arc::new(repository(&db));

    let insight = repo
        .create_insight(&NewInsight {
            title: "先进封装产能".to_string(),
            ..NewInsight::default()
        })
        .await
        .unwrap();
    assert_eq!(insight.read_count, 0);

    for _ in 0..10 {
        repo.increment_read_count(insight.id).await.unwrap();
    }

    let (a, b) = tokio::join!(
        repo.increment_read_count(insight.id),
        repo.increment_read_count(insight.id)
    );
    let mut counts = vec![a.unwrap(), b.unwrap()];
    counts.sort_unstable();
    assert_eq!(counts, vec![11, 12]);

    let stored = repo.get_insight(insight.id).await.unwrap();
    assert_eq!(stored.read_count, 12);
}

#[tokio::test]
async fn test_increment_of_missing_insight_is_not_found() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let result = repo.increment_read_count(uuid::Uuid::new_v4()).await;
    assert!(matches!(result, Err(AtlasError::NotFound { .. })));
}

#[tokio::test]
async fn test_insight_update_cannot_touch_read_count() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let insight = repo
        .create_insight(&NewInsight {
            title: "draft".to_string(),
            status: Some(PublishStatus::Draft),
            ..NewInsight::default()
        })
        .await
        .unwrap();
    repo.increment_read_count(insight.id).await.unwrap();

    let updated = repo
        .update_insight(
            insight.id,
            &InsightChanges {
                status: Some(PublishStatus::Published),
                tags: Some(vec!["EUV".to_string()]),
                ..InsightChanges::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.read_count, 1);
    assert_eq!(updated.status, PublishStatus::Published);
    assert_eq!(updated.tags, vec!["EUV".to_string()]);
}

#[tokio::test]
async fn test_popular_insights_skip_drafts_and_rank_by_reads() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let mut ids = Vec::new();
    for (title, status, reads) in [
        ("quiet", PublishStatus::Published, 1),
        ("loud", PublishStatus::Published, 3),
        ("hidden", PublishStatus::Draft, 5),
    ] {
        let insight = repo
            .create_insight(&NewInsight {
                title: title.to_string(),
                status: Some(status),
                ..NewInsight::default()
            })
            .await
            .unwrap();
        for _ in 0..reads {
            repo.increment_read_count(insight.id).await.unwrap();
        }
        ids.push(insight.id);
    }

    let popular = repo.popular_insights(5).await.unwrap();
    let titles: Vec<_> = popular.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["loud", "quiet"]);

    let top = repo.popular_insights(1).await.unwrap();
    assert_eq!(top.len(), 1);

    let drafts = repo
        .list_insights(&InsightFilter {
            status: Some(PublishStatus::Draft),
            ..InsightFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
}

#[tokio::test]
async fn test_import_is_all_or_nothing() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let imported = repo
        .import_companies(vec![named("Applied Materials"), named("KLA")])
        .await
        .unwrap();
    assert_eq!(imported.len(), 2);

    let result = repo
        .import_companies(vec![named("Teradyne"), named("   ")])
        .await;
    assert!(matches!(result, Err(AtlasError::Constraint(_))));

    let all = repo.list_companies(&CompanyFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_login_stamps_last_login() {
    let (_dir, db) = open_catalog();
    let repo = repository(&db);

    let user = repo
        .create_user(&NewUser {
            email: "admin@example.com".to_string(),
            role: Some(UserRole::Admin),
            ..NewUser::default()
        })
        .await
        .unwrap();
    assert!(user.last_login_at.is_none());

    let found = repo.get_user_by_email("admin@example.com").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));
    assert!(repo.get_user_by_email("nobody@example.com").await.unwrap().is_none());

    let signed_in = repo.record_login(user.id).await.unwrap();
    assert!(signed_in.last_login_at.is_some());

    let admins = repo
        .list_users(&UserFilter {
            role: Some(UserRole::Admin),
            ..UserFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(admins.len(), 1);
}

#[test]
fn test_initialize_seeds_only_an_empty_catalog() {
    let (_dir, db) = open_catalog();

    let seeded = db.initialize().expect("Failed to seed catalog");
    assert_eq!(seeded, 5);
    assert_eq!(db.initialize().expect("Second initialize failed"), 0);

    let admin = db.find_user_by_email("admin@example.com").unwrap();
    assert_eq!(admin.map(|u| u.role), Some(UserRole::Admin));
}
