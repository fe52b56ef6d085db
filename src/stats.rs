//! Dashboard statistics computed from fetched rows.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Company, Insight, PublishStatus, Roadmap};
use crate::table::{sort_rows, CompanySortField, SortOrder};

/// Bucket for roadmaps without a node label
pub const UNKNOWN_NODE: &str = "Unknown";

/// Headline numbers of the home view
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverviewStats {
    pub total_companies: usize,
    /// Milestones still planned or in progress
    pub active_roadmaps: usize,
    pub published_insights: usize,
    /// Sum of roadmap investment (100M USD)
    pub total_investment: f64,
}

impl OverviewStats {
    /// Compute the overview from full (unfiltered) result sets
    #[must_use]
    pub fn from_rows(companies: &[Company], roadmaps: &[Roadmap], insights: &[Insight]) -> Self {
        Self {
            total_companies: companies.len(),
            active_roadmaps: roadmaps.iter().filter(|r| r.status.is_active()).count(),
            published_insights: insights
                .iter()
                .filter(|i| i.status == PublishStatus::Published)
                .count(),
            total_investment: roadmaps.iter().filter_map(|r| r.investment).sum(),
        }
    }
}

/// Companies per region; companies without a region are left out
#[must_use]
pub fn companies_by_region(companies: &[Company]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for region in companies.iter().filter_map(|c| c.region) {
        *counts.entry(region.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Roadmaps per node label, blank labels counted as [`UNKNOWN_NODE`]
#[must_use]
pub fn roadmaps_by_node(roadmaps: &[Roadmap]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for roadmap in roadmaps {
        let node = roadmap
            .node
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_NODE);
        *counts.entry(node.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Largest companies by market capitalization
#[must_use]
pub fn top_companies_by_market_cap(companies: &[Company], limit: usize) -> Vec<Company> {
    let mut ranked: Vec<Company> = companies.iter().filter(|c| c.market_cap.is_some()).cloned().collect();
    sort_rows(&mut ranked, CompanySortField::MarketCap, SortOrder::Desc);
    ranked.truncate(limit);
    ranked
}

/// Total reads per publication month (`YYYY-MM`), oldest first
#[must_use]
pub fn reads_by_month(insights: &[Insight]) -> BTreeMap<String, i64> {
    let mut reads = BTreeMap::new();
    for insight in insights {
        let month = insight.published_at.format("%Y-%m").to_string();
        *reads.entry(month).or_insert(0) += insight.read_count;
    }
    reads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Region, RoadmapStatus};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn company(name: &str, region: Option<Region>, market_cap: Option<f64>) -> Company {
        let now = Utc::now();
        Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
            name_en: None,
            ticker: None,
            region,
            industry: None,
            description: None,
            website: None,
            headquarters: None,
            founded_year: None,
            employees: None,
            market_cap,
            revenue: None,
            status: PublishStatus::Published,
            created_at: now,
            updated_at: now,
        }
    }

    fn roadmap(node: Option<&str>, status: RoadmapStatus, investment: Option<f64>) -> Roadmap {
        let now = Utc::now();
        Roadmap {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            node: node.map(str::to_string),
            process_type: None,
            status,
            start_date: None,
            end_date: None,
            actual_date: None,
            capacity: None,
            wafer_size: None,
            yield_rate: None,
            investment,
            notes: None,
            sources: Vec::new(),
            created_at: now,
            updated_at: now,
            company: None,
        }
    }

    #[test]
    fn overview_counts_active_roadmaps_and_investment() {
        let companies = vec![company("A", None, None), company("B", None, None)];
        let roadmaps = vec![
            roadmap(Some("3nm"), RoadmapStatus::Planning, Some(100.0)),
            roadmap(Some("5nm"), RoadmapStatus::InProgress, None),
            roadmap(Some("7nm"), RoadmapStatus::Completed, Some(50.5)),
        ];
        let stats = OverviewStats::from_rows(&companies, &roadmaps, &[]);
        assert_eq!(stats.total_companies, 2);
        assert_eq!(stats.active_roadmaps, 2);
        assert!((stats.total_investment - 150.5).abs() < f64::EPSILON);
    }

    #[test]
    fn regions_skip_missing_values() {
        let companies = vec![
            company("A", Some(Region::Japan), None),
            company("B", Some(Region::Japan), None),
            company("C", None, None),
        ];
        let counts = companies_by_region(&companies);
        assert_eq!(counts.get("日本"), Some(&2));
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn blank_nodes_are_unknown() {
        let roadmaps = vec![
            roadmap(None, RoadmapStatus::Planning, None),
            roadmap(Some("  "), RoadmapStatus::Planning, None),
            roadmap(Some("2nm"), RoadmapStatus::Planning, None),
        ];
        let counts = roadmaps_by_node(&roadmaps);
        assert_eq!(counts.get(UNKNOWN_NODE), Some(&2));
        assert_eq!(counts.get("2nm"), Some(&1));
    }

    #[test]
    fn top_companies_rank_by_market_cap() {
        let companies = vec![
            company("small", None, Some(10.0)),
            company("none", None, None),
            company("big", None, Some(9000.0)),
        ];
        let top = top_companies_by_market_cap(&companies, 5);
        let names: Vec<_> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["big", "small"]);
    }

    #[test]
    fn reads_group_by_month() {
        let now = Utc::now();
        let insight = |month: u32, reads: i64| Insight {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            category: None,
            summary: None,
            content: None,
            tags: Vec::new(),
            cover_image: None,
            read_count: reads,
            status: PublishStatus::Published,
            published_at: Utc.with_ymd_and_hms(2025, month, 3, 0, 0, 0).unwrap(),
            created_at: now,
            updated_at: now,
            related_companies: Vec::new(),
        };
        let reads = reads_by_month(&[insight(1, 3), insight(1, 4), insight(2, 1)]);
        assert_eq!(reads.get("2025-01"), Some(&7));
        assert_eq!(reads.get("2025-02"), Some(&1));
    }
}
