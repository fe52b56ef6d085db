//! Filter objects and the predicate builder.
//!
//! Each entity has a filter struct whose fields are all optional. A filter
//! turns into a [`QueryBuilder`]: an ordered list of column predicates that
//! are ANDed together, an optional case-insensitive text search across a
//! fixed set of columns, a default ordering and an optional limit. Backends
//! render the builder into SQL or REST parameters; nothing here touches I/O.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Industry, InsightCategory, ProcessType, PublishStatus, Region, RoadmapStatus, UserRole,
    WaferSize,
};
use crate::schema::{companies, insights, roadmaps, users};

/// Query builder for constructing backend queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    /// List of filters to apply (ANDed)
    pub filters: Vec<Filter>,
    /// Case-insensitive substring search
    pub search: Option<TextSearch>,
    /// Column to order results by
    pub order_by: Option<OrderBy>,
    /// Maximum number of results to return
    pub limit: Option<usize>,
}

/// A filter condition for backend queries
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column name to filter on
    pub field: &'static str,
    /// Comparison operator
    pub operator: Operator,
    /// Value to compare against
    pub value: FilterValue,
}

/// Comparison operators for filters
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    /// Equality (=)
    Equal,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,
    /// Less than or equal (<=)
    LessThanOrEqual,
}

impl Operator {
    /// SQL spelling
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
        }
    }

    /// PostgREST spelling
    #[must_use]
    pub const fn rest(self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::GreaterThanOrEqual => "gte",
            Self::LessThanOrEqual => "lte",
        }
    }
}

/// Value types for filter conditions
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Text value (enum columns included)
    Text(String),
    /// Integer value
    Integer(i64),
    /// Calendar date
    Date(NaiveDate),
    /// Instant
    Timestamp(DateTime<Utc>),
    /// Row identifier
    Uuid(Uuid),
}

/// Substring search over several columns; a row matches if any column does
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSearch {
    /// Columns searched
    pub fields: &'static [&'static str],
    /// Lower-cased search term
    pub term: String,
}

/// Ordering requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to order by
    pub field: &'static str,
    /// True for ascending
    pub ascending: bool,
}

impl QueryBuilder {
    /// Create a new empty query builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter condition to the query
    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// Add an equality condition when the value is present
    pub fn eq_opt(&mut self, field: &'static str, value: Option<FilterValue>) {
        if let Some(value) = value {
            self.add_filter(Filter {
                field,
                operator: Operator::Equal,
                value,
            });
        }
    }

    /// Add a comparison condition when the value is present
    pub fn cmp_opt(&mut self, field: &'static str, operator: Operator, value: Option<FilterValue>) {
        if let Some(value) = value {
            self.add_filter(Filter {
                field,
                operator,
                value,
            });
        }
    }

    /// Search `fields` for `term`; blank terms are ignored
    pub fn set_search(&mut self, fields: &'static [&'static str], term: Option<&str>) {
        self.search = term
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| TextSearch {
                fields,
                term: t.to_lowercase(),
            });
    }

    /// Set the column to order results by
    pub fn set_order_by(&mut self, field: &'static str, ascending: bool) {
        self.order_by = Some(OrderBy { field, ascending });
    }

    /// Set the maximum number of results to return
    pub const fn set_limit(&mut self, limit: usize) {
        self.limit = Some(limit);
    }

    /// True when no predicate narrows the result set
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.filters.is_empty() && self.search.is_none()
    }
}

fn text<T: ToString>(value: Option<T>) -> Option<FilterValue> {
    value.map(|v| FilterValue::Text(v.to_string()))
}

fn non_blank(value: Option<&String>) -> Option<FilterValue> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| FilterValue::Text(v.to_string()))
}

/// Filters for the companies list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyFilter {
    /// Matches name or description
    pub search: Option<String>,
    /// Exact region
    pub region: Option<Region>,
    /// Exact industry
    pub industry: Option<Industry>,
    /// Exact publication status
    pub status: Option<PublishStatus>,
    /// Founded in or after this year
    pub founded_from: Option<i32>,
    /// Founded in or before this year
    pub founded_to: Option<i32>,
}

impl CompanyFilter {
    /// Translate into backend predicates
    #[must_use]
    pub fn to_query(&self) -> QueryBuilder {
        let mut query = QueryBuilder::new();
        query.eq_opt(companies::REGION, text(self.region));
        query.eq_opt(companies::INDUSTRY, text(self.industry));
        query.eq_opt(companies::STATUS, text(self.status));
        query.cmp_opt(
            companies::FOUNDED_YEAR,
            Operator::GreaterThanOrEqual,
            self.founded_from.map(|y| FilterValue::Integer(i64::from(y))),
        );
        query.cmp_opt(
            companies::FOUNDED_YEAR,
            Operator::LessThanOrEqual,
            self.founded_to.map(|y| FilterValue::Integer(i64::from(y))),
        );
        query.set_search(companies::SEARCH_FIELDS, self.search.as_deref());
        query.set_order_by(companies::UPDATED_AT, false);
        query
    }
}

/// Filters for the roadmap list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapFilter {
    /// Matches node label or notes
    pub search: Option<String>,
    /// Owning company
    pub company_id: Option<Uuid>,
    /// Exact node label
    pub node: Option<String>,
    /// Exact process type
    pub process_type: Option<ProcessType>,
    /// Exact status
    pub status: Option<RoadmapStatus>,
    /// Exact wafer size
    pub wafer_size: Option<WaferSize>,
    /// Planned start in or after this year
    pub start_year: Option<i32>,
    /// Planned end in or before this year
    pub end_year: Option<i32>,
}

impl RoadmapFilter {
    /// Milestones of one company
    #[must_use]
    pub fn for_company(company_id: Uuid) -> Self {
        Self {
            company_id: Some(company_id),
            ..Self::default()
        }
    }

    /// Translate into backend predicates
    #[must_use]
    pub fn to_query(&self) -> QueryBuilder {
        let mut query = QueryBuilder::new();
        query.eq_opt(roadmaps::COMPANY_ID, self.company_id.map(FilterValue::Uuid));
        query.eq_opt(roadmaps::NODE, non_blank(self.node.as_ref()));
        query.eq_opt(roadmaps::PROCESS_TYPE, text(self.process_type));
        query.eq_opt(roadmaps::STATUS, text(self.status));
        query.eq_opt(roadmaps::WAFER_SIZE, text(self.wafer_size));
        query.cmp_opt(
            roadmaps::START_DATE,
            Operator::GreaterThanOrEqual,
            self.start_year
                .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
                .map(FilterValue::Date),
        );
        query.cmp_opt(
            roadmaps::END_DATE,
            Operator::LessThanOrEqual,
            self.end_year
                .and_then(|y| NaiveDate::from_ymd_opt(y, 12, 31))
                .map(FilterValue::Date),
        );
        query.set_search(roadmaps::SEARCH_FIELDS, self.search.as_deref());
        query.set_order_by(roadmaps::UPDATED_AT, false);
        query
    }
}

/// Filters for the insight list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightFilter {
    /// Matches title or summary
    pub search: Option<String>,
    /// Exact category
    pub category: Option<InsightCategory>,
    /// Exact publication status
    pub status: Option<PublishStatus>,
    /// Published at or after
    pub published_from: Option<DateTime<Utc>>,
    /// Published at or before
    pub published_to: Option<DateTime<Utc>>,
}

impl InsightFilter {
    /// Translate into backend predicates
    #[must_use]
    pub fn to_query(&self) -> QueryBuilder {
        let mut query = QueryBuilder::new();
        query.eq_opt(insights::CATEGORY, text(self.category));
        query.eq_opt(insights::STATUS, text(self.status));
        query.cmp_opt(
            insights::PUBLISHED_AT,
            Operator::GreaterThanOrEqual,
            self.published_from.map(FilterValue::Timestamp),
        );
        query.cmp_opt(
            insights::PUBLISHED_AT,
            Operator::LessThanOrEqual,
            self.published_to.map(FilterValue::Timestamp),
        );
        query.set_search(insights::SEARCH_FIELDS, self.search.as_deref());
        query.set_order_by(insights::UPDATED_AT, false);
        query
    }

    /// Most-read published insights
    #[must_use]
    pub fn popular_query(limit: usize) -> QueryBuilder {
        let mut query = Self {
            status: Some(PublishStatus::Published),
            ..Self::default()
        }
        .to_query();
        query.set_order_by(insights::READ_COUNT, false);
        query.set_limit(limit);
        query
    }
}

/// Filters for the user list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    /// Matches email or name
    pub search: Option<String>,
    /// Exact role
    pub role: Option<UserRole>,
}

impl UserFilter {
    /// Translate into backend predicates
    #[must_use]
    pub fn to_query(&self) -> QueryBuilder {
        let mut query = QueryBuilder::new();
        query.eq_opt(users::ROLE, text(self.role));
        query.set_search(users::SEARCH_FIELDS, self.search.as_deref());
        query.set_order_by(users::UPDATED_AT, false);
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_impose_no_predicates() {
        assert!(CompanyFilter::default().to_query().is_unrestricted());
        assert!(RoadmapFilter::default().to_query().is_unrestricted());
        assert!(InsightFilter::default().to_query().is_unrestricted());
        assert!(UserFilter::default().to_query().is_unrestricted());
    }

    #[test]
    fn company_filter_builds_ordered_predicates() {
        let filter = CompanyFilter {
            region: Some(Region::Taiwan),
            industry: Some(Industry::Manufacturing),
            founded_from: Some(1980),
            ..CompanyFilter::default()
        };
        let query = filter.to_query();
        assert_eq!(query.filters.len(), 3);
        assert_eq!(query.filters[0].field, companies::REGION);
        assert_eq!(query.filters[0].value, FilterValue::Text("台湾".to_string()));
        assert_eq!(query.filters[1].value, FilterValue::Text("制造".to_string()));
        assert_eq!(query.filters[2].operator, Operator::GreaterThanOrEqual);
        assert_eq!(
            query.order_by,
            Some(OrderBy {
                field: companies::UPDATED_AT,
                ascending: false
            })
        );
    }

    #[test]
    fn search_term_is_trimmed_and_lowercased() {
        let filter = CompanyFilter {
            search: Some("  TSMC ".to_string()),
            ..CompanyFilter::default()
        };
        let search = filter.to_query().search.unwrap();
        assert_eq!(search.term, "tsmc");
        assert_eq!(search.fields, companies::SEARCH_FIELDS);
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = CompanyFilter {
            search: Some("   ".to_string()),
            ..CompanyFilter::default()
        };
        assert!(filter.to_query().is_unrestricted());
    }

    #[test]
    fn roadmap_years_become_date_bounds() {
        let filter = RoadmapFilter {
            start_year: Some(2024),
            end_year: Some(2026),
            ..RoadmapFilter::default()
        };
        let query = filter.to_query();
        assert_eq!(
            query.filters[0].value,
            FilterValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert_eq!(
            query.filters[1].value,
            FilterValue::Date(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap())
        );
    }

    #[test]
    fn popular_query_orders_by_reads() {
        let query = InsightFilter::popular_query(5);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.order_by.unwrap().field, insights::READ_COUNT);
        assert_eq!(query.filters.len(), 1);
    }

    #[test]
    fn filter_deserializes_from_partial_json() {
        let filter: CompanyFilter =
            serde_json::from_str(r#"{"region": "美国", "search": "intel"}"#).unwrap();
        assert_eq!(filter.region, Some(Region::Usa));
        assert_eq!(filter.industry, None);
    }
}
