//! Client-side sort and pagination over fetched result sets.
//!
//! Sort fields are closed per entity, so an unknown column name is rejected
//! when it is parsed instead of silently sorting by nothing. Sorting is
//! stable; rows with equal keys keep the order the backend returned.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::models::{Company, Insight, Roadmap, User};

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first
    Asc,
    /// Largest first
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascend" | "ascending" => Ok(Self::Asc),
            "desc" | "descend" | "descending" => Ok(Self::Desc),
            other => Err(AtlasError::validation(format!("invalid sort order: {other}"))),
        }
    }
}

macro_rules! sort_field {
    (
        $(#[$meta:meta])*
        $name:ident { $default:ident => $default_text:literal $(, $variant:ident => $text:literal)* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            #[serde(rename = $default_text)]
            $default,
            $( #[serde(rename = $text)] $variant, )*
        }

        impl $name {
            /// Column name this field sorts by
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    Self::$default => $default_text,
                    $( Self::$variant => $text, )*
                }
            }
        }

        impl FromStr for $name {
            type Err = AtlasError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim() {
                    $default_text => Ok(Self::$default),
                    $( $text => Ok(Self::$variant), )*
                    other => Err(AtlasError::validation(format!(
                        "cannot sort {} by {other:?}",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

sort_field! {
    /// Sortable company columns
    CompanySortField {
        UpdatedAt => "updated_at",
        CreatedAt => "created_at",
        Name => "name",
        MarketCap => "market_cap",
        FoundedYear => "founded_year",
        Revenue => "revenue",
        Employees => "employees",
    }
}

sort_field! {
    /// Sortable roadmap columns
    RoadmapSortField {
        UpdatedAt => "updated_at",
        StartDate => "start_date",
        EndDate => "end_date",
        Node => "node",
        YieldRate => "yield_rate",
        Investment => "investment",
    }
}

sort_field! {
    /// Sortable insight columns
    InsightSortField {
        UpdatedAt => "updated_at",
        PublishedAt => "published_at",
        ReadCount => "read_count",
        Title => "title",
    }
}

sort_field! {
    /// Sortable user columns
    UserSortField {
        UpdatedAt => "updated_at",
        Email => "email",
        Name => "name",
        LastLoginAt => "last_login_at",
    }
}

/// A row type that knows how to compare itself on its sort fields
pub trait Sortable {
    /// Closed set of columns
    type Field: Copy;

    /// Ascending comparison on `field`
    fn cmp_by(&self, other: &Self, field: Self::Field) -> Ordering;
}

/// Ordering for optional floats: missing first, then `total_cmp`
fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

impl Sortable for Company {
    type Field = CompanySortField;

    fn cmp_by(&self, other: &Self, field: CompanySortField) -> Ordering {
        match field {
            CompanySortField::UpdatedAt => self.updated_at.cmp(&other.updated_at),
            CompanySortField::CreatedAt => self.created_at.cmp(&other.created_at),
            CompanySortField::Name => self.name.cmp(&other.name),
            CompanySortField::MarketCap => cmp_f64(self.market_cap, other.market_cap),
            CompanySortField::FoundedYear => self.founded_year.cmp(&other.founded_year),
            CompanySortField::Revenue => cmp_f64(self.revenue, other.revenue),
            CompanySortField::Employees => self.employees.cmp(&other.employees),
        }
    }
}

impl Sortable for Roadmap {
    type Field = RoadmapSortField;

    fn cmp_by(&self, other: &Self, field: RoadmapSortField) -> Ordering {
        match field {
            RoadmapSortField::UpdatedAt => self.updated_at.cmp(&other.updated_at),
            RoadmapSortField::StartDate => self.start_date.cmp(&other.start_date),
            RoadmapSortField::EndDate => self.end_date.cmp(&other.end_date),
            RoadmapSortField::Node => self.node.cmp(&other.node),
            RoadmapSortField::YieldRate => cmp_f64(self.yield_rate, other.yield_rate),
            RoadmapSortField::Investment => cmp_f64(self.investment, other.investment),
        }
    }
}

impl Sortable for Insight {
    type Field = InsightSortField;

    fn cmp_by(&self, other: &Self, field: InsightSortField) -> Ordering {
        match field {
            InsightSortField::UpdatedAt => self.updated_at.cmp(&other.updated_at),
            InsightSortField::PublishedAt => self.published_at.cmp(&other.published_at),
            InsightSortField::ReadCount => self.read_count.cmp(&other.read_count),
            InsightSortField::Title => self.title.cmp(&other.title),
        }
    }
}

impl Sortable for User {
    type Field = UserSortField;

    fn cmp_by(&self, other: &Self, field: UserSortField) -> Ordering {
        match field {
            UserSortField::UpdatedAt => self.updated_at.cmp(&other.updated_at),
            UserSortField::Email => self.email.cmp(&other.email),
            UserSortField::Name => self.name.cmp(&other.name),
            UserSortField::LastLoginAt => self.last_login_at.cmp(&other.last_login_at),
        }
    }
}

/// Stable sort of `rows` in place
pub fn sort_rows<T: Sortable>(rows: &mut [T], field: T::Field, order: SortOrder) {
    match order {
        SortOrder::Asc => rows.sort_by(|a, b| a.cmp_by(b, field)),
        SortOrder::Desc => rows.sort_by(|a, b| a.cmp_by(b, field).reverse()),
    }
}

/// A 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 1
    pub page: usize,
    /// Rows per page
    pub page_size: usize,
}

impl PageRequest {
    /// Build a request, rejecting page sizes outside `1..=max_page_size`
    pub fn new(page: usize, page_size: usize, max_page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(AtlasError::validation("page size must be at least 1"));
        }
        if page_size > max_page_size {
            return Err(AtlasError::validation(format!(
                "page size {page_size} exceeds the maximum of {max_page_size}"
            )));
        }
        Ok(Self { page, page_size })
    }

    /// Index of the first row on this page, `None` for page 0
    fn offset(self) -> Option<usize> {
        self.page
            .checked_sub(1)
            .and_then(|p| p.checked_mul(self.page_size))
    }
}

/// One page of a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows on this page
    pub data: Vec<T>,
    /// Size of the whole result set
    pub total: usize,
    /// Requested page
    pub page: usize,
    /// Requested page size
    pub page_size: usize,
    /// Number of non-empty pages
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// True when this page holds no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Cut one page out of `rows`; pages past the end come back empty
#[must_use]
pub fn paginate<T>(rows: Vec<T>, request: PageRequest) -> Page<T> {
    let total = rows.len();
    let total_pages = total.div_ceil(request.page_size);
    let data = match request.offset() {
        Some(start) if start < total => rows
            .into_iter()
            .skip(start)
            .take(request.page_size)
            .collect(),
        _ => Vec::new(),
    };

    Page {
        data,
        total,
        page: request.page,
        page_size: request.page_size,
        total_pages,
    }
}

/// Rows that can be matched by a case-insensitive text search
pub trait Searchable {
    /// Texts the search looks at
    fn search_texts(&self) -> Vec<&str>;

    /// True when any text contains `term` (already lower-cased)
    fn matches(&self, term: &str) -> bool {
        self.search_texts()
            .iter()
            .any(|text| text.to_lowercase().contains(term))
    }
}

impl Searchable for Company {
    fn search_texts(&self) -> Vec<&str> {
        let mut texts = vec![self.name.as_str()];
        texts.extend(self.description.as_deref());
        texts
    }
}

impl Searchable for Roadmap {
    fn search_texts(&self) -> Vec<&str> {
        self.node.iter().chain(self.notes.iter()).map(String::as_str).collect()
    }
}

impl Searchable for Insight {
    fn search_texts(&self) -> Vec<&str> {
        let mut texts = vec![self.title.as_str()];
        texts.extend(self.summary.as_deref());
        texts
    }
}

impl Searchable for User {
    fn search_texts(&self) -> Vec<&str> {
        let mut texts = vec![self.email.as_str()];
        texts.extend(self.name.as_deref());
        texts
    }
}

/// Rows matching `term`; a blank term keeps everything
pub fn filter_by_search<'a, T: Searchable>(rows: &'a [T], term: &str) -> Vec<&'a T> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return rows.iter().collect();
    }
    rows.iter().filter(|row| row.matches(&term)).collect()
}
