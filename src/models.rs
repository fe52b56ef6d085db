//! Data models for the semiconductor catalog
//!
//! This module contains the four persisted entities (companies, roadmaps,
//! insights, users), their insert and partial-update payloads, and the closed
//! enums used for region, industry, status and role columns.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AtlasError;

/// Declares a closed enum stored as text.
///
/// The text is what the backend stores and what serde reads and writes, so an
/// unknown value is rejected wherever a row enters the process.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every variant in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Text stored in the backend for this variant
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AtlasError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(AtlasError::Validation(format!(
                        "invalid {} value: {other:?}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: AtlasError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum! {
    /// Headquarters region of a company
    Region {
        /// Mainland China
        MainlandChina => "中国大陆",
        /// Taiwan
        Taiwan => "台湾",
        /// United States
        Usa => "美国",
        /// Japan
        Japan => "日本",
        /// South Korea
        Korea => "韩国",
        /// Europe
        Europe => "欧洲",
        /// Anywhere else
        Other => "其他",
    }
}

text_enum! {
    /// Segment of the semiconductor value chain
    Industry {
        /// Fabless design
        Design => "设计",
        /// Foundry / IDM manufacturing
        Manufacturing => "制造",
        /// Packaging and test
        PackagingTest => "封测",
        /// Equipment vendors
        Equipment => "设备",
        /// Materials suppliers
        Materials => "材料",
        /// IP cores and EDA tools
        IpEda => "IP/EDA",
        /// Anything else
        Other => "其他",
    }
}

text_enum! {
    /// Publication state of companies and insights
    PublishStatus {
        /// Visible to viewers
        Published => "published",
        /// Work in progress
        Draft => "draft",
    }
}

text_enum! {
    /// Transistor architecture of a process node
    ProcessType {
        /// FinFET
        FinFet => "FinFET",
        /// Gate-all-around
        Gaa => "GAA",
        /// Fully-depleted silicon on insulator
        FdSoi => "FD-SOI",
        /// Conventional planar CMOS
        ConventionalCmos => "传统CMOS",
        /// Anything else
        Other => "其他",
    }
}

text_enum! {
    /// Progress of a roadmap milestone
    RoadmapStatus {
        /// Announced, not started
        Planning => "planning",
        /// Under way
        InProgress => "in_progress",
        /// Reached volume production
        Completed => "completed",
        /// Behind its planned dates
        Delayed => "delayed",
        /// Abandoned
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Wafer diameter
    WaferSize {
        /// 150 mm
        SixInch => "6英寸",
        /// 200 mm
        EightInch => "8英寸",
        /// 300 mm
        TwelveInch => "12英寸",
        /// 450 mm
        EighteenInch => "18英寸",
    }
}

text_enum! {
    /// Topic of an analyst insight
    InsightCategory {
        /// Industry trend
        Trend => "趋势",
        /// Market analysis
        Market => "市场",
        /// Technology analysis
        Technology => "技术",
        /// Policy and regulation
        Policy => "政策",
        /// Mergers and acquisitions
        MergersAcquisitions => "并购",
        /// Anything else
        Other => "其他",
    }
}

text_enum! {
    /// Permission level of a dashboard operator
    UserRole {
        /// Full access including the management views
        Admin => "admin",
        /// May create and edit content
        Editor => "editor",
        /// Read-only
        Viewer => "viewer",
    }
}

impl Default for PublishStatus {
    fn default() -> Self {
        Self::Published
    }
}

impl Default for RoadmapStatus {
    fn default() -> Self {
        Self::Planning
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Editor
    }
}

impl RoadmapStatus {
    /// Planned or running milestones
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Planning | Self::InProgress)
    }
}

impl UserRole {
    /// Admins unlock the management views
    #[must_use]
    pub const fn can_manage(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Admins and editors may write content
    #[must_use]
    pub const fn can_edit(self) -> bool {
        matches!(self, Self::Admin | Self::Editor)
    }
}

/// A semiconductor firm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Identifier generated by the persistence layer
    pub id: Uuid,
    /// Display name (required)
    pub name: String,
    /// English name
    pub name_en: Option<String>,
    /// Stock ticker
    pub ticker: Option<String>,
    /// Headquarters region
    pub region: Option<Region>,
    /// Value-chain segment
    pub industry: Option<Industry>,
    /// Free-text description
    pub description: Option<String>,
    /// Website URL
    pub website: Option<String>,
    /// Headquarters city
    pub headquarters: Option<String>,
    /// Year founded
    pub founded_year: Option<i32>,
    /// Head count
    pub employees: Option<i64>,
    /// Market capitalization (100M USD)
    pub market_cap: Option<f64>,
    /// Annual revenue (100M USD)
    pub revenue: Option<f64>,
    /// Publication state
    pub status: PublishStatus,
    /// Insert time
    pub created_at: DateTime<Utc>,
    /// Last write time, maintained by the persistence layer
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a new company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<Industry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    /// Left unset, the backend default (`published`) applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,
}

/// Partial update of a company; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<Industry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,
}

/// Owning company expanded onto a roadmap row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    /// Company identifier
    pub id: Uuid,
    /// Company name
    pub name: String,
}

/// One process-technology milestone of a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    /// Identifier generated by the persistence layer
    pub id: Uuid,
    /// Owning company; deleting it deletes this row
    pub company_id: Uuid,
    /// Node label, e.g. "3nm"
    pub node: Option<String>,
    /// Transistor architecture
    pub process_type: Option<ProcessType>,
    /// Progress
    pub status: RoadmapStatus,
    /// Planned start
    pub start_date: Option<NaiveDate>,
    /// Planned end
    pub end_date: Option<NaiveDate>,
    /// Actual completion
    pub actual_date: Option<NaiveDate>,
    /// Monthly capacity description
    pub capacity: Option<String>,
    /// Wafer diameter
    pub wafer_size: Option<WaferSize>,
    /// Yield in percent
    pub yield_rate: Option<f64>,
    /// Investment (100M USD)
    pub investment: Option<f64>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Data-source citations
    #[serde(default)]
    pub sources: Vec<String>,
    /// Insert time
    pub created_at: DateTime<Utc>,
    /// Last write time, maintained by the persistence layer
    pub updated_at: DateTime<Utc>,
    /// Owning company, present when the listing expanded the join
    #[serde(default, alias = "companies", skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyRef>,
}

/// Data for creating a new roadmap milestone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoadmap {
    pub company_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_type: Option<ProcessType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RoadmapStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wafer_size: Option<WaferSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl NewRoadmap {
    /// A milestone with only the owning company set
    #[must_use]
    pub const fn for_company(company_id: Uuid) -> Self {
        Self {
            company_id,
            node: None,
            process_type: None,
            status: None,
            start_date: None,
            end_date: None,
            actual_date: None,
            capacity: None,
            wafer_size: None,
            yield_rate: None,
            investment: None,
            notes: None,
            sources: Vec::new(),
        }
    }
}

/// Partial update of a roadmap milestone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadmapChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_type: Option<ProcessType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RoadmapStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wafer_size: Option<WaferSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

/// A published analyst article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Identifier generated by the persistence layer
    pub id: Uuid,
    /// Headline (required)
    pub title: String,
    /// Topic
    pub category: Option<InsightCategory>,
    /// Short abstract
    pub summary: Option<String>,
    /// Full article body
    pub content: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Cover image reference
    pub cover_image: Option<String>,
    /// Number of reads, only ever incremented server-side
    pub read_count: i64,
    /// Publication state
    pub status: PublishStatus,
    /// Publication time
    pub published_at: DateTime<Utc>,
    /// Insert time
    pub created_at: DateTime<Utc>,
    /// Last write time, maintained by the persistence layer
    pub updated_at: DateTime<Utc>,
    /// Companies mentioned; no integrity guarantee
    #[serde(default)]
    pub related_companies: Vec<Uuid>,
}

/// Data for creating a new insight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewInsight {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<InsightCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_companies: Vec<Uuid>,
}

/// Partial update of an insight; the read counter is deliberately absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<InsightCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_companies: Option<Vec<Uuid>>,
}

/// An authenticated operator of the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier generated by the persistence layer
    pub id: Uuid,
    /// Login email, unique
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Permission level
    pub role: UserRole,
    /// Avatar reference
    pub avatar_url: Option<String>,
    /// Most recent sign-in
    pub last_login_at: Option<DateTime<Utc>>,
    /// Insert time
    pub created_at: DateTime<Utc>,
    /// Last write time, maintained by the persistence layer
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a new user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Partial update of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Output format for exported result sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values format
    Csv,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Get the file extension for this format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(AtlasError::Validation(format!(
                "invalid export format: {other} (expected csv or json)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_stored_text() {
        assert_eq!(Region::MainlandChina.as_str(), "中国大陆");
        assert_eq!(Industry::IpEda.to_string(), "IP/EDA");
        assert_eq!("in_progress".parse::<RoadmapStatus>().unwrap(), RoadmapStatus::InProgress);
        assert_eq!(
            serde_json::to_string(&ProcessType::ConventionalCmos).unwrap(),
            "\"传统CMOS\""
        );
    }

    #[test]
    fn unknown_enum_text_is_rejected() {
        assert!("mars".parse::<Region>().is_err());
        assert!(serde_json::from_str::<UserRole>("\"root\"").is_err());
    }

    #[test]
    fn defaults_match_schema() {
        assert_eq!(PublishStatus::default(), PublishStatus::Published);
        assert_eq!(UserRole::default(), UserRole::Editor);
        assert_eq!(RoadmapStatus::default(), RoadmapStatus::Planning);
    }

    #[test]
    fn roles_gate_management() {
        assert!(UserRole::Admin.can_manage());
        assert!(!UserRole::Editor.can_manage());
        assert!(UserRole::Editor.can_edit());
        assert!(!UserRole::Viewer.can_edit());
    }

    #[test]
    fn new_company_skips_unset_fields() {
        let company = NewCompany {
            name: "中芯国际".to_string(),
            region: Some(Region::MainlandChina),
            ..NewCompany::default()
        };
        let json = serde_json::to_value(&company).unwrap();
        assert_eq!(json, serde_json::json!({"name": "中芯国际", "region": "中国大陆"}));
    }

    #[test]
    fn output_format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert!("txt".parse::<OutputFormat>().is_err());
    }
}
