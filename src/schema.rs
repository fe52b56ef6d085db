//! Database schema definitions
//!
//! Table and column names used when building SQL with rusqlite, plus the
//! migration scripts for the embedded store and the hosted Postgres backend.

/// Migration creating the embedded catalog (tables, indexes, triggers)
pub const SQLITE_MIGRATION: &str =
    include_str!("../migrations/2026-01-10-000000_create_catalog/up.sql");

/// Setup script for the hosted Postgres backend, including the
/// `increment_read_count` RPC
pub const POSTGRES_SCHEMA: &str = include_str!("../sql/postgres_schema.sql");

/// Format of every timestamp the embedded store writes
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Companies table schema
pub mod companies {
    /// Table name
    pub const TABLE: &str = "companies";
    /// Primary key column
    pub const ID: &str = "id";
    /// Company name column
    pub const NAME: &str = "name";
    /// English name column
    pub const NAME_EN: &str = "name_en";
    /// Stock ticker column
    pub const TICKER: &str = "ticker";
    /// Region column
    pub const REGION: &str = "region";
    /// Industry segment column
    pub const INDUSTRY: &str = "industry";
    /// Description column
    pub const DESCRIPTION: &str = "description";
    /// Website column
    pub const WEBSITE: &str = "website";
    /// Headquarters column
    pub const HEADQUARTERS: &str = "headquarters";
    /// Founding year column
    pub const FOUNDED_YEAR: &str = "founded_year";
    /// Head count column
    pub const EMPLOYEES: &str = "employees";
    /// Market capitalization column
    pub const MARKET_CAP: &str = "market_cap";
    /// Revenue column
    pub const REVENUE: &str = "revenue";
    /// Publication status column
    pub const STATUS: &str = "status";
    /// Insert timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last write timestamp column
    pub const UPDATED_AT: &str = "updated_at";
    /// Columns matched by free-text search
    pub const SEARCH_FIELDS: &[&str] = &[NAME, DESCRIPTION];
}

/// Roadmaps table schema
pub mod roadmaps {
    /// Table name
    pub const TABLE: &str = "roadmaps";
    /// Primary key column
    pub const ID: &str = "id";
    /// Foreign key to companies table
    pub const COMPANY_ID: &str = "company_id";
    /// Node label column
    pub const NODE: &str = "node";
    /// Process type column
    pub const PROCESS_TYPE: &str = "process_type";
    /// Progress status column
    pub const STATUS: &str = "status";
    /// Planned start column
    pub const START_DATE: &str = "start_date";
    /// Planned end column
    pub const END_DATE: &str = "end_date";
    /// Actual completion column
    pub const ACTUAL_DATE: &str = "actual_date";
    /// Capacity column
    pub const CAPACITY: &str = "capacity";
    /// Wafer size column
    pub const WAFER_SIZE: &str = "wafer_size";
    /// Yield column
    pub const YIELD_RATE: &str = "yield_rate";
    /// Investment column
    pub const INVESTMENT: &str = "investment";
    /// Notes column
    pub const NOTES: &str = "notes";
    /// JSON array of citations
    pub const SOURCES: &str = "sources";
    /// Insert timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last write timestamp column
    pub const UPDATED_AT: &str = "updated_at";
    /// Alias of the joined company name
    pub const COMPANY_NAME: &str = "company_name";
    /// Columns matched by free-text search
    pub const SEARCH_FIELDS: &[&str] = &[NODE, NOTES];
}

/// Insights table schema
pub mod insights {
    /// Table name
    pub const TABLE: &str = "insights";
    /// Primary key column
    pub const ID: &str = "id";
    /// Title column
    pub const TITLE: &str = "title";
    /// Category column
    pub const CATEGORY: &str = "category";
    /// Summary column
    pub const SUMMARY: &str = "summary";
    /// Body column
    pub const CONTENT: &str = "content";
    /// JSON array of tags
    pub const TAGS: &str = "tags";
    /// Cover image column
    pub const COVER_IMAGE: &str = "cover_image";
    /// Read counter column
    pub const READ_COUNT: &str = "read_count";
    /// Publication status column
    pub const STATUS: &str = "status";
    /// Publication timestamp column
    pub const PUBLISHED_AT: &str = "published_at";
    /// Insert timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last write timestamp column
    pub const UPDATED_AT: &str = "updated_at";
    /// JSON array of related company ids
    pub const RELATED_COMPANIES: &str = "related_companies";
    /// Columns matched by free-text search
    pub const SEARCH_FIELDS: &[&str] = &[TITLE, SUMMARY];
}

/// Users table schema
pub mod users {
    /// Table name
    pub const TABLE: &str = "users";
    /// Primary key column
    pub const ID: &str = "id";
    /// Unique email column
    pub const EMAIL: &str = "email";
    /// Display name column
    pub const NAME: &str = "name";
    /// Role column
    pub const ROLE: &str = "role";
    /// Avatar column
    pub const AVATAR_URL: &str = "avatar_url";
    /// Last sign-in column
    pub const LAST_LOGIN_AT: &str = "last_login_at";
    /// Insert timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last write timestamp column
    pub const UPDATED_AT: &str = "updated_at";
    /// Columns matched by free-text search
    pub const SEARCH_FIELDS: &[&str] = &[EMAIL, NAME];
}
