use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{AtlasError, Result};
use crate::models::{
    Company, CompanyChanges, CompanyRef, Industry, InsightCategory, Insight, InsightChanges,
    NewCompany, NewInsight, NewRoadmap, NewUser, ProcessType, Region, Roadmap, RoadmapChanges,
    RoadmapStatus, User, UserChanges, UserRole, WaferSize,
};
use crate::query::{FilterValue, QueryBuilder};
use crate::schema::{self, companies, insights, roadmaps, users, TIMESTAMP_FORMAT};

// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Per-connection setup: foreign keys enforced, a busy timeout for
/// concurrent writers and the `casefold()` SQL function used by text search.
fn prepare_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )
}

/// Strip the `sqlite:` / `sqlite://` scheme from a database URL
#[must_use]
pub fn database_path(database_url: &str) -> &Path {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    Path::new(path)
}

/// A table row that can be read back from SQLite
pub trait Record: Sized + Send + 'static {
    /// Table name
    const TABLE: &'static str;
    /// Human-readable entity name used in errors
    const ENTITY: &'static str;

    /// Map a database row
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// SELECT prefix every read goes through
    fn select_sql() -> String {
        format!("SELECT {t}.* FROM {t}", t = Self::TABLE)
    }
}

/// Column/value pairs of an insert or a partial update
#[derive(Default)]
pub struct ColumnSet {
    names: Vec<&'static str>,
    values: Vec<Box<dyn ToSql>>,
}

impl ColumnSet {
    /// Always write this column
    pub fn push<V: ToSql + 'static>(&mut self, name: &'static str, value: V) {
        self.names.push(name);
        self.values.push(Box::new(value));
    }

    /// Write this column only when a value is present
    pub fn push_opt<V: ToSql + 'static>(&mut self, name: &'static str, value: Option<V>) {
        if let Some(value) = value {
            self.push(name, value);
        }
    }

    /// Write a list column as JSON text
    pub fn push_json<V: Serialize + ?Sized>(&mut self, name: &'static str, value: &V) -> Result<()> {
        self.push(name, serde_json::to_string(value)?);
        Ok(())
    }

    /// Write an instant in the store's timestamp format
    pub fn push_timestamp(&mut self, name: &'static str, value: Option<DateTime<Utc>>) {
        self.push_opt(name, value.map(format_timestamp));
    }

    /// Column names in insertion order
    #[must_use]
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    /// True when nothing would be written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Payload inserting one row of `Output`
pub trait Insertable {
    /// Row type read back after the insert
    type Output: Record;

    /// Columns supplied by the caller; omitted ones take the schema default
    fn column_set(&self) -> Result<ColumnSet>;
}

/// Payload partially updating one row of `Output`
pub trait Changeset {
    /// Row type read back after the update
    type Output: Record;

    /// Columns to overwrite
    fn column_set(&self) -> Result<ColumnSet>;
}

/// Render an instant the way the schema defaults do
#[must_use]
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

fn json_column<T: DeserializeOwned + Default>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let raw: Option<String> = row.get(column)?;
    match raw {
        None => Ok(T::default()),
        Some(text) => serde_json::from_str(&text).map_err(|e| {
            let index = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
        }),
    }
}

fn filter_param(value: &FilterValue) -> Box<dyn ToSql> {
    match value {
        FilterValue::Text(text) => Box::new(text.clone()),
        FilterValue::Integer(n) => Box::new(*n),
        FilterValue::Date(date) => Box::new(*date),
        FilterValue::Timestamp(ts) => Box::new(format_timestamp(*ts)),
        FilterValue::Uuid(id) => Box::new(*id),
    }
}

/// Render a query's predicates, ordering and limit as an SQL suffix
#[must_use]
pub fn render_query(table: &str, query: &QueryBuilder) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    for filter in &query.filters {
        clauses.push(format!("{table}.{} {} ?", filter.field, filter.operator.sql()));
        params.push(filter_param(&filter.value));
    }

    if let Some(search) = &query.search {
        let alternatives: Vec<String> = search
            .fields
            .iter()
            .map(|field| format!("instr(casefold({table}.{field}), ?) > 0"))
            .collect();
        clauses.push(format!("({})", alternatives.join(" OR ")));
        for _ in search.fields {
            params.push(Box::new(search.term.clone()));
        }
    }

    let mut sql = String::new();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    if let Some(order) = &query.order_by {
        let direction = if order.ascending { "ASC" } else { "DESC" };
        sql.push_str(&format!(
            " ORDER BY {table}.{} {direction}, {table}.rowid ASC",
            order.field
        ));
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    (sql, params)
}

/// Database manager for handling connections and operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (creating if needed) the catalog at `database_url` and migrate it
    pub fn new(database_url: &str) -> Result<Self> {
        Self::with_config(&DatabaseConfig {
            url: database_url.to_string(),
            ..DatabaseConfig::default()
        })
    }

    /// Open the catalog with explicit pool settings
    pub fn with_config(config: &DatabaseConfig) -> Result<Self> {
        let path = database_path(&config.url);

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| prepare_connection(conn, busy_timeout));
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)?;

        let conn = pool.get()?;
        Self::run_migrations(&conn)?;
        info!(path = %path.display(), "Catalog database ready");

        Ok(Self { pool })
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(schema::SQLITE_MIGRATION)?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Rows of `T` matching `query`
    pub fn list<T: Record>(&self, query: &QueryBuilder) -> Result<Vec<T>> {
        let conn = self.get_connection()?;
        let (suffix, params) = render_query(T::TABLE, query);
        let sql = format!("{}{suffix}", T::select_sql());
        debug!(sql = %sql, "Listing rows");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| T::from_row(row))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// One row of `T` by id
    pub fn get<T: Record>(&self, id: Uuid) -> Result<T> {
        let conn = self.get_connection()?;
        Self::fetch(&conn, id)
    }

    fn fetch<T: Record>(conn: &Connection, id: Uuid) -> Result<T> {
        conn.query_row(
            &format!("{} WHERE {}.id = ?1", T::select_sql(), T::TABLE),
            params![id],
            |row| T::from_row(row),
        )
        .optional()?
        .ok_or_else(|| AtlasError::not_found(T::ENTITY, id))
    }

    fn insert_with<N: Insertable>(conn: &Connection, new: &N) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut columns = ColumnSet::default();
        columns.push("id", id);
        let supplied = new.column_set()?;
        columns.names.extend(supplied.names);
        columns.values.extend(supplied.values);

        let placeholders = vec!["?"; columns.names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            N::Output::TABLE,
            columns.names.join(", ")
        );
        conn.execute(&sql, params_from_iter(columns.values.iter()))?;
        Ok(id)
    }

    /// Insert one row and read it back
    pub fn insert<N: Insertable>(&self, new: &N) -> Result<N::Output> {
        let conn = self.get_connection()?;
        let id = Self::insert_with(&conn, new)?;
        debug!(table = N::Output::TABLE, %id, "Inserted row");
        Self::fetch(&conn, id)
    }

    /// Insert every row or none of them
    pub fn insert_many<N: Insertable>(&self, rows: &[N]) -> Result<Vec<N::Output>> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(Self::insert_with(&tx, row)?);
        }
        let mut inserted = Vec::with_capacity(ids.len());
        for id in ids {
            inserted.push(Self::fetch(&tx, id)?);
        }

        tx.commit()?;
        info!(table = N::Output::TABLE, count = inserted.len(), "Bulk insert committed");
        Ok(inserted)
    }

    /// Overwrite the supplied columns of one row and read it back
    pub fn update<C: Changeset>(&self, id: Uuid, changes: &C) -> Result<C::Output> {
        let conn = self.get_connection()?;
        let columns = changes.column_set()?;
        if columns.is_empty() {
            return Self::fetch(&conn, id);
        }

        let assignments: Vec<String> = columns.names.iter().map(|n| format!("{n} = ?")).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            C::Output::TABLE,
            assignments.join(", ")
        );
        let mut values = columns.values;
        values.push(Box::new(id));

        let affected = conn.execute(&sql, params_from_iter(values.iter()))?;
        if affected == 0 {
            return Err(AtlasError::not_found(C::Output::ENTITY, id));
        }
        Self::fetch(&conn, id)
    }

    /// Delete one row; dependent rows follow the schema's cascade rules
    pub fn delete<T: Record>(&self, id: Uuid) -> Result<()> {
        let conn = self.get_connection()?;
        let affected = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", T::TABLE),
            params![id],
        )?;
        if affected == 0 {
            return Err(AtlasError::not_found(T::ENTITY, id));
        }
        Ok(())
    }

    /// Add one read in a single statement and return the new count
    pub fn increment_read_count(&self, insight_id: Uuid) -> Result<i64> {
        let conn = self.get_connection()?;
        conn.query_row(
            &format!(
                "UPDATE {t} SET {c} = {c} + 1 WHERE {id} = ?1 RETURNING {c}",
                t = insights::TABLE,
                c = insights::READ_COUNT,
                id = insights::ID
            ),
            params![insight_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| AtlasError::not_found(Insight::ENTITY, insight_id))
    }

    /// Look a user up by login email
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.get_connection()?;
        let user = conn
            .query_row(
                &format!("{} WHERE {}.{} = ?1", User::select_sql(), users::TABLE, users::EMAIL),
                params![email.trim()],
                |row| User::from_row(row),
            )
            .optional()?;
        Ok(user)
    }

    /// Stamp a successful sign-in
    pub fn record_login(&self, user_id: Uuid) -> Result<User> {
        let conn = self.get_connection()?;
        let affected = conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1 WHERE {} = ?2",
                users::TABLE,
                users::LAST_LOGIN_AT,
                users::ID
            ),
            params![format_timestamp(Utc::now()), user_id],
        )?;
        if affected == 0 {
            return Err(AtlasError::not_found(User::ENTITY, user_id));
        }
        Self::fetch(&conn, user_id)
    }

    /// Initialize the database with sample data when it is empty
    pub fn initialize(&self) -> Result<usize> {
        let conn = self.get_connection()?;
        let existing: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", companies::TABLE),
            [],
            |row| row.get(0),
        )?;
        drop(conn);
        if existing > 0 {
            debug!(existing, "Catalog already populated, skipping sample data");
            return Ok(0);
        }

        let companies = self.insert_many(&sample_companies())?;
        let by_name = |name: &str| companies.iter().find(|c| c.name == name).map(|c| c.id);

        let mut milestones = Vec::new();
        if let Some(tsmc) = by_name("台积电") {
            milestones.push(sample_roadmap(tsmc, "3nm", ProcessType::FinFet, RoadmapStatus::Completed, (2020, 2022)));
            milestones.push(sample_roadmap(tsmc, "2nm", ProcessType::Gaa, RoadmapStatus::InProgress, (2023, 2025)));
        }
        if let Some(smic) = by_name("中芯国际") {
            milestones.push(sample_roadmap(smic, "7nm", ProcessType::FinFet, RoadmapStatus::InProgress, (2021, 2024)));
        }
        if let Some(intel) = by_name("英特尔") {
            milestones.push(sample_roadmap(intel, "18A", ProcessType::Gaa, RoadmapStatus::Planning, (2024, 2026)));
        }
        self.insert_many(&milestones)?;

        self.insert(&NewInsight {
            title: "GAA 晶体管量产进程".to_string(),
            category: Some(InsightCategory::Technology),
            summary: Some("主要晶圆厂 2nm 级别节点的量产时间表对比".to_string()),
            tags: vec!["GAA".to_string(), "2nm".to_string()],
            related_companies: companies.iter().map(|c| c.id).take(2).collect(),
            ..NewInsight::default()
        })?;

        self.insert(&NewUser {
            email: "admin@example.com".to_string(),
            name: Some("Administrator".to_string()),
            role: Some(UserRole::Admin),
            avatar_url: None,
        })?;

        info!(companies = companies.len(), roadmaps = milestones.len(), "Sample data loaded");
        Ok(companies.len())
    }
}

fn sample_companies() -> Vec<NewCompany> {
    let company = |name: &str, name_en: &str, region, industry, founded| NewCompany {
        name: name.to_string(),
        name_en: Some(name_en.to_string()),
        region: Some(region),
        industry: Some(industry),
        founded_year: Some(founded),
        ..NewCompany::default()
    };
    vec![
        company("台积电", "TSMC", Region::Taiwan, Industry::Manufacturing, 1987),
        company("中芯国际", "SMIC", Region::MainlandChina, Industry::Manufacturing, 2000),
        company("英特尔", "Intel", Region::Usa, Industry::Manufacturing, 1968),
        company("三星电子", "Samsung Electronics", Region::Korea, Industry::Manufacturing, 1969),
        company("阿斯麦", "ASML", Region::Europe, Industry::Equipment, 1984),
    ]
}

fn sample_roadmap(
    company_id: Uuid,
    node: &str,
    process_type: ProcessType,
    status: RoadmapStatus,
    (start, end): (i32, i32),
) -> NewRoadmap {
    NewRoadmap {
        node: Some(node.to_string()),
        process_type: Some(process_type),
        status: Some(status),
        start_date: NaiveDate::from_ymd_opt(start, 1, 1),
        end_date: NaiveDate::from_ymd_opt(end, 12, 31),
        wafer_size: Some(WaferSize::TwelveInch),
        ..NewRoadmap::for_company(company_id)
    }
}

impl Record for Company {
    const TABLE: &'static str = companies::TABLE;
    const ENTITY: &'static str = "company";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(companies::ID)?,
            name: row.get(companies::NAME)?,
            name_en: row.get(companies::NAME_EN)?,
            ticker: row.get(companies::TICKER)?,
            region: row.get(companies::REGION)?,
            industry: row.get(companies::INDUSTRY)?,
            description: row.get(companies::DESCRIPTION)?,
            website: row.get(companies::WEBSITE)?,
            headquarters: row.get(companies::HEADQUARTERS)?,
            founded_year: row.get(companies::FOUNDED_YEAR)?,
            employees: row.get(companies::EMPLOYEES)?,
            market_cap: row.get(companies::MARKET_CAP)?,
            revenue: row.get(companies::REVENUE)?,
            status: row.get(companies::STATUS)?,
            created_at: row.get(companies::CREATED_AT)?,
            updated_at: row.get(companies::UPDATED_AT)?,
        })
    }
}

impl Record for Roadmap {
    const TABLE: &'static str = roadmaps::TABLE;
    const ENTITY: &'static str = "roadmap";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let company_id: Uuid = row.get(roadmaps::COMPANY_ID)?;
        let company = match row.get::<_, Option<String>>(roadmaps::COMPANY_NAME) {
            Ok(name) => name.map(|name| CompanyRef {
                id: company_id,
                name,
            }),
            Err(rusqlite::Error::InvalidColumnName(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(Self {
            id: row.get(roadmaps::ID)?,
            company_id,
            node: row.get(roadmaps::NODE)?,
            process_type: row.get(roadmaps::PROCESS_TYPE)?,
            status: row.get(roadmaps::STATUS)?,
            start_date: row.get(roadmaps::START_DATE)?,
            end_date: row.get(roadmaps::END_DATE)?,
            actual_date: row.get(roadmaps::ACTUAL_DATE)?,
            capacity: row.get(roadmaps::CAPACITY)?,
            wafer_size: row.get(roadmaps::WAFER_SIZE)?,
            yield_rate: row.get(roadmaps::YIELD_RATE)?,
            investment: row.get(roadmaps::INVESTMENT)?,
            notes: row.get(roadmaps::NOTES)?,
            sources: json_column(row, roadmaps::SOURCES)?,
            created_at: row.get(roadmaps::CREATED_AT)?,
            updated_at: row.get(roadmaps::UPDATED_AT)?,
            company,
        })
    }

    fn select_sql() -> String {
        format!(
            "SELECT {r}.*, {c}.{name} AS {alias} FROM {r} LEFT JOIN {c} ON {c}.{cid} = {r}.{fk}",
            r = roadmaps::TABLE,
            c = companies::TABLE,
            name = companies::NAME,
            alias = roadmaps::COMPANY_NAME,
            cid = companies::ID,
            fk = roadmaps::COMPANY_ID
        )
    }
}

impl Record for Insight {
    const TABLE: &'static str = insights::TABLE;
    const ENTITY: &'static str = "insight";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(insights::ID)?,
            title: row.get(insights::TITLE)?,
            category: row.get(insights::CATEGORY)?,
            summary: row.get(insights::SUMMARY)?,
            content: row.get(insights::CONTENT)?,
            tags: json_column(row, insights::TAGS)?,
            cover_image: row.get(insights::COVER_IMAGE)?,
            read_count: row.get(insights::READ_COUNT)?,
            status: row.get(insights::STATUS)?,
            published_at: row.get(insights::PUBLISHED_AT)?,
            created_at: row.get(insights::CREATED_AT)?,
            updated_at: row.get(insights::UPDATED_AT)?,
            related_companies: json_column(row, insights::RELATED_COMPANIES)?,
        })
    }
}

impl Record for User {
    const TABLE: &'static str = users::TABLE;
    const ENTITY: &'static str = "user";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(users::ID)?,
            email: row.get(users::EMAIL)?,
            name: row.get(users::NAME)?,
            role: row.get(users::ROLE)?,
            avatar_url: row.get(users::AVATAR_URL)?,
            last_login_at: row.get(users::LAST_LOGIN_AT)?,
            created_at: row.get(users::CREATED_AT)?,
            updated_at: row.get(users::UPDATED_AT)?,
        })
    }
}

impl Insertable for NewCompany {
    type Output = Company;

    fn column_set(&self) -> Result<ColumnSet> {
        let mut set = ColumnSet::default();
        set.push(companies::NAME, self.name.trim().to_string());
        set.push_opt(companies::NAME_EN, self.name_en.clone());
        set.push_opt(companies::TICKER, self.ticker.clone());
        set.push_opt(companies::REGION, self.region);
        set.push_opt(companies::INDUSTRY, self.industry);
        set.push_opt(companies::DESCRIPTION, self.description.clone());
        set.push_opt(companies::WEBSITE, self.website.clone());
        set.push_opt(companies::HEADQUARTERS, self.headquarters.clone());
        set.push_opt(companies::FOUNDED_YEAR, self.founded_year);
        set.push_opt(companies::EMPLOYEES, self.employees);
        set.push_opt(companies::MARKET_CAP, self.market_cap);
        set.push_opt(companies::REVENUE, self.revenue);
        set.push_opt(companies::STATUS, self.status);
        Ok(set)
    }
}

impl Changeset for CompanyChanges {
    type Output = Company;

    fn column_set(&self) -> Result<ColumnSet> {
        let mut set = ColumnSet::default();
        set.push_opt(companies::NAME, self.name.as_ref().map(|n| n.trim().to_string()));
        set.push_opt(companies::NAME_EN, self.name_en.clone());
        set.push_opt(companies::TICKER, self.ticker.clone());
        set.push_opt(companies::REGION, self.region);
        set.push_opt(companies::INDUSTRY, self.industry);
        set.push_opt(companies::DESCRIPTION, self.description.clone());
        set.push_opt(companies::WEBSITE, self.website.clone());
        set.push_opt(companies::HEADQUARTERS, self.headquarters.clone());
        set.push_opt(companies::FOUNDED_YEAR, self.founded_year);
        set.push_opt(companies::EMPLOYEES, self.employees);
        set.push_opt(companies::MARKET_CAP, self.market_cap);
        set.push_opt(companies::REVENUE, self.revenue);
        set.push_opt(companies::STATUS, self.status);
        Ok(set)
    }
}

impl Insertable for NewRoadmap {
    type Output = Roadmap;

    fn column_set(&self) -> Result<ColumnSet> {
        let mut set = ColumnSet::default();
        set.push(roadmaps::COMPANY_ID, self.company_id);
        set.push_opt(roadmaps::NODE, self.node.clone());
        set.push_opt(roadmaps::PROCESS_TYPE, self.process_type);
        set.push_opt(roadmaps::STATUS, self.status);
        set.push_opt(roadmaps::START_DATE, self.start_date);
        set.push_opt(roadmaps::END_DATE, self.end_date);
        set.push_opt(roadmaps::ACTUAL_DATE, self.actual_date);
        set.push_opt(roadmaps::CAPACITY, self.capacity.clone());
        set.push_opt(roadmaps::WAFER_SIZE, self.wafer_size);
        set.push_opt(roadmaps::YIELD_RATE, self.yield_rate);
        set.push_opt(roadmaps::INVESTMENT, self.investment);
        set.push_opt(roadmaps::NOTES, self.notes.clone());
        set.push_json(roadmaps::SOURCES, &self.sources)?;
        Ok(set)
    }
}

impl Changeset for RoadmapChanges {
    type Output = Roadmap;

    fn column_set(&self) -> Result<ColumnSet> {
        let mut set = ColumnSet::default();
        set.push_opt(roadmaps::NODE, self.node.clone());
        set.push_opt(roadmaps::PROCESS_TYPE, self.process_type);
        set.push_opt(roadmaps::STATUS, self.status);
        set.push_opt(roadmaps::START_DATE, self.start_date);
        set.push_opt(roadmaps::END_DATE, self.end_date);
        set.push_opt(roadmaps::ACTUAL_DATE, self.actual_date);
        set.push_opt(roadmaps::CAPACITY, self.capacity.clone());
        set.push_opt(roadmaps::WAFER_SIZE, self.wafer_size);
        set.push_opt(roadmaps::YIELD_RATE, self.yield_rate);
        set.push_opt(roadmaps::INVESTMENT, self.investment);
        set.push_opt(roadmaps::NOTES, self.notes.clone());
        if let Some(sources) = &self.sources {
            set.push_json(roadmaps::SOURCES, sources)?;
        }
        Ok(set)
    }
}

impl Insertable for NewInsight {
    type Output = Insight;

    fn column_set(&self) -> Result<ColumnSet> {
        let mut set = ColumnSet::default();
        set.push(insights::TITLE, self.title.trim().to_string());
        set.push_opt(insights::CATEGORY, self.category);
        set.push_opt(insights::SUMMARY, self.summary.clone());
        set.push_opt(insights::CONTENT, self.content.clone());
        set.push_json(insights::TAGS, &self.tags)?;
        set.push_opt(insights::COVER_IMAGE, self.cover_image.clone());
        set.push_opt(insights::STATUS, self.status);
        set.push_timestamp(insights::PUBLISHED_AT, self.published_at);
        set.push_json(insights::RELATED_COMPANIES, &self.related_companies)?;
        Ok(set)
    }
}

impl Changeset for InsightChanges {
    type Output = Insight;

    fn column_set(&self) -> Result<ColumnSet> {
        let mut set = ColumnSet::default();
        set.push_opt(insights::TITLE, self.title.as_ref().map(|t| t.trim().to_string()));
        set.push_opt(insights::CATEGORY, self.category);
        set.push_opt(insights::SUMMARY, self.summary.clone());
        set.push_opt(insights::CONTENT, self.content.clone());
        if let Some(tags) = &self.tags {
            set.push_json(insights::TAGS, tags)?;
        }
        set.push_opt(insights::COVER_IMAGE, self.cover_image.clone());
        set.push_opt(insights::STATUS, self.status);
        set.push_timestamp(insights::PUBLISHED_AT, self.published_at);
        if let Some(related) = &self.related_companies {
            set.push_json(insights::RELATED_COMPANIES, related)?;
        }
        Ok(set)
    }
}

impl Insertable for NewUser {
    type Output = User;

    fn column_set(&self) -> Result<ColumnSet> {
        let mut set = ColumnSet::default();
        set.push(users::EMAIL, self.email.trim().to_string());
        set.push_opt(users::NAME, self.name.clone());
        set.push_opt(users::ROLE, self.role);
        set.push_opt(users::AVATAR_URL, self.avatar_url.clone());
        Ok(set)
    }
}

impl Changeset for UserChanges {
    type Output = User;

    fn column_set(&self) -> Result<ColumnSet> {
        let mut set = ColumnSet::default();
        set.push_opt(users::NAME, self.name.clone());
        set.push_opt(users::ROLE, self.role);
        set.push_opt(users::AVATAR_URL, self.avatar_url.clone());
        Ok(set)
    }
}

/// Initialize the database connection from configuration
pub fn establish_connection(config: &DatabaseConfig) -> Result<Database> {
    let database = Database::with_config(config)?;
    Ok(database)
}
