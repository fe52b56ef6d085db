use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::db::Database;
use crate::error::Result;
use crate::logging::OperationTimer;
use crate::metrics::MetricsTimer;
use crate::metrics::MetricsCollector;
use crate::models::{
    Company, CompanyChanges, Insight, InsightChanges, NewCompany, NewInsight, NewRoadmap, NewUser,
    Roadmap, RoadmapChanges, User, UserChanges,
};
use crate::query::{CompanyFilter, InsightFilter, RoadmapFilter, UserFilter};

/// Persistence seam shared by the embedded and the hosted backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_companies(&self, filter: &CompanyFilter) -> Result<Vec<Company>>;
    async fn get_company(&self, id: Uuid) -> Result<Company>;
    async fn create_company(&self, company: &NewCompany) -> Result<Company>;
    async fn update_company(&self, id: Uuid, changes: &CompanyChanges) -> Result<Company>;
    /// Deleting a company deletes its roadmaps
    async fn delete_company(&self, id: Uuid) -> Result<()>;
    /// Insert every company or none of them
    async fn import_companies(&self, companies: Vec<NewCompany>) -> Result<Vec<Company>>;

    async fn list_roadmaps(&self, filter: &RoadmapFilter) -> Result<Vec<Roadmap>>;
    async fn get_roadmap(&self, id: Uuid) -> Result<Roadmap>;
    async fn create_roadmap(&self, roadmap: &NewRoadmap) -> Result<Roadmap>;
    async fn update_roadmap(&self, id: Uuid, changes: &RoadmapChanges) -> Result<Roadmap>;
    async fn delete_roadmap(&self, id: Uuid) -> Result<()>;

    async fn list_insights(&self, filter: &InsightFilter) -> Result<Vec<Insight>>;
    async fn get_insight(&self, id: Uuid) -> Result<Insight>;
    async fn create_insight(&self, insight: &NewInsight) -> Result<Insight>;
    async fn update_insight(&self, id: Uuid, changes: &InsightChanges) -> Result<Insight>;
    async fn delete_insight(&self, id: Uuid) -> Result<()>;
    /// Atomically add one read and return the new count
    async fn increment_read_count(&self, id: Uuid) -> Result<i64>;
    /// Published insights, most read first
    async fn popular_insights(&self, limit: usize) -> Result<Vec<Insight>>;

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>>;
    async fn get_user(&self, id: Uuid) -> Result<User>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<User>;
    async fn delete_user(&self, id: Uuid) -> Result<()>;
    /// Stamp `last_login_at` with the current time
    async fn record_login(&self, id: Uuid) -> Result<User>;
}

/// Repository over the embedded SQLite catalog
///
/// rusqlite is blocking, so every call runs on tokio's blocking pool with its
/// own pooled connection.
#[derive(Clone)]
pub struct SqliteRepository {
    database: Database,
    metrics: Arc<MetricsCollector>,
}

impl SqliteRepository {
    pub fn new(database: Database, metrics: Arc<MetricsCollector>) -> Self {
        Self { database, metrics }
    }

    /// Underlying database handle
    pub fn database(&self) -> &Database {
        &self.database
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let database = self.database.clone();
        let timer = OperationTimer::new(operation);
        let metrics_timer = MetricsTimer::new(&self.metrics, operation);

        let result = tokio::task::spawn_blocking(move || f(&database)).await?;

        metrics_timer.finish(result.is_ok());
        if let Err(e) = &result {
            warn!(operation, error = %e, "Repository operation failed");
        }
        drop(timer);
        result
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn list_companies(&self, filter: &CompanyFilter) -> Result<Vec<Company>> {
        let query = filter.to_query();
        self.run("list_companies", move |db| db.list(&query)).await
    }

    async fn get_company(&self, id: Uuid) -> Result<Company> {
        self.run("get_company", move |db| db.get(id)).await
    }

    async fn create_company(&self, company: &NewCompany) -> Result<Company> {
        let company = company.clone();
        self.run("create_company", move |db| db.insert(&company)).await
    }

    async fn update_company(&self, id: Uuid, changes: &CompanyChanges) -> Result<Company> {
        let changes = changes.clone();
        self.run("update_company", move |db| db.update(id, &changes)).await
    }

    async fn delete_company(&self, id: Uuid) -> Result<()> {
        self.run("delete_company", move |db| db.delete::<Company>(id)).await
    }

    async fn import_companies(&self, companies: Vec<NewCompany>) -> Result<Vec<Company>> {
        self.run("import_companies", move |db| db.insert_many(&companies))
            .await
    }

    async fn list_roadmaps(&self, filter: &RoadmapFilter) -> Result<Vec<Roadmap>> {
        let query = filter.to_query();
        self.run("list_roadmaps", move |db| db.list(&query)).await
    }

    async fn get_roadmap(&self, id: Uuid) -> Result<Roadmap> {
        self.run("get_roadmap", move |db| db.get(id)).await
    }

    async fn create_roadmap(&self, roadmap: &NewRoadmap) -> Result<Roadmap> {
        let roadmap = roadmap.clone();
        self.run("create_roadmap", move |db| db.insert(&roadmap)).await
    }

    async fn update_roadmap(&self, id: Uuid, changes: &RoadmapChanges) -> Result<Roadmap> {
        let changes = changes.clone();
        self.run("update_roadmap", move |db| db.update(id, &changes)).await
    }

    async fn delete_roadmap(&self, id: Uuid) -> Result<()> {
        self.run("delete_roadmap", move |db| db.delete::<Roadmap>(id)).await
    }

    async fn list_insights(&self, filter: &InsightFilter) -> Result<Vec<Insight>> {
        let query = filter.to_query();
        self.run("list_insights", move |db| db.list(&query)).await
    }

    async fn get_insight(&self, id: Uuid) -> Result<Insight> {
        self.run("get_insight", move |db| db.get(id)).await
    }

    async fn create_insight(&self, insight: &NewInsight) -> Result<Insight> {
        let insight = insight.clone();
        self.run("create_insight", move |db| db.insert(&insight)).await
    }

    async fn update_insight(&self, id: Uuid, changes: &InsightChanges) -> Result<Insight> {
        let changes = changes.clone();
        self.run("update_insight", move |db| db.update(id, &changes)).await
    }

    async fn delete_insight(&self, id: Uuid) -> Result<()> {
        self.run("delete_insight", move |db| db.delete::<Insight>(id)).await
    }

    async fn increment_read_count(&self, id: Uuid) -> Result<i64> {
        let count = self
            .run("increment_read_count", move |db| db.increment_read_count(id))
            .await?;
        self.metrics.record_insight_read();
        Ok(count)
    }

    async fn popular_insights(&self, limit: usize) -> Result<Vec<Insight>> {
        let query = InsightFilter::popular_query(limit);
        self.run("popular_insights", move |db| db.list(&query)).await
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let query = filter.to_query();
        self.run("list_users", move |db| db.list(&query)).await
    }

    async fn get_user(&self, id: Uuid) -> Result<User> {
        self.run("get_user", move |db| db.get(id)).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.run("get_user_by_email", move |db| db.find_user_by_email(&email))
            .await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let user = user.clone();
        self.run("create_user", move |db| db.insert(&user)).await
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<User> {
        let changes = changes.clone();
        self.run("update_user", move |db| db.update(id, &changes)).await
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        self.run("delete_user", move |db| db.delete::<User>(id)).await
    }

    async fn record_login(&self, id: Uuid) -> Result<User> {
        self.run("record_login", move |db| db.record_login(id)).await
    }
}
