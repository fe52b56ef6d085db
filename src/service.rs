use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::error::{AtlasError, Result};
use crate::export::{companies_from_csv, parse_csv_file, write_export};
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::models::{
    Company, CompanyChanges, Insight, InsightChanges, NewCompany, NewInsight, NewRoadmap, NewUser,
    OutputFormat, Roadmap, RoadmapChanges, User, UserChanges,
};
use crate::query::{CompanyFilter, InsightFilter, RoadmapFilter, UserFilter};
use crate::repository::Repository;
use crate::stats::{companies_by_region, reads_by_month, roadmaps_by_node, OverviewStats};
use crate::table::{
    paginate, sort_rows, CompanySortField, InsightSortField, Page, PageRequest, RoadmapSortField,
    SortOrder, Sortable, UserSortField,
};
use crate::validation::InputValidator;

/// How a listing should be sorted and which page to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions<F> {
    pub sort_field: F,
    pub sort_order: SortOrder,
    pub page: usize,
    pub page_size: usize,
}

impl<F: Default> ListOptions<F> {
    /// First page, default sort, configured page size
    pub fn first_page(page_size: usize) -> Self {
        Self {
            sort_field: F::default(),
            sort_order: SortOrder::default(),
            page: 1,
            page_size,
        }
    }
}

/// Dashboard statistics bundle
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DashboardStats {
    pub overview: OverviewStats,
    pub companies_by_region: std::collections::BTreeMap<String, usize>,
    pub roadmaps_by_node: std::collections::BTreeMap<String, usize>,
    /// Reads per publication month, oldest first
    pub reads_by_month: std::collections::BTreeMap<String, i64>,
}

fn invalid(e: anyhow::Error) -> AtlasError {
    AtlasError::Validation(e.to_string())
}

/// Application service: validation, sorting, pagination, export and import
/// on top of a [`Repository`]
pub struct CatalogService {
    repository: Arc<dyn Repository>,
    pagination: PaginationConfig,
    metrics: Arc<MetricsCollector>,
}

impl CatalogService {
    pub fn new(
        repository: Arc<dyn Repository>,
        pagination: PaginationConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            repository,
            pagination,
            metrics,
        }
    }

    /// Backend this service talks to
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Default listing options from configuration
    pub fn default_options<F: Default>(&self) -> ListOptions<F> {
        ListOptions::first_page(self.pagination.default_page_size)
    }

    fn page_of<T: Sortable>(&self, mut rows: Vec<T>, options: ListOptions<T::Field>) -> Result<Page<T>> {
        let request = PageRequest::new(options.page, options.page_size, self.pagination.max_page_size)?;
        sort_rows(&mut rows, options.sort_field, options.sort_order);
        Ok(paginate(rows, request))
    }

    /// One page of companies matching `filter`
    pub async fn browse_companies(
        &self,
        filter: &CompanyFilter,
        options: ListOptions<CompanySortField>,
    ) -> Result<Page<Company>> {
        let rows = self.repository.list_companies(filter).await?;
        self.page_of(rows, options)
    }

    /// One page of roadmaps matching `filter`
    pub async fn browse_roadmaps(
        &self,
        filter: &RoadmapFilter,
        options: ListOptions<RoadmapSortField>,
    ) -> Result<Page<Roadmap>> {
        let rows = self.repository.list_roadmaps(filter).await?;
        self.page_of(rows, options)
    }

    /// One page of insights matching `filter`
    pub async fn browse_insights(
        &self,
        filter: &InsightFilter,
        options: ListOptions<InsightSortField>,
    ) -> Result<Page<Insight>> {
        let rows = self.repository.list_insights(filter).await?;
        self.page_of(rows, options)
    }

    /// One page of users matching `filter`
    pub async fn browse_users(&self, filter: &UserFilter, options: ListOptions<UserSortField>) -> Result<Page<User>> {
        let rows = self.repository.list_users(filter).await?;
        self.page_of(rows, options)
    }

    pub async fn create_company(&self, company: &NewCompany) -> Result<Company> {
        InputValidator::validate_new_company(company).map_err(invalid)?;
        let created = self.repository.create_company(company).await?;
        info!(id = %created.id, name = %created.name, "Company created");
        Ok(created)
    }

    pub async fn update_company(&self, id: Uuid, changes: &CompanyChanges) -> Result<Company> {
        InputValidator::validate_company_changes(changes).map_err(invalid)?;
        self.repository.update_company(id, changes).await
    }

    /// Delete a company together with its roadmaps
    pub async fn delete_company(&self, id: Uuid) -> Result<()> {
        self.repository.delete_company(id).await?;
        info!(%id, "Company deleted");
        Ok(())
    }

    pub async fn create_roadmap(&self, roadmap: &NewRoadmap) -> Result<Roadmap> {
        InputValidator::validate_new_roadmap(roadmap).map_err(invalid)?;
        self.repository.create_roadmap(roadmap).await
    }

    pub async fn update_roadmap(&self, id: Uuid, changes: &RoadmapChanges) -> Result<Roadmap> {
        InputValidator::validate_roadmap_changes(changes).map_err(invalid)?;
        self.repository.update_roadmap(id, changes).await
    }

    /// Milestones of one company, newest first
    pub async fn company_roadmaps(&self, company_id: Uuid) -> Result<Vec<Roadmap>> {
        self.repository
            .list_roadmaps(&RoadmapFilter::for_company(company_id))
            .await
    }

    pub async fn create_insight(&self, insight: &NewInsight) -> Result<Insight> {
        InputValidator::validate_new_insight(insight).map_err(invalid)?;
        self.repository.create_insight(insight).await
    }

    pub async fn update_insight(&self, id: Uuid, changes: &InsightChanges) -> Result<Insight> {
        if let Some(title) = &changes.title {
            InputValidator::validate_title(title).map_err(invalid)?;
        }
        self.repository.update_insight(id, changes).await
    }

    /// Count one read of an insight and return it with the new count
    pub async fn read_insight(&self, id: Uuid) -> Result<Insight> {
        let count = self.repository.increment_read_count(id).await?;
        debug!(%id, count, "Read count incremented");
        self.repository.get_insight(id).await
    }

    /// Most-read published insights
    pub async fn popular_insights(&self, limit: usize) -> Result<Vec<Insight>> {
        self.repository.popular_insights(limit).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        InputValidator::validate_new_user(user).map_err(invalid)?;
        self.repository.create_user(user).await
    }

    pub async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<User> {
        if let Some(avatar) = &changes.avatar_url {
            InputValidator::validate_url(avatar).map_err(invalid)?;
        }
        self.repository.update_user(id, changes).await
    }

    /// Look up the operator behind `email` and stamp the sign-in
    pub async fn login(&self, email: &str) -> Result<User> {
        let user = self
            .repository
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| AtlasError::not_found("user", email))?;
        self.repository.record_login(user.id).await
    }

    /// Overview numbers and the two breakdown charts
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let companies = self.repository.list_companies(&CompanyFilter::default()).await?;
        let roadmaps = self.repository.list_roadmaps(&RoadmapFilter::default()).await?;
        let insights = self.repository.list_insights(&InsightFilter::default()).await?;

        Ok(DashboardStats {
            overview: OverviewStats::from_rows(&companies, &roadmaps, &insights),
            companies_by_region: companies_by_region(&companies),
            roadmaps_by_node: roadmaps_by_node(&roadmaps),
            reads_by_month: reads_by_month(&insights),
        })
    }

    fn export_rows<T: serde::Serialize>(
        &self,
        rows: &[T],
        format: OutputFormat,
        output_dir: &Path,
        entity: &str,
    ) -> Result<Option<PathBuf>> {
        let started = Instant::now();
        let path = write_export(rows, format, output_dir, entity)?;

        match &path {
            Some(path) => {
                let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or_default();
                self.metrics
                    .record_export_operation(format.extension(), rows.len(), size, started.elapsed());
                info!(entity, rows = rows.len(), path = %path.display(), "Export written");
            }
            None => info!(entity, "Nothing to export"),
        }
        Ok(path)
    }

    /// Export every company matching `filter`
    pub async fn export_companies(
        &self,
        filter: &CompanyFilter,
        format: OutputFormat,
        output_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let rows = self.repository.list_companies(filter).await?;
        self.export_rows(&rows, format, output_dir, "companies")
    }

    /// Export every roadmap matching `filter`
    pub async fn export_roadmaps(
        &self,
        filter: &RoadmapFilter,
        format: OutputFormat,
        output_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let rows = self.repository.list_roadmaps(filter).await?;
        self.export_rows(&rows, format, output_dir, "roadmaps")
    }

    /// Export every insight matching `filter`
    pub async fn export_insights(
        &self,
        filter: &InsightFilter,
        format: OutputFormat,
        output_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let rows = self.repository.list_insights(filter).await?;
        self.export_rows(&rows, format, output_dir, "insights")
    }

    /// Parse, validate and insert a CSV of companies in one transaction
    pub async fn import_companies_csv(&self, path: &Path) -> Result<Vec<Company>> {
        let timer = OperationTimer::new("import_companies_csv");
        let records = parse_csv_file(path)?;
        let companies = companies_from_csv(&records)?;

        for (record, company) in records.iter().zip(&companies) {
            InputValidator::validate_new_company(company)
                .map_err(|e| AtlasError::Import(format!("line {}: {e}", record.line)))?;
        }

        let inserted = self.repository.import_companies(companies).await?;
        self.metrics.record_import("companies", inserted.len());
        info!(count = inserted.len(), path = %path.display(), "Companies imported");
        timer.finish();
        Ok(inserted)
    }
}
