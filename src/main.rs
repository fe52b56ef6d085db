use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use semi_atlas::app_state::{AppState, Theme};
use semi_atlas::config::AppConfig;
use semi_atlas::db::{establish_connection, Database};
use semi_atlas::format::{
    format_bytes, format_currency, format_date, format_datetime, industry_icon, publish_status_label,
    region_label, roadmap_status_label,
};
use semi_atlas::logging::{init_logging, OperationTimer};
use semi_atlas::metrics::MetricsCollector;
use semi_atlas::models::{
    Company, CompanyChanges, Industry, Insight, InsightCategory, NewCompany, NewUser, OutputFormat,
    ProcessType, PublishStatus, Region, Roadmap, RoadmapStatus, User, UserRole, WaferSize,
};
use semi_atlas::query::{CompanyFilter, InsightFilter, RoadmapFilter, UserFilter};
use semi_atlas::repository::{Repository, SqliteRepository};
use semi_atlas::rest::RestRepository;
use semi_atlas::schema::{POSTGRES_SCHEMA, SQLITE_MIGRATION};
use semi_atlas::service::{CatalogService, ListOptions};
use semi_atlas::stats::top_companies_by_market_cap;
use semi_atlas::table::{
    CompanySortField, InsightSortField, Page, RoadmapSortField, SortOrder, UserSortField,
};
use semi_atlas::validation::InputValidator;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(short, long, global = true, env = "SEMI_ATLAS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog schema
    Init {
        /// Load sample companies, roadmaps and an insight into an empty catalog
        #[arg(long)]
        seed: bool,
    },
    /// Browse and maintain companies
    #[command(subcommand)]
    Companies(CompanyCommand),
    /// Browse process roadmaps
    #[command(subcommand)]
    Roadmaps(RoadmapCommand),
    /// Browse and read insights
    #[command(subcommand)]
    Insights(InsightCommand),
    /// Manage dashboard users
    #[command(subcommand)]
    Users(UserCommand),
    /// Show dashboard statistics
    Stats,
    /// Show or change persisted UI preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
    /// Print the schema of the selected backend
    Schema {
        /// Print the PostgreSQL schema even when the SQLite backend is selected
        #[arg(long)]
        postgres: bool,
    },
    /// Print the effective configuration
    Config,
}

/// Paging and output flags shared by every listing
#[derive(Args, Clone)]
struct PageArgs {
    /// Sort direction (asc or desc)
    #[arg(long, default_value = "desc")]
    order: SortOrder,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Rows per page (defaults to the configured page size)
    #[arg(long)]
    page_size: Option<usize>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl PageArgs {
    fn options<F>(&self, config: &AppConfig, sort_field: F) -> Result<ListOptions<F>> {
        let page_size = self.page_size.unwrap_or(config.pagination.default_page_size);
        InputValidator::validate_page_size(page_size, config.pagination.max_page_size)?;
        Ok(ListOptions {
            sort_field,
            sort_order: self.order,
            page: self.page,
            page_size,
        })
    }
}

/// Strip control characters from free text typed on the command line
fn clean(text: Option<String>) -> Option<String> {
    text.map(|t| InputValidator::sanitize_text(&t)).filter(|t| !t.is_empty())
}

#[derive(Args, Clone, Default)]
struct CompanyFilterArgs {
    /// Case-insensitive search over name and description
    #[arg(short, long)]
    search: Option<String>,
    #[arg(long)]
    region: Option<Region>,
    #[arg(long)]
    industry: Option<Industry>,
    #[arg(long)]
    status: Option<PublishStatus>,
    /// Founded in or after this year
    #[arg(long)]
    founded_from: Option<i32>,
    /// Founded in or before this year
    #[arg(long)]
    founded_to: Option<i32>,
}

impl From<CompanyFilterArgs> for CompanyFilter {
    fn from(args: CompanyFilterArgs) -> Self {
        Self {
            search: clean(args.search),
            region: args.region,
            industry: args.industry,
            status: args.status,
            founded_from: args.founded_from,
            founded_to: args.founded_to,
        }
    }
}

#[derive(Args, Clone, Default)]
struct CompanyFields {
    /// English name
    #[arg(long)]
    name_en: Option<String>,
    #[arg(long)]
    ticker: Option<String>,
    #[arg(long)]
    region: Option<Region>,
    #[arg(long)]
    industry: Option<Industry>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    website: Option<String>,
    #[arg(long)]
    headquarters: Option<String>,
    #[arg(long)]
    founded_year: Option<i32>,
    #[arg(long)]
    employees: Option<i64>,
    /// Market capitalization (100M USD)
    #[arg(long)]
    market_cap: Option<f64>,
    /// Annual revenue (100M USD)
    #[arg(long)]
    revenue: Option<f64>,
    #[arg(long)]
    status: Option<PublishStatus>,
}

#[derive(Subcommand)]
enum CompanyCommand {
    /// List companies
    List {
        #[command(flatten)]
        filter: CompanyFilterArgs,
        /// Column to sort by
        #[arg(long, default_value = "updated_at")]
        sort: CompanySortField,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one company with its roadmaps
    Show { id: Uuid },
    /// Create a company
    Create {
        /// Company name
        #[arg(short, long)]
        name: String,
        #[command(flatten)]
        fields: CompanyFields,
    },
    /// Change some columns of a company
    Update {
        id: Uuid,
        /// New company name
        #[arg(short, long)]
        name: Option<String>,
        #[command(flatten)]
        fields: CompanyFields,
    },
    /// Delete a company and its roadmaps
    Delete { id: Uuid },
    /// Export matching companies to a file
    Export {
        #[command(flatten)]
        filter: CompanyFilterArgs,
        /// Output format (csv or json); defaults to the configured format
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// Output directory; defaults to the configured directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Import companies from a CSV file
    Import {
        /// CSV file with a header row
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum RoadmapCommand {
    /// List roadmap milestones
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long)]
        company: Option<Uuid>,
        /// Exact node label, e.g. 3nm
        #[arg(long)]
        node: Option<String>,
        #[arg(long)]
        process_type: Option<ProcessType>,
        #[arg(long)]
        status: Option<RoadmapStatus>,
        #[arg(long)]
        wafer_size: Option<WaferSize>,
        /// Started on or after January 1st of this year
        #[arg(long)]
        start_year: Option<i32>,
        /// Ends on or before December 31st of this year
        #[arg(long)]
        end_year: Option<i32>,
        #[arg(long, default_value = "updated_at")]
        sort: RoadmapSortField,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one milestone
    Show { id: Uuid },
    /// Delete one milestone
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum InsightCommand {
    /// List insights
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<InsightCategory>,
        #[arg(long)]
        status: Option<PublishStatus>,
        /// Published on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Published on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value = "updated_at")]
        sort: InsightSortField,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one insight without counting a read
    Show { id: Uuid },
    /// Open an insight, counting one read
    Read { id: Uuid },
    /// Most read published insights
    Popular {
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// List users
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long)]
        role: Option<UserRole>,
        #[arg(long, default_value = "updated_at")]
        sort: UserSortField,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a user
    Create {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        role: Option<UserRole>,
    },
    /// Sign in and stamp the last login time
    Login {
        #[arg(short, long)]
        email: String,
        /// Password for the hosted backend's auth service
        #[arg(short, long, env = "SEMI_ATLAS_PASSWORD")]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Print the stored preferences
    Show,
    /// Switch the color theme
    Theme { theme: Theme },
    /// Collapse or expand the sidebar
    ToggleSidebar,
}

/// The backend a command runs against
enum Backend {
    Sqlite(Database),
    Rest(Arc<RestRepository>),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // Initialize logging; the guard flushes the log file on exit
    let log_file = config.logging.file_path.as_ref().map(PathBuf::from);
    let _log_guard = init_logging(
        Some(&config.get_log_level()),
        log_file.as_deref(),
        &config.logging.format,
    )?;

    if let Err(e) = MetricsCollector::init() {
        warn!("Metrics recorder not installed: {e}");
    }

    info!("Starting semi-atlas");

    // Commands that never touch a backend
    match &cli.command {
        Commands::Prefs(command) => return run_prefs(&config, command),
        Commands::Config => {
            emit(&config.to_yaml()?);
            return Ok(());
        }
        Commands::Schema { postgres } => {
            if *postgres || config.uses_rest_backend() {
                emit(POSTGRES_SCHEMA);
            } else {
                emit(SQLITE_MIGRATION);
            }
            return Ok(());
        }
        _ => {}
    }

    let metrics = Arc::new(MetricsCollector::default());
    let backend = connect(&config, Arc::clone(&metrics))?;
    let repository: Arc<dyn Repository> = match &backend {
        Backend::Sqlite(database) => Arc::new(SqliteRepository::new(database.clone(), Arc::clone(&metrics))),
        Backend::Rest(rest) => Arc::clone(rest) as Arc<dyn Repository>,
    };
    let service = CatalogService::new(repository, config.pagination.clone(), Arc::clone(&metrics));

    // Process command
    match cli.command {
        Commands::Init { seed } => run_init(&backend, seed)?,
        Commands::Companies(command) => run_companies(&config, &service, command).await?,
        Commands::Roadmaps(command) => run_roadmaps(&config, &service, command).await?,
        Commands::Insights(command) => run_insights(&config, &service, command).await?,
        Commands::Users(command) => run_users(&config, &service, &backend, command).await?,
        Commands::Stats => run_stats(&service).await?,
        Commands::Prefs(_) | Commands::Config | Commands::Schema { .. } => {}
    }

    debug!(snapshot = ?metrics.snapshot(), "Metrics at exit");
    Ok(())
}

/// Open the configured backend
fn connect(config: &AppConfig, metrics: Arc<MetricsCollector>) -> Result<Backend> {
    if config.uses_rest_backend() {
        let url = config.backend.rest_url.as_deref().context("backend.rest_url is not set")?;
        let api_key = config.backend.api_key.as_deref().context("backend.api_key is not set")?;
        info!(url, "Using hosted REST backend");
        let rest = RestRepository::new(
            url,
            api_key,
            Duration::from_secs(config.backend.request_timeout_secs),
            metrics,
        )?;
        return Ok(Backend::Rest(Arc::new(rest)));
    }

    let mut database_config = config.database.clone();
    database_config.url = config.get_database_url();
    InputValidator::validate_database_url(&database_config.url)?;
    info!(url = %database_config.url, "Using SQLite backend");
    Ok(Backend::Sqlite(establish_connection(&database_config)?))
}

#[allow(clippy::print_stdout)]
fn emit(text: &str) {
    println!("{text}");
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    emit(&serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit_page<T: Serialize>(page: &Page<T>, json: bool, line: impl Fn(&T) -> String) -> Result<()> {
    if json {
        return emit_json(page);
    }
    for row in &page.data {
        emit(&line(row));
    }
    emit(&format!(
        "-- page {}/{} ({} total, {} per page)",
        page.page, page.total_pages, page.total, page.page_size
    ));
    Ok(())
}

fn company_line(company: &Company) -> String {
    let region = company.region.map_or("-", region_label);
    let icon = company.industry.map_or("", industry_icon);
    let market_cap = company.market_cap.map_or_else(|| "-".to_string(), format_currency);
    format!(
        "{}  {icon} {}  [{}]  {region}  cap {market_cap}  {}",
        company.id,
        company.name,
        company.ticker.as_deref().unwrap_or("-"),
        publish_status_label(company.status),
    )
}

fn roadmap_line(roadmap: &Roadmap) -> String {
    let company = roadmap.company.as_ref().map_or("-", |c| c.name.as_str());
    let start = roadmap.start_date.map_or_else(|| "-".to_string(), format_date);
    let end = roadmap.end_date.map_or_else(|| "-".to_string(), format_date);
    format!(
        "{}  {company}  {}  {start} .. {end}  {}",
        roadmap.id,
        roadmap.node.as_deref().unwrap_or("-"),
        roadmap_status_label(roadmap.status),
    )
}

fn insight_line(insight: &Insight) -> String {
    format!(
        "{}  {}  reads {}  {}  {}",
        insight.id,
        insight.title,
        insight.read_count,
        format_datetime(insight.published_at),
        publish_status_label(insight.status),
    )
}

fn user_line(user: &User) -> String {
    let last_login = user.last_login_at.map_or_else(|| "never".to_string(), format_datetime);
    format!(
        "{}  {}  {}  {}  last login {last_login}",
        user.id,
        user.email,
        user.name.as_deref().unwrap_or("-"),
        user.role,
    )
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|at| at.and_utc())
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_milli_opt(23, 59, 59, 999).map(|at| at.and_utc())
}

fn run_init(backend: &Backend, seed: bool) -> Result<()> {
    match backend {
        Backend::Sqlite(database) => {
            info!("Catalog schema is up to date");
            if seed {
                let inserted = database.initialize()?;
                emit(&format!("Seeded {inserted} rows"));
            } else {
                emit("Catalog ready");
            }
        }
        Backend::Rest(_) => {
            warn!("The hosted schema is managed on the server; run `semi-atlas schema --postgres` to get it");
        }
    }
    Ok(())
}

async fn run_companies(config: &AppConfig, service: &CatalogService, command: CompanyCommand) -> Result<()> {
    match command {
        CompanyCommand::List { filter, sort, page } => {
            let options = page.options(config, sort)?;
            let result = service.browse_companies(&filter.into(), options).await?;
            emit_page(&result, page.json, company_line)?;
        }
        CompanyCommand::Show { id } => {
            let company = service.repository().get_company(id).await?;
            let roadmaps = service.company_roadmaps(id).await?;
            emit_json(&serde_json::json!({ "company": company, "roadmaps": roadmaps }))?;
        }
        CompanyCommand::Create { name, fields } => {
            let company = NewCompany {
                name,
                name_en: fields.name_en,
                ticker: fields.ticker,
                region: fields.region,
                industry: fields.industry,
                description: clean(fields.description),
                website: fields.website,
                headquarters: fields.headquarters,
                founded_year: fields.founded_year,
                employees: fields.employees,
                market_cap: fields.market_cap,
                revenue: fields.revenue,
                status: fields.status,
            };
            let created = service.create_company(&company).await?;
            info!(id = %created.id, name = %created.name, "Company created");
            emit_json(&created)?;
        }
        CompanyCommand::Update { id, name, fields } => {
            let changes = CompanyChanges {
                name,
                name_en: fields.name_en,
                ticker: fields.ticker,
                region: fields.region,
                industry: fields.industry,
                description: clean(fields.description),
                website: fields.website,
                headquarters: fields.headquarters,
                founded_year: fields.founded_year,
                employees: fields.employees,
                market_cap: fields.market_cap,
                revenue: fields.revenue,
                status: fields.status,
            };
            let updated = service.update_company(id, &changes).await?;
            emit_json(&updated)?;
        }
        CompanyCommand::Delete { id } => {
            service.delete_company(id).await?;
            emit(&format!("Deleted company {id}"));
        }
        CompanyCommand::Export {
            filter,
            format,
            output_dir,
        } => {
            let format = match format {
                Some(format) => format,
                None => config.export_format()?,
            };
            let output_dir =
                output_dir.unwrap_or_else(|| PathBuf::from(&config.export.output_directory));
            match service.export_companies(&filter.into(), format, &output_dir).await? {
                Some(path) => {
                    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or_default();
                    emit(&format!("Exported to {} ({})", path.display(), format_bytes(size)));
                }
                None => emit("No companies matched; nothing exported"),
            }
        }
        CompanyCommand::Import { path } => {
            InputValidator::validate_file_path(&path)?;
            let timer = OperationTimer::new("cli_import");
            let imported = service.import_companies_csv(&path).await?;
            timer.finish();
            emit(&format!("Imported {} companies", imported.len()));
        }
    }
    Ok(())
}

async fn run_roadmaps(config: &AppConfig, service: &CatalogService, command: RoadmapCommand) -> Result<()> {
    match command {
        RoadmapCommand::List {
            search,
            company,
            node,
            process_type,
            status,
            wafer_size,
            start_year,
            end_year,
            sort,
            page,
        } => {
            let filter = RoadmapFilter {
                search: clean(search),
                company_id: company,
                node,
                process_type,
                status,
                wafer_size,
                start_year,
                end_year,
            };
            let result = service.browse_roadmaps(&filter, page.options(config, sort)?).await?;
            emit_page(&result, page.json, roadmap_line)?;
        }
        RoadmapCommand::Show { id } => {
            let roadmap = service.repository().get_roadmap(id).await?;
            emit_json(&roadmap)?;
        }
        RoadmapCommand::Delete { id } => {
            service.repository().delete_roadmap(id).await?;
            emit(&format!("Deleted roadmap {id}"));
        }
    }
    Ok(())
}

async fn run_insights(config: &AppConfig, service: &CatalogService, command: InsightCommand) -> Result<()> {
    match command {
        InsightCommand::List {
            search,
            category,
            status,
            from,
            to,
            sort,
            page,
        } => {
            let filter = InsightFilter {
                search: clean(search),
                category,
                status,
                published_from: from.and_then(start_of_day),
                published_to: to.and_then(end_of_day),
            };
            let result = service.browse_insights(&filter, page.options(config, sort)?).await?;
            emit_page(&result, page.json, insight_line)?;
        }
        InsightCommand::Show { id } => {
            let insight = service.repository().get_insight(id).await?;
            emit_json(&insight)?;
        }
        InsightCommand::Read { id } => {
            let insight = service.read_insight(id).await?;
            emit_json(&insight)?;
        }
        InsightCommand::Popular { limit } => {
            for insight in service.popular_insights(limit).await? {
                emit(&insight_line(&insight));
            }
        }
    }
    Ok(())
}

async fn run_users(
    config: &AppConfig,
    service: &CatalogService,
    backend: &Backend,
    command: UserCommand,
) -> Result<()> {
    match command {
        UserCommand::List {
            search,
            role,
            sort,
            page,
        } => {
            let filter = UserFilter {
                search: clean(search),
                role,
            };
            let result = service.browse_users(&filter, page.options(config, sort)?).await?;
            emit_page(&result, page.json, user_line)?;
        }
        UserCommand::Create { email, name, role } => {
            let user = service
                .create_user(&NewUser {
                    email,
                    name,
                    role,
                    avatar_url: None,
                })
                .await?;
            emit_json(&user)?;
        }
        UserCommand::Login { email, password } => {
            if let Backend::Rest(rest) = backend {
                let password = password.context("the hosted backend needs --password")?;
                let session = rest.sign_in_with_password(&email, &password).await?;
                info!(user = %session.user.id, "Signed in to hosted backend");
            }
            let user = service.login(&email).await?;

            let mut state = AppState::new(Some(config.preferences_path()));
            state.set_user(Some(user));
            if let Some(user) = state.user() {
                emit(&format!(
                    "Signed in as {} ({}); management views {}",
                    user.email,
                    user.role,
                    if state.can_manage() { "enabled" } else { "hidden" }
                ));
            }
        }
    }
    Ok(())
}

async fn run_stats(service: &CatalogService) -> Result<()> {
    let stats = service.dashboard_stats().await?;
    let overview = stats.overview;
    emit(&format!("Companies:          {}", overview.total_companies));
    emit(&format!("Active roadmaps:    {}", overview.active_roadmaps));
    emit(&format!("Published insights: {}", overview.published_insights));
    emit(&format!("Total investment:   {} (100M USD)", overview.total_investment));

    emit("\nCompanies by region:");
    for (region, count) in &stats.companies_by_region {
        emit(&format!("  {region}: {count}"));
    }
    emit("\nRoadmaps by node:");
    for (node, count) in &stats.roadmaps_by_node {
        emit(&format!("  {node}: {count}"));
    }
    emit("\nReads by month:");
    for (month, reads) in &stats.reads_by_month {
        emit(&format!("  {month}: {reads}"));
    }

    let companies = service.repository().list_companies(&CompanyFilter::default()).await?;
    emit("\nTop companies by market cap:");
    for company in top_companies_by_market_cap(&companies, 5) {
        let cap = company.market_cap.map_or_else(|| "-".to_string(), format_currency);
        emit(&format!("  {}  {cap}", company.name));
    }
    Ok(())
}

fn run_prefs(config: &AppConfig, command: &PrefsCommand) -> Result<()> {
    let mut state = AppState::new(Some(config.preferences_path()));
    match command {
        PrefsCommand::Show => emit_json(&state.preferences())?,
        PrefsCommand::Theme { theme } => {
            state.set_theme(*theme)?;
            emit_json(&state.preferences())?;
        }
        PrefsCommand::ToggleSidebar => {
            let collapsed = state.toggle_sidebar()?;
            emit(if collapsed { "Sidebar collapsed" } else { "Sidebar expanded" });
        }
    }
    Ok(())
}
