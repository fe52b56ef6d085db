//! Client for the hosted Postgres backend behind a PostgREST-style façade.
//!
//! Tables live under `/rest/v1/<table>`, functions under `/rest/v1/rpc/<fn>`
//! and the authentication service under `/auth/v1`. Token issuance belongs
//! to the hosted service; this client only passes credentials through and
//! keeps the returned session for subsequent requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::format_timestamp;
use crate::error::{AtlasError, Result};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::models::{
    Company, CompanyChanges, Insight, InsightChanges, NewCompany, NewInsight, NewRoadmap, NewUser,
    Roadmap, RoadmapChanges, User, UserChanges,
};
use crate::query::{CompanyFilter, FilterValue, InsightFilter, QueryBuilder, RoadmapFilter, UserFilter};
use crate::repository::Repository;
use crate::schema::{companies, insights, roadmaps, users};

/// Roadmap listings expand the owning company
const ROADMAP_SELECT: &str = "*,companies(id,name)";

/// Characters that must be quoted inside a PostgREST `or=(...)` tree
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\'];

/// Tokens returned by the hosted authentication service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    pub user: AuthUser,
}

/// Identity attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Error body returned by PostgREST and the auth service
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

fn render_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Text(text) => text.clone(),
        FilterValue::Integer(n) => n.to_string(),
        FilterValue::Date(date) => date.format("%Y-%m-%d").to_string(),
        FilterValue::Timestamp(ts) => format_timestamp(*ts),
        FilterValue::Uuid(id) => id.to_string(),
    }
}

/// `ilike` pattern matching `term` anywhere, with LIKE wildcards taken literally
fn search_pattern(term: &str) -> String {
    let literal = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("*{literal}*");
    if pattern.contains(RESERVED) {
        format!("\"{}\"", pattern.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        pattern
    }
}

/// Render a query as PostgREST query-string pairs
#[must_use]
pub fn render_params(query: &QueryBuilder, select: &str) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), select.to_string())];

    for filter in &query.filters {
        params.push((
            filter.field.to_string(),
            format!("{}.{}", filter.operator.rest(), render_value(&filter.value)),
        ));
    }

    if let Some(search) = &query.search {
        let pattern = search_pattern(&search.term);
        let alternatives: Vec<String> = search
            .fields
            .iter()
            .map(|field| format!("{field}.ilike.{pattern}"))
            .collect();
        params.push(("or".to_string(), format!("({})", alternatives.join(","))));
    }

    if let Some(order) = &query.order_by {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.field)));
    }

    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }

    params
}

/// Every key used by any row, in first-seen order
///
/// Sent as `columns=` so a bulk insert accepts rows with differing keys and
/// fills the absent ones from column defaults.
fn bulk_columns(rows: &[serde_json::Value]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for key in rows.iter().filter_map(serde_json::Value::as_object).flat_map(|o| o.keys()) {
        if !columns.contains(&key.as_str()) {
            columns.push(key);
        }
    }
    columns.join(",")
}

/// Map a non-success response to an error
///
/// HTTP 409 and Postgres integrity codes (class `23`) are constraint
/// violations; anything else keeps its status and message.
fn response_error(status: StatusCode, text: &str) -> AtlasError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let is_constraint =
        status == StatusCode::CONFLICT || body.code.as_deref().is_some_and(|c| c.starts_with("23"));
    let message = body
        .message
        .or(body.msg)
        .or(body.error_description)
        .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text.to_string() });

    if is_constraint {
        AtlasError::Constraint(message)
    } else {
        AtlasError::Backend {
            status: status.as_u16(),
            message,
        }
    }
}

fn id_param(id: Uuid) -> Vec<(String, String)> {
    vec![("id".to_string(), format!("eq.{id}"))]
}

/// Repository and auth pass-through for the hosted backend
pub struct RestRepository {
    client: Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<Session>>,
    metrics: Arc<MetricsCollector>,
}

impl RestRepository {
    /// Client for the project at `base_url` using its public API key
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            session: RwLock::new(None),
            metrics,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map_or_else(|| self.api_key.clone(), |s| s.access_token.clone())
    }

    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self.bearer().await;
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(response_error(status, &text))
    }

    async fn send<T: DeserializeOwned>(&self, operation: &'static str, builder: RequestBuilder) -> Result<T> {
        let timer = MetricsTimer::new(&self.metrics, operation);
        let result = async {
            let response = Self::check(builder.send().await?).await?;
            Ok(response.json::<T>().await?)
        }
        .await;

        timer.finish(result.is_ok());
        if let Err(e) = &result {
            warn!(operation, error = %e, "REST request failed");
        }
        result
    }

    async fn select<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        table: &str,
        params: &[(String, String)],
    ) -> Result<Vec<T>> {
        let builder = self
            .request(Method::GET, &self.table_url(table))
            .await
            .query(params);
        self.send(operation, builder).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        table: &str,
        select: &str,
        id: Uuid,
        entity: &'static str,
    ) -> Result<T> {
        let mut params = vec![("select".to_string(), select.to_string())];
        params.extend(id_param(id));
        self.select::<T>(operation, table, &params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AtlasError::not_found(entity, id))
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        table: &str,
        select: &str,
        body: &B,
    ) -> Result<Vec<T>> {
        let builder = self
            .request(Method::POST, &self.table_url(table))
            .await
            .header("Prefer", "return=representation")
            .query(&[("select", select)])
            .json(body);
        self.send(operation, builder).await
    }

    async fn insert_one<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        table: &str,
        select: &str,
        body: &B,
    ) -> Result<T> {
        self.insert::<B, T>(operation, table, select, body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AtlasError::Other(format!("{operation}: backend returned no row")))
    }

    async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        table: &str,
        select: &str,
        id: Uuid,
        body: &B,
        entity: &'static str,
    ) -> Result<T> {
        let mut params = vec![("select".to_string(), select.to_string())];
        params.extend(id_param(id));
        let builder = self
            .request(Method::PATCH, &self.table_url(table))
            .await
            .header("Prefer", "return=representation")
            .query(&params)
            .json(body);
        self.send::<Vec<T>>(operation, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AtlasError::not_found(entity, id))
    }

    async fn remove(&self, operation: &'static str, table: &str, id: Uuid, entity: &'static str) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &self.table_url(table))
            .await
            .header("Prefer", "return=representation")
            .query(&[("select", "id")])
            .query(&id_param(id));
        let deleted: Vec<serde_json::Value> = self.send(operation, builder).await?;
        if deleted.is_empty() {
            return Err(AtlasError::not_found(entity, id));
        }
        Ok(())
    }

    /// Exchange email and password for a session
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let builder = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }));
        let session: Session = self.send("sign_in", builder).await?;
        info!(user = %session.user.id, "Signed in");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Trade the stored refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or_else(|| AtlasError::validation("no session to refresh"))?;

        let builder = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&json!({ "refresh_token": refresh_token }));
        let session: Session = self.send("refresh_session", builder).await?;
        debug!(user = %session.user.id, "Session refreshed");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// End the session on the server and forget it locally
    pub async fn sign_out(&self) -> Result<()> {
        if self.session.read().await.is_none() {
            return Ok(());
        }
        let builder = self.request(Method::POST, &self.auth_url("logout")).await;
        let result = Self::check(builder.send().await?).await;
        *self.session.write().await = None;
        result.map(|_| ())
    }

    /// Identity behind the current session, if any
    pub async fn current_user(&self) -> Result<Option<AuthUser>> {
        if self.session.read().await.is_none() {
            return Ok(None);
        }
        let builder = self.request(Method::GET, &self.auth_url("user")).await;
        let user: AuthUser = self.send("current_user", builder).await?;
        Ok(Some(user))
    }

    /// Session currently held, if any
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }
}

#[async_trait]
impl Repository for RestRepository {
    async fn list_companies(&self, filter: &CompanyFilter) -> Result<Vec<Company>> {
        let params = render_params(&filter.to_query(), "*");
        self.select("list_companies", companies::TABLE, &params).await
    }

    async fn get_company(&self, id: Uuid) -> Result<Company> {
        self.select_one("get_company", companies::TABLE, "*", id, "company")
            .await
    }

    async fn create_company(&self, company: &NewCompany) -> Result<Company> {
        self.insert_one("create_company", companies::TABLE, "*", company)
            .await
    }

    async fn update_company(&self, id: Uuid, changes: &CompanyChanges) -> Result<Company> {
        if *changes == CompanyChanges::default() {
            return self.get_company(id).await;
        }
        self.patch("update_company", companies::TABLE, "*", id, changes, "company")
            .await
    }

    async fn delete_company(&self, id: Uuid) -> Result<()> {
        self.remove("delete_company", companies::TABLE, id, "company")
            .await
    }

    async fn import_companies(&self, companies: Vec<NewCompany>) -> Result<Vec<Company>> {
        if companies.is_empty() {
            return Ok(Vec::new());
        }
        let rows = companies
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        let columns = bulk_columns(&rows);

        // One bulk POST is one INSERT statement on the server
        let builder = self
            .request(Method::POST, &self.table_url(companies::TABLE))
            .await
            .header("Prefer", "return=representation,missing=default")
            .query(&[("columns", columns.as_str()), ("select", "*")])
            .json(&rows);
        self.send("import_companies", builder).await
    }

    async fn list_roadmaps(&self, filter: &RoadmapFilter) -> Result<Vec<Roadmap>> {
        let params = render_params(&filter.to_query(), ROADMAP_SELECT);
        self.select("list_roadmaps", roadmaps::TABLE, &params).await
    }

    async fn get_roadmap(&self, id: Uuid) -> Result<Roadmap> {
        self.select_one("get_roadmap", roadmaps::TABLE, ROADMAP_SELECT, id, "roadmap")
            .await
    }

    async fn create_roadmap(&self, roadmap: &NewRoadmap) -> Result<Roadmap> {
        self.insert_one("create_roadmap", roadmaps::TABLE, ROADMAP_SELECT, roadmap)
            .await
    }

    async fn update_roadmap(&self, id: Uuid, changes: &RoadmapChanges) -> Result<Roadmap> {
        if *changes == RoadmapChanges::default() {
            return self.get_roadmap(id).await;
        }
        self.patch("update_roadmap", roadmaps::TABLE, ROADMAP_SELECT, id, changes, "roadmap")
            .await
    }

    async fn delete_roadmap(&self, id: Uuid) -> Result<()> {
        self.remove("delete_roadmap", roadmaps::TABLE, id, "roadmap")
            .await
    }

    async fn list_insights(&self, filter: &InsightFilter) -> Result<Vec<Insight>> {
        let params = render_params(&filter.to_query(), "*");
        self.select("list_insights", insights::TABLE, &params).await
    }

    async fn get_insight(&self, id: Uuid) -> Result<Insight> {
        self.select_one("get_insight", insights::TABLE, "*", id, "insight")
            .await
    }

    async fn create_insight(&self, insight: &NewInsight) -> Result<Insight> {
        self.insert_one("create_insight", insights::TABLE, "*", insight)
            .await
    }

    async fn update_insight(&self, id: Uuid, changes: &InsightChanges) -> Result<Insight> {
        if *changes == InsightChanges::default() {
            return self.get_insight(id).await;
        }
        self.patch("update_insight", insights::TABLE, "*", id, changes, "insight")
            .await
    }

    async fn delete_insight(&self, id: Uuid) -> Result<()> {
        self.remove("delete_insight", insights::TABLE, id, "insight")
            .await
    }

    async fn increment_read_count(&self, id: Uuid) -> Result<i64> {
        let builder = self
            .request(Method::POST, &self.table_url("rpc/increment_read_count"))
            .await
            .json(&json!({ "insight_id": id }));
        let count: Option<i64> = self.send("increment_read_count", builder).await?;
        let count = count.ok_or_else(|| AtlasError::not_found("insight", id))?;
        self.metrics.record_insight_read();
        Ok(count)
    }

    async fn popular_insights(&self, limit: usize) -> Result<Vec<Insight>> {
        let params = render_params(&InsightFilter::popular_query(limit), "*");
        self.select("popular_insights", insights::TABLE, &params).await
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let params = render_params(&filter.to_query(), "*");
        self.select("list_users", users::TABLE, &params).await
    }

    async fn get_user(&self, id: Uuid) -> Result<User> {
        self.select_one("get_user", users::TABLE, "*", id, "user").await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let params = vec![
            ("select".to_string(), "*".to_string()),
            (users::EMAIL.to_string(), format!("eq.{}", email.trim())),
        ];
        let found: Vec<User> = self.select("get_user_by_email", users::TABLE, &params).await?;
        Ok(found.into_iter().next())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        self.insert_one("create_user", users::TABLE, "*", user).await
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<User> {
        if *changes == UserChanges::default() {
            return self.get_user(id).await;
        }
        self.patch("update_user", users::TABLE, "*", id, changes, "user")
            .await
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        self.remove("delete_user", users::TABLE, id, "user").await
    }

    async fn record_login(&self, id: Uuid) -> Result<User> {
        let body = json!({ "last_login_at": format_timestamp(Utc::now()) });
        self.patch("record_login", users::TABLE, "*", id, &body, "user")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Region, RoadmapStatus};

    fn lookup<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn filters_render_as_operator_prefixed_values() {
        let filter = CompanyFilter {
            region: Some(Region::Korea),
            founded_from: Some(1970),
            founded_to: Some(1990),
            ..CompanyFilter::default()
        };
        let params = render_params(&filter.to_query(), "*");
        assert_eq!(lookup(&params, "region"), vec!["eq.韩国"]);
        assert_eq!(lookup(&params, "founded_year"), vec!["gte.1970", "lte.1990"]);
        assert_eq!(lookup(&params, "order"), vec!["updated_at.desc"]);
    }

    #[test]
    fn search_becomes_an_or_tree() {
        let filter = CompanyFilter {
            search: Some("Micron".to_string()),
            ..CompanyFilter::default()
        };
        let params = render_params(&filter.to_query(), "*");
        assert_eq!(
            lookup(&params, "or"),
            vec!["(name.ilike.*micron*,description.ilike.*micron*)"]
        );
    }

    #[test]
    fn reserved_characters_in_search_are_quoted() {
        let filter = RoadmapFilter {
            search: Some("3nm (N3E)".to_string()),
            ..RoadmapFilter::default()
        };
        let params = render_params(&filter.to_query(), ROADMAP_SELECT);
        assert_eq!(
            lookup(&params, "or"),
            vec!["(node.ilike.\"*3nm (n3e)*\",notes.ilike.\"*3nm (n3e)*\")"]
        );
        assert_eq!(lookup(&params, "select"), vec![ROADMAP_SELECT]);
    }

    #[test]
    fn like_wildcards_in_search_are_literal() {
        let filter = CompanyFilter {
            search: Some("a_b".to_string()),
            ..CompanyFilter::default()
        };
        let params = render_params(&filter.to_query(), "*");
        assert_eq!(
            lookup(&params, "or"),
            vec![r#"(name.ilike."*a\\_b*",description.ilike."*a\\_b*")"#]
        );

        assert_eq!(search_pattern("100%"), r#""*100\\%*""#);
        assert_eq!(search_pattern(r"c:\tmp"), r#""*c:\\\\tmp*""#);
        assert_eq!(search_pattern("euv"), "*euv*");
    }

    #[test]
    fn bulk_columns_cover_every_row() {
        let rows = vec![
            json!({"name": "A", "ticker": "AAA"}),
            json!({"name": "B", "region": "日本"}),
        ];
        assert_eq!(bulk_columns(&rows), "name,ticker,region");
    }

    #[test]
    fn integrity_failures_map_to_constraint() {
        let err = response_error(StatusCode::CONFLICT, r#"{"code":"23505","message":"duplicate key"}"#);
        assert!(matches!(err, AtlasError::Constraint(ref m) if m == "duplicate key"));

        let err = response_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":"23503","message":"violates foreign key constraint"}"#,
        );
        assert!(matches!(err, AtlasError::Constraint(_)));

        let err = response_error(StatusCode::BAD_REQUEST, r#"{"code":"22P02","message":"invalid input"}"#);
        assert!(matches!(err, AtlasError::Backend { status: 400, .. }));

        let err = response_error(StatusCode::BAD_GATEWAY, "");
        assert!(matches!(err, AtlasError::Backend { status: 502, ref message } if message.contains("502")));
    }

    #[test]
    fn roadmap_company_and_status_filters() {
        let company = Uuid::new_v4();
        let filter = RoadmapFilter {
            status: Some(RoadmapStatus::InProgress),
            ..RoadmapFilter::for_company(company)
        };
        let params = render_params(&filter.to_query(), ROADMAP_SELECT);
        assert_eq!(lookup(&params, "company_id"), vec![format!("eq.{company}")]);
        assert_eq!(lookup(&params, "status"), vec!["eq.in_progress"]);
    }

    #[test]
    fn popular_query_renders_limit() {
        let params = render_params(&InsightFilter::popular_query(10), "*");
        assert_eq!(lookup(&params, "status"), vec!["eq.published"]);
        assert_eq!(lookup(&params, "order"), vec!["read_count.desc"]);
        assert_eq!(lookup(&params, "limit"), vec!["10"]);
    }

    #[test]
    fn session_deserializes_from_auth_response() {
        let body = r#"{
            "access_token": "at",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "rt",
            "user": {"id": "1f0c6f1e-6a1e-4b8e-9c57-3b1c2f6b7a10", "email": "admin@example.com", "aud": "authenticated"}
        }"#;
        let session: Session = serde_json::from_str(body).unwrap();
        assert_eq!(session.refresh_token, "rt");
        assert_eq!(session.user.email.as_deref(), Some("admin@example.com"));
    }
}
