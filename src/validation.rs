use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use std::path::Path;

use crate::models::{CompanyChanges, NewCompany, NewInsight, NewRoadmap, NewUser, RoadmapChanges};

/// Earliest founding year accepted for a company
pub const MIN_FOUNDED_YEAR: i32 = 1800;

/// Validation utilities for form input, run before anything reaches a backend
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

fn pattern(source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| anyhow!("Invalid validation pattern {source:?}: {e}"))
}

impl InputValidator {
    /// Validate company name
    pub fn validate_company_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow!("Company name cannot be empty"));
        }

        if name.chars().count() > 255 {
            return Err(anyhow!("Company name too long (max 255 characters)"));
        }

        // Check for potentially dangerous characters
        if name.contains('\0') || name.contains('\r') || name.contains('\n') {
            return Err(anyhow!("Company name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate stock ticker
    pub fn validate_ticker(ticker: &str) -> Result<()> {
        if ticker.chars().count() > 50 {
            return Err(anyhow!("Ticker too long (max 50 characters)"));
        }

        // e.g. "2330.TW", "688981.SH", "BRK-B"
        if !pattern(r"^[A-Za-z0-9][A-Za-z0-9.\-:]*$")?.is_match(ticker) {
            return Err(anyhow!("Ticker contains invalid characters: {ticker}"));
        }

        Ok(())
    }

    /// Validate email format
    pub fn validate_email(email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(anyhow!("Email cannot be empty"));
        }

        if email.len() > 254 {
            return Err(anyhow!("Email too long (max 254 characters)"));
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return Err(anyhow!("Email must have exactly one @ symbol"));
        }

        if parts[0].is_empty() || parts[0].len() > 64 {
            return Err(anyhow!("Email local part invalid"));
        }

        if !pattern(r"^[^@\s]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9\-]+)+$")?
            .is_match(email)
        {
            return Err(anyhow!("Email domain invalid"));
        }

        Ok(())
    }

    /// Validate website / image URL
    pub fn validate_url(url: &str) -> Result<()> {
        if url.len() > 2048 {
            return Err(anyhow!("URL too long (max 2048 characters)"));
        }

        if !pattern(r"^https?://[^\s/$.?#][^\s]*$")?.is_match(url) {
            return Err(anyhow!("URL must start with http:// or https://: {url}"));
        }

        Ok(())
    }

    /// Validate founding year
    pub fn validate_founded_year(year: i32) -> Result<()> {
        let current = Utc::now().year();
        if !(MIN_FOUNDED_YEAR..=current).contains(&year) {
            return Err(anyhow!(
                "Founded year must be between {MIN_FOUNDED_YEAR} and {current}, got {year}"
            ));
        }
        Ok(())
    }

    /// Validate a non-negative amount (employees, market cap, revenue, investment)
    pub fn validate_non_negative(field: &str, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow!("{field} must be a non-negative number, got {value}"));
        }
        Ok(())
    }

    /// Validate yield percentage
    pub fn validate_percentage(value: f64) -> Result<()> {
        if !(0.0..=100.0).contains(&value) {
            return Err(anyhow!("Yield rate must be between 0 and 100, got {value}"));
        }
        Ok(())
    }

    /// Validate node label
    pub fn validate_node(node: &str) -> Result<()> {
        if node.trim().is_empty() {
            return Err(anyhow!("Node cannot be blank"));
        }
        if node.chars().count() > 100 {
            return Err(anyhow!("Node too long (max 100 characters)"));
        }
        Ok(())
    }

    /// Validate insight title
    pub fn validate_title(title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(anyhow!("Title cannot be empty"));
        }
        if title.chars().count() > 500 {
            return Err(anyhow!("Title too long (max 500 characters)"));
        }
        Ok(())
    }

    /// Validate date range
    pub fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
        if let (Some(start_date), Some(end_date)) = (start, end) {
            if start_date > end_date {
                return Err(anyhow!("Start date cannot be after end date"));
            }
        }

        Ok(())
    }

    /// Validate requested page size
    pub fn validate_page_size(page_size: usize, max: usize) -> Result<()> {
        if page_size == 0 {
            return Err(anyhow!("Page size must be greater than 0"));
        }

        if page_size > max {
            return Err(anyhow!("Page size too large (max {max})"));
        }

        Ok(())
    }

    /// Validate file path
    pub fn validate_file_path(path: &Path) -> Result<()> {
        if path.to_string_lossy().is_empty() {
            return Err(anyhow!("File path cannot be empty"));
        }

        // Check for path traversal attempts
        let path_str = path.to_string_lossy();
        if path_str.contains("..") || path_str.contains('~') {
            return Err(anyhow!(
                "File path contains potentially dangerous characters"
            ));
        }

        // Check path length
        if path_str.len() > 4096 {
            return Err(anyhow!("File path too long (max 4096 characters)"));
        }

        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Validate database URL
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Database URL cannot be empty"));
        }

        if url.len() > 1000 {
            return Err(anyhow!("Database URL too long"));
        }

        Ok(())
    }

    /// Check every field of a company form
    pub fn validate_new_company(company: &NewCompany) -> Result<()> {
        Self::validate_company_name(&company.name)?;
        Self::validate_company_fields(
            company.ticker.as_deref(),
            company.website.as_deref(),
            company.founded_year,
            company.employees,
            company.market_cap,
            company.revenue,
        )
    }

    /// Check the supplied fields of a company update
    pub fn validate_company_changes(changes: &CompanyChanges) -> Result<()> {
        if let Some(name) = &changes.name {
            Self::validate_company_name(name)?;
        }
        Self::validate_company_fields(
            changes.ticker.as_deref(),
            changes.website.as_deref(),
            changes.founded_year,
            changes.employees,
            changes.market_cap,
            changes.revenue,
        )
    }

    fn validate_company_fields(
        ticker: Option<&str>,
        website: Option<&str>,
        founded_year: Option<i32>,
        employees: Option<i64>,
        market_cap: Option<f64>,
        revenue: Option<f64>,
    ) -> Result<()> {
        if let Some(ticker) = ticker {
            Self::validate_ticker(ticker)?;
        }
        if let Some(website) = website {
            Self::validate_url(website)?;
        }
        if let Some(year) = founded_year {
            Self::validate_founded_year(year)?;
        }
        if let Some(employees) = employees {
            if employees < 0 {
                return Err(anyhow!("employees must be a non-negative number, got {employees}"));
            }
        }
        if let Some(market_cap) = market_cap {
            Self::validate_non_negative("market_cap", market_cap)?;
        }
        if let Some(revenue) = revenue {
            Self::validate_non_negative("revenue", revenue)?;
        }
        Ok(())
    }

    /// Check every field of a roadmap form
    pub fn validate_new_roadmap(roadmap: &NewRoadmap) -> Result<()> {
        if let Some(node) = &roadmap.node {
            Self::validate_node(node)?;
        }
        if let Some(yield_rate) = roadmap.yield_rate {
            Self::validate_percentage(yield_rate)?;
        }
        if let Some(investment) = roadmap.investment {
            Self::validate_non_negative("investment", investment)?;
        }
        Self::validate_date_range(roadmap.start_date, roadmap.end_date)
    }

    /// Check the supplied fields of a roadmap update
    pub fn validate_roadmap_changes(changes: &RoadmapChanges) -> Result<()> {
        if let Some(node) = &changes.node {
            Self::validate_node(node)?;
        }
        if let Some(yield_rate) = changes.yield_rate {
            Self::validate_percentage(yield_rate)?;
        }
        if let Some(investment) = changes.investment {
            Self::validate_non_negative("investment", investment)?;
        }
        Self::validate_date_range(changes.start_date, changes.end_date)
    }

    /// Check every field of an insight form
    pub fn validate_new_insight(insight: &NewInsight) -> Result<()> {
        Self::validate_title(&insight.title)?;
        if let Some(cover) = &insight.cover_image {
            Self::validate_url(cover)?;
        }
        Ok(())
    }

    /// Check every field of a user form
    pub fn validate_new_user(user: &NewUser) -> Result<()> {
        Self::validate_email(user.email.trim())?;
        if let Some(avatar) = &user.avatar_url {
            Self::validate_url(avatar)?;
        }
        Ok(())
    }
}
