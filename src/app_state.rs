//! Explicit application state for a dashboard front end.
//!
//! Holds the signed-in user, UI preferences, the most recently fetched lists
//! and the global search text. Only the theme and the sidebar flag survive a
//! restart; they are stored as JSON under the key the dashboard has always
//! used for them.
//!
//! Every fetch takes a [`RequestTicket`]. Navigating to another view starts a
//! new generation, and a response carrying a ticket from an older generation
//! is dropped instead of overwriting newer data.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Company, Insight, Roadmap, User};
use crate::table::filter_by_search;

/// Key the persisted preferences are stored under
pub const STORAGE_KEY: &str = "semiconductor-platform-storage";

/// Color scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl std::str::FromStr for Theme {
    type Err = crate::error::AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(crate::error::AtlasError::validation(format!(
                "invalid theme: {other} (expected dark or light)"
            ))),
        }
    }
}

/// The persisted part of the state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiPreferences {
    pub theme: Theme,
    pub sidebar_collapsed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPreferences {
    state: UiPreferences,
    #[serde(default)]
    version: u32,
}

impl UiPreferences {
    /// Load from `path`; a missing or unreadable file yields the defaults
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => {
                debug!(path = %path.display(), "No stored preferences, using defaults");
                return Self::default();
            }
        };

        let stored: std::result::Result<serde_json::Map<String, serde_json::Value>, _> =
            serde_json::from_str(&text);
        let prefs = stored
            .ok()
            .and_then(|mut map| map.remove(STORAGE_KEY))
            .and_then(|value| serde_json::from_value::<StoredPreferences>(value).ok())
            .map(|stored| stored.state);

        prefs.unwrap_or_else(|| {
            warn!(path = %path.display(), "Stored preferences are malformed, using defaults");
            Self::default()
        })
    }

    /// Write to `path`, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut root = serde_json::Map::new();
        root.insert(
            STORAGE_KEY.to_string(),
            serde_json::to_value(StoredPreferences {
                state: *self,
                version: 0,
            })?,
        );
        fs::write(path, serde_json::to_string_pretty(&root)?)?;
        Ok(())
    }
}

/// Top-level screens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Home,
    Companies,
    Roadmap,
    Insights,
    Admin,
    Login,
}

/// Identifies the request a response belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub view: View,
    pub generation: u64,
}

/// State shared by the views of one session
#[derive(Debug, Default)]
pub struct AppState {
    user: Option<User>,
    preferences: UiPreferences,
    preferences_path: Option<PathBuf>,
    companies: Vec<Company>,
    roadmaps: Vec<Roadmap>,
    insights: Vec<Insight>,
    global_search: String,
    view: View,
    generation: u64,
}

impl AppState {
    /// Fresh state; preferences are restored from `preferences_path` when given
    #[must_use]
    pub fn new(preferences_path: Option<PathBuf>) -> Self {
        let preferences = preferences_path
            .as_deref()
            .map(UiPreferences::load)
            .unwrap_or_default();
        Self {
            preferences,
            preferences_path,
            ..Self::default()
        }
    }

    /// Save `preferences`, then adopt them; a failed save changes nothing
    fn commit(&mut self, preferences: UiPreferences) -> Result<()> {
        if let Some(path) = &self.preferences_path {
            preferences.save(path)?;
        }
        self.preferences = preferences;
        Ok(())
    }

    pub fn preferences(&self) -> UiPreferences {
        self.preferences
    }

    /// Switch theme and persist it
    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.commit(UiPreferences {
            theme,
            ..self.preferences
        })
    }

    /// Flip the sidebar and persist it; returns the new collapsed flag
    pub fn toggle_sidebar(&mut self) -> Result<bool> {
        let collapsed = !self.preferences.sidebar_collapsed;
        self.commit(UiPreferences {
            sidebar_collapsed: collapsed,
            ..self.preferences
        })?;
        Ok(collapsed)
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    pub fn logout(&mut self) {
        self.user = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Only admins see the management views
    pub fn can_manage(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.can_manage())
    }

    /// Admins and editors may change content
    pub fn can_edit(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.can_edit())
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Move to `view`; responses to requests issued before this are stale
    pub fn navigate(&mut self, view: View) -> RequestTicket {
        self.view = view;
        self.generation += 1;
        self.begin_request()
    }

    /// Ticket for a fetch issued now from the current view
    pub fn begin_request(&self) -> RequestTicket {
        RequestTicket {
            view: self.view,
            generation: self.generation,
        }
    }

    /// True when a response for `ticket` may still be applied
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.view == self.view && ticket.generation == self.generation
    }

    fn accept(&self, ticket: RequestTicket, what: &str) -> bool {
        let current = self.is_current(ticket);
        if !current {
            debug!(?ticket, current = self.generation, what, "Dropping stale response");
        }
        current
    }

    /// Store fetched companies unless the response is stale
    pub fn apply_companies(&mut self, ticket: RequestTicket, companies: Vec<Company>) -> bool {
        let accepted = self.accept(ticket, "companies");
        if accepted {
            self.companies = companies;
        }
        accepted
    }

    /// Store fetched roadmaps unless the response is stale
    pub fn apply_roadmaps(&mut self, ticket: RequestTicket, roadmaps: Vec<Roadmap>) -> bool {
        let accepted = self.accept(ticket, "roadmaps");
        if accepted {
            self.roadmaps = roadmaps;
        }
        accepted
    }

    /// Store fetched insights unless the response is stale
    pub fn apply_insights(&mut self, ticket: RequestTicket, insights: Vec<Insight>) -> bool {
        let accepted = self.accept(ticket, "insights");
        if accepted {
            self.insights = insights;
        }
        accepted
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    pub fn roadmaps(&self) -> &[Roadmap] {
        &self.roadmaps
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    pub fn global_search(&self) -> &str {
        &self.global_search
    }

    pub fn set_global_search(&mut self, search: impl Into<String>) {
        self.global_search = search.into();
    }

    /// Cached companies matching the global search
    pub fn search_companies(&self) -> Vec<&Company> {
        filter_by_search(&self.companies, &self.global_search)
    }

    /// Cached roadmaps matching the global search
    pub fn search_roadmaps(&self) -> Vec<&Roadmap> {
        filter_by_search(&self.roadmaps, &self.global_search)
    }

    /// Cached insights matching the global search
    pub fn search_insights(&self) -> Vec<&Insight> {
        filter_by_search(&self.insights, &self.global_search)
    }
}
