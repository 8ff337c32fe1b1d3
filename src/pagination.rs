//! Cursor navigation over a team's repositories, and the selection of
//! repositories a team wants its pull requests pulled from.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use log::debug;
use serde_json::{Map, Value};

use crate::fetcher::DataFetcher;
use crate::models::TeamRepositoryPageable;
use crate::settings::SettingsRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNavigation {
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
}

impl FromStr for PageNavigation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NEXT_PAGE" => Ok(PageNavigation::NextPage),
            "PREVIOUS_PAGE" => Ok(PageNavigation::PreviousPage),
            "FIRST_PAGE" => Ok(PageNavigation::FirstPage),
            "LAST_PAGE" => Ok(PageNavigation::LastPage),
            _ => Err(anyhow!("Unexpected pagination type requested: {}", s)),
        }
    }
}

/// Requested direction plus the boundaries of the page it is relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub page: PageNavigation,
    pub total: Option<u32>,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            start_cursor: None,
            end_cursor: None,
            page: PageNavigation::NextPage,
            total: None,
        }
    }
}

impl PageCursor {
    /// Cursor for moving `page` away from `current`.
    pub fn relative_to(current: &TeamRepositoryPageable, page: PageNavigation) -> Self {
        Self {
            start_cursor: current.start_cursor.clone(),
            end_cursor: current.end_cursor.clone(),
            page,
            total: Some(current.total),
        }
    }
}

/// Connection arguments for one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageWindow {
    First { count: u32, after: Option<String> },
    Last { count: u32, before: Option<String> },
}

impl PageWindow {
    pub fn variables(&self) -> Map<String, Value> {
        let mut variables = Map::new();
        match self {
            PageWindow::First { count, after } => {
                variables.insert("first".into(), Value::from(*count));
                variables.insert("after".into(), after.clone().map_or(Value::Null, Value::from));
                variables.insert("last".into(), Value::Null);
                variables.insert("before".into(), Value::Null);
            }
            PageWindow::Last { count, before } => {
                variables.insert("first".into(), Value::Null);
                variables.insert("after".into(), Value::Null);
                variables.insert("last".into(), Value::from(*count));
                variables.insert("before".into(), before.clone().map_or(Value::Null, Value::from));
            }
        }
        variables
    }
}

impl fmt::Display for PageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageWindow::First { count, after } => {
                write!(f, "first:{} after:\"{}\"", count, after.as_deref().unwrap_or(""))
            }
            PageWindow::Last { count, before } => {
                write!(f, "last:{} before:\"{}\"", count, before.as_deref().unwrap_or(""))
            }
        }
    }
}

fn non_empty(cursor: Option<&String>) -> Option<String> {
    cursor.filter(|cursor| !cursor.is_empty()).cloned()
}

/// Derives the page request for `cursor`.
///
/// The last page asks for exactly the items on the final page, which is
/// `total % page_size` or a full page when that remainder is zero.
pub fn page_window(page_size: u32, cursor: &PageCursor) -> PageWindow {
    match cursor.page {
        PageNavigation::NextPage => PageWindow::First {
            count: page_size,
            after: non_empty(cursor.end_cursor.as_ref()),
        },
        PageNavigation::PreviousPage => PageWindow::Last {
            count: page_size,
            before: non_empty(cursor.start_cursor.as_ref()),
        },
        PageNavigation::FirstPage => PageWindow::First {
            count: page_size,
            after: None,
        },
        PageNavigation::LastPage => {
            let remainder = cursor.total.unwrap_or(0).checked_rem(page_size).unwrap_or(0);
            PageWindow::Last {
                count: if remainder == 0 { page_size } else { remainder },
                before: None,
            }
        }
    }
}

/// Pages through a team's repositories and tracks which ones are selected.
#[derive(Debug, Default)]
pub struct RepositoryBrowser {
    team_name: Option<String>,
    cursor: PageCursor,
    page: Option<TeamRepositoryPageable>,
    selected: BTreeSet<String>,
}

impl RepositoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn team_name(&self) -> Option<&str> {
        self.team_name.as_deref()
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn page(&self) -> Option<&TeamRepositoryPageable> {
        self.page.as_ref()
    }

    /// Starts over on the first page of `team_name` with its saved selection.
    /// Does nothing when that team is already shown.
    pub fn switch_team(&mut self, team_name: &str, settings: &dyn SettingsRepository) -> Result<()> {
        if self.team_name.as_deref() == Some(team_name) {
            return Ok(());
        }

        debug!("Switching repository browser to team {}", team_name);
        self.team_name = Some(team_name.to_string());
        self.cursor = PageCursor::default();
        self.page = None;
        self.restore(settings)
    }

    pub fn navigate(&mut self, page: PageNavigation) {
        self.cursor = match &self.page {
            Some(current) => PageCursor::relative_to(current, page),
            None => PageCursor {
                page,
                ..PageCursor::default()
            },
        };
    }

    pub fn show_page(&mut self, page: TeamRepositoryPageable) {
        self.page = Some(page);
    }

    /// Fetches the page the current cursor points at.
    pub async fn load_page(
        &mut self,
        fetcher: &DataFetcher,
        org_name: &str,
        page_size: u32,
    ) -> Result<&TeamRepositoryPageable> {
        let team_name = self
            .team_name
            .clone()
            .ok_or_else(|| anyhow!("No team selected"))?;
        let page = fetcher
            .fetch_team_repositories(org_name, &team_name, &self.cursor, page_size)
            .await?;
        Ok(&*self.page.insert(page))
    }

    pub fn has_next_page(&self) -> bool {
        self.page.as_ref().is_some_and(|page| page.has_next_page)
    }

    pub fn has_previous_page(&self) -> bool {
        self.page.as_ref().is_some_and(|page| page.has_previous_page)
    }

    pub fn is_selected(&self, name_with_owner: &str) -> bool {
        self.selected.contains(name_with_owner)
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn toggle(&mut self, name_with_owner: &str) {
        if !self.selected.remove(name_with_owner) {
            self.selected.insert(name_with_owner.to_string());
        }
    }

    pub fn select_all_on_page(&mut self) {
        if let Some(page) = &self.page {
            self.selected.extend(
                page.team_repositories
                    .iter()
                    .map(|repository| repository.name_with_owner.clone()),
            );
        }
    }

    pub fn unselect_all(&mut self) {
        self.selected.clear();
    }

    /// Drops unsaved changes and reloads the team's saved selection.
    pub fn restore(&mut self, settings: &dyn SettingsRepository) -> Result<()> {
        self.selected.clear();
        if let Some(team_name) = &self.team_name {
            if let Some(team) = settings.load_team(team_name)? {
                self.selected.extend(team.repositories);
            }
        }
        Ok(())
    }

    pub fn save(&self, settings: &dyn SettingsRepository) -> Result<()> {
        let team_name = self
            .team_name
            .as_deref()
            .ok_or_else(|| anyhow!("No team selected"))?;
        settings.partial_save_team(team_name, self.selected.iter().cloned().collect())
    }
}
