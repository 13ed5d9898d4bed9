//! Session commands

use anyhow::Result;
use jasper_common::ConfigStore;
use jasper_portal::SimDataService;
use serde::Serialize;

use crate::output::{print_list, print_success, OutputFormat, TableDisplay};

#[derive(Debug, Serialize)]
pub struct SessionRow {
    pub project: String,
    pub cookie_count: usize,
    /// Cookie names only
    pub cookies: Vec<String>,
}

impl TableDisplay for SessionRow {
    fn headers() -> Vec<&'static str> {
        vec!["Project", "Cookies", "Names"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.project.clone(),
            self.cookie_count.to_string(),
            self.cookies.join(", "),
        ]
    }
}

/// Cached sessions, one row per project.
pub fn session_rows(store: &ConfigStore) -> Result<Vec<SessionRow>> {
    let mut rows = Vec::new();
    for project in store.session_projects()? {
        let cookies = store.load_session_cookies(&project)?.unwrap_or_default();
        rows.push(SessionRow {
            cookie_count: cookies.len(),
            cookies: cookies.names().map(str::to_string).collect(),
            project,
        });
    }
    Ok(rows)
}

pub fn list(store: &ConfigStore, format: OutputFormat) -> Result<()> {
    print_list(&session_rows(store)?, format);
    Ok(())
}

pub async fn refresh(service: SimDataService, project: &str, format: OutputFormat) -> Result<()> {
    let cookies = service.refresh(project).await?;
    match format {
        OutputFormat::Table => print_success(&format!(
            "Logged in to {} ({} cookies)",
            project,
            cookies.len()
        )),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "project": project,
                "cookies": cookies.names().collect::<Vec<_>>()
            })
        ),
    }
    Ok(())
}
