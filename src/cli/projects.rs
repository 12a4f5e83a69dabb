use anyhow::{bail, Result};

use crate::config::LoopConfig;
use crate::db;
use crate::memory::store;

pub fn list(config: &LoopConfig) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path())?;
    let projects = store::list_projects(&conn)?;

    if projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }
    for project in &projects {
        match &project.description {
            Some(desc) => println!("  {}  {}", project.name, super::preview(desc, 80)),
            None => println!("  {}", project.name),
        }
    }
    Ok(())
}

pub fn add(config: &LoopConfig, name: &str, description: Option<&str>) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("project name must not be empty");
    }
    let conn = db::open_database(config.resolved_db_path())?;
    let project = store::add_project(&conn, name, description)?;
    println!("Added project {} ({})", project.name, project.id);
    Ok(())
}
