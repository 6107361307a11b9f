use crate::config::{ConfigStore, Configuration, SavedConfig};
use crate::core::{self, RunContext};
use crate::error::{TransporterError, TransporterResult};
use crate::store::{TabularStore, WorkbookId, XlsxStore};
use crate::types::RunOutcome;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Where the CLI finds workbooks and saved configurations
#[derive(Debug, Clone)]
pub struct Workspace {
    pub drive: PathBuf,
    pub configs: PathBuf,
    /// Workbook bound to the `current` destination
    pub active: Option<String>,
}

impl Workspace {
    pub fn new(drive: PathBuf, configs: Option<PathBuf>, active: Option<String>) -> Self {
        let configs = configs.unwrap_or_else(|| drive.join("configs.json"));
        Self {
            drive,
            configs,
            active,
        }
    }

    fn store(&self) -> TransporterResult<XlsxStore> {
        XlsxStore::open(&self.drive)
    }

    fn config_store(&self) -> ConfigStore {
        ConfigStore::new(&self.configs)
    }

    fn context(&self) -> RunContext {
        let ctx = RunContext::new();
        match self.active.as_deref().map(str::trim) {
            Some(active) if !active.is_empty() => {
                ctx.with_active_workbook(WorkbookId::new(core::extract_file_id(active)))
            }
            _ => ctx,
        }
    }
}

fn print_outcome(outcome: &RunOutcome, json: bool) -> TransporterResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else if outcome.is_success() {
        println!("{}", format!("✅ {}", outcome.message).bold().green());
        if let Some(url) = &outcome.file_url {
            println!("   File: {}", url.cyan());
        }
    } else {
        println!("{}", format!("❌ {}", outcome.message).bold().red());
    }

    if outcome.is_success() {
        Ok(())
    } else {
        Err(TransporterError::RunFailed(outcome.message.clone()))
    }
}

fn execute_config(
    workspace: &Workspace,
    config: &Configuration,
    record: bool,
    json: bool,
) -> TransporterResult<()> {
    let mut store = workspace.store()?;
    let configs = workspace.config_store();
    let outcome = core::run_execution(
        &mut store,
        config,
        &workspace.context(),
        record.then_some(&configs),
    );
    print_outcome(&outcome, json)
}

/// Execute the run command
pub fn run(workspace: &Workspace, file: PathBuf, json: bool, verbose: bool) -> TransporterResult<()> {
    let config = Configuration::load(&file)?;
    if !json {
        println!("{}", "🚚 Transporter - Running configuration".bold().green());
        println!("   File:  {}", file.display());
        println!("   Mode:  {}", config.mode().bright_yellow().bold());
        println!("   Drive: {}\n", workspace.drive.display());
    }
    if verbose && !json {
        println!("{}", "📖 Configuration:".cyan());
        println!("{}", serde_yaml::to_string(&config)?);
    }
    execute_config(workspace, &config, true, json)
}

/// Execute the validate command
pub fn validate(files: Vec<PathBuf>) -> TransporterResult<()> {
    let mut failures = Vec::new();

    for file in &files {
        match Configuration::load(file) {
            Ok(config) => println!(
                "{} {} ({})",
                "✅".green(),
                file.display(),
                config.mode().bright_yellow()
            ),
            Err(e) => {
                println!("{} {}", "❌".red(), file.display());
                println!("   {}", e.to_string().red());
                failures.push(file.display().to_string());
            }
        }
    }

    println!();
    if failures.is_empty() {
        println!("{}", format!("✅ {} configuration(s) valid", files.len()).bold().green());
        Ok(())
    } else {
        Err(TransporterError::Validation(format!(
            "{} of {} configuration(s) invalid: {}",
            failures.len(),
            files.len(),
            failures.join(", ")
        )))
    }
}

/// Execute the files command
pub fn files(workspace: &Workspace) -> TransporterResult<()> {
    let store = workspace.store()?;
    let files = store.files()?;
    if files.is_empty() {
        println!("{}", "⚠️  No workbooks found".yellow());
        return Ok(());
    }
    for file in files {
        println!("{}  {}", file.id.to_string().cyan(), file.name);
    }
    Ok(())
}

/// Execute the sheets command
pub fn sheets(workspace: &Workspace, workbook: &str) -> TransporterResult<()> {
    let mut store = workspace.store()?;
    for name in core::sheet_names(&mut store, workbook)? {
        println!("{}", name);
    }
    Ok(())
}

/// Execute the columns command
pub fn columns(
    workspace: &Workspace,
    workbook: &str,
    sheet: &str,
    header_row: u32,
) -> TransporterResult<()> {
    let mut store = workspace.store()?;
    let columns = core::sheet_columns(&mut store, workbook, sheet, header_row)?;
    if columns.is_empty() {
        println!("{}", format!("⚠️  No header labels in row {}", header_row.max(1)).yellow());
    }
    for column in columns {
        println!("{}", column);
    }
    Ok(())
}

fn print_saved(saved: &SavedConfig) {
    let last_run = saved
        .last_run
        .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
    println!(
        "{}  {} [{}]  last run: {}",
        saved.id.cyan(),
        saved.name.bold(),
        saved.config.mode(),
        last_run
    );
}

/// Execute the configs list command
pub fn configs_list(workspace: &Workspace) -> TransporterResult<()> {
    let saved = workspace.config_store().list()?;
    if saved.is_empty() {
        println!("{}", "⚠️  No saved configurations".yellow());
    }
    for entry in &saved {
        print_saved(entry);
    }
    Ok(())
}

fn find_saved(configs: &ConfigStore, id: &str) -> TransporterResult<SavedConfig> {
    configs
        .get(id)?
        .ok_or_else(|| TransporterError::config(format!("No saved configuration with id '{}'", id)))
}

/// Execute the configs show command
pub fn configs_show(workspace: &Workspace, id: &str) -> TransporterResult<()> {
    let saved = find_saved(&workspace.config_store(), id)?;
    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}

/// Execute the configs save command
pub fn configs_save(workspace: &Workspace, file: &Path, name: Option<&str>) -> TransporterResult<()> {
    let config = Configuration::load(file)?;
    let saved = workspace.config_store().save(config, name)?;
    println!(
        "{}",
        format!("✅ Saved '{}' as {}", saved.name, saved.id).bold().green()
    );
    Ok(())
}

/// Execute the configs delete command
pub fn configs_delete(workspace: &Workspace, id: &str) -> TransporterResult<()> {
    if workspace.config_store().delete(id)? {
        println!("{}", format!("✅ Deleted {}", id).green());
        Ok(())
    } else {
        Err(TransporterError::config(format!(
            "No saved configuration with id '{}'",
            id
        )))
    }
}

/// Execute the configs run command
pub fn configs_run(workspace: &Workspace, id: &str, json: bool) -> TransporterResult<()> {
    let saved = find_saved(&workspace.config_store(), id)?;
    if !json {
        println!(
            "{}",
            format!("🚚 Transporter - Running '{}'", saved.name).bold().green()
        );
        println!("   Mode:  {}\n", saved.config.mode().bright_yellow().bold());
    }
    execute_config(workspace, &saved.config, true, json)
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
