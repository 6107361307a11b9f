use clap::{Parser, Subcommand};
use royalbit_transporter::cli::{self, Workspace};
use royalbit_transporter::error::TransporterResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "transporter")]
#[command(about = "Move rows between spreadsheets and archive workbooks, driven by YAML configs.")]
#[command(long_about = "Transporter - Declarative spreadsheet data migration and archival

A drive is a directory of .xlsx workbooks (subdirectories are folders).
Workbooks are addressed by id: the file name without the .xlsx extension.

COMMANDS:
  run       - Execute a transfer or archive configuration
  validate  - Check configuration files against the schema
  files     - List workbooks on the drive
  sheets    - List the sheets of a workbook
  columns   - List the header labels of a sheet
  configs   - Manage saved configurations

EXAMPLES:
  transporter run transfer.yaml --drive ./drive
  transporter run archive.yaml --json
  transporter columns 3f2a9c... Orders --header-row 2
  transporter configs save nightly.yaml --name \"Nightly archive\"")]
#[command(version)]
struct Cli {
    /// Directory acting as the drive
    #[arg(long, global = true, env = "TRANSPORTER_DRIVE", default_value = ".")]
    drive: PathBuf,

    /// Saved configurations file (default: <drive>/configs.json)
    #[arg(long, global = true, env = "TRANSPORTER_CONFIGS")]
    configs: Option<PathBuf>,

    /// Workbook id used for the `current` destination
    #[arg(long, global = true)]
    active: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Execute a transfer or archive configuration.

TRANSFER:
  Reads every source sheet, keeps the selected columns, and writes the rows to
  the destination sheet (append or replace) using the chosen strategy:
    atomic    - one write for all rows
    rowByRow  - one write and flush per row
    batched   - one write and flush per batchSize rows

ARCHIVE:
  Copies the source workbook (optionally into a folder), keeps a subset of
  sheets, filters rows, and trims trailing blank rows/columns.

Runs of saved configurations (with an id) stamp lastRun in the configs file.")]
    /// Execute a configuration file
    Run {
        /// Path to YAML or JSON configuration
        file: PathBuf,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,

        /// Show the parsed configuration
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate configuration files without running them
    Validate {
        /// Path to configuration file(s)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List workbooks on the drive
    Files,

    /// List the sheets of a workbook
    Sheets {
        /// Workbook id or URL
        workbook: String,
    },

    /// List the header labels of a sheet
    Columns {
        /// Workbook id or URL
        workbook: String,

        /// Sheet name
        sheet: String,

        /// 1-based header row
        #[arg(long, default_value_t = 1)]
        header_row: u32,
    },

    /// Manage saved configurations
    Configs {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List saved configurations, most recently updated first
    List,

    /// Print a saved configuration as JSON
    Show {
        id: String,
    },

    /// Save a configuration file (updates it when its id is already saved)
    Save {
        /// Path to YAML or JSON configuration
        file: PathBuf,

        /// Display name for new configurations
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a saved configuration
    Delete {
        id: String,
    },

    /// Execute a saved configuration
    Run {
        id: String,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> TransporterResult<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "royalbit_transporter=info".into()),
        )
        .init();

    let workspace = Workspace::new(cli.drive, cli.configs, cli.active);

    match cli.command {
        Commands::Run {
            file,
            json,
            verbose,
        } => cli::run(&workspace, file, json, verbose),

        Commands::Validate { files } => cli::validate(files),

        Commands::Files => cli::files(&workspace),

        Commands::Sheets { workbook } => cli::sheets(&workspace, &workbook),

        Commands::Columns {
            workbook,
            sheet,
            header_row,
        } => cli::columns(&workspace, &workbook, &sheet, header_row),

        Commands::Configs { action } => match action {
            ConfigAction::List => cli::configs_list(&workspace),
            ConfigAction::Show { id } => cli::configs_show(&workspace, &id),
            ConfigAction::Save { file, name } => {
                cli::configs_save(&workspace, &file, name.as_deref())
            }
            ConfigAction::Delete { id } => cli::configs_delete(&workspace, &id),
            ConfigAction::Run { id, json } => cli::configs_run(&workspace, &id, json),
        },
    }
}
