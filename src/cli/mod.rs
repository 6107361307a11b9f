//! CLI command handlers

pub mod commands;

pub use commands::{
    columns, configs_delete, configs_list, configs_run, configs_save, configs_show, files, run,
    sheets, validate, Workspace,
};
