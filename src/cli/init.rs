//! planboard init command implementation
//!
//! Creates the data directory, its collections folder and a default config.

use std::path::{Path, PathBuf};

use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct InitReport {
    data_dir: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    collections: bool,
}

pub fn run(global: &GlobalOptions) -> Result<()> {
    let storage = Storage::discover(global.data_dir.as_deref())?;

    let created_collections = !storage.is_initialized();
    storage.init()?;
    let created_config = ensure_config(&storage.config_file())?;

    let report = InitReport {
        data_dir: storage.root().to_path_buf(),
        created: InitCreated {
            config: created_config,
            collections: created_collections,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(crate::config::CONFIG_FILE);
    }
    if created_collections {
        created_items.push("collections/");
    }

    let header = if created_items.is_empty() {
        "planboard init: nothing to do".to_string()
    } else {
        "planboard init: initialized data directory".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("data dir", storage.root().display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("planboard user set <id>");
    human.push_next_step("planboard add <title>");

    emit_success(global.output, "init", &report, Some(&human))
}

fn ensure_config(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{} exists but is not a file",
                config_path.display()
            )));
        }
        // Surface a broken config at init time rather than on first use.
        Config::load(config_path)?;
        return Ok(false);
    }

    Config::default().save(config_path)?;
    Ok(true)
}
