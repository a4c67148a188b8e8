//! planboard user command implementation
//!
//! Session identity helpers (set/show).

use std::path::PathBuf;

use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::session;
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct UserSetReport {
    user: String,
    path: PathBuf,
}

#[derive(serde::Serialize)]
struct UserShowReport {
    user: Option<String>,
    authenticated: bool,
}

pub fn run_set(global: &GlobalOptions, id: &str) -> Result<()> {
    let storage = Storage::discover(global.data_dir.as_deref())?;
    let path = session::persist_user(storage.root(), id)?;
    let user = id.trim().to_string();

    let mut human = HumanOutput::new(format!("planboard user set: {user}"));
    human.push_summary("user", user.clone());
    human.push_summary("path", path.display().to_string());
    human.push_next_step("planboard board");

    let report = UserSetReport { user, path };
    emit_success(global.output, "user set", &report, Some(&human))
}

pub fn run_show(global: &GlobalOptions) -> Result<()> {
    let storage = Storage::discover(global.data_dir.as_deref())?;
    let config = Config::load_from_dir(storage.root())?;
    let user = session::resolve_user(storage.root(), global.user.as_deref(), &config)?;

    let mut human = match user.as_deref() {
        Some(user) => {
            let mut human = HumanOutput::new(format!("planboard user: {user}"));
            human.push_summary("user", user.to_string());
            human
        }
        None => {
            let mut human = HumanOutput::new("planboard user: not set");
            human.push_warning("no user; board commands will be refused");
            human.push_next_step("planboard user set <id>");
            human
        }
    };
    human.push_summary("data dir", storage.root().display().to_string());

    let report = UserShowReport {
        authenticated: user.is_some(),
        user,
    };
    emit_success(global.output, "user show", &report, Some(&human))
}
