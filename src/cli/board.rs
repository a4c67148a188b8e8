//! planboard board commands: add, board, move, edit, rm, stats, calendar.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::board::{Board, BoardOptions, MoveReport, Notice};
use crate::calendar::{self, WeekAgenda};
use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::file_store::FileStore;
use crate::group::GroupView;
use crate::item::{FieldEdit, Item, ItemDraft, Priority, StatusSet};
use crate::output::{emit_success, HumanOutput};
use crate::reorder::MoveIntent;
use crate::session::{self, SessionContext};
use crate::stats::{BoardStats, StatusCount};
use crate::storage::Storage;
use crate::sync::SyncAdapter;

pub struct AddOptions {
    pub title: String,
    pub description: Option<String>,
    pub due: Option<String>,
    pub priority: Option<String>,
    pub labels: Vec<String>,
}

pub struct MoveOptions {
    pub id: String,
    pub status: String,
    pub index: Option<usize>,
    pub from: Option<String>,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due: Option<String>,
    pub clear_due: bool,
    pub priority: Option<String>,
    pub labels: Vec<String>,
    pub clear_labels: bool,
}

struct BoardContext {
    session: SessionContext,
    board: Board,
}

#[derive(Serialize)]
struct BoardOutput<'a> {
    user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    #[serde(flatten)]
    view: GroupView,
}

#[derive(Serialize)]
struct MoveOutput {
    #[serde(flatten)]
    report: MoveReport,
    status: String,
    index: usize,
}

#[derive(Serialize)]
struct DeleteOutput {
    id: String,
    title: String,
}

#[derive(Serialize)]
struct NoticeOutput<'a, T: Serialize> {
    #[serde(flatten)]
    data: &'a T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notices: Vec<Notice>,
}

pub async fn run_add(global: &GlobalOptions, options: AddOptions) -> Result<()> {
    let mut ctx = load_context(global).await?;

    let mut draft = ItemDraft::new(options.title.trim());
    draft.description = options.description.unwrap_or_default();
    draft.due_date = parse_due(options.due.as_deref())?;
    if let Some(priority) = options.priority.as_deref() {
        draft.priority = priority.parse()?;
    }
    draft.labels = labels(options.labels);

    let item = ctx.board.create_item(&ctx.session, draft, Utc::now()).await?;

    let mut human = HumanOutput::new("Task created");
    human.push_summary("ID", item.id.clone());
    human.push_summary("Title", item.title.clone());
    human.push_summary("Status", item.status.clone());
    human.push_summary("Priority", item.priority.to_string());
    if let Some(due) = item.due_date {
        human.push_summary("Due", due.format("%Y-%m-%d").to_string());
    }
    human.push_next_step(format!("planboard move {} <status>", short_id(&item.id)));

    emit_success(global.output, "add", &item, Some(&human))
}

pub async fn run_board(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global).await?;
    let view = ctx.board.view();

    let mut human = HumanOutput::new(match global.project.as_deref() {
        Some(project) => format!("Board: {project}"),
        None => "Board".to_string(),
    });
    human.push_summary("User", ctx.session.user_id().to_string());
    human.push_summary("Tasks", ctx.board.items().len().to_string());
    for group in &view.groups {
        human.push_section(
            format!("{} ({})", group.status, group.items.len()),
            group
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| board_line(index, item))
                .collect(),
        );
    }
    if ctx.board.items().is_empty() {
        human.push_next_step("planboard add <title>");
    }

    let output = BoardOutput {
        user: ctx.session.user_id(),
        project: global.project.as_deref(),
        view,
    };
    emit_success(global.output, "board", &output, Some(&human))
}

pub async fn run_move(global: &GlobalOptions, options: MoveOptions) -> Result<()> {
    let mut ctx = load_context(global).await?;
    let id = resolve_id(ctx.board.items(), &options.id)?;

    let mut intent = MoveIntent::new(id.clone(), options.status, options.index.unwrap_or(usize::MAX));
    if let Some(from) = options.from {
        intent = intent.from_status(from);
    }
    let report = ctx.board.move_item(&ctx.session, intent, Utc::now()).await?;

    let (status, index) = ctx
        .board
        .view()
        .position_of(&id)
        .map(|(status, index)| (status.to_string(), index))
        .ok_or_else(|| Error::NotFound(id.clone()))?;

    let header = if report.updates == 0 {
        "Task already in place"
    } else {
        "Task moved"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("ID", id);
    human.push_summary("Status", status.clone());
    human.push_summary("Position", index.to_string());
    human.push_summary("Updated", report.updates.to_string());
    if ctx.board.needs_refresh() {
        human.push_warning("local board may be stale; run `planboard board`");
    }

    let output = MoveOutput {
        report,
        status,
        index,
    };
    emit_with_notices(global, "move", &output, &mut human, &mut ctx.board)
}

pub async fn run_edit(global: &GlobalOptions, options: EditOptions) -> Result<()> {
    let mut ctx = load_context(global).await?;
    let id = resolve_id(ctx.board.items(), &options.id)?;

    let edit = FieldEdit {
        title: options.title.map(|title| title.trim().to_string()),
        description: options.description,
        due_date: if options.clear_due {
            Some(None)
        } else {
            parse_due(options.due.as_deref())?.map(Some)
        },
        priority: options
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?,
        labels: if options.clear_labels {
            Some(BTreeSet::new())
        } else if options.labels.is_empty() {
            None
        } else {
            Some(labels(options.labels))
        },
        project_id: None,
    };
    if edit.is_empty() {
        return Err(Error::InvalidArgument(
            "edit requires at least one field to change".to_string(),
        ));
    }

    let item = ctx.board.edit_item(&ctx.session, &id, edit, Utc::now()).await?;

    let mut human = HumanOutput::new("Task updated");
    human.push_summary("ID", item.id.clone());
    human.push_summary("Title", item.title.clone());
    human.push_summary("Priority", item.priority.to_string());
    human.push_summary(
        "Due",
        item.due_date
            .map(|due| due.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "(none)".to_string()),
    );
    if !item.labels.is_empty() {
        human.push_summary("Labels", join_labels(&item.labels));
    }
    emit_with_notices(global, "edit", &item, &mut human, &mut ctx.board)
}

pub async fn run_rm(global: &GlobalOptions, id: &str) -> Result<()> {
    let mut ctx = load_context(global).await?;
    let id = resolve_id(ctx.board.items(), id)?;
    let removed = ctx.board.delete_item(&ctx.session, &id).await?;

    let mut human = HumanOutput::new("Task deleted");
    human.push_summary("ID", removed.id.clone());
    human.push_summary("Title", removed.title.clone());

    let output = DeleteOutput {
        id: removed.id,
        title: removed.title,
    };
    emit_success(global.output, "rm", &output, Some(&human))
}

pub async fn run_stats(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global).await?;
    let stats: BoardStats = ctx.board.stats(Utc::now());

    let mut human = HumanOutput::new("Board stats");
    human.push_summary("Tasks", stats.total.to_string());
    human.push_summary("Done", stats.done.to_string());
    human.push_summary("Completion", format!("{}%", stats.completion_rate));
    human.push_summary("Overdue", stats.overdue.to_string());
    human.push_summary("Columns", format_status_counts(&stats.statuses));
    human.push_section(
        "Last 7 days (created/completed)",
        stats
            .trend
            .iter()
            .map(|day| {
                format!(
                    "{} {}: {}/{}",
                    day.date.format("%a"),
                    day.date,
                    day.created,
                    day.completed
                )
            })
            .collect(),
    );

    emit_success(global.output, "stats", &stats, Some(&human))
}

pub async fn run_calendar(global: &GlobalOptions, week: Option<&str>, offset: i64) -> Result<()> {
    let ctx = load_context(global).await?;
    let anchor = match week {
        Some(raw) => parse_date(raw)?,
        None => Utc::now().date_naive(),
    };
    let agenda: WeekAgenda = ctx.board.agenda(calendar::shift_week(anchor, offset)?);

    let mut human = HumanOutput::new(format!(
        "Week of {} - {}",
        agenda.week_start.format("%b %-d"),
        agenda.week_end().format("%b %-d, %Y")
    ));
    human.push_summary("Due this week", agenda.len().to_string());
    for day in &agenda.days {
        human.push_section(
            day.date.format("%a %b %-d").to_string(),
            day.items
                .iter()
                .map(|item| {
                    format!(
                        "{} [{}] {} ({})",
                        item.due_date
                            .map(|due| due.format("%H:%M").to_string())
                            .unwrap_or_default(),
                        item.priority,
                        item.title,
                        item.status
                    )
                })
                .collect(),
        );
    }
    human.push_next_step(format!(
        "planboard calendar --week {} --offset 1",
        agenda.week_start
    ));

    emit_success(global.output, "calendar", &agenda, Some(&human))
}

async fn load_context(global: &GlobalOptions) -> Result<BoardContext> {
    let storage = Storage::discover(global.data_dir.as_deref())?;
    let config = Config::load_from_dir(storage.root())?;
    let auth = session::shell_auth(storage.root(), global.user.as_deref(), &config)?;
    let session = SessionContext::establish(&auth)?;

    let statuses = StatusSet::from_config(&config.board)?;
    let remote = Arc::new(FileStore::new(storage, config.sync.lock_timeout_ms));
    let mut board = Board::new(
        SyncAdapter::new(remote, statuses),
        BoardOptions {
            project: global.project.clone(),
            refetch_after_move: config.sync.refetch_after_move,
        },
    );
    board.refresh(&session).await?;
    Ok(BoardContext { session, board })
}

fn emit_with_notices<T: Serialize>(
    global: &GlobalOptions,
    command: &str,
    data: &T,
    human: &mut HumanOutput,
    board: &mut Board,
) -> Result<()> {
    let notices = board.drain_notices();
    for notice in &notices {
        human.push_warning(notice.message.clone());
    }
    let output = NoticeOutput { data, notices };
    emit_success(global.output, command, &output, Some(&*human))
}

/// Exact id, or a unique prefix of one.
fn resolve_id(items: &[Item], input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }
    if items.iter().any(|item| item.id == input) {
        return Ok(input.to_string());
    }
    let matches: Vec<&Item> = items.iter().filter(|item| item.id.starts_with(input)).collect();
    match matches.as_slice() {
        [single] => Ok(single.id.clone()),
        [] => Err(Error::NotFound(input.to_string())),
        many => Err(Error::InvalidArgument(format!(
            "id prefix '{input}' matches {} tasks",
            many.len()
        ))),
    }
}

fn parse_due(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = value.map(str::trim) else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    let date = parse_date(raw)?;
    Ok(Some(date.and_time(NaiveTime::MIN).and_utc()))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| {
        Error::InvalidArgument(format!(
            "invalid date '{raw}' (expected YYYY-MM-DD or RFC 3339): {err}"
        ))
    })
}

fn labels(raw: Vec<String>) -> BTreeSet<String> {
    raw.into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}

fn join_labels(labels: &BTreeSet<String>) -> String {
    labels.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn board_line(index: usize, item: &Item) -> String {
    let mut line = format!("{index}. {} [{}] {}", short_id(&item.id), item.priority, item.title);
    if let Some(due) = item.due_date {
        line.push_str(&format!(" (due {})", due.format("%Y-%m-%d")));
    }
    if !item.labels.is_empty() {
        line.push_str(&format!(" #{}", item.labels.iter().cloned().collect::<Vec<_>>().join(" #")));
    }
    line
}

fn format_status_counts(counts: &[StatusCount]) -> String {
    counts
        .iter()
        .map(|entry| format!("{}={}", entry.status, entry.count))
        .collect::<Vec<_>>()
        .join(", ")
}
