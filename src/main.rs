//! todo-state command-line front-end
//!
//! Drives the task list state holder the way a UI would: every command goes
//! through `TaskListState` and reads back the filtered list it publishes.

use anyhow::{Result, anyhow};
use clap::Parser;
use std::sync::Arc;
use todo_state::cli::{Cli, Command};
use todo_state::config::Config;
use todo_state::format::{OutputFormat, format_tasks, parse_date};
use todo_state::gateway::{GatewayCell, TaskGateway};
use todo_state::logging::{LogTarget, init_logging};
use todo_state::state::TaskListState;
use todo_state::types::Filter;
use tracing::debug;

fn parse_deadline(raw: Option<&str>) -> Result<Option<i64>> {
    raw.map(|s| parse_date(s).ok_or_else(|| anyhow!("invalid date '{}', expected yyyy/mm/dd", s)))
        .transpose()
}

fn print_list(state: &TaskListState, format: OutputFormat) {
    let rx = state.observe_filtered_tasks();
    let tasks = rx.borrow().clone();
    print!("{}", format_tasks(&tasks, state.current_filter(), format));
    if format == OutputFormat::Json {
        println!();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(db_path) = cli.database {
        config.store.db_path = db_path;
    }

    let target = LogTarget::parse(cli.log.as_deref().unwrap_or(&config.logging.target));
    init_logging(&target, &config.logging.level, cli.verbose)?;
    debug!(db = %config.store.db_path.display(), "Configuration loaded");

    let gateway = GatewayCell::new(config.store.clone()).get().await?;
    let state = TaskListState::new(Arc::clone(&gateway) as Arc<dyn TaskGateway>, &config.view);

    match cli.command {
        Command::Add { title, deadline } => {
            let deadline = parse_deadline(deadline.as_deref())?;
            state.add_task(&title, deadline)?.await?;
            print_list(&state, OutputFormat::Text);
        }
        Command::List { filter, format } => {
            state.set_filter(filter.into());
            print_list(&state, format.into());
        }
        Command::Toggle { id } => {
            state.toggle_completion(id).await?;
            print_list(&state, OutputFormat::Text);
        }
        Command::Edit {
            id,
            title,
            deadline,
            clear_deadline,
        } => {
            let deadline = if clear_deadline {
                None
            } else if deadline.is_some() {
                parse_deadline(deadline.as_deref())?
            } else {
                gateway.current().get(id).and_then(|task| task.deadline)
            };
            state.update_details(id, &title, deadline)?.await?;
            print_list(&state, OutputFormat::Text);
        }
        Command::Delete { id } => {
            state.delete_task(id).await?;
            print_list(&state, OutputFormat::Text);
        }
        Command::Watch { filter } => {
            state.set_filter(filter.into());
            let mut rx = state.observe_filtered_tasks();
            loop {
                let tasks = rx.borrow_and_update().clone();
                print!("{}", format_tasks(&tasks, Filter::from(filter), OutputFormat::Text));
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}
