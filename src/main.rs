use anyhow::{anyhow, Result};
use chrono::Local;
use crossterm::style::Stylize;
use reedline::{
    DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

mod table_display;

use datagrid::config::config::Config;
use datagrid::data::pagination::PageNav;
use datagrid::services::{FormValues, RequestState};
use datagrid::state::FileSessionStore;
use datagrid::utils::app_paths::AppPaths;
use datagrid::utils::logging::{init_tracing, LogRingBuffer};
use datagrid::{ColumnDef, GridController, GridEvent, HttpDataSource, PendingLoad};
use table_display::{render_controls, render_grid};

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Grid(GridEvent),
    State,
    Logs(usize),
    Help,
    Clear,
    Quit,
}

fn parse_command(line: &str) -> Result<ReplCommand> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match word.to_lowercase().as_str() {
        "search" | "/" => ReplCommand::Grid(GridEvent::SearchChanged(rest.to_string())),
        "confirm" => ReplCommand::Grid(GridEvent::SearchConfirmed),
        "sort" if !rest.is_empty() => ReplCommand::Grid(GridEvent::HeaderActivated(rest.to_string())),
        "size" => {
            let size = rest
                .parse::<usize>()
                .map_err(|_| anyhow!("Usage: size <rows per page>"))?;
            ReplCommand::Grid(GridEvent::PageSizeChanged(size))
        }
        "retry" => ReplCommand::Grid(GridEvent::Retry),
        "reload" => ReplCommand::Grid(GridEvent::Reload),
        "submit" => ReplCommand::Grid(GridEvent::FormSubmitted(parse_form(rest)?)),
        "state" => ReplCommand::State,
        "logs" => ReplCommand::Logs(rest.parse().unwrap_or(20)),
        "help" | "\\help" => ReplCommand::Help,
        "clear" | "\\clear" => ReplCommand::Clear,
        "quit" | "exit" | "\\q" => ReplCommand::Quit,
        other => match PageNav::parse(other) {
            Some(nav) => ReplCommand::Grid(GridEvent::Navigate(nav)),
            None => return Err(anyhow!("Unknown command: {line} (try `help`)")),
        },
    };
    Ok(command)
}

/// `k=v k2=v2` into form values
fn parse_form(args: &str) -> Result<FormValues> {
    args.split_whitespace()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("Expected key=value, got '{pair}'"))
        })
        .collect()
}

struct CliArgs {
    url: Option<String>,
    table_key: Option<String>,
    session: Option<String>,
    columns: Option<Vec<ColumnDef>>,
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|pos| args.get(pos + 1))
        .cloned()
}

fn parse_args(args: &[String]) -> CliArgs {
    let flags_with_values = ["--key", "--session", "--columns"];
    let url = args
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(idx, arg)| {
            !arg.starts_with("--") && !flags_with_values.contains(&args[idx - 1].as_str())
        })
        .map(|(_, arg)| arg.clone())
        .next();

    CliArgs {
        url,
        table_key: flag_value(args, "--key"),
        session: flag_value(args, "--session").or_else(|| std::env::var("DATAGRID_SESSION").ok()),
        columns: flag_value(args, "--columns").map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(ColumnDef::sortable)
                .collect()
        }),
    }
}

fn print_help() {
    println!("{}", "datagrid - browse a JSON endpoint as a table".blue().bold());
    println!();
    println!("{}", "Usage:".yellow());
    println!("  datagrid [OPTIONS] <URL>");
    println!();
    println!("{}", "Options:".yellow());
    println!("  {}    - Namespace for saved grid state", "--key <name>".green());
    println!("  {}  - Resume a session's saved state", "--session <id>".green());
    println!("  {} - Sortable columns, e.g. name,email", "--columns <a,b>".green());
    println!("  {}      - Write the default config file", "--init-config".green());
    println!("  {}  - Write a commented config file", "--generate-config".green());
    println!();
    println!("{}", "Commands:".yellow());
    println!("  {}   - Type into the search box (debounced)", "search <text>".green());
    println!("  {}         - Apply the search box now", "confirm".green());
    println!("  {} - Cycle a column: asc, desc, off", "sort <property>".green());
    println!("  {}        - Rows per page", "size <n>".green());
    println!("  {} - Change page", "first | prev | next | last".green());
    println!("  {} - Fetch again with form values", "submit k=v ...".green());
    println!("  {}  - Fetch again", "retry | reload".green());
    println!("  {} - Show saved state / recent logs", "state | logs [n]".green());
    println!("  {}            - Exit", "quit".green());
    println!();
}

fn new_session_id() -> String {
    format!("{}-{}", Local::now().format("%Y%m%d%H%M%S"), std::process::id())
}

fn show(grid: &mut GridController) {
    let snapshot = grid.snapshot();
    render_grid(&snapshot);
    render_controls(&snapshot);
}

/// Run a pending load to completion. Ctrl-C abandons it.
fn drive(runtime: &Runtime, grid: &mut GridController, pending: Option<PendingLoad>) {
    if pending.is_none() {
        return;
    }
    println!("{}", "Loading... (Ctrl-C to cancel)".cyan());

    let abort = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    runtime.block_on(async {
        grid.drive_or_abort(pending, abort).await;
    });
}

fn print_state(grid: &GridController) {
    let pagination = grid.pagination();
    println!("search:      {:?}", grid.search());
    println!(
        "sort:        {}",
        serde_json::to_string(grid.sort()).unwrap_or_default()
    );
    println!("page size:   {}", pagination.page_size);
    println!("page:        {}", pagination.current_page);
    if grid.search_pending() {
        println!("pending:     search not applied yet (type `confirm`)");
    }
    let request = match grid.request_state() {
        RequestState::Idle => "idle".to_string(),
        RequestState::Loading => "loading".to_string(),
        RequestState::Success(rows) => format!("{} rows fetched", rows.len()),
        RequestState::Error(reason) => format!("failed: {reason}"),
    };
    println!("request:     {request}");
    if let Some(form) = grid.form_values() {
        println!(
            "form data:   {}",
            serde_json::to_string(form).unwrap_or_default()
        );
    }
}

fn print_logs(buffer: &LogRingBuffer, count: usize) {
    for entry in buffer.get_recent(count) {
        println!("{}", entry.format_for_display().dark_grey());
    }
}

fn main() -> Result<()> {
    let log_buffer = init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    if args.contains(&"--init-config".to_string()) {
        Config::default().save()?;
        println!("Default configuration written to: {:?}", Config::get_config_path()?);
        return Ok(());
    }

    if args.contains(&"--generate-config".to_string()) {
        let path = Config::get_config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Config::create_default_with_comments())?;
        println!("Configuration file created at: {:?}", path);
        return Ok(());
    }

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{}", format!("Using default config: {e:#}").yellow());
        Config::default()
    });

    let cli = parse_args(&args);
    let Some(url) = cli.url.or_else(|| config.source.url.clone()) else {
        print_help();
        return Err(anyhow!("No data source URL given"));
    };

    let mut options = config.grid_options(&url);
    if let Some(key) = cli.table_key {
        options.table_key = key;
    }
    if let Some(columns) = cli.columns {
        options.columns = columns;
    }

    let session_id = cli.session.unwrap_or_else(new_session_id);
    let sessions_dir = AppPaths::sessions_dir()?;
    if let Err(e) = FileSessionStore::prune_stale(&sessions_dir, config.session_retention(), &session_id) {
        eprintln!("{}", format!("Could not prune old sessions: {e:#}").yellow());
    }
    let store = FileSessionStore::open(&sessions_dir, &session_id)?;
    println!(
        "{}",
        format!("Session {session_id} (resume with --session {session_id})").dark_grey()
    );

    let runtime = Runtime::new()?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("datagrid/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let mut grid = GridController::new(
        options,
        Arc::new(HttpDataSource::with_client(client)),
        Arc::new(store),
    );
    if let Some(form) = grid.initialize() {
        println!(
            "{}",
            format!(
                "Restored form values: {}",
                serde_json::to_string(&form).unwrap_or_default()
            )
            .cyan()
        );
    }

    println!("{}", format!("Connecting to {url}").cyan());
    let pending = grid.begin_load();
    drive(&runtime, &mut grid, Some(pending));
    show(&mut grid);

    let history = AppPaths::history_file()
        .and_then(|path| FileBackedHistory::with_file(100, path).map_err(|e| anyhow!("{e}")));
    let mut line_editor = match history {
        Ok(history) => Reedline::create().with_history(Box::new(history)),
        Err(_) => Reedline::create(),
    };
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("grid".to_string()),
        DefaultPromptSegment::Empty,
    );

    loop {
        let buffer = match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => buffer,
            Signal::CtrlD | Signal::CtrlC => break,
        };
        if buffer.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&buffer) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                continue;
            }
        };

        match command {
            ReplCommand::Grid(GridEvent::SearchChanged(text)) => {
                if !grid.on_search_input(&text) {
                    eprintln!("{}", "Search is disabled right now.".red());
                    continue;
                }
                // A whole line arrives at once; wait out the debounce like a
                // pause in typing would
                if let Some(remaining) = grid.search_time_remaining() {
                    std::thread::sleep(remaining);
                }
                let pending = grid.tick();
                drive(&runtime, &mut grid, pending);
                show(&mut grid);
            }
            ReplCommand::Grid(event) => {
                let pending = grid.dispatch(event);
                drive(&runtime, &mut grid, pending);
                show(&mut grid);
            }
            ReplCommand::State => print_state(&grid),
            ReplCommand::Logs(count) => print_logs(&log_buffer, count),
            ReplCommand::Help => print_help(),
            ReplCommand::Clear => print!("{esc}[2J{esc}[1;1H", esc = 27 as char),
            ReplCommand::Quit => break,
        }
    }

    println!("\nGoodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_grid_commands() {
        assert_eq!(
            parse_command("search al pha").unwrap(),
            ReplCommand::Grid(GridEvent::SearchChanged("al pha".to_string()))
        );
        assert_eq!(
            parse_command("sort name").unwrap(),
            ReplCommand::Grid(GridEvent::HeaderActivated("name".to_string()))
        );
        assert_eq!(
            parse_command("size 25").unwrap(),
            ReplCommand::Grid(GridEvent::PageSizeChanged(25))
        );
        assert_eq!(
            parse_command("prev").unwrap(),
            ReplCommand::Grid(GridEvent::Navigate(PageNav::Previous))
        );
        assert_eq!(parse_command("logs").unwrap(), ReplCommand::Logs(20));
        assert!(parse_command("size lots").is_err());
        assert!(parse_command("bogus").is_err());
    }

    #[test]
    fn test_parse_submit() {
        let command = parse_command("submit role=admin active=true").unwrap();
        let ReplCommand::Grid(GridEvent::FormSubmitted(form)) = command else {
            panic!("expected a form submission");
        };
        assert_eq!(form.get("role").map(String::as_str), Some("admin"));
        assert_eq!(form.len(), 2);
        assert!(parse_command("submit role").is_err());
    }

    #[test]
    fn test_parse_args() {
        let cli = parse_args(&args(&[
            "datagrid",
            "--key",
            "users",
            "http://localhost/users",
            "--columns",
            "name, email",
        ]));
        assert_eq!(cli.url.as_deref(), Some("http://localhost/users"));
        assert_eq!(cli.table_key.as_deref(), Some("users"));
        let columns = cli.columns.unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].property, "email");
    }
}
