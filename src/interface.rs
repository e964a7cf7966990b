use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use colored::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::hint::Hinter;
use rustyline::{CompletionType, Config, Context, Editor, Helper, Highlighter, Validator};
use tokio::sync::Mutex;

use crate::api::ApiClient;
use crate::chat::render::visible_text;
use crate::chat::{
    ChatSession, ChatView, FileHistoryStore, Message, Rejection, Sender, SubmitOutcome,
};
use crate::config::AppConfig;
use crate::dashboard::{
    load_page_shared, refresh_shared, Dashboard, DashboardOptions, Notification, Recommendation,
    RefreshMode, RefreshOutcome, RefreshTimer, Severity, SharedDashboard,
};
use crate::logger::Logger;

/// Available slash commands for tab-completion.
const COMMANDS: &[&str] = &[
    "/help", "/quit", "/exit", "/open", "/close", "/toggle", "/reply", "/history",
    "/clear", "/export", "/stats", "/dashboard", "/refresh", "/records", "/metric",
    "/export-dashboard", "/export-metric", "/resize", "/dismiss",
];

/// Rustyline helper providing slash-command tab-completion and inline hints.
#[derive(Helper, Validator, Highlighter)]
struct CommandCompleter;

impl Hinter for CommandCompleter {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        // Only hint when cursor is at end and line starts with '/'
        if pos != line.len() || !line.starts_with('/') || line.contains(' ') {
            return None;
        }

        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && **cmd != line)
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];
        if !prefix.starts_with('/') || prefix.contains(' ') {
            return Ok((0, vec![]));
        }

        let matches: Vec<Pair> = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

pub fn print_banner() {
    println!("{}", "====================================".bright_green());
    println!("{}", "        KENYA AGRO ASSISTANT        ".bright_green().bold());
    println!("{}", "====================================".bright_green());
    println!("{}", " Farm statistics and advice".bright_white());
    println!("{}\n", " Type /open to chat, /help for commands".dimmed());
}

/// Start a spinner animation in a background thread.
/// Returns an `Arc<AtomicBool>`; set it to `false` to stop the spinner.
fn start_spinner(message: &str) -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    let msg = message.to_string();

    std::thread::spawn(move || {
        let frames = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
        let mut i = 0;
        while running_clone.load(Ordering::Relaxed) {
            print!("\r{} {} ", frames[i % frames.len()].to_string().green(), msg.dimmed());
            let _ = io::stdout().flush();
            std::thread::sleep(Duration::from_millis(80));
            i += 1;
        }
        print!("\r{}\r", " ".repeat(msg.chars().count() + 4));
        let _ = io::stdout().flush();
    });

    running
}

fn stop_spinner(handle: &Arc<AtomicBool>) {
    handle.store(false, Ordering::Relaxed);
    // Give the spinner thread time to clear the line
    std::thread::sleep(Duration::from_millis(100));
}

// ── Terminal chat view ───────────────────────────────────────────────

/// Renders the chat widget into the terminal. The typing indicator is a
/// spinner; bubbles are printed as their visible text.
#[derive(Default)]
struct TerminalView {
    typing: Option<Arc<AtomicBool>>,
}

impl ChatView for TerminalView {
    fn set_visible(&mut self, open: bool) {
        if open {
            println!("{}", "💬 Chat opened. Type your question, /close to hide.".bright_green());
        } else {
            println!("{}", "Chat closed. Type /open to continue.".dimmed());
        }
    }

    // The terminal prompt always has focus and is cleared by rustyline.
    fn focus_input(&mut self) {}

    fn clear_input(&mut self) {}

    fn scroll_to_bottom(&mut self) {
        let _ = io::stdout().flush();
    }

    fn render_message(&mut self, message: &Message, markup: &str) {
        let text = visible_text(markup);
        let stamp = format!("[{}]", message.timestamp).dimmed();
        match (message.sender, message.is_error()) {
            (Sender::User, _) => println!("{} {} {}", stamp, "You:".bright_blue().bold(), text),
            (Sender::Bot, true) => println!("{} {} {}", stamp, "Assistant:".red().bold(), text.red()),
            (Sender::Bot, false) => {
                println!("{} {}", stamp, "Assistant:".bright_green().bold());
                for line in text.lines() {
                    println!("  {}", line);
                }
            }
        }
    }

    fn clear_messages(&mut self) {
        println!("{}", "── chat cleared ──".dimmed());
    }

    fn set_typing(&mut self, typing: bool) {
        match (typing, self.typing.take()) {
            (true, None) => self.typing = Some(start_spinner("Assistant is typing...")),
            (true, Some(existing)) => self.typing = Some(existing),
            (false, Some(handle)) => stop_spinner(&handle),
            (false, None) => {}
        }
    }

    fn show_quick_replies(&mut self, replies: &[&str]) {
        if replies.is_empty() {
            return;
        }
        let row: Vec<String> = replies
            .iter()
            .enumerate()
            .map(|(i, r)| format!("[{}] {}", i + 1, r))
            .collect();
        println!("  {} {}", "Suggestions (/reply N):".dimmed(), row.join("  ").cyan());
    }
}

// ── Dashboard printing ───────────────────────────────────────────────

fn print_notification(n: &Notification) {
    let line = format!("{} {} (#{})", n.severity.icon(), n.message, n.id);
    let colored = match n.severity {
        Severity::Success => line.green(),
        Severity::Danger => line.red(),
        Severity::Warning => line.yellow(),
        Severity::Info => line.cyan(),
    };
    println!("{}", colored);
}

fn print_dashboard(dash: &mut Dashboard) {
    dash.prune_notifications();

    println!("\n{}", "━━━━━━━━━━━━━ Dashboard ━━━━━━━━━━━━━".bright_green().bold());
    if let Some(ts) = dash.last_updated() {
        println!("{} {}", "Last updated:".dimmed(), ts);
    }
    for card in dash.metric_cards() {
        println!(
            "  {:<18} {} {}  {}",
            card.label,
            card.value.bright_white().bold(),
            card.unit.dimmed(),
            format!("(/metric {})", card.id).dimmed()
        );
    }

    for (_, chart) in dash.charts().iter() {
        let lines = chart.render_lines();
        if lines.is_empty() {
            continue;
        }
        println!("\n{}", chart.series().title.bright_cyan());
        for line in lines {
            println!("  {}", line);
        }
    }

    if !dash.recommendations().is_empty() {
        println!("\n{}", "Recommended crops".bright_cyan());
        for rec in dash.recommendations() {
            println!("  {} {:.0}%  {}", rec.crop.bright_white(), rec.score * 100.0, rec.reason.dimmed());
        }
    }

    for n in dash.notifications() {
        print_notification(n);
    }
    println!("{}\n", "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".bright_green());
}

fn print_records(dash: &Dashboard) {
    if dash.records().is_empty() {
        println!("{}", "No records loaded.".yellow());
        return;
    }
    println!(
        "\n{}",
        format!("{:<16} {:<14} {:>12} {:<8} {:<6} {}", "Crop", "County", "Value", "Unit", "Year", "Source")
            .bright_cyan()
            .bold()
    );
    for r in dash.records() {
        let value = r
            .value
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<14} {:>12} {:<8} {:<6} {}",
            r.crop.as_deref().unwrap_or("-"),
            r.county.as_deref().unwrap_or("-"),
            value,
            r.unit.as_deref().unwrap_or("-"),
            r.year,
            r.source.as_deref().unwrap_or("-")
        );
    }
    if let Some(p) = dash.pagination() {
        println!(
            "{}",
            format!("Page {} of {} ({} records)", p.page, p.pages, p.total).dimmed()
        );
    }
    println!();
}

fn load_recommendations(path: &str) -> Result<Vec<Recommendation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read recommendations from {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid recommendations file {}", path))
}

fn print_help() {
    println!("\n{}", "Chat:".bright_cyan().bold());
    println!("  {}       - Show / hide the chat window", "/open, /close".green());
    println!("  {}          - Toggle the chat window", "/toggle".green());
    println!("  {}         - Send suggestion N", "/reply N".green());
    println!("  {}         - Show the message log", "/history".green());
    println!("  {}           - Clear saved chat history", "/clear".green());
    println!("  {}          - Export chat history to JSON", "/export".green());
    println!("\n{}", "Dashboard:".bright_cyan().bold());
    println!("  {}       - Show metrics, charts and notifications", "/dashboard".green());
    println!("  {}         - Fetch the latest statistics", "/refresh".green());
    println!("  {}    - Browse stored records", "/records [page]".green());
    println!("  {}     - Metric detail", "/metric <id>".green());
    println!("  {}  - Export the dashboard to JSON", "/export-dashboard".green());
    println!("  {} - Export one metric", "/export-metric <id>".green());
    println!("  {}  - Re-flow charts to a new width", "/resize <width>".green());
    println!("  {}    - Dismiss a notification", "/dismiss <id>".green());
    println!("\n  {}           - Session statistics", "/stats".green());
    println!("  {}    - Exit", "/quit, /exit".green());
    println!();
}

// ── REPL ─────────────────────────────────────────────────────────────

/// Interactive terminal host for the chat widget and the dashboard.
pub async fn start_repl(config: &AppConfig) -> Result<()> {
    print_banner();

    let client = Arc::new(ApiClient::new(config)?);
    println!("{} {}", "✓ Backend:".green(), client.base_url().dimmed());

    let logger = Logger::new(&config.log_dir).context("Failed to create logger")?;
    let store = FileHistoryStore::new(config.history_path());

    let mut chat = ChatSession::new(
        client.clone(),
        Box::new(store),
        Box::new(TerminalView::default()),
        Some(logger.clone()),
    );

    let mut dashboard = Dashboard::new(
        client.clone(),
        DashboardOptions::from_config(config),
        Some(logger.clone()),
    );
    if let Some(path) = &config.recommendations_file {
        match load_recommendations(path) {
            Ok(recs) => dashboard.set_recommendations(recs),
            Err(e) => println!("{} {:#}", "⚠️  Recommendations not loaded:".yellow(), e),
        }
    }
    if let Err(e) = dashboard.load_page(1).await {
        println!("{} {}", "⚠️  Could not load initial data:".yellow(), e);
    }
    let dashboard = Arc::new(Mutex::new(dashboard));
    let mut timer = RefreshTimer::start(
        dashboard.clone(),
        Duration::from_secs(config.refresh_interval_secs),
    );

    let rl_config = Config::builder()
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(100)
        .build();
    let mut rl = Editor::with_config(rl_config).context("Failed to create line editor")?;
    rl.set_helper(Some(CommandCompleter));

    let export_dir = PathBuf::from(&config.export_dir);

    loop {
        let readline = rl.readline(&"> ".bright_green().bold().to_string());
        let input = match readline {
            Ok(line) => line.trim().to_string(),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                println!("{} {}", "✗ Input error:".red(), e);
                continue;
            }
        };

        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let arg = parts.next();

        match command {
            "/quit" | "/exit" => {
                println!("Goodbye!");
                break;
            }
            "/help" => print_help(),
            "/open" => chat.open(),
            "/close" => chat.close(),
            "/toggle" => chat.toggle(),
            "/reply" => {
                let Some(n) = arg.and_then(|a| a.parse::<usize>().ok()).filter(|n| *n > 0) else {
                    println!("{}", "Usage: /reply N".yellow());
                    continue;
                };
                report_submit(chat.submit_quick_reply(n - 1).await);
            }
            "/history" => {
                println!("\n{}", "Message log:".bright_cyan().bold());
                for (i, msg) in chat.messages().iter().enumerate() {
                    let who = match msg.sender {
                        Sender::User => "you".bright_blue(),
                        Sender::Bot => "assistant".bright_green(),
                    };
                    println!("{}. [{}] {} {}", i + 1, msg.timestamp.dimmed(), who, msg.body);
                }
                println!();
            }
            "/clear" => match chat.clear_history() {
                Ok(()) => println!("{}", "✓ Chat history cleared.".green()),
                Err(e) => println!("{} {:#}", "✗ Failed to clear history:".red(), e),
            },
            "/export" => match chat.export_history(&export_dir) {
                Ok(path) => println!("{} {}", "✓ Chat exported to:".green(), path.display()),
                Err(e) => println!("{} {:#}", "✗ Export failed:".red(), e),
            },
            "/stats" => {
                let mut metrics = chat.metrics().clone();
                let dash = dashboard.lock().await;
                metrics.refreshes = dash.metrics().refreshes;
                metrics.refresh_failures = dash.metrics().refresh_failures;
                metrics.display();
            }
            "/dashboard" => print_dashboard(&mut *dashboard.lock().await),
            "/refresh" => manual_refresh(&dashboard).await,
            "/records" => {
                let page = arg.and_then(|a| a.parse().ok()).unwrap_or(1);
                let result = load_page_shared(&dashboard, page).await;
                let dash = dashboard.lock().await;
                match result {
                    Ok(_) => print_records(&dash),
                    Err(_) => {
                        if let Some(n) = dash.notifications().last() {
                            print_notification(n);
                        }
                    }
                }
            }
            "/metric" => {
                let dash = dashboard.lock().await;
                match arg.and_then(|id| dash.metric_detail(id)) {
                    Some(detail) => {
                        println!("\n{}", detail.metric.label.bright_cyan().bold());
                        println!("  {} {}", detail.metric.value.bright_white().bold(), detail.metric.unit);
                        println!("  {} {}", "Trend:".dimmed(), detail.trend);
                        println!("  {} {}", "Advice:".dimmed(), detail.recommendation);
                        println!("  {}\n", format!("/export-metric {}", detail.metric.id).dimmed());
                    }
                    None => println!("{}", "Unknown metric. See /dashboard for ids.".yellow()),
                }
            }
            "/export-dashboard" => {
                let result = dashboard.lock().await.export_snapshot(&export_dir);
                report_export(result, "Dashboard");
            }
            "/export-metric" => {
                let Some(id) = arg else {
                    println!("{}", "Usage: /export-metric <id>".yellow());
                    continue;
                };
                let result = dashboard.lock().await.export_metric(id, &export_dir);
                report_export(result, "Metric");
            }
            "/resize" => match arg.and_then(|a| a.parse::<usize>().ok()) {
                Some(width) => {
                    let mut dash = dashboard.lock().await;
                    dash.on_resize(width);
                    print_dashboard(&mut dash);
                }
                None => println!("{}", "Usage: /resize <width>".yellow()),
            },
            "/dismiss" => {
                let id = arg.and_then(|a| a.trim_start_matches('#').parse::<u64>().ok());
                let dismissed = match id {
                    Some(id) => dashboard.lock().await.dismiss(id),
                    None => false,
                };
                if !dismissed {
                    println!("{}", "No such notification.".yellow());
                }
            }
            _ if command.starts_with('/') => {
                println!("{} {}", "Unknown command:".yellow(), command);
            }
            _ => {
                if !chat.is_open() {
                    println!("{}", "The chat is closed. Type /open to start chatting.".yellow());
                    continue;
                }
                report_submit(chat.submit(&input).await);
            }
        }
    }

    timer.stop();
    dashboard.lock().await.teardown();
    Ok(())
}

async fn manual_refresh(dashboard: &SharedDashboard) {
    let spinner = start_spinner("Updating agricultural data...");
    let outcome = refresh_shared(dashboard, RefreshMode::Manual).await;
    stop_spinner(&spinner);

    if outcome == RefreshOutcome::Busy {
        println!("{}", "A refresh is already running.".yellow());
        return;
    }
    if let Some(n) = dashboard.lock().await.notifications().last() {
        print_notification(n);
    }
    if let RefreshOutcome::Updated {
        reload_after: Some(delay),
        ..
    } = outcome
    {
        tokio::time::sleep(delay).await;
        print_dashboard(&mut *dashboard.lock().await);
    }
}

fn report_submit(outcome: SubmitOutcome) {
    if let SubmitOutcome::Rejected(reason) = outcome {
        let msg = match reason {
            Rejection::Empty => "Nothing to send.",
            Rejection::Busy => "Still waiting for the previous reply.",
            Rejection::Closed => "The chat is closed. Type /open first.",
            Rejection::NoSuchReply => "No such suggestion.",
        };
        println!("{}", msg.yellow());
    }
}

fn report_export(result: Result<PathBuf>, what: &str) {
    match result {
        Ok(path) => println!("{} {}", format!("✓ {} exported to:", what).green(), display_path(&path)),
        Err(e) => println!("{} {:#}", "✗ Export failed:".red(), e),
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string().bright_white().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_unique_slash_commands() {
        let mut seen = std::collections::HashSet::new();
        for cmd in COMMANDS {
            assert!(cmd.starts_with('/'));
            assert!(seen.insert(*cmd), "duplicate command {cmd}");
        }
    }

    #[test]
    fn test_load_recommendations() {
        let path = "test_agro_recommendations.json";
        fs::write(
            path,
            r#"[{"crop": "Sorghum", "score": 0.9, "reason": "Drought tolerant"}]"#,
        )
        .unwrap();
        let recs = load_recommendations(path).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].crop, "Sorghum");
        let _ = fs::remove_file(path);

        assert!(load_recommendations("does_not_exist.json").is_err());
    }

    #[test]
    fn test_terminal_view_typing_toggles_spinner() {
        let mut view = TerminalView::default();
        view.set_typing(true);
        assert!(view.typing.is_some());
        view.set_typing(true);
        assert!(view.typing.is_some());
        view.set_typing(false);
        assert!(view.typing.is_none());
    }
}
