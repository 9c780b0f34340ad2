use console::{measure_text_width, Style};

use crate::account::ServiceAccount;
use crate::decision::{Decision, InteractionType};
use crate::engine::RunSummary;

pub const TREE_BRANCH: char = '\u{251C}';
pub const TREE_END: char = '\u{2514}';
pub const TREE_HORIZ: char = '\u{2500}';
pub const TREE_VERT: char = '\u{2502}';

const TREE_PREFIX_WIDTH: usize = 4;
const VALUE_COLUMN: usize = 22;

fn tree_branch() -> String {
    dim()
        .apply_to(format!("{}{}{} ", TREE_BRANCH, TREE_HORIZ, TREE_HORIZ))
        .to_string()
}

fn tree_end() -> String {
    dim()
        .apply_to(format!("{}{}{} ", TREE_END, TREE_HORIZ, TREE_HORIZ))
        .to_string()
}

fn tree_indent() -> String {
    dim().apply_to(format!("{}   ", TREE_VERT)).to_string()
}

pub fn dim() -> Style {
    Style::new().dim()
}

fn blue() -> Style {
    Style::new().blue()
}

fn magenta() -> Style {
    Style::new().magenta()
}

fn cyan() -> Style {
    Style::new().cyan()
}

fn green() -> Style {
    Style::new().green()
}

fn red() -> Style {
    Style::new().red()
}

fn yellow() -> Style {
    Style::new().yellow()
}

fn bold() -> Style {
    Style::new().bold()
}

fn init_prefix() -> String {
    blue().apply_to("[INIT]").to_string()
}

fn db_prefix() -> String {
    cyan().apply_to("[DB]").to_string()
}

fn run_prefix() -> String {
    magenta().apply_to("[RUN]").to_string()
}

pub fn pad_label(label: &str, depth: usize) -> String {
    let prefix_width = depth * TREE_PREFIX_WIDTH;
    let target_width = VALUE_COLUMN.saturating_sub(prefix_width);
    let current_width = measure_text_width(label);
    if current_width < target_width {
        format!("{}{}", label, " ".repeat(target_width - current_width))
    } else {
        format!("{} ", label)
    }
}

fn on_off(enabled: bool) -> String {
    if enabled {
        green().apply_to("enabled").to_string()
    } else {
        yellow().apply_to("disabled").to_string()
    }
}

pub fn log_startup_config(
    database_url: &str,
    model: &str,
    model_configured: bool,
    interval_minutes: u32,
    scheduler_enabled: bool,
    admin_enabled: bool,
) {
    println!("{} starting carlbot...", init_prefix());
    println!("{}{} {}", tree_branch(), pad_label("database", 1), cyan().apply_to(database_url));
    let model_note = if model_configured {
        String::new()
    } else {
        format!(" {}", red().apply_to("(no api key)"))
    };
    println!("{}{} {}{}", tree_branch(), pad_label("model", 1), cyan().apply_to(model), model_note);
    println!(
        "{}{} {} {}",
        tree_branch(),
        pad_label("scheduler", 1),
        on_off(scheduler_enabled),
        dim().apply_to(format!("every {interval_minutes}m"))
    );
    println!("{}{} {}", tree_end(), pad_label("bot endpoints", 1), on_off(admin_enabled));
}

pub fn log_db_status(message: &str) {
    println!("{} {}", db_prefix(), dim().apply_to(message));
}

pub fn log_db_ready(applied_migrations: usize) {
    if applied_migrations > 0 {
        println!(
            "{} ready, applied {} migration(s)",
            db_prefix(),
            bold().apply_to(applied_migrations)
        );
    } else {
        println!("{} ready", db_prefix());
    }
}

pub fn log_account_ready(account: &ServiceAccount) {
    println!(
        "{} acting as {} {}",
        init_prefix(),
        bold().apply_to(format!("@{}", account.username)),
        dim().apply_to(format!("(id {})", account.id))
    );
}

pub fn log_server_starting(host: &str, port: u16) {
    println!(
        "{} listening on {}",
        init_prefix(),
        cyan().apply_to(format!("{host}:{port}"))
    );
}

pub fn log_scheduler_started(interval_minutes: u32) {
    println!(
        "{} scheduler started, every {} minutes",
        run_prefix(),
        bold().apply_to(interval_minutes)
    );
}

pub fn log_scheduler_stopped() {
    println!("{} scheduler stopped", run_prefix());
}

pub fn log_run_summary(summary: &RunSummary) {
    if summary.skipped {
        println!("{} skipped {}", run_prefix(), dim().apply_to("(auto interaction disabled)"));
        return;
    }
    println!(
        "{} done in {}s, {} posts",
        run_prefix(),
        summary.finished_at - summary.started_at,
        bold().apply_to(summary.processed)
    );
    println!("{}{} {}", tree_branch(), pad_label("comments", 1), bold().apply_to(summary.comments));
    println!("{}{} {}", tree_branch(), pad_label("likes", 1), bold().apply_to(summary.likes));
    println!("{}{} {}", tree_branch(), pad_label("retweets", 1), bold().apply_to(summary.retweets));
    let errors = if summary.errors > 0 {
        red().apply_to(summary.errors)
    } else {
        dim().apply_to(summary.errors)
    };
    println!("{}{} {}", tree_end(), pad_label("errors", 1), errors);
}

pub fn log_run_failed(error: &str) {
    println!("{} {} {}", run_prefix(), red().apply_to("failed:"), dim().apply_to(error));
}

fn preview(text: &str) -> String {
    let preview = if text.chars().count() > 60 {
        format!("{}...", text.chars().take(57).collect::<String>())
    } else {
        text.to_string()
    };
    preview.replace('\n', " ")
}

fn flag(value: bool) -> String {
    if value {
        green().apply_to("yes").to_string()
    } else {
        dim().apply_to("no").to_string()
    }
}

/// Tree view of a single decision, used by the `decide-post` binary.
pub fn print_decision(text: &str, kind: InteractionType, decision: &Decision) {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "{} \"{}\"",
        magenta().apply_to(bold().apply_to(format!("[{} DECISION]", kind.keyword()))),
        dim().apply_to(preview(text))
    ));

    if let Some(meta) = &decision.metadata {
        lines.push(String::new());
        lines.push(format!("{}", bold().apply_to("MODEL")));
        lines.push(format!(
            "{}{} {}",
            tree_branch(),
            pad_label("reply", 1),
            dim().apply_to(preview(&meta.model_output))
        ));
        lines.push(format!("{}{} {}", tree_branch(), pad_label("verdict", 1), meta.verdict));
        lines.push(format!(
            "{}{} {}",
            tree_end(),
            pad_label("spam flag", 1),
            match &meta.spam_flag {
                Some(marker) => red().apply_to(marker.as_str()).to_string(),
                None => dim().apply_to("none").to_string(),
            }
        ));

        lines.push(String::new());
        lines.push(format!("{}", bold().apply_to("HEURISTICS")));
        lines.push(format!(
            "{}{} {}",
            tree_branch(),
            pad_label("game", 1),
            match &meta.game {
                Some(name) => cyan().apply_to(name.as_str()).to_string(),
                None => dim().apply_to("none").to_string(),
            }
        ));
        lines.push(format!("{}{}", tree_branch(), pad_label("signals", 1)));
        lines.push(format!(
            "{}{}{} {}",
            tree_indent(),
            tree_branch(),
            pad_label("question", 2),
            flag(meta.heuristics.is_question)
        ));
        lines.push(format!(
            "{}{}{} {}",
            tree_indent(),
            tree_branch(),
            pad_label("gaming words", 2),
            flag(meta.heuristics.gaming_keyword)
        ));
        lines.push(format!(
            "{}{}{} {}",
            tree_indent(),
            tree_end(),
            pad_label("engagement", 2),
            flag(meta.heuristics.has_engagement)
        ));
        lines.push(format!(
            "{}{} {}",
            tree_end(),
            pad_label("override", 1),
            if meta.override_applied {
                yellow().apply_to("applied").to_string()
            } else {
                dim().apply_to("no").to_string()
            }
        ));
    }

    lines.push(String::new());
    lines.push(format!("{}", bold().apply_to("RESULT")));
    let (status, style) = if decision.should_interact {
        ("INTERACT", green().bold())
    } else {
        ("SKIP", red().bold())
    };
    lines.push(format!("{}{} {}", tree_branch(), pad_label("status", 1), style.apply_to(status)));
    lines.push(format!(
        "{}{} {}",
        tree_end(),
        pad_label("reason", 1),
        dim().apply_to(&decision.reason)
    ));

    println!("{}\n", lines.join("\n"));
}
