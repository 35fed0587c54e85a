//! Plan display

use colored::Colorize;

use super::planner::{Action, Plan};

/// Display a plan in a user-friendly format
pub fn display_plan(plan: &Plan) {
    if plan.is_empty() {
        println!();
        println!(
            "  {} No changes. Infrastructure matches the configuration.",
            "✓".green()
        );
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for change in &plan.changes {
        let (symbol, note) = match change.action {
            Action::Create => ("+".green(), "will be created"),
            Action::Update => ("~".yellow(), "will be updated in-place"),
            Action::Delete => ("-".red(), "will be destroyed"),
        };
        println!(
            "│ {} {:<30} {}",
            symbol,
            change.address.to_string().bold(),
            note.dimmed()
        );
        for line in &change.details {
            println!("│     {}", colorize_detail(line));
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to delete",
        plan.count(Action::Create).to_string().green(),
        plan.count(Action::Update).to_string().yellow(),
        plan.count(Action::Delete).to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn colorize_detail(line: &str) -> String {
    match line.chars().next() {
        Some('+') => line.green().to_string(),
        Some('~') => line.yellow().to_string(),
        Some('-') => line.red().to_string(),
        _ => line.dimmed().to_string(),
    }
}
