use colored::Colorize;
use declarative::{Diagnostics, Error, Severity};

use crate::resource::Address;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Print collected warnings and errors
pub fn diagnostics(diags: &Diagnostics) {
    if diags.is_empty() {
        return;
    }
    println!();
    for diag in diags.iter() {
        let symbol = match diag.severity {
            Severity::Warning => "⚠".yellow(),
            Severity::Error => "✗".red(),
        };
        println!("  {} {}", symbol, diag.summary.bold());
        if !diag.detail.is_empty() {
            println!("    {}", diag.detail.dimmed());
        }
    }
}

/// Print a failed operation on one resource, with advice for its category
pub fn resource_error(address: &Address, err: &Error) {
    let category = err.category();
    eprintln!();
    eprintln!("  {} {}: {}", "✗".red(), address.to_string().bold(), category);
    eprintln!("    {}", err);
    eprintln!("    {} {}", "→".cyan(), category.advice().dimmed());
}
