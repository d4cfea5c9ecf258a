// src/utils/log.rs

//! Console report formatting with server-style timestamps.
//!
//! Regular diagnostics go through the `log` facade. These helpers print the
//! human-facing blocks (headers, run summaries) and honor the same level
//! filter so `--quiet` style settings silence them too.

use chrono::Local;

/// Format a report line with timestamp and level
fn format_line(message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] [INFO] {}", timestamp, message)
}

fn enabled() -> bool {
    ::log::log_enabled!(::log::Level::Info)
}

/// Print a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    if enabled() {
        let msg = format!("[STEP {}/{}] {}", step_num, total, message);
        println!("{}", format_line(&msg));
    }
}

/// Print a separator line
pub fn separator() {
    if enabled() {
        println!("{}", format_line(&"─".repeat(60)));
    }
}

/// Print a header
pub fn header(title: &str) {
    if enabled() {
        let border = "═".repeat(60);
        println!("{}", format_line(&border));
        println!("{}", format_line(&format!("  {}", title)));
        println!("{}", format_line(&border));
    }
}

/// Print a sub-item (indented)
pub fn sub_item(message: &str) {
    if enabled() {
        let msg = format!("    {}", message);
        println!("{}", format_line(&msg));
    }
}

/// Print a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    if enabled() {
        println!();

        let title_msg = format!("[SUMMARY] {}", title);
        println!("{}", format_line(&title_msg));

        for (key, value) in items {
            let item_msg = format!("    {}: {}", key, value);
            println!("{}", format_line(&item_msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let line = format_line("hello");
        assert!(line.ends_with("[INFO] hello"));
        assert!(line.starts_with('['));
    }
}
