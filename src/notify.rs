#[cfg(target_os = "macos")]
use std::process::{Command, Stdio};
#[cfg(not(target_os = "macos"))]
use tracing::info;

#[cfg(target_os = "macos")]
pub fn send_goal_notification(steps: u64, goal_steps: u64) {
    let body = format!("Daily goal reached: {steps} of {goal_steps} steps.");
    deliver("StePPay Goal Reached", &body);
}

#[cfg(target_os = "macos")]
pub fn send_test_notification() -> bool {
    deliver("StePPay", "Test notification from StePPay.")
}

#[cfg(target_os = "macos")]
fn deliver(title: &str, body: &str) -> bool {
    let notified = Command::new("terminal-notifier")
        .args(["-title", title, "-message", body])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);

    if notified {
        return true;
    }

    // Fallback when terminal-notifier is not installed.
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(body),
        escape_applescript(title)
    );

    Command::new("osascript")
        .arg("-e")
        .arg(script)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(target_os = "macos")]
fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(not(target_os = "macos"))]
pub fn send_goal_notification(steps: u64, goal_steps: u64) {
    info!(steps, goal_steps, "daily goal reached");
}

#[cfg(not(target_os = "macos"))]
pub fn send_test_notification() -> bool {
    false
}
