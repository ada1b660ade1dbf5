//! Output formatting: key/value tables for humans, JSON for scripts.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use netloc_core::matcher::match_reason;
use netloc_core::{Evaluation, ProxyOutcome, SettleOutcome, SystemProxy};

use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Color only when writing to a terminal and not told otherwise.
pub fn should_color(no_color: bool) -> bool {
    !no_color && io::stdout().is_terminal()
}

fn good(text: &str, color: bool) -> String {
    if color { text.green().to_string() } else { text.to_owned() }
}

fn bad(text: &str, color: bool) -> String {
    if color { text.red().to_string() } else { text.to_owned() }
}

fn muted(text: &str, color: bool) -> String {
    if color { text.dimmed().to_string() } else { text.to_owned() }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn row(field: &str, value: impl Into<String>) -> Row {
    Row {
        field: field.to_owned(),
        value: value.into(),
    }
}

fn render_table(rows: &[Row]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn list_or(items: &[String], empty: &str) -> String {
    if items.is_empty() { empty.to_owned() } else { items.join(", ") }
}

fn system_proxy(proxy: &SystemProxy) -> String {
    match proxy {
        SystemProxy::Disabled => "disabled".into(),
        SystemProxy::Manual(endpoint) => format!("manual {endpoint}"),
        SystemProxy::AutoConfig(url) => format!("auto-config {url}"),
    }
}

fn proxy_outcome(outcome: &ProxyOutcome, color: bool) -> String {
    match outcome {
        ProxyOutcome::Resolved { proxy } => proxy.to_string(),
        ProxyOutcome::Fallback { proxy, reason } => {
            format!("{proxy} {}", muted(&format!("(last known good; {reason})"), color))
        }
        ProxyOutcome::Unresolved { reason } => bad(&format!("unresolved: {reason}"), color),
    }
}

fn evaluation_rows(eval: &Evaluation, is_default: bool, color: bool) -> Vec<Row> {
    let snapshot = &eval.snapshot;
    let plan = &eval.plan;

    let location = if color {
        eval.location.name.cyan().bold().to_string()
    } else {
        eval.location.name.clone()
    };
    let reason = match match_reason(snapshot, &eval.location) {
        Some(reason) if !is_default => reason,
        _ => "default",
    };
    let domains: Vec<String> = snapshot.dns_search_domains.iter().cloned().collect();

    let mut rows = vec![
        row("Location", location),
        row("Matched by", reason),
        row("SSID", snapshot.ssid.clone().unwrap_or_else(|| "-".into())),
        row("Search domains", list_or(&domains, "-")),
        row("VPN", if snapshot.vpn_active { "active" } else { "inactive" }),
        row("Service", snapshot.active_service_id.clone()),
        row("Proxy", proxy_outcome(&eval.proxy, color)),
        row("System proxy", system_proxy(&plan.proxy)),
    ];

    if let Some(servers) = &plan.dns_servers {
        let servers: Vec<String> = servers.iter().map(ToString::to_string).collect();
        rows.push(row("DNS servers", servers.join(", ")));
    }
    if let Some(domains) = &plan.search_domains {
        rows.push(row("Set search domains", list_or(domains, "(empty)")));
    }
    if let Some(printer) = &plan.printer {
        rows.push(row("Printer", printer.clone()));
    }
    if let Some(ntp) = &plan.ntp_server {
        rows.push(row("NTP server", ntp.clone()));
    }
    for (setting, why) in &plan.held {
        rows.push(row(&format!("Held: {setting}"), muted(why, color)));
    }
    for note in &eval.degraded {
        rows.push(row("Degraded", bad(note, color)));
    }
    if eval.from_cache {
        rows.push(row("Snapshot", muted("unchanged since last capture", color)));
    }
    rows
}

// ── Renderers ────────────────────────────────────────────────────────

/// Detail view of a side-effect-free evaluation.
pub fn render_evaluation(eval: &Evaluation, is_default: bool, color: bool) -> String {
    render_table(&evaluation_rows(eval, is_default, color))
}

/// Detail view of a settle: the decision, then one row per write.
pub fn render_outcome(outcome: &SettleOutcome, is_default: bool, color: bool) -> String {
    let mut rows = evaluation_rows(&outcome.evaluation, is_default, color);
    for result in &outcome.applied {
        let status = match &result.error {
            None => good("ok", color),
            Some(e) => bad(&format!("failed: {e}"), color),
        };
        rows.push(row(&format!("Applied {}", result.setting), status));
    }
    for result in &outcome.shell {
        let status = match (&result.change, &result.error) {
            (_, Some(e)) => bad(&format!("failed: {e}"), color),
            (Some(change), None) => good(&change.to_string(), color),
            (None, None) => muted("skipped", color),
        };
        rows.push(row(&result.path.display().to_string(), status));
    }
    render_table(&rows)
}

pub fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Print to stdout, skipping empty output.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
