//! `docweaver discover`: Preview which project files would be injected.

use docweaver_config::AppConfig;
use docweaver_engine::{DiscoveryOptions, DiscoveryReport, FileDiscovery};
use std::path::Path;

pub fn run(
    config: &AppConfig,
    dir: &Path,
    min_score: Option<f64>,
    max_count: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = DiscoveryOptions::from(&config.discovery);
    if let Some(min) = min_score {
        options.min_score = min;
    }
    if let Some(max) = max_count {
        options.max_count = max;
    }

    let (report, _) = FileDiscovery::new(options.clone()).scan(dir);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report, &options));
    }
    Ok(())
}

fn render(report: &DiscoveryReport, options: &DiscoveryOptions) -> String {
    let mut out = format!(
        "🔍 Discovery in {}: {} files scanned in {} ms\n",
        report.root.display(),
        report.scanned,
        report.elapsed_ms
    );
    if report.candidates.is_empty() {
        out.push_str("\n  No candidate files found.\n");
    } else {
        out.push_str(&format!("\n  {:<6} {:<5} {}\n", "Score", "Pick", "File"));
        for c in &report.candidates {
            let pick = if c.injected { "✅" } else { "  " };
            let cut = if c.truncated { " (truncated)" } else { "" };
            out.push_str(&format!("  {:>5.1}  {pick}   {}{cut}\n", c.score, c.key));
        }
    }

    let selected = report.injected_files().count();
    out.push_str(&format!(
        "\n  {selected} file(s) above score {:.0} (max {})\n",
        options.min_score, options.max_count
    ));
    if report.timed_out {
        out.push_str("  ⚠️  Stopped early: discovery timeout reached\n");
    }
    for e in &report.errors {
        out.push_str(&format!("  ⚠️  {e}\n"));
    }
    out
}
