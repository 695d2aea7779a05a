//! `docweaver build`: Assemble context for one document type.

use super::session::{self, SessionArgs};
use docweaver_config::AppConfig;
use docweaver_engine::{AssemblyResult, OverflowKind};
use std::path::Path;

pub fn run(
    config: &AppConfig,
    args: &SessionArgs,
    document_type: &str,
    json: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = session::open(config, args)?;
    let result = engine.build(document_type)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match output {
        Some(path) => {
            std::fs::write(path, &result.text)?;
            eprintln!("Wrote context to {}", path.display());
        }
        None => println!("{}", result.text),
    }
    eprintln!("{}", summary(&result));
    Ok(())
}

/// One-line summary plus any overflow warnings.
pub fn summary(result: &AssemblyResult) -> String {
    let mut out = format!(
        "── {} · {} · {} tier · phase {} · {} fragments · {} / {} tokens ({:.1}%)",
        result.document_type,
        result.model,
        result.tier,
        result.phase_reached.number(),
        result.included_fragment_keys.len(),
        result.total_tokens,
        result.available_budget,
        result.utilization_percentage
    );
    for w in &result.warnings {
        let what = match w.kind {
            OverflowKind::Truncated => "truncated",
            OverflowKind::Skipped => "skipped",
        };
        out.push_str(&format!(
            "\n   ⚠️  {} {what} ({} tokens, {} left)",
            w.key, w.fragment_tokens, w.remaining_budget
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docweaver_core::ModelProfile;
    use docweaver_engine::ContextAssemblyEngine;

    #[test]
    fn summary_mentions_budget_and_warnings() {
        let mut engine =
            ContextAssemblyEngine::new(ModelProfile::new("test", "mock", 2_000, 1_000).unwrap());
        engine.set_core_context("word ".repeat(795));
        engine.add_enriched("risk-analysis", "risk ".repeat(2_000));
        let result = engine.build("risk-analysis").unwrap();

        let text = summary(&result);
        assert!(text.contains("risk-analysis · test/mock"));
        assert!(text.contains("/ 1000 tokens"));
        assert!(text.contains("risk-analysis skipped"));
    }
}
