//! `docweaver analyze`: Utilization report for a document type.

use super::session::{self, SessionArgs};
use docweaver_config::AppConfig;

pub fn run(
    config: &AppConfig,
    args: &SessionArgs,
    document_type: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = session::open(config, args)?;
    let report = engine.analyze(document_type)?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}
