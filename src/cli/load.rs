use super::{Output, ui};
use crate::store::disk::FjallPriceStore;
use crate::store::loader::load_csv_path;
use anyhow::Result;
use serde_json::json;
use std::path::Path;
use tracing::info;

pub fn run(path: &Path, store: &FjallPriceStore, output: Output) -> Result<()> {
    let pb = ui::new_spinner(&format!("Loading {}", path.display()))?;
    let summary = load_csv_path(path, store);
    pb.finish_and_clear();
    let summary = summary?;
    info!(
        written = summary.written,
        skipped = summary.skipped,
        "Loaded {}",
        path.display()
    );

    match output {
        Output::Json => ui::print_json(&json!({
            "written": summary.written,
            "skipped": summary.skipped,
        })),
        Output::Table => {
            println!(
                "Loaded {} observations ({} weeks without a price)",
                summary.written, summary.skipped
            );
            Ok(())
        }
    }
}
