use super::{Output, ui};
use crate::core::Predictor;
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;
use serde_json::json;

pub async fn run(predictor: &Predictor, market: &str, output: Output) -> Result<()> {
    let report = predictor.scenarios(market).await?;

    if let Output::Json = output {
        return ui::print_json(&json!({
            "market_name": report.market_name,
            "scenarios": report.entries,
            "skipped": report.skipped,
            "count": report.entries.len(),
            "timestamp": Utc::now(),
        }));
    }

    println!(
        "\nScenarios: {}",
        ui::style_text(&report.market_name, ui::StyleType::Title)
    );
    if report.entries.is_empty() && report.skipped.is_empty() {
        println!("No price data found for this market.");
        return Ok(());
    }

    let mut table = ui::new_styled_table(&[
        "Horizon",
        "For",
        "Predicted",
        "Change",
        "Trend",
        "Confidence",
    ]);
    for entry in &report.entries {
        table.add_row(vec![
            Cell::new(format!("{} days", entry.horizon_days)),
            Cell::new(entry.prediction_date),
            ui::price_cell(entry.predicted_price),
            ui::change_cell(entry.change_percent),
            ui::trend_cell(entry.trend),
            ui::confidence_cell(entry.confidence),
        ]);
    }
    println!("{table}");

    for skipped in &report.skipped {
        let line = format!("Skipped {} days: {}", skipped.horizon_days, skipped.reason);
        println!("{}", ui::style_text(&line, ui::StyleType::Subtle));
    }
    Ok(())
}
