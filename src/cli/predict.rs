use super::{Output, ui};
use crate::core::{BatchEntry, PredictionResult, Predictor};
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;
use serde_json::json;

pub async fn run(
    predictor: &Predictor,
    market: &str,
    horizon_days: i64,
    output: Output,
) -> Result<()> {
    let result = predictor.predict(market, horizon_days).await?;
    match output {
        Output::Json => ui::print_json(&result),
        Output::Table => {
            println!(
                "\nForecast: {}",
                ui::style_text(&result.market_name, ui::StyleType::Title)
            );
            display_predictions(&[BatchEntry::Prediction(result)]);
            Ok(())
        }
    }
}

pub async fn run_batch(
    predictor: &Predictor,
    markets: &[String],
    horizon_days: i64,
    output: Output,
) -> Result<()> {
    let pb = ui::new_spinner(&format!("Predicting {} markets", markets.len()))?;
    let entries = predictor.predict_batch(markets, horizon_days).await;
    pb.finish_and_clear();

    match output {
        Output::Json => ui::print_json(&json!({
            "results": entries,
            "count": entries.len(),
            "timestamp": Utc::now(),
        })),
        Output::Table => {
            println!(
                "\nBatch forecast, {} days ahead",
                ui::style_text(&horizon_days.to_string(), ui::StyleType::Title)
            );
            display_predictions(&entries);
            Ok(())
        }
    }
}

fn display_predictions(entries: &[BatchEntry]) {
    let mut table = ui::new_styled_table(&[
        "Market",
        "Current",
        "As of",
        "Predicted",
        "For",
        "Change",
        "Trend",
        "Confidence",
    ]);

    let mut errors = Vec::new();
    for entry in entries {
        match entry {
            BatchEntry::Prediction(result) => {
                table.add_row(prediction_row(result));
            }
            BatchEntry::Error { market_name, error } => {
                table.add_row(vec![
                    Cell::new(market_name),
                    ui::na_cell(),
                    ui::na_cell(),
                    ui::na_cell(),
                    ui::na_cell(),
                    ui::na_cell(),
                    ui::na_cell(),
                    ui::na_cell(),
                ]);
                errors.push(format!("{market_name}: {error}"));
            }
        }
    }
    println!("{table}");

    for error in errors {
        println!("{}", ui::style_text(&error, ui::StyleType::Error));
    }
}

fn prediction_row(result: &PredictionResult) -> Vec<Cell> {
    vec![
        Cell::new(&result.market_name),
        ui::price_cell(result.current_price),
        Cell::new(result.current_price_date),
        ui::price_cell(result.predicted_price),
        Cell::new(result.prediction_date),
        ui::change_cell(result.change_percent),
        ui::trend_cell(result.trend),
        ui::confidence_cell(result.confidence),
    ]
}
