use super::{Output, ui};
use crate::core::{PriceObservation, Predictor};
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

pub async fn run_health(predictor: &Predictor, output: Output) -> Result<()> {
    let health = predictor.health().await?;
    match output {
        Output::Json => ui::print_json(&health),
        Output::Table => {
            println!(
                "{}: {} markets, {} model over {} features",
                ui::style_text(health.status, ui::StyleType::Title),
                health.markets,
                health.model,
                health.feature_columns
            );
            if let Some(error) = &health.model_error {
                println!("{}", ui::style_text(error, ui::StyleType::Error));
            }
            Ok(())
        }
    }
}

pub async fn run_markets(predictor: &Predictor, output: Output) -> Result<()> {
    let mut markets = predictor.store().markets().await?;
    markets.sort();

    match output {
        Output::Json => ui::print_json(&json!({
            "markets": markets,
            "count": markets.len(),
            "timestamp": Utc::now(),
        })),
        Output::Table => {
            let mut table = ui::new_styled_table(&["#", "Market"]);
            for (i, market) in markets.iter().enumerate() {
                table.add_row(vec![Cell::new(i + 1), Cell::new(market)]);
            }
            println!("{table}");
            let count = format!("{} markets", markets.len());
            println!("{}", ui::style_text(&count, ui::StyleType::Subtle));
            Ok(())
        }
    }
}

pub async fn run_history(
    predictor: &Predictor,
    market: &str,
    weeks: usize,
    output: Output,
) -> Result<()> {
    let history = predictor.store().history(market, weeks).await?;

    match output {
        Output::Json => {
            let rows: Vec<_> = history.iter().map(history_row).collect();
            ui::print_json(&json!({
                "market_name": market,
                "history": rows,
                "count": rows.len(),
                "timestamp": Utc::now(),
            }))
        }
        Output::Table => {
            println!(
                "\nPrice history: {}",
                ui::style_text(market, ui::StyleType::Title)
            );
            if history.is_empty() {
                println!("No price data found for this market.");
                return Ok(());
            }
            let mut table = ui::new_styled_table(&["Week of", "Price / quintal"]);
            for obs in &history {
                table.add_row(vec![
                    Cell::new(obs.week_start_date),
                    ui::price_cell(obs.price()),
                ]);
            }
            println!("{table}");
            Ok(())
        }
    }
}

fn history_row(obs: &PriceObservation) -> serde_json::Value {
    json!({
        "date": obs.week_start_date,
        "price": obs.price_per_quintal.to_f64(),
    })
}
