const BASE_CONFIDENCE: f64 = 0.95;
const DECAY_PER_30_DAYS: f64 = 0.2;
const MIN_CONFIDENCE: f64 = 0.5;
const MAX_CONFIDENCE: f64 = 0.99;

/// Confidence in a prediction `horizon_days` ahead, decaying linearly with
/// distance and clamped to `[0.5, 0.99]`.
pub fn confidence(horizon_days: i64) -> f64 {
    let decay = (horizon_days as f64 / 30.0) * DECAY_PER_30_DAYS;
    (BASE_CONFIDENCE - decay).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}
