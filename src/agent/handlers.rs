//! Pure execution handlers for the non-collaborator task kinds. Each
//! takes the task's input payload and either produces a result payload or
//! fails the task with a `SwarmError` that becomes the task's result.

use serde_json::{Value, json};

use crate::types::error::{Result, SwarmError};

fn require_f64(input: &Value, field: &str) -> Result<f64> {
    input
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| SwarmError::TaskExecution(format!("missing numeric field '{field}'")))
}

/// Settlement: compute the net payout after the protocol fee.
pub fn settle(input: &Value) -> Result<Value> {
    let amount = require_f64(input, "amount")?;
    let fee_rate = input
        .get("fee_rate")
        .and_then(Value::as_f64)
        .unwrap_or(0.025);
    let fee = amount * fee_rate;
    Ok(json!({
        "gross": amount,
        "fee": fee,
        "net": amount - fee,
        "currency": input.get("currency").cloned().unwrap_or(json!("USD")),
    }))
}

/// Content analysis: surface shape metrics over a text payload.
pub fn analyze_content(input: &Value) -> Result<Value> {
    let content = input
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| SwarmError::TaskExecution("missing string field 'content'".to_string()))?;
    let words = content.split_whitespace().count();
    Ok(json!({
        "characters": content.chars().count(),
        "words": words,
        "lines": content.lines().count(),
        "empty": words == 0,
    }))
}

/// Royalty calculation: split a gross amount across recipients by share.
/// Shares must not sum to more than 1.0.
pub fn calculate_royalties(input: &Value) -> Result<Value> {
    let gross = require_f64(input, "gross")?;
    let splits = input
        .get("splits")
        .and_then(Value::as_array)
        .ok_or_else(|| SwarmError::TaskExecution("missing array field 'splits'".to_string()))?;

    let mut total_share = 0.0;
    let mut payouts = Vec::with_capacity(splits.len());
    for split in splits {
        let recipient = split
            .get("recipient")
            .and_then(Value::as_str)
            .ok_or_else(|| SwarmError::TaskExecution("split missing 'recipient'".to_string()))?;
        let share = require_f64(split, "share")?;
        total_share += share;
        payouts.push(json!({
            "recipient": recipient,
            "share": share,
            "amount": gross * share,
        }));
    }
    if total_share > 1.0 + f64::EPSILON {
        return Err(SwarmError::TaskExecution(format!(
            "royalty shares sum to {total_share}, exceeding 1.0"
        )));
    }
    Ok(json!({
        "gross": gross,
        "distributed": gross * total_share,
        "retained": gross * (1.0 - total_share),
        "payouts": payouts,
    }))
}

/// Data aggregation: summary statistics over a numeric series.
pub fn aggregate_data(input: &Value) -> Result<Value> {
    let values = input
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| SwarmError::TaskExecution("missing array field 'values'".to_string()))?;
    let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    if numbers.len() != values.len() {
        return Err(SwarmError::TaskExecution(
            "'values' must contain only numbers".to_string(),
        ));
    }
    let count = numbers.len();
    let sum: f64 = numbers.iter().sum();
    let mean = if count == 0 { 0.0 } else { sum / count as f64 };
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(json!({
        "count": count,
        "sum": sum,
        "mean": mean,
        "min": if count == 0 { Value::Null } else { json!(min) },
        "max": if count == 0 { Value::Null } else { json!(max) },
    }))
}
