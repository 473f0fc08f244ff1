//! Extraction of position ids, collected fees and gas from settled effects.
//!
//! None of these functions invent values: a position id that cannot be
//! found is `None`, never a placeholder.

use crate::tx::TxEffects;
use serde_json::Value;

const POSITION_TYPE_MARKER: &str = "Position";
const POSITION_ID_FIELDS: [&str; 2] = ["position_id", "position"];
const FEE_FIELDS: [(&str, &str); 2] = [("amount_a", "amount_b"), ("fee_amount_a", "fee_amount_b")];

/// Finds the protocol id of a newly opened position.
///
/// Created objects whose type names a position take precedence; events
/// carrying a `position_id` or `position` field are the fallback.
pub fn parse_position_id(effects: &TxEffects) -> Option<String> {
    let from_objects = effects
        .created
        .iter()
        .find(|o| o.object_type.contains(POSITION_TYPE_MARKER) && !o.object_id.is_empty())
        .map(|o| o.object_id.clone());
    if from_objects.is_some() {
        return from_objects;
    }

    effects.events.iter().find_map(|event| {
        POSITION_ID_FIELDS
            .iter()
            .find_map(|key| event.fields.get(key).and_then(Value::as_str))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

/// Sums token A and token B fee amounts reported by collect events.
pub fn parse_fees(effects: &TxEffects) -> (u64, u64) {
    effects
        .events
        .iter()
        .filter(|e| e.event_type.contains("Fee"))
        .filter_map(|event| {
            FEE_FIELDS.iter().find_map(|(a, b)| {
                let amount_a = event.fields.get(*a).and_then(as_u64)?;
                let amount_b = event.fields.get(*b).and_then(as_u64)?;
                Some((amount_a, amount_b))
            })
        })
        .fold((0u64, 0u64), |(sum_a, sum_b), (a, b)| {
            (sum_a.saturating_add(a), sum_b.saturating_add(b))
        })
}

/// Liquidity reported by the open event, if any.
pub fn parse_liquidity(effects: &TxEffects) -> Option<u128> {
    effects.events.iter().find_map(|event| {
        match event.fields.get("liquidity")? {
            Value::Number(n) => n.as_u64().map(u128::from),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    })
}

/// Net gas paid in native base units. Rebates exceeding cost yield zero.
pub fn parse_gas_used(effects: &TxEffects) -> u64 {
    let gas = effects.gas;
    gas.computation_cost
        .saturating_add(gas.storage_cost)
        .saturating_sub(gas.storage_rebate)
}

// Amounts arrive as JSON numbers or decimal strings depending on the node.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
