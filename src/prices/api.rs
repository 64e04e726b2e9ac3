//! Wire protocol for the external pricing service: a fixed GraphQL query
//! against poestack's live pricing summary, asking for the four lifeforce
//! currencies in the configured league.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::shared::JuicePrices;

pub const PRICING_ENDPOINT: &str = "https://api.poestack.com/graphql";

const PRICING_QUERY: &str = "query Query($search: LivePricingSummarySearch!) \
{livePricingSummarySearch(search: $search) {entries {itemGroup {key}valuation{value}}}}";

/// Item-group keys the service reports, mapped to snapshot fields.
pub const KEY_BLUE: &str = "primal crystallised lifeforce";
pub const KEY_YELLOW: &str = "vivid crystallised lifeforce";
pub const KEY_PURPLE: &str = "wild crystallised lifeforce";
pub const KEY_WHITE: &str = "sacred crystallised lifeforce";

// ─────────────────────────────────────────────────────────────────────────────
// Request body
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestRoot<'a> {
    operation_name: &'a str,
    variables: Variables<'a>,
    query: &'a str,
}

#[derive(Serialize)]
struct Variables<'a> {
    search: Search<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Search<'a> {
    league: &'a str,
    off_set: u32,
    search_string: &'a str,
    quantity_min: u32,
    tag: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response body
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ResponseRoot {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "livePricingSummarySearch")]
    live_pricing_summary_search: SummarySearch,
}

#[derive(Debug, Deserialize)]
struct SummarySearch {
    entries: Vec<SummaryEntry>,
}

#[derive(Debug, Deserialize)]
struct SummaryEntry {
    #[serde(rename = "itemGroup")]
    item_group: ItemGroup,
    valuation: Option<Valuation>,
}

#[derive(Debug, Deserialize)]
struct ItemGroup {
    key: String,
}

#[derive(Debug, Deserialize)]
struct Valuation {
    value: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetch
// ─────────────────────────────────────────────────────────────────────────────

/// Issues one pricing query for `league` and builds a full snapshot from the
/// response. Any transport or protocol failure aborts the whole attempt; a
/// recognized key that is merely missing or zero is an anomaly that only
/// logs.
pub fn fetch_prices(league: &str) -> Result<JuicePrices, String> {
    let body = RequestRoot {
        operation_name: "Query",
        variables: Variables {
            search: Search {
                league,
                off_set: 0,
                search_string: "lifeforce",
                quantity_min: 1,
                tag: "currency",
            },
        },
        query: PRICING_QUERY,
    };

    let client = reqwest::blocking::Client::new();
    let response = client
        .post(PRICING_ENDPOINT)
        .json(&body)
        .send()
        .map_err(|e| format!("Pricing request failed: {}", e))?
        .error_for_status()
        .map_err(|e| format!("Pricing request rejected: {}", e))?;

    let root: ResponseRoot = response
        .json()
        .map_err(|e| format!("Pricing response was not valid JSON: {}", e))?;

    if let Some(errors) = root.errors {
        return Err(format!("Pricing query returned errors: {}", errors));
    }
    let data = root
        .data
        .ok_or_else(|| String::from("Pricing response carried no data"))?;

    let mut by_key = HashMap::new();
    for entry in data.live_pricing_summary_search.entries {
        let value = entry.valuation.map(|v| v.value).unwrap_or(0.0);
        by_key.insert(entry.item_group.key, value);
    }

    Ok(build_prices(&by_key))
}

/// Assembles a snapshot from a key → value map. Missing or zero keys default
/// to price 0 with a logged anomaly; the snapshot is still produced in full.
pub fn build_prices(by_key: &HashMap<String, f64>) -> JuicePrices {
    for key in [KEY_BLUE, KEY_YELLOW, KEY_PURPLE, KEY_WHITE] {
        match by_key.get(key) {
            Some(value) if *value != 0.0 => {}
            _ => warn!("[Prices] Market data is missing or zero for '{}'", key),
        }
    }

    let price = |key: &str| by_key.get(key).copied().unwrap_or(0.0);
    JuicePrices {
        blue: price(KEY_BLUE),
        yellow: price(KEY_YELLOW),
        purple: price(KEY_PURPLE),
        white: price(KEY_WHITE),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
