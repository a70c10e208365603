use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::config::ApiConfig;
use crate::http_client::http_client;

const API_KEY_HEADER: &str = "x-apisports-key";
const STANDINGS_POINTER: &str = "/response/0/league/standings/0";

pub fn standings_url(api_host: &str) -> String {
    format!("{}/standings", api_host.trim_end_matches('/'))
}

/// Fetches the first standings group for `league`/`season` as raw per-team entries.
pub fn fetch_standings(api: &ApiConfig, league: u32, season: i32) -> Result<Vec<Value>> {
    let client = http_client()?;
    let url = standings_url(&api.host);
    let resp = client
        .get(&url)
        .query(&[("league", league.to_string()), ("season", season.to_string())])
        .header(API_KEY_HEADER, api.key.as_str())
        .send()
        .context("standings request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading standings body")?;
    if !status.is_success() {
        let snippet = body
            .trim()
            .replace(['\n', '\r'], " ")
            .chars()
            .take(220)
            .collect::<String>();
        return Err(anyhow!("standings http {}: {}", status, snippet));
    }
    parse_standings_payload(&body)
}

pub fn parse_standings_payload(raw: &str) -> Result<Vec<Value>> {
    let mut v: Value = serde_json::from_str(raw.trim()).context("invalid standings json")?;
    match v.pointer_mut(STANDINGS_POINTER).map(Value::take) {
        Some(Value::Array(entries)) => Ok(entries),
        Some(other) => Err(anyhow!(
            "response[0].league.standings[0] is not an array (got {})",
            json_kind(&other)
        )),
        None => {
            // api-sports answers auth/quota problems with 200 and an `errors` field.
            let errors = api_errors(&v);
            if errors.is_empty() {
                Err(anyhow!("missing response[0].league.standings[0] in payload"))
            } else {
                Err(anyhow!("api-sports errors: {}", errors.join("; ")))
            }
        }
    }
}

fn api_errors(v: &Value) -> Vec<String> {
    match v.get("errors") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, msg)| match msg.as_str() {
                Some(s) => format!("{k}: {s}"),
                None => format!("{k}: {msg}"),
            })
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| item.to_string())
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
