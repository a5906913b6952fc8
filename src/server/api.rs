use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calc::{calculate_scenario, TeamCalculationResult};
use crate::config::CalcConfig;
use crate::data::card::Card;
use crate::data::error::DataError;
use crate::data::team::Scenario;

/// Shared read-only inputs for every request.
#[derive(Debug, Clone, Default)]
pub struct ServerState {
    /// Dataset used when a request does not carry its own cards.
    pub cards: Vec<Card>,
    pub config: CalcConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalculateRequest {
    #[serde(default)]
    pub cards: Option<Vec<Card>>,
    pub scenario: Scenario,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalculateResponse<'a> {
    pub status: &'static str,
    pub scenario: Option<&'a str>,
    pub result: &'a TeamCalculationResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardListItem<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub attribute: &'static str,
}

#[derive(Debug, Error)]
pub enum CalculateError {
    #[error("invalid request body: {0}")]
    Parse(#[source] serde_json::Error),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("failed to serialize result: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub fn health_payload(state: &ServerState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "teamcalc-api",
        "version": env!("CARGO_PKG_VERSION"),
        "cards_loaded": state.cards.len(),
    }))
}

pub fn cards_payload(state: &ServerState) -> Result<String, serde_json::Error> {
    let list: Vec<CardListItem<'_>> = state
        .cards
        .iter()
        .map(|card| CardListItem {
            id: &card.id,
            name: &card.name,
            attribute: card.attribute.as_str(),
        })
        .collect();
    serde_json::to_string_pretty(&serde_json::json!({ "cards": list }))
}

pub fn calculate_payload(body: &str, state: &ServerState) -> Result<String, CalculateError> {
    let request: CalculateRequest = serde_json::from_str(body).map_err(CalculateError::Parse)?;
    let cards = request.cards.as_deref().unwrap_or(&state.cards);
    let result = calculate_scenario(&request.scenario, cards, &state.config)?;
    serde_json::to_string_pretty(&CalculateResponse {
        status: "ok",
        scenario: request.scenario.name.as_deref(),
        result: &result,
    })
    .map_err(CalculateError::Serialize)
}
