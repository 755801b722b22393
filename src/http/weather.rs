//! `GET /weather?city=<name>`.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    #[serde(default)]
    pub city: Option<String>,
}

pub async fn get_weather(State(state): State<AppState>, Query(query): Query<WeatherQuery>) -> Response {
    let city = query.city.unwrap_or_default();
    if city.trim().is_empty() {
        tracing::warn!("Empty city parameter provided");
    }

    match state.engine.fetch(&city).await {
        Ok(answer) => answer.into_response(),
        Err(failure) => failure.into_response(),
    }
}
