/// Read-only HTTP handlers over the reader's current state
use axum::{extract::State, Json};
use log::debug;
use serde::Serialize;
use std::sync::Arc;

use crate::serial::ScaleReader;
use crate::utils::format_timestamp;

const NO_DATA_MESSAGE: &str = "No data yet.";

/// Body of `GET /api/weight`
///
/// Both shapes are returned with status 200; "no data yet" is not an HTTP failure.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum WeightResponse {
    Reading {
        weight: f64,
        unit: &'static str,
        timestamp: String,
    },
    Pending {
        error: &'static str,
    },
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub running: bool,
    pub serial_connected: bool,
    pub port: String,
    pub last_timestamp: Option<String>,
    pub last_error: Option<String>,
}

pub async fn get_weight(State(reader): State<Arc<ScaleReader>>) -> Json<WeightResponse> {
    let response = match reader.latest_reading() {
        Some(reading) => WeightResponse::Reading {
            weight: reading.weight,
            unit: reading.unit,
            timestamp: format_timestamp(&reading.captured_at),
        },
        None => WeightResponse::Pending {
            error: NO_DATA_MESSAGE,
        },
    };
    debug!("GET /api/weight -> {:?}", response);
    Json(response)
}

pub async fn health(State(reader): State<Arc<ScaleReader>>) -> Json<HealthResponse> {
    let status = reader.status();
    let last_timestamp = reader
        .latest_reading()
        .map(|reading| format_timestamp(&reading.captured_at));
    debug!("GET /api/health (reader state {:?})", reader.state());

    Json(HealthResponse {
        status: "ok",
        running: status.running,
        serial_connected: status.connected,
        port: status.port,
        last_timestamp,
        last_error: status.last_error,
    })
}
