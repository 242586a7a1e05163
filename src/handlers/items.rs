// src/handlers/items.rs
use axum::{extract::Path, Json};
use serde::Serialize;

use crate::error::HandlerError;

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: u32,
    pub name: &'static str,
}

const CATALOG: &[Item] = &[
    Item { id: 1, name: "keyboard" },
    Item { id: 2, name: "monitor" },
];

/// GET /items/{id}
pub async fn get_item(Path(id): Path<String>) -> Result<Json<Item>, HandlerError> {
    let id: u32 = id
        .parse()
        .map_err(|e: std::num::ParseIntError| HandlerError::from_error(&e).with_status_code(400))?;

    CATALOG
        .iter()
        .find(|item| item.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| HandlerError::not_found(format!("Item {} not found", id)))
}

/// GET /fail
pub async fn fail() -> Result<Json<Item>, HandlerError> {
    let err = anyhow::anyhow!("connection reset by peer").context("loading item catalog");
    Err(HandlerError::from(err).with_error("catalog unavailable"))
}
