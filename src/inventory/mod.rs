//! In-memory inventory table.
//!
//! Seed rows come from configuration, or the built-in table when none are
//! configured. The table is read-only after construction; stock status and
//! the reorder flag are derived from quantity and reorder point.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::InventoryItemConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("duplicate sku '{0}'")]
    DuplicateSku(String),

    #[error("sku must not be empty")]
    EmptySku,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    InStock,
    Low,
    OutOfStock,
}

impl StockStatus {
    fn derive(quantity: u32, reorder_point: u32) -> Self {
        if quantity == 0 {
            StockStatus::OutOfStock
        } else if quantity <= reorder_point {
            StockStatus::Low
        } else {
            StockStatus::InStock
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryItem {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub reorder_point: u32,
    pub stock_status: StockStatus,
    pub needs_reorder: bool,
}

impl InventoryItem {
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        quantity: u32,
        reorder_point: u32,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            category: category.into(),
            quantity,
            reorder_point,
            stock_status: StockStatus::derive(quantity, reorder_point),
            needs_reorder: quantity <= reorder_point,
        }
    }
}

impl From<&InventoryItemConfig> for InventoryItem {
    fn from(config: &InventoryItemConfig) -> Self {
        Self::new(
            config.sku.trim(),
            config.name.clone(),
            config.category.trim(),
            config.quantity,
            config.reorder_point,
        )
    }
}

/// Body of `POST /api/inventory/check`. Both filters are optional and
/// combine with AND; blank values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryQuery {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct InventoryStore {
    items: Vec<InventoryItem>,
}

impl InventoryStore {
    /// Build a store, rejecting duplicate SKUs (case-insensitive).
    pub fn from_items(items: Vec<InventoryItem>) -> Result<Self, InventoryError> {
        let mut seen = HashSet::new();
        for item in &items {
            let key = item.sku.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(InventoryError::EmptySku);
            }
            if !seen.insert(key) {
                return Err(InventoryError::DuplicateSku(item.sku.clone()));
            }
        }
        Ok(Self { items })
    }

    /// Configured rows, or the built-in seed when the list is empty.
    pub fn from_config(rows: &[InventoryItemConfig]) -> Result<Self, InventoryError> {
        if rows.is_empty() {
            return Ok(Self::seed());
        }
        Self::from_items(rows.iter().map(InventoryItem::from).collect())
    }

    /// Built-in fulfilment supplies table.
    pub fn seed() -> Self {
        Self {
            items: vec![
                InventoryItem::new("FBS-001", "Small Shipping Box", "FBS", 450, 100),
                InventoryItem::new("FBS-002", "Medium Shipping Box", "FBS", 80, 100),
                InventoryItem::new("FBS-003", "Large Shipping Box", "FBS", 0, 50),
                InventoryItem::new("PKG-101", "Bubble Wrap Roll", "PKG", 35, 40),
                InventoryItem::new("PKG-102", "Packing Peanuts (Bag)", "PKG", 220, 60),
                InventoryItem::new("LBL-201", "Thermal Shipping Labels", "LBL", 1200, 300),
                InventoryItem::new("LBL-202", "Fragile Stickers", "LBL", 150, 150),
            ],
        }
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    /// Items matching `query`: SKU equality and category equality, both
    /// case-insensitive. An empty query returns everything.
    pub fn check(&self, query: &InventoryQuery) -> Vec<&InventoryItem> {
        let sku = non_blank(&query.sku);
        let category = non_blank(&query.category);
        self.items
            .iter()
            .filter(|item| sku.map_or(true, |s| item.sku.eq_ignore_ascii_case(s)))
            .filter(|item| category.map_or(true, |c| item.category.eq_ignore_ascii_case(c)))
            .collect()
    }

    /// Items at or below their reorder point, out-of-stock included.
    pub fn low_stock(&self) -> Vec<&InventoryItem> {
        self.items
            .iter()
            .filter(|item| item.needs_reorder || item.stock_status == StockStatus::Low)
            .collect()
    }
}
