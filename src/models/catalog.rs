// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Static catalog reference data: categories and loggable activities.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A grouping of activities (transport, food, energy, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Icon reference understood by the presentation layer
    pub icon: String,
}

/// A loggable activity with its carbon factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Activity {
    pub id: String,
    /// Owning category (must exist in the catalog)
    pub category_id: String,
    pub name: String,
    /// kg CO2e per unit; negative for carbon-saving actions
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub carbon_per_unit: Decimal,
    /// Unit label (km, meal, kWh, ...)
    pub unit: String,
}

impl Activity {
    /// Carbon impact of logging `quantity` units of this activity.
    pub fn impact_for(&self, quantity: Decimal) -> Decimal {
        quantity * self.carbon_per_unit
    }

    /// Whether this activity reduces emissions.
    pub fn is_carbon_saving(&self) -> bool {
        self.carbon_per_unit < Decimal::ZERO
    }
}
