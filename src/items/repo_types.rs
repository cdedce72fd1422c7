use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Food category as stored in `food_items.category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Vegetables,
    Fruits,
    Grains,
    Legumes,
    Nuts,
    NonVeg,
    Baked,
    Desserts,
    Meals,
    Processed,
    Beverages,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Vegetables,
        Category::Fruits,
        Category::Grains,
        Category::Legumes,
        Category::Nuts,
        Category::NonVeg,
        Category::Baked,
        Category::Desserts,
        Category::Meals,
        Category::Processed,
        Category::Beverages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Vegetables => "vegetables",
            Category::Fruits => "fruits",
            Category::Grains => "grains",
            Category::Legumes => "legumes",
            Category::Nuts => "nuts",
            Category::NonVeg => "non-veg",
            Category::Baked => "baked",
            Category::Desserts => "desserts",
            Category::Meals => "meals",
            Category::Processed => "processed",
            Category::Beverages => "beverages",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown category: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kg,
    G,
    Liters,
    Ml,
    #[default]
    Pieces,
    Packs,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::G => "g",
            Unit::Liters => "liters",
            Unit::Ml => "ml",
            Unit::Pieces => "pieces",
            Unit::Packs => "packs",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(Unit::Kg),
            "g" => Ok(Unit::G),
            "liters" => Ok(Unit::Liters),
            "ml" => Ok(Unit::Ml),
            "pieces" => Ok(Unit::Pieces),
            "packs" => Ok(Unit::Packs),
            other => anyhow::bail!("unknown unit: {}", other),
        }
    }
}

/// Row of `food_items` joined with the viewer's like state.
#[derive(Debug, Clone, FromRow)]
pub struct FoodItemRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub image_url: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_address: Option<String>,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub expire_date: Option<OffsetDateTime>,
    pub carbon_emissions: Option<f64>,
    pub likes: i64,
    pub liked: bool,
}

/// Validated insert for `food_items`; emissions are filled in by the store.
#[derive(Debug, Clone)]
pub struct NewFoodItem {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub quantity: u32,
    pub unit: Unit,
    pub image_url: Option<String>,
    pub location_lat: f64,
    pub location_lng: f64,
    pub location_address: String,
    pub user_id: Uuid,
    pub expire_date: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub likes: i64,
    pub liked: bool,
}
