use crate::execution::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Kind of ERP record being synchronized. Each entity has its own lock,
/// checkpoint and progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Products,
    Customers,
    Orders,
}

impl Entity {
    pub const ALL: [Entity; 3] = [Entity::Products, Entity::Customers, Entity::Orders];

    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Products => "products",
            Entity::Customers => "customers",
            Entity::Orders => "orders",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "products" => Ok(Entity::Products),
            "customers" => Ok(Entity::Customers),
            "orders" => Ok(Entity::Orders),
            other => Err(ModelError::UnknownEntity(other.to_string())),
        }
    }
}

/// Which side is the source of truth for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    ErpToStore,
    StoreToErp,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ErpToStore => "erp_to_store",
            Direction::StoreToErp => "store_to_erp",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "erp_to_store" => Ok(Direction::ErpToStore),
            "store_to_erp" => Ok(Direction::StoreToErp),
            other => Err(ModelError::UnknownDirection(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entity_names_case_insensitively() {
        assert_eq!("Products".parse::<Entity>().unwrap(), Entity::Products);
        assert_eq!(" orders ".parse::<Entity>().unwrap(), Entity::Orders);
        assert!("invoices".parse::<Entity>().is_err());
    }

    #[test]
    fn parses_direction_with_dashes() {
        assert_eq!(
            "store-to-erp".parse::<Direction>().unwrap(),
            Direction::StoreToErp
        );
        assert_eq!(Direction::default(), Direction::ErpToStore);
    }

    #[test]
    fn entity_display_matches_key_segment() {
        for entity in Entity::ALL {
            assert_eq!(entity.to_string(), entity.as_str());
        }
    }
}
