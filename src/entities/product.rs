use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product master record.
///
/// `cost` is the running weighted-average acquisition cost per unit, shared
/// across all warehouses. It is persisted rounded to a whole currency unit
/// and is only ever written through the costing policy, never set directly.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(unique)]
    pub sku: String,
    pub cost: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_level::Entity")]
    StockLevel,
    #[sea_orm(has_many = "super::transfer_item::Entity")]
    TransferItem,
}

impl Related<super::stock_level::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLevel.def()
    }
}

impl Related<super::transfer_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransferItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
