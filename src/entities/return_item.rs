use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One returned line, referencing the original sale item it reverses.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "return_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub return_id: Uuid,
    pub sale_item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub tax_refund: Decimal,
    pub line_total: Decimal,
    pub condition_notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_return::Entity",
        from = "Column::ReturnId",
        to = "super::product_return::Column::Id"
    )]
    ProductReturn,
    #[sea_orm(
        belongs_to = "super::sale_item::Entity",
        from = "Column::SaleItemId",
        to = "super::sale_item::Column::Id"
    )]
    SaleItem,
}

impl Related<super::product_return::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductReturn.def()
    }
}

impl Related<super::sale_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
