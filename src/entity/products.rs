use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub florist_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub images: Json,
    pub category: Option<String>,
    pub occasions: Json,
    pub in_stock: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::florist_profiles::Entity",
        from = "Column::FloristId",
        to = "super::florist_profiles::Column::Id"
    )]
    FloristProfiles,
    #[sea_orm(has_many = "super::cart_items::Entity")]
    CartItems,
}

impl Related<super::florist_profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FloristProfiles.def()
    }
}

impl Related<super::cart_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
