use sea_orm::entity::prelude::*;

/// 首页轮播图
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "banners")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name_en: String,
    pub name_hu: String,
    /// 图片路径
    pub image: String,
    /// 排序（越小越靠前，NULL 排最后）
    pub queue: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
