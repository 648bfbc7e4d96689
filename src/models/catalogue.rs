use crate::entities::{banner_entity, category_entity, product_entity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BannerResponse {
    pub id: i64,
    pub image: String,
    pub name_en: String,
    pub name_hu: String,
}

impl From<banner_entity::Model> for BannerResponse {
    fn from(m: banner_entity::Model) -> Self {
        Self {
            id: m.id,
            image: m.image,
            name_en: m.name_en,
            name_hu: m.name_hu,
        }
    }
}

/// 页头分类（不含图片）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i64,
    pub name_en: String,
    pub name_hu: String,
}

impl From<category_entity::Model> for CategoryResponse {
    fn from(m: category_entity::Model) -> Self {
        Self {
            id: m.id,
            name_en: m.name_en,
            name_hu: m.name_hu,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryWithImageResponse {
    pub id: i64,
    pub name_en: String,
    pub name_hu: String,
    pub image: String,
}

impl From<category_entity::Model> for CategoryWithImageResponse {
    fn from(m: category_entity::Model) -> Self {
        Self {
            id: m.id,
            name_en: m.name_en,
            name_hu: m.name_hu,
            image: m.image,
        }
    }
}

/// 商品列表项
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductItemResponse {
    pub id: i64,
    pub name_en: String,
    pub name_hu: String,
    pub thumbnail: String,
    pub is_best: bool,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
    pub discount: i32,
    #[schema(value_type = String, example = "8.0")]
    pub new_price: Decimal,
}

impl From<product_entity::Model> for ProductItemResponse {
    fn from(m: product_entity::Model) -> Self {
        Self {
            id: m.id,
            name_en: m.name_en,
            name_hu: m.name_hu,
            thumbnail: m.thumbnail,
            is_best: m.is_best,
            price: m.price,
            discount: m.discount,
            new_price: m.new_price,
        }
    }
}

/// 商品详情
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: i64,
    pub name_en: String,
    pub name_hu: String,
    pub description_en: String,
    pub description_hu: String,
    pub image: String,
    pub is_best: bool,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
    pub discount: i32,
    #[schema(value_type = String, example = "8.0")]
    pub new_price: Decimal,
}

impl From<product_entity::Model> for ProductResponse {
    fn from(m: product_entity::Model) -> Self {
        Self {
            id: m.id,
            name_en: m.name_en,
            name_hu: m.name_hu,
            description_en: m.description_en,
            description_hu: m.description_hu,
            image: m.image,
            is_best: m.is_best,
            price: m.price,
            discount: m.discount,
            new_price: m.new_price,
        }
    }
}

/// 首页菜单：分类 + 其下启用的商品
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MenuResponse {
    pub id: i64,
    pub name_en: String,
    pub name_hu: String,
    pub products: Vec<ProductItemResponse>,
}

/// 单个分类的菜单页
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryMenuResponse {
    pub name_en: String,
    pub name_hu: String,
    pub image: String,
    pub products: Vec<ProductItemResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HomeResponse {
    pub banners: Vec<BannerResponse>,
    pub bests: Vec<ProductItemResponse>,
    pub discounts: Vec<ProductItemResponse>,
    pub menu: Vec<MenuResponse>,
}

// ---- 管理端请求 ----

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBannerRequest {
    pub name_en: String,
    pub name_hu: String,
    pub image: String,
    pub queue: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBannerRequest {
    pub name_en: Option<String>,
    pub name_hu: Option<String>,
    pub image: Option<String>,
    pub queue: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name_en: String,
    pub name_hu: String,
    #[serde(default)]
    pub image: String,
    pub queue: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCategoryRequest {
    pub name_en: Option<String>,
    pub name_hu: Option<String>,
    pub image: Option<String>,
    pub queue: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name_en: String,
    pub name_hu: String,
    pub description_en: String,
    pub description_hu: String,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
    #[serde(default)]
    pub discount: i32,
    #[serde(default)]
    pub is_best: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub thumbnail: String,
    pub image: String,
    pub category_id: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name_en: Option<String>,
    pub name_hu: Option<String>,
    pub description_en: Option<String>,
    pub description_hu: Option<String>,
    #[schema(value_type = Option<String>, example = "10.00")]
    pub price: Option<Decimal>,
    pub discount: Option<i32>,
    pub is_best: Option<bool>,
    pub is_active: Option<bool>,
    pub thumbnail: Option<String>,
    pub image: Option<String>,
    pub category_id: Option<i64>,
}
