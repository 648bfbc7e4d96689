use crate::entities::{
    banner_entity as banners, category_entity as categories, product_entity as products,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::order_ledger::{self, DeletionGuard};
use crate::utils::pricing;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct CatalogueService {
    pool: Arc<DatabaseConnection>,
}

impl CatalogueService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }

    /// 页头分类
    pub async fn header_categories(&self) -> AppResult<Vec<CategoryResponse>> {
        let rows = categories::Entity::find()
            .order_by_asc(categories::Column::Queue)
            .order_by_asc(categories::Column::Id)
            .all(self.pool.as_ref())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn catalogue(&self) -> AppResult<Vec<CategoryWithImageResponse>> {
        let rows = categories::Entity::find()
            .order_by_asc(categories::Column::Queue)
            .order_by_asc(categories::Column::Id)
            .all(self.pool.as_ref())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// 首页：轮播、推荐、折扣、菜单
    pub async fn home(&self) -> AppResult<HomeResponse> {
        let banner_rows = banners::Entity::find()
            .order_by_asc(banners::Column::Queue)
            .order_by_asc(banners::Column::Id)
            .all(self.pool.as_ref())
            .await?;

        let bests = products::Entity::find()
            .filter(products::Column::IsBest.eq(true))
            .filter(products::Column::IsActive.eq(true))
            .order_by_asc(products::Column::Id)
            .all(self.pool.as_ref())
            .await?;

        let discounts = products::Entity::find()
            .filter(products::Column::Discount.gt(0))
            .filter(products::Column::IsBest.eq(false))
            .filter(products::Column::IsActive.eq(true))
            .order_by_desc(products::Column::Discount)
            .order_by_asc(products::Column::Id)
            .all(self.pool.as_ref())
            .await?;

        let menu = self.menu().await?;

        Ok(HomeResponse {
            banners: banner_rows.into_iter().map(Into::into).collect(),
            bests: bests.into_iter().map(Into::into).collect(),
            discounts: discounts.into_iter().map(Into::into).collect(),
            menu,
        })
    }

    async fn menu(&self) -> AppResult<Vec<MenuResponse>> {
        let category_rows = categories::Entity::find()
            .order_by_asc(categories::Column::Queue)
            .order_by_asc(categories::Column::Id)
            .all(self.pool.as_ref())
            .await?;

        let mut grouped: HashMap<i64, Vec<ProductItemResponse>> = HashMap::new();
        for product in products::Entity::find()
            .filter(products::Column::IsActive.eq(true))
            .order_by_asc(products::Column::Id)
            .all(self.pool.as_ref())
            .await?
        {
            grouped
                .entry(product.category_id)
                .or_default()
                .push(product.into());
        }

        Ok(category_rows
            .into_iter()
            .map(|c| MenuResponse {
                products: grouped.remove(&c.id).unwrap_or_default(),
                id: c.id,
                name_en: c.name_en,
                name_hu: c.name_hu,
            })
            .collect())
    }

    pub async fn category_menu(&self, category_id: i64) -> AppResult<CategoryMenuResponse> {
        let category = categories::Entity::find_by_id(category_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".into()))?;

        let rows = products::Entity::find()
            .filter(products::Column::CategoryId.eq(category.id))
            .filter(products::Column::IsActive.eq(true))
            .order_by_asc(products::Column::Id)
            .all(self.pool.as_ref())
            .await?;

        Ok(CategoryMenuResponse {
            name_en: category.name_en,
            name_hu: category.name_hu,
            image: category.image,
            products: rows.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn list_products(&self) -> AppResult<Vec<ProductItemResponse>> {
        let rows = products::Entity::find()
            .filter(products::Column::IsActive.eq(true))
            .order_by_asc(products::Column::Id)
            .all(self.pool.as_ref())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// 商品详情，未启用的商品视为不存在
    pub async fn get_product(&self, product_id: i64) -> AppResult<ProductResponse> {
        products::Entity::find_by_id(product_id)
            .filter(products::Column::IsActive.eq(true))
            .one(self.pool.as_ref())
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound("Product not found".into()))
    }

    // ---- 管理端 ----

    pub async fn create_banner(&self, request: CreateBannerRequest) -> AppResult<BannerResponse> {
        let banner = banners::ActiveModel {
            name_en: Set(request.name_en),
            name_hu: Set(request.name_hu),
            image: Set(request.image),
            queue: Set(request.queue),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;
        Ok(banner.into())
    }

    pub async fn update_banner(
        &self,
        banner_id: i64,
        request: UpdateBannerRequest,
    ) -> AppResult<BannerResponse> {
        let banner = banners::Entity::find_by_id(banner_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Banner not found".into()))?;

        let mut am = banner.into_active_model();
        if let Some(v) = request.name_en {
            am.name_en = Set(v);
        }
        if let Some(v) = request.name_hu {
            am.name_hu = Set(v);
        }
        if let Some(v) = request.image {
            am.image = Set(v);
        }
        if request.queue.is_some() {
            am.queue = Set(request.queue);
        }
        Ok(am.update(self.pool.as_ref()).await?.into())
    }

    pub async fn delete_banner(&self, banner_id: i64) -> AppResult<()> {
        let res = banners::Entity::delete_by_id(banner_id)
            .exec(self.pool.as_ref())
            .await?;
        if res.rows_affected == 0 {
            return Err(AppError::NotFound("Banner not found".into()));
        }
        Ok(())
    }

    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> AppResult<CategoryWithImageResponse> {
        let category = categories::ActiveModel {
            name_en: Set(request.name_en),
            name_hu: Set(request.name_hu),
            image: Set(request.image),
            queue: Set(request.queue),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;
        Ok(category.into())
    }

    pub async fn update_category(
        &self,
        category_id: i64,
        request: UpdateCategoryRequest,
    ) -> AppResult<CategoryWithImageResponse> {
        let category = categories::Entity::find_by_id(category_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".into()))?;

        let mut am = category.into_active_model();
        if let Some(v) = request.name_en {
            am.name_en = Set(v);
        }
        if let Some(v) = request.name_hu {
            am.name_hu = Set(v);
        }
        if let Some(v) = request.image {
            am.image = Set(v);
        }
        if let Some(v) = request.queue {
            am.queue = Set(v);
        }
        Ok(am.update(self.pool.as_ref()).await?.into())
    }

    /// 删除分类及其商品；任一商品已被订单引用时拒绝
    pub async fn delete_category(&self, category_id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let category = categories::Entity::find_by_id(category_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".into()))?;

        let product_ids: Vec<i64> = products::Entity::find()
            .filter(products::Column::CategoryId.eq(category.id))
            .lock_exclusive()
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        let mut guard = DeletionGuard::new();
        let released = order_ledger::release_product_items(&txn, &product_ids, &mut guard).await?;

        if !product_ids.is_empty() {
            products::Entity::delete_many()
                .filter(products::Column::Id.is_in(product_ids.clone()))
                .exec(&txn)
                .await?;
        }
        categories::Entity::delete_by_id(category.id)
            .exec(&txn)
            .await?;
        txn.commit().await?;

        log::info!(
            "Category {} deleted with {} products and {released} pending items",
            category.id,
            product_ids.len()
        );
        Ok(())
    }

    pub async fn create_product(&self, request: CreateProductRequest) -> AppResult<ProductResponse> {
        // new_price 只由 price/discount 推导
        let new_price = pricing::discounted_price(request.price, request.discount)?;
        self.ensure_category(request.category_id).await?;

        let product = products::ActiveModel {
            name_en: Set(request.name_en),
            name_hu: Set(request.name_hu),
            description_en: Set(request.description_en),
            description_hu: Set(request.description_hu),
            price: Set(pricing::quantize(request.price, 2)),
            discount: Set(request.discount),
            new_price: Set(new_price),
            is_best: Set(request.is_best),
            is_active: Set(request.is_active),
            thumbnail: Set(request.thumbnail),
            image: Set(request.image),
            category_id: Set(request.category_id),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;

        log::info!("Product {} created, new_price={}", product.id, product.new_price);
        Ok(product.into())
    }

    pub async fn update_product(
        &self,
        product_id: i64,
        request: UpdateProductRequest,
    ) -> AppResult<ProductResponse> {
        let product = products::Entity::find_by_id(product_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

        let price = request.price.unwrap_or(product.price);
        let discount = request.discount.unwrap_or(product.discount);
        let new_price = pricing::discounted_price(price, discount)?;
        if let Some(category_id) = request.category_id {
            self.ensure_category(category_id).await?;
        }

        let mut am = product.into_active_model();
        if let Some(v) = request.name_en {
            am.name_en = Set(v);
        }
        if let Some(v) = request.name_hu {
            am.name_hu = Set(v);
        }
        if let Some(v) = request.description_en {
            am.description_en = Set(v);
        }
        if let Some(v) = request.description_hu {
            am.description_hu = Set(v);
        }
        if let Some(v) = request.is_best {
            am.is_best = Set(v);
        }
        if let Some(v) = request.is_active {
            am.is_active = Set(v);
        }
        if let Some(v) = request.thumbnail {
            am.thumbnail = Set(v);
        }
        if let Some(v) = request.image {
            am.image = Set(v);
        }
        if let Some(v) = request.category_id {
            am.category_id = Set(v);
        }
        am.price = Set(pricing::quantize(price, 2));
        am.discount = Set(discount);
        am.new_price = Set(new_price);

        Ok(am.update(self.pool.as_ref()).await?.into())
    }

    /// 删除商品；引用它的 Pending 明细一并删除，已下单的明细会阻止删除
    pub async fn delete_product(&self, product_id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let product = products::Entity::find_by_id(product_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

        let mut guard = DeletionGuard::new();
        let released = order_ledger::release_product_items(&txn, &[product.id], &mut guard).await?;

        products::Entity::delete_by_id(product.id)
            .exec(&txn)
            .await?;
        txn.commit().await?;

        log::info!("Product {} deleted with {released} pending items", product.id);
        Ok(())
    }

    async fn ensure_category(&self, category_id: i64) -> AppResult<()> {
        categories::Entity::find_by_id(category_id)
            .one(self.pool.as_ref())
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Category not found".into()))
    }
}
