use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;
use crate::routes::menu_item::MenuItem;
use crate::routes::user::User;
use crate::utils::validation::{TEXT_MAX_LEN, validate_required_text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i32,
    pub name: String,
    pub description: String,
    /// 下单用户，可为空；拥有订单的用户不能删除
    pub owner_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderInput {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub items: Vec<i32>,
}

impl OrderInput {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_required_text("名称", &self.name, TEXT_MAX_LEN)?;
        validate_required_text("描述", &self.description, TEXT_MAX_LEN)
    }
}

/// 只改名称和描述；菜品通过 add_item/remove_item 修改
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderUpdate {
    pub name: String,
    pub description: String,
}

impl OrderUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_required_text("名称", &self.name, TEXT_MAX_LEN)?;
        validate_required_text("描述", &self.description, TEXT_MAX_LEN)
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<MenuItem>,
    /// menu_id 指向本订单的菜品
    pub related_menu: Vec<MenuItem>,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Order {
    pub async fn create(
        pool: &PgPool,
        input: OrderInput,
        owner_id: Option<i32>,
    ) -> Result<Self, AppError> {
        input.validate()?;

        let mut tx = pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (name, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, owner_id
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        if !input.items.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, menuitem_id)
                SELECT DISTINCT $1::int4, item_id FROM UNNEST($2::int4[]) AS item_id
                ON CONFLICT (order_id, menuitem_id) DO NOTHING
                "#,
            )
            .bind(order.id)
            .bind(&input.items)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!("Created order {}: {} (owner: {:?})", order.id, order, owner_id);
        Ok(order)
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, AppError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, name, description, owner_id FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(order)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT id, name, description, owner_id FROM orders ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }

    pub async fn list_by_owner(pool: &PgPool, owner_id: i32) -> Result<Vec<Self>, AppError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT id, name, description, owner_id FROM orders WHERE owner_id = $1 ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }

    pub async fn update(pool: &PgPool, id: i32, input: OrderUpdate) -> Result<Self, AppError> {
        input.validate()?;

        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET name = $1, description = $2
            WHERE id = $3
            RETURNING id, name, description, owner_id
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("订单", id))
    }

    /// 仍有菜品的 menu_id 指向该订单时无法删除（PROTECT）
    pub async fn delete(pool: &PgPool, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::on_delete)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("订单", id));
        }
        tracing::info!("Deleted order: {}", id);
        Ok(())
    }

    pub async fn items(pool: &PgPool, id: i32) -> Result<Vec<MenuItem>, AppError> {
        let items = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT i.id, i.name, i.description, i.menu_id
            FROM menu_items i
            JOIN order_items oi ON oi.menuitem_id = i.id
            WHERE oi.order_id = $1
            ORDER BY i.id
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    pub async fn add_item(pool: &PgPool, id: i32, item_id: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, menuitem_id)
            VALUES ($1, $2)
            ON CONFLICT (order_id, menuitem_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(item_id)
        .execute(pool)
        .await?;

        tracing::debug!("Added item {} to order {}", item_id, id);
        Ok(())
    }

    pub async fn remove_item(pool: &PgPool, id: i32, item_id: i32) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND menuitem_id = $2")
                .bind(id)
                .bind(item_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn detail(pool: &PgPool, id: i32) -> Result<OrderDetail, AppError> {
        let order = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("订单", id))?;
        Self::detail_of(pool, order).await
    }

    pub async fn detail_of(pool: &PgPool, order: Order) -> Result<OrderDetail, AppError> {
        let items = Self::items(pool, order.id).await?;
        let related_menu = MenuItem::find_by_menu_ref(pool, order.id).await?;
        Ok(OrderDetail {
            order,
            items,
            related_menu,
        })
    }

    /// 订单所有者和超级用户可以访问
    pub fn can_access(&self, user: &User) -> bool {
        user.is_active && (user.is_superuser || self.owner_id == Some(user.id))
    }
}
