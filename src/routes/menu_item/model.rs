use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;
use crate::routes::menu::Menu;
use crate::routes::order::Order;
use crate::utils::validation::{TEXT_MAX_LEN, validate_required_text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MenuItem {
    pub id: i32,
    pub name: String,
    pub description: String,
    /// 指向 orders 表（不是 menus），可为空，被引用的订单不能删除
    pub menu_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuItemInput {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub menu_id: Option<i32>,
}

impl MenuItemInput {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_required_text("名称", &self.name, TEXT_MAX_LEN)?;
        validate_required_text("描述", &self.description, TEXT_MAX_LEN)
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 菜品详情：包含列出该菜品的菜单和订单
#[derive(Debug, Serialize)]
pub struct MenuItemDetail {
    #[serde(flatten)]
    pub item: MenuItem,
    pub menus: Vec<Menu>,
    pub orders: Vec<Order>,
}

impl MenuItem {
    pub async fn create(pool: &PgPool, input: MenuItemInput) -> Result<Self, AppError> {
        input.validate()?;

        let item = sqlx::query_as::<_, MenuItem>(
            r#"
            INSERT INTO menu_items (name, description, menu_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, menu_id
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.menu_id)
        .fetch_one(pool)
        .await?;

        tracing::info!("Created menu item {}: {}", item.id, item);
        Ok(item)
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, AppError> {
        let item = sqlx::query_as::<_, MenuItem>(
            "SELECT id, name, description, menu_id FROM menu_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(item)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let items = sqlx::query_as::<_, MenuItem>(
            "SELECT id, name, description, menu_id FROM menu_items ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    pub async fn update(pool: &PgPool, id: i32, input: MenuItemInput) -> Result<Self, AppError> {
        input.validate()?;

        sqlx::query_as::<_, MenuItem>(
            r#"
            UPDATE menu_items
            SET name = $1, description = $2, menu_id = $3
            WHERE id = $4
            RETURNING id, name, description, menu_id
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.menu_id)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("菜品", id))
    }

    /// 删除菜品，菜单和订单中的关联行随之删除
    pub async fn delete(pool: &PgPool, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::on_delete)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("菜品", id));
        }
        tracing::info!("Deleted menu item: {}", id);
        Ok(())
    }

    /// `menu_id` 指向该订单的菜品
    pub async fn find_by_menu_ref(pool: &PgPool, order_id: i32) -> Result<Vec<Self>, AppError> {
        let items = sqlx::query_as::<_, MenuItem>(
            "SELECT id, name, description, menu_id FROM menu_items WHERE menu_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    /// 包含该菜品的菜单
    pub async fn menus(pool: &PgPool, id: i32) -> Result<Vec<Menu>, AppError> {
        let menus = sqlx::query_as::<_, Menu>(
            r#"
            SELECT m.id, m.name, m.description
            FROM menus m
            JOIN menu_menu_items mm ON mm.menu_id = m.id
            WHERE mm.menuitem_id = $1
            ORDER BY m.id
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        Ok(menus)
    }

    /// 包含该菜品的订单
    pub async fn orders(pool: &PgPool, id: i32) -> Result<Vec<Order>, AppError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT o.id, o.name, o.description, o.owner_id
            FROM orders o
            JOIN order_items oi ON oi.order_id = o.id
            WHERE oi.menuitem_id = $1
            ORDER BY o.id
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }

    pub async fn detail(pool: &PgPool, id: i32) -> Result<MenuItemDetail, AppError> {
        let item = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("菜品", id))?;
        let menus = Self::menus(pool, id).await?;
        let orders = Self::orders(pool, id).await?;

        Ok(MenuItemDetail {
            item,
            menus,
            orders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, description: &str) -> MenuItemInput {
        MenuItemInput {
            name: name.into(),
            description: description.into(),
            menu_id: None,
        }
    }

    #[test]
    fn requires_name_and_description() {
        assert!(input("Soup", "Tomato soup").validate().is_ok());
        assert!(input("", "Tomato soup").validate().is_err());
        assert!(input("Soup", "  ").validate().is_err());
        assert!(input(&"s".repeat(256), "Tomato soup").validate().is_err());
    }

    #[test]
    fn display_is_name() {
        let item = MenuItem {
            id: 1,
            name: "Dumplings".into(),
            description: "Pork and chive".into(),
            menu_id: None,
        };
        assert_eq!(item.to_string(), "Dumplings");
    }

    #[test]
    fn menu_id_is_optional_in_input() {
        let parsed: MenuItemInput =
            serde_json::from_str(r#"{"name": "Tea", "description": "Oolong"}"#).unwrap();
        assert_eq!(parsed.menu_id, None);
    }

    #[test]
    fn detail_flattens_item_fields() {
        let detail = MenuItemDetail {
            item: MenuItem {
                id: 3,
                name: "Rice".into(),
                description: "Steamed".into(),
                menu_id: Some(9),
            },
            menus: vec![],
            orders: vec![],
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["menu_id"], 9);
        assert!(value["menus"].as_array().unwrap().is_empty());
    }
}
