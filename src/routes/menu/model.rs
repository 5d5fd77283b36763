use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;
use crate::routes::menu_item::MenuItem;
use crate::utils::validation::{TEXT_MAX_LEN, validate_required_text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Menu {
    pub id: i32,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuInput {
    pub name: String,
    pub description: String,
    /// 创建时一并关联的菜品
    #[serde(default)]
    pub menu_items: Vec<i32>,
}

impl MenuInput {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_required_text("名称", &self.name, TEXT_MAX_LEN)?;
        validate_required_text("描述", &self.description, TEXT_MAX_LEN)
    }
}

/// 只改名称和描述；关联菜品走 set_items，多余字段直接拒绝
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuUpdate {
    pub name: String,
    pub description: String,
}

impl MenuUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_required_text("名称", &self.name, TEXT_MAX_LEN)?;
        validate_required_text("描述", &self.description, TEXT_MAX_LEN)
    }
}

#[derive(Debug, Deserialize)]
pub struct SetItemsRequest {
    pub menu_items: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct MenuDetail {
    #[serde(flatten)]
    pub menu: Menu,
    pub menu_items: Vec<MenuItem>,
}

impl fmt::Display for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Menu {
    pub async fn create(pool: &PgPool, input: MenuInput) -> Result<Self, AppError> {
        input.validate()?;

        let mut tx = pool.begin().await?;

        let menu = sqlx::query_as::<_, Menu>(
            r#"
            INSERT INTO menus (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await?;

        if !input.menu_items.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO menu_menu_items (menu_id, menuitem_id)
                SELECT DISTINCT $1::int4, item_id FROM UNNEST($2::int4[]) AS item_id
                ON CONFLICT (menu_id, menuitem_id) DO NOTHING
                "#,
            )
            .bind(menu.id)
            .bind(&input.menu_items)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!("Created menu {}: {}", menu.id, menu);
        Ok(menu)
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, AppError> {
        let menu =
            sqlx::query_as::<_, Menu>("SELECT id, name, description FROM menus WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(menu)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let menus = sqlx::query_as::<_, Menu>("SELECT id, name, description FROM menus ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(menus)
    }

    pub async fn update(pool: &PgPool, id: i32, input: MenuUpdate) -> Result<Self, AppError> {
        input.validate()?;

        sqlx::query_as::<_, Menu>(
            r#"
            UPDATE menus
            SET name = $1, description = $2
            WHERE id = $3
            RETURNING id, name, description
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("菜单", id))
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::on_delete)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("菜单", id));
        }
        tracing::info!("Deleted menu: {}", id);
        Ok(())
    }

    pub async fn items(pool: &PgPool, id: i32) -> Result<Vec<MenuItem>, AppError> {
        let items = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT i.id, i.name, i.description, i.menu_id
            FROM menu_items i
            JOIN menu_menu_items mm ON mm.menuitem_id = i.id
            WHERE mm.menu_id = $1
            ORDER BY i.id
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    /// 已关联时不重复添加
    pub async fn add_item(pool: &PgPool, id: i32, item_id: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO menu_menu_items (menu_id, menuitem_id)
            VALUES ($1, $2)
            ON CONFLICT (menu_id, menuitem_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(item_id)
        .execute(pool)
        .await?;

        tracing::debug!("Added item {} to menu {}", item_id, id);
        Ok(())
    }

    /// 返回是否确实移除了关联
    pub async fn remove_item(pool: &PgPool, id: i32, item_id: i32) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM menu_menu_items WHERE menu_id = $1 AND menuitem_id = $2")
                .bind(id)
                .bind(item_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 用给定列表替换全部关联菜品
    pub async fn set_items(pool: &PgPool, id: i32, item_ids: &[i32]) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM menus WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::not_found("菜单", id));
        }

        sqlx::query("DELETE FROM menu_menu_items WHERE menu_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO menu_menu_items (menu_id, menuitem_id)
            SELECT DISTINCT $1::int4, item_id FROM UNNEST($2::int4[]) AS item_id
            ON CONFLICT (menu_id, menuitem_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(item_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn detail(pool: &PgPool, id: i32) -> Result<MenuDetail, AppError> {
        let menu = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("菜单", id))?;
        let menu_items = Self::items(pool, id).await?;
        Ok(MenuDetail { menu, menu_items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_defaults_to_no_items() {
        let input: MenuInput =
            serde_json::from_str(r#"{"name": "Lunch", "description": "Weekday lunch"}"#).unwrap();
        assert!(input.menu_items.is_empty());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let input = MenuInput {
            name: " ".into(),
            description: "Weekday lunch".into(),
            menu_items: vec![],
        };
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));

        let input = MenuInput {
            name: "Lunch".into(),
            description: String::new(),
            menu_items: vec![],
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn update_refuses_item_list() {
        let parsed = serde_json::from_str::<MenuUpdate>(
            r#"{"name": "Lunch", "description": "Weekday lunch", "menu_items": [1, 2]}"#,
        );
        assert!(parsed.is_err());

        let update: MenuUpdate =
            serde_json::from_str(r#"{"name": "Lunch", "description": "Weekday lunch"}"#).unwrap();
        assert!(update.validate().is_ok());
    }

    #[test]
    fn display_is_name() {
        let menu = Menu {
            id: 1,
            name: "Breakfast".into(),
            description: "Morning".into(),
        };
        assert_eq!(format!("{}", menu), "Breakfast");
    }
}
