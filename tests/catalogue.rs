mod common;

use menu_orders::error::AppError;
use menu_orders::routes::menu::{Menu, MenuInput};
use menu_orders::routes::menu_item::{MenuItem, MenuItemInput};
use menu_orders::routes::order::{Order, OrderInput, OrderUpdate};

fn item_input(name: &str) -> MenuItemInput {
    MenuItemInput {
        name: name.into(),
        description: format!("{} description", name),
        menu_id: None,
    }
}

fn order_update(name: &str) -> OrderUpdate {
    OrderUpdate {
        name: name.into(),
        description: "test order".into(),
    }
}

fn order_input(name: &str) -> OrderInput {
    OrderInput {
        name: name.into(),
        description: "test order".into(),
        items: vec![],
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn menu_items_many_to_many() {
    let pool = common::pool().await;
    let soup = MenuItem::create(&pool, item_input("Soup")).await.unwrap();
    let tea = MenuItem::create(&pool, item_input("Tea")).await.unwrap();

    let menu = Menu::create(
        &pool,
        MenuInput {
            name: common::unique("Lunch"),
            description: "Weekday lunch".into(),
            menu_items: vec![soup.id],
        },
    )
    .await
    .unwrap();

    Menu::add_item(&pool, menu.id, tea.id).await.unwrap();
    // 重复添加不报错
    Menu::add_item(&pool, menu.id, tea.id).await.unwrap();

    let items = Menu::items(&pool, menu.id).await.unwrap();
    assert_eq!(items, vec![soup.clone(), tea.clone()]);
    assert_eq!(MenuItem::menus(&pool, tea.id).await.unwrap(), vec![menu.clone()]);

    assert!(Menu::remove_item(&pool, menu.id, soup.id).await.unwrap());
    assert!(!Menu::remove_item(&pool, menu.id, soup.id).await.unwrap());

    Menu::set_items(&pool, menu.id, &[soup.id]).await.unwrap();
    let detail = Menu::detail(&pool, menu.id).await.unwrap();
    assert_eq!(detail.menu_items, vec![soup.clone()]);

    // 删除菜品时关联行随之删除
    MenuItem::delete(&pool, soup.id).await.unwrap();
    assert!(Menu::items(&pool, menu.id).await.unwrap().is_empty());

    Menu::delete(&pool, menu.id).await.unwrap();
    MenuItem::delete(&pool, tea.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn adding_missing_item_is_not_found() {
    let pool = common::pool().await;
    let menu = Menu::create(
        &pool,
        MenuInput {
            name: common::unique("Dinner"),
            description: "Evening".into(),
            menu_items: vec![],
        },
    )
    .await
    .unwrap();

    let err = Menu::add_item(&pool, menu.id, i32::MAX).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = Menu::set_items(&pool, i32::MAX, &[]).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Menu::delete(&pool, menu.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn order_referenced_by_menu_item_is_protected() {
    let pool = common::pool().await;
    let order = Order::create(&pool, order_input("Table 1"), None).await.unwrap();

    let item = MenuItem::create(
        &pool,
        MenuItemInput {
            menu_id: Some(order.id),
            ..item_input("Noodles")
        },
    )
    .await
    .unwrap();
    assert_eq!(item.menu_id, Some(order.id));

    let related = MenuItem::find_by_menu_ref(&pool, order.id).await.unwrap();
    assert_eq!(related, vec![item.clone()]);

    let err = Order::delete(&pool, order.id).await.unwrap_err();
    assert!(matches!(err, AppError::Protected(_)));

    MenuItem::update(
        &pool,
        item.id,
        MenuItemInput {
            menu_id: None,
            ..item_input("Noodles")
        },
    )
    .await
    .unwrap();
    Order::delete(&pool, order.id).await.unwrap();
    MenuItem::delete(&pool, item.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn menu_item_pointing_at_missing_order_is_rejected() {
    let pool = common::pool().await;
    let err = MenuItem::create(
        &pool,
        MenuItemInput {
            menu_id: Some(i32::MAX),
            ..item_input("Ghost")
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn order_items_and_detail() {
    let pool = common::pool().await;
    let rice = MenuItem::create(&pool, item_input("Rice")).await.unwrap();

    let order = Order::create(
        &pool,
        OrderInput {
            items: vec![rice.id, rice.id],
            ..order_input("Table 2")
        },
        None,
    )
    .await
    .unwrap();

    let detail = Order::detail(&pool, order.id).await.unwrap();
    assert_eq!(detail.items, vec![rice.clone()]);
    assert!(detail.related_menu.is_empty());
    assert_eq!(MenuItem::orders(&pool, rice.id).await.unwrap(), vec![order.clone()]);

    let renamed = Order::update(&pool, order.id, order_update("Table 3")).await.unwrap();
    assert_eq!(renamed.to_string(), "Table 3");

    assert!(Order::remove_item(&pool, order.id, rice.id).await.unwrap());
    Order::add_item(&pool, order.id, rice.id).await.unwrap();
    assert_eq!(Order::items(&pool, order.id).await.unwrap().len(), 1);

    Order::delete(&pool, order.id).await.unwrap();
    MenuItem::delete(&pool, rice.id).await.unwrap();

    let err = Order::update(&pool, order.id, order_update("Gone")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
