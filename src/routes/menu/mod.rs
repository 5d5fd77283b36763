mod handler;
mod model;

pub use handler::{
    add_item, create_menu, delete_menu, get_menu, list_menus, remove_item, set_items, update_menu,
};
pub use model::{Menu, MenuDetail, MenuInput, MenuUpdate, SetItemsRequest};
