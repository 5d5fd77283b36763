mod handler;
mod model;

pub use handler::{
    add_item, create_order, delete_order, get_order, list_orders, remove_item, update_order,
};
pub use model::{Order, OrderDetail, OrderInput, OrderUpdate};
