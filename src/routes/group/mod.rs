mod handler;

pub use handler::{
    create_group, delete_group, get_group, get_group_by_query, get_member_count, list_groups,
    update_price,
};
