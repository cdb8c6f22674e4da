mod handler;

pub use handler::{add_member, leave_group, list_members, remove_member};
