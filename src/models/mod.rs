mod group;
mod member;
mod user;

pub use group::{
    CreateGroupRequest, Group, GroupCount, GroupIdQuery, GroupValidationError, NewGroup,
    PriceError, UpdatePriceRequest, check_price_proposal,
};
pub use member::{AddMemberRequest, AddMemberResponse, LeaveGroupRequest, Member, NewMember};
pub use user::{LoginRequest, LoginResponse, NewUser, RegisterRequest, User};
