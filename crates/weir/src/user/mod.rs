//! User accounts and OAuth identities.

mod models;
mod repository;

pub use models::{
    CreateUserRequest, OAuthAccount, OAuthLogin, UpdateUserRequest, User, UserInfo, UserListQuery,
    UserStats,
};
pub use repository::UserRepository;
