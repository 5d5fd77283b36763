mod handler;
mod model;

pub use handler::{
    delete_user, list_users, login, me, register, set_user_active, update_me, update_password,
};
pub use model::{
    LoginRequest, NewUser, REQUIRED_FIELDS, RegisterRequest, TokenResponse, USERNAME_FIELD,
    UpdatePasswordRequest, UpdateProfileRequest, User, UserFlags,
};

#[cfg(test)]
pub(crate) use model::sample_user;
