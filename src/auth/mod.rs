//! Authentication: password hashing, credential tokens, route guards,
//! and account flows

mod extract;
mod handlers;
mod password;
mod tokens;

pub use extract::{authenticate, maybe_user, protect, require_role, token_from_headers, CurrentUser};
pub use handlers::{
    forgot_password, hash_reset_token, login, logout, reset_password, sign_up, update_password,
    LoginRequest,
};
pub use password::{PasswordConfig, PasswordHasher};
pub use tokens::{Claims, TokenKeys, TOKEN_COOKIE};
