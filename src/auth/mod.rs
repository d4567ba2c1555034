pub mod guard;
pub mod jwt;
pub mod password;

pub use guard::{
    is_public_path, require_session, session_claims, session_cookie, AUTH_COOKIE, SIGNIN_PATH,
};
pub use jwt::{Claims, JwtService};
