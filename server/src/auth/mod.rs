//! Authentication: JWT tokens and request guards

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, CurrentUser, JwtError, JwtService};
pub use middleware::{require_admin, require_auth};
