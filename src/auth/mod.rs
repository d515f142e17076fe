pub mod jwt;
pub mod login;
pub mod middleware;
pub mod provider;
pub mod state;

pub use jwt::{JwtService, JwtServiceImpl, SessionClaims, parse_algorithm};
pub use login::LoginService;
pub use middleware::{CurrentUser, auth_middleware};
pub use provider::{IdentityProvider, OAuth2Gateway, RemoteIdentity};
pub use state::StateStore;
