//! Authentication module: configuration, credential handling, token minting,
//! the refresh-token session field, the account lifecycle service, Rocket
//! request guards, and HTTP route handlers.

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod passwords;
pub mod refresh_store;
pub mod responses;
pub mod routes;
pub mod service;
pub mod validation;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::AuthUser;
pub use jwt::{JwtService, TokenKind, VerificationFailure};
pub use passwords::PasswordService;
pub use refresh_store::RefreshTokenStore;
pub use service::AuthService;
