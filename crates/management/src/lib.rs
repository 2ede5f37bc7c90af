//! Auth (register/login/me) and admin CRUD (products/campaigns) backend.
//!
//! Owns the user/product/campaign admin surface named in §6; the API edge
//! crate mounts [`public_router`] and [`protected_router`] alongside its own
//! bid/ranking/order routes, route-layering the shared auth middleware onto
//! the protected half only.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;

pub use error::ApiError;
pub use handlers::{AuthenticatedUser, ManagementState};
pub use router::{protected_router, public_router};
