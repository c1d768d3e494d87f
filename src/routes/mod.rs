/// Router Module Index
///
/// Routes are grouped by the access they require. The groups are documentation and
/// wiring only; enforcement happens in `security::enforce_access`, which applies the
/// URL policy to the merged router, and again inside the admin handlers.

/// Routes open to anonymous callers: login flow and health check.
pub mod public;

/// Routes for any authenticated principal.
pub mod authenticated;

/// Routes restricted to the ADMIN role: the admin page and `/api/admin/**`.
pub mod admin;
