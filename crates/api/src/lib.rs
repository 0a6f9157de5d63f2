//! # docrender-api
//!
//! API data transfer objects and wire formats for the `/v1/pdf` HTTP
//! surface: closed path-segment parsing, the `{name, status, message,
//! details}` error body shape, and the `Content-Disposition`
//! percent-encoding rule.
//!
//! This crate depends on `domain`, `ports`, and `shared`.

/// API v1 DTOs.
pub mod v1;

/// Returns the API crate version.
#[must_use]
pub const fn api_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrender_domain::domain_crate_version;
    use docrender_shared::shared_crate_version;

    #[test]
    fn api_crate_compiles() {
        let version = api_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn api_can_use_domain_and_shared() {
        let domain_version = domain_crate_version();
        let shared_version = shared_crate_version();

        assert!(!domain_version.is_empty());
        assert!(!shared_version.is_empty());
    }
}
