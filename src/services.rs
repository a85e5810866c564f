//! Registry of supported infrastructure services.
//!
//! Each entry carries what the interactive flows need: a display name, a
//! short description, the page where the user creates a token, and the
//! token shape the validator enforces. Services outside this registry are
//! still accepted by the vault; the registry only drives validation and the
//! CLI's guided setup.

use crate::validate::TokenShape;

/// Static description of one supported service.
pub struct ServiceSpec {
    /// Stable identifier used as the vault record key.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// One-line description shown during setup.
    pub description: &'static str,
    /// Where the user creates a token for this service.
    pub token_url: &'static str,
    /// Expected token shape, if the service has a documented one.
    pub shape: Option<TokenShape>,
}

/// All services with first-class support.
pub const SERVICES: &[ServiceSpec] = &[
    ServiceSpec {
        id: "github",
        name: "GitHub",
        description: "Repository management and secrets",
        token_url: "https://github.com/settings/tokens/new",
        shape: Some(TokenShape::prefixed(&["ghp_"], 36)),
    },
    ServiceSpec {
        id: "vercel",
        name: "Vercel",
        description: "Deployment and hosting",
        token_url: "https://vercel.com/account/tokens",
        shape: Some(TokenShape::bare(24)),
    },
    ServiceSpec {
        id: "supabase",
        name: "Supabase",
        description: "Database and authentication",
        token_url: "https://app.supabase.io/project/_/settings/api",
        shape: Some(TokenShape::bare(48)),
    },
    ServiceSpec {
        id: "cloudflare",
        name: "Cloudflare",
        description: "DNS and CDN management",
        token_url: "https://dash.cloudflare.com/profile/api-tokens",
        shape: Some(TokenShape::bare(40)),
    },
    ServiceSpec {
        id: "stripe",
        name: "Stripe",
        description: "Payment processing",
        token_url: "https://dashboard.stripe.com/apikeys",
        shape: Some(TokenShape::prefixed(
            &["sk_test_", "sk_live_", "pk_test_", "pk_live_"],
            24,
        )),
    },
];

/// Look up a service by identifier.
pub fn find(id: &str) -> Option<&'static ServiceSpec> {
    SERVICES.iter().find(|s| s.id == id)
}

/// Display name for a service, falling back to the raw identifier.
pub fn display_name(id: &str) -> &str {
    find(id).map_or(id, |s| s.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_service() {
        let github = find("github").unwrap();
        assert_eq!(github.name, "GitHub");
        assert!(github.shape.is_some());
    }

    #[test]
    fn test_find_unknown_service() {
        assert!(find("railway").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        for (i, a) in SERVICES.iter().enumerate() {
            for b in &SERVICES[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        assert_eq!(display_name("github"), "GitHub");
        assert_eq!(display_name("railway"), "railway");
    }
}
