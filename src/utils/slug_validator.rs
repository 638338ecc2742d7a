// TES-74: Slug format guard for tenant subdomains
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]*[a-z0-9]$").unwrap();
    static ref RESERVED_SLUGS: HashSet<&'static str> = {
        let mut reserved = HashSet::new();
        for word in [
            // Infrastructure hostnames
            "www", "api", "app", "mail", "smtp", "imap", "ftp", "ns1", "ns2",
            "cdn", "assets", "static", "vpn", "webmail",
            // Platform surfaces
            "admin", "dashboard", "portal", "billing", "account", "login",
            "signup", "auth", "sso", "secure", "internal", "platform",
            // Environments
            "staging", "dev", "test", "demo", "sandbox", "preview",
            // Support surfaces
            "status", "docs", "blog", "help", "support", "community",
            // Brand
            "tessera",
        ] {
            reserved.insert(word);
        }
        reserved
    };
}

pub struct SlugValidator;

impl SlugValidator {
    /// Validate a tenant slug according to subdomain rules.
    ///
    /// The slug becomes a DNS label under the root domain, so the rules are
    /// stricter than general identifiers: lowercase alphanumeric with
    /// interior hyphens only.
    pub fn validate(slug: &str) -> Result<(), String> {
        // Length validation
        if slug.len() < 3 {
            return Err("Slug must be at least 3 characters long".to_string());
        }

        if slug.len() > 30 {
            return Err("Slug must be no more than 30 characters long".to_string());
        }

        // Format validation
        if !SLUG_REGEX.is_match(slug) {
            return Err(
                "Slug can only contain lowercase letters, numbers, and hyphens, and must start and end with a letter or number"
                    .to_string(),
            );
        }

        // Check for consecutive hyphens
        if slug.contains("--") {
            return Err("Slug cannot contain consecutive hyphens".to_string());
        }

        // Check reserved names
        if RESERVED_SLUGS.contains(slug) {
            return Err(format!("Slug '{}' is reserved", slug));
        }

        Ok(())
    }

    /// Check whether a slug is on the reserved list
    pub fn is_reserved(slug: &str) -> bool {
        RESERVED_SLUGS.contains(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slugs() {
        assert!(SlugValidator::validate("acme").is_ok());
        assert!(SlugValidator::validate("acme-corp").is_ok());
        assert!(SlugValidator::validate("a1b2c3").is_ok());
        assert!(SlugValidator::validate("123").is_ok());
        assert!(SlugValidator::validate("my-long-tenant-name-ok").is_ok());
    }

    #[test]
    fn test_length_bounds() {
        assert!(SlugValidator::validate("ab").is_err());
        assert!(SlugValidator::validate(&"a".repeat(31)).is_err());
        assert!(SlugValidator::validate(&"a".repeat(30)).is_ok());
        assert!(SlugValidator::validate("abc").is_ok());
    }

    #[test]
    fn test_rejects_bad_characters() {
        assert!(SlugValidator::validate("Acme").is_err());
        assert!(SlugValidator::validate("acme_corp").is_err());
        assert!(SlugValidator::validate("acme corp").is_err());
        assert!(SlugValidator::validate("acmé").is_err());
        assert!(SlugValidator::validate("acme.corp").is_err());
    }

    #[test]
    fn test_rejects_edge_hyphens() {
        assert!(SlugValidator::validate("-acme").is_err());
        assert!(SlugValidator::validate("acme-").is_err());
        assert!(SlugValidator::validate("ac--me").is_err());
    }

    #[test]
    fn test_rejects_reserved_slugs() {
        assert!(SlugValidator::validate("www").is_err());
        assert!(SlugValidator::validate("api").is_err());
        assert!(SlugValidator::validate("admin").is_err());
        assert!(SlugValidator::validate("staging").is_err());
        assert!(SlugValidator::validate("tessera").is_err());

        // Reserved words embedded in a longer slug are fine
        assert!(SlugValidator::validate("api-gateway").is_ok());
        assert!(SlugValidator::validate("wwwacme").is_ok());
    }

    #[test]
    fn test_is_reserved() {
        assert!(SlugValidator::is_reserved("admin"));
        assert!(!SlugValidator::is_reserved("acme"));
    }
}
