//! CPE platform identifiers
//!
//! Benchmark platforms are standardized CPE strings such as
//! `cpe:/o:canonical:ubuntu_linux:16.04`. Definition metadata wants the
//! human-facing platform naming used by scanner content, so this module
//! maps the vendor/product pair and joins the version digits:
//!
//! - `cpe:/o:canonical:ubuntu_linux:16.04` → `Ubuntu 1604`
//! - `cpe:/o:debianproject:debian:8` → `Debian 8`
//! - `cpe:/o:redhat:enterprise_linux:6` → `Red Hat Enterprise Linux 6`
//!
//! Strings that are not CPE URIs pass through unchanged, so an authoring
//! document may also carry an already-humanized platform label.

/// Map a platform identifier to the affected-platform name used in
/// definition metadata
pub fn affected_platform(platform: &str) -> String {
    let Some(rest) = platform.strip_prefix("cpe:/") else {
        return platform.to_string();
    };

    let mut parts = rest.split(':');
    let _part_type = parts.next();
    let vendor = parts.next().unwrap_or_default();
    let product = parts.next().unwrap_or_default();
    let version = parts.next().unwrap_or_default();

    if product.is_empty() {
        return platform.to_string();
    }

    let name = product_name(vendor, product);

    // leap carries its version in the product line, not the CPE version
    if product == "leap" {
        return name;
    }

    let digits: String = version.chars().filter(|c| *c != '.').collect();
    if digits.is_empty() {
        name
    } else {
        format!("{} {}", name, digits)
    }
}

fn product_name(vendor: &str, product: &str) -> String {
    match (vendor, product) {
        ("redhat", "enterprise_linux") => "Red Hat Enterprise Linux".to_string(),
        ("canonical", "ubuntu_linux") => "Ubuntu".to_string(),
        ("suse", "linux_enterprise_server") => "SUSE Linux Enterprise".to_string(),
        ("novell", "leap") => "OpenSUSE".to_string(),
        (_, product) => capitalize(product),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
