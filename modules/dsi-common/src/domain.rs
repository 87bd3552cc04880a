//! Root-domain normalization (§3, §4.6.3).

/// Second-level labels that keep a third label when it's followed by a
/// two-letter country code (`co.uk`, `com.au`, ...).
const SECOND_LEVEL_LABELS: [&str; 7] = ["co", "com", "org", "net", "gov", "edu", "ac"];

/// Normalize a hostname to its root domain: lowercase, strip a leading
/// `www.`, and retain two TLD labels (three when the next-to-last label is
/// one of the fixed second-level labels and the last label is a two-letter
/// country code). Idempotent: `normalize(normalize(d)) == normalize(d)`.
pub fn normalize_domain(host: &str) -> String {
    let lower = host.trim().to_ascii_lowercase();
    let lower = lower.strip_prefix("www.").unwrap_or(&lower);

    let labels: Vec<&str> = lower.split('.').filter(|s| !s.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }

    let last = labels[labels.len() - 1];
    let second_to_last = labels[labels.len() - 2];

    let keep_three = last.len() == 2 && SECOND_LEVEL_LABELS.contains(&second_to_last);

    let keep = if keep_three { 3 } else { 2 };
    labels[labels.len() - keep..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_and_lowercases() {
        assert_eq!(normalize_domain("WWW.Example.com"), "example.com");
    }

    #[test]
    fn keeps_two_labels_by_default() {
        assert_eq!(normalize_domain("blog.vendor.example.com"), "example.com");
    }

    #[test]
    fn keeps_three_labels_for_country_code_second_level() {
        assert_eq!(normalize_domain("shop.acme.co.uk"), "acme.co.uk");
        assert_eq!(normalize_domain("acme.com.au"), "acme.com.au");
    }

    #[test]
    fn does_not_extend_ordinary_country_codes() {
        // "de" is not in the fixed second-level list, so only two labels kept.
        assert_eq!(normalize_domain("sub.acme.de"), "acme.de");
    }

    #[test]
    fn is_idempotent() {
        for host in ["WWW.Example.com", "shop.acme.co.uk", "sub.acme.de", "plain.io"] {
            let once = normalize_domain(host);
            let twice = normalize_domain(&once);
            assert_eq!(once, twice, "normalize not idempotent for {host}");
        }
    }
}
