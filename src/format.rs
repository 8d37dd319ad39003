use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::Url;
use uuid::Uuid;

static HOSTNAME_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap());

/// Checks `value` against a named format. Unknown names always pass so that
/// schemas written for richer validators still compile and run.
pub fn is_valid_format(format: &str, value: &str) -> bool {
    match format {
        "date-time" => DateTime::parse_from_rfc3339(value).is_ok(),
        "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        "time" => DateTime::parse_from_rfc3339(&format!("1970-01-01T{}", value)).is_ok(),
        "email" => is_email(value),
        "hostname" => is_hostname(value),
        "ipv4" => value.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => value.parse::<Ipv6Addr>().is_ok(),
        "uri" => Url::parse(value).is_ok(),
        "uri-reference" => is_uri_reference(value),
        "regex" => Regex::new(value).is_ok(),
        "uuid" => is_uuid(value),
        _ => true,
    }
}

fn is_email(value: &str) -> bool {
    match value.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !local.contains(char::is_whitespace)
                && !local.contains('@')
                && is_hostname(domain)
        }
        None => false,
    }
}

// Only the hyphenated form; the parser alone also takes simple, braced and urn forms.
fn is_uuid(value: &str) -> bool {
    value.len() == 36 && Uuid::parse_str(value).is_ok()
}

fn is_hostname(value: &str) -> bool {
    let value = value.strip_suffix('.').unwrap_or(value);
    !value.is_empty() && value.len() <= 253 && value.split('.').all(|label| HOSTNAME_LABEL.is_match(label))
}

fn is_uri_reference(value: &str) -> bool {
    if value.contains(|c: char| c.is_whitespace() || c == '\\') {
        return false;
    }

    Url::parse(value).is_ok()
        || Url::parse("json-schema:///")
            .and_then(|base| base.join(value))
            .is_ok()
}

#[cfg(test)]
mod tests {
    use super::is_valid_format;

    #[test]
    fn dates_and_times() {
        assert!(is_valid_format("date-time", "1963-06-19T08:30:06.283185Z"));
        assert!(is_valid_format("date-time", "1963-06-19T08:30:06+02:00"));
        assert!(!is_valid_format("date-time", "06/19/1963 08:30:06 PST"));
        assert!(is_valid_format("date", "1963-06-19"));
        assert!(!is_valid_format("date", "1963-13-19"));
        assert!(is_valid_format("time", "08:30:06Z"));
        assert!(!is_valid_format("time", "8:30 AM"));
    }

    #[test]
    fn network_names() {
        assert!(is_valid_format("email", "joe.bloggs@example.com"));
        assert!(!is_valid_format("email", "2962"));
        assert!(!is_valid_format("email", "a b@example.com"));
        assert!(is_valid_format("hostname", "www.example.com"));
        assert!(!is_valid_format("hostname", "-a-host-name-that-starts-with--"));
        assert!(!is_valid_format("hostname", &"a".repeat(64)));
        assert!(is_valid_format("ipv4", "192.168.0.1"));
        assert!(!is_valid_format("ipv4", "256.256.256.256"));
        assert!(is_valid_format("ipv6", "::1"));
        assert!(!is_valid_format("ipv6", "12345::"));
    }

    #[test]
    fn references_and_patterns() {
        assert!(is_valid_format("uri", "http://foo.bar/?baz=qux#quux"));
        assert!(!is_valid_format("uri", "//foo.bar/?baz=qux#quux"));
        assert!(is_valid_format("uri-reference", "//foo.bar/?baz=qux#quux"));
        assert!(is_valid_format("uri-reference", "#fragment"));
        assert!(!is_valid_format("uri-reference", "\\\\WINDOWS\\fileshare"));
        assert!(is_valid_format("regex", "([abc])+\\s+$"));
        assert!(!is_valid_format("regex", "^(abc]"));
        assert!(is_valid_format("uuid", "2eb8aa08-aa98-11ea-b4aa-73b441d16380"));
        assert!(!is_valid_format("uuid", "2eb8aa08-aa98-11ea-b4aa-73b441d1638"));
        assert!(!is_valid_format("uuid", "2eb8aa08aa9811eab4aa73b441d16380"));
        assert!(!is_valid_format("uuid", "{2eb8aa08-aa98-11ea-b4aa-73b441d16380}"));
        assert!(!is_valid_format("uuid", "2eb8aa08-aa98-11ea-b4aa-73b441d1638g"));
    }

    #[test]
    fn unknown_formats_pass() {
        assert!(is_valid_format("credit-card", "definitely not"));
    }
}
