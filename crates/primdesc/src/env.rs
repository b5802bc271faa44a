use std::env;
use std::sync::OnceLock;

static PRIMDESC_VERBOSE: OnceLock<bool> = OnceLock::new();
static PRIMDESC_POOLING_IMPL: OnceLock<Option<String>> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// `PRIMDESC_VERBOSE`: log a summary line for every created descriptor.
pub(crate) fn verbose_enabled() -> bool {
    *PRIMDESC_VERBOSE.get_or_init(|| match env::var("PRIMDESC_VERBOSE") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

/// `PRIMDESC_POOLING_IMPL`: raw implementation policy string, see `ImplPolicy::parse`.
pub(crate) fn pooling_impl_override() -> Option<&'static str> {
    PRIMDESC_POOLING_IMPL
        .get_or_init(|| match env::var("PRIMDESC_POOLING_IMPL") {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            _ => None,
        })
        .as_deref()
}

#[cfg(test)]
mod tests {
    use super::parse_bool;

    #[test]
    fn parse_bool_accepts_common_truthy_spellings() {
        for value in ["1", "true", "YES", " on "] {
            assert!(parse_bool(value), "{value:?} should parse as true");
        }
    }

    #[test]
    fn parse_bool_rejects_everything_else() {
        for value in ["0", "false", "off", "", "enabled"] {
            assert!(!parse_bool(value), "{value:?} should parse as false");
        }
    }
}
