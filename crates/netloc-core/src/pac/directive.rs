use tracing::warn;

use crate::error::CoreError;
use crate::model::ProxyDirective;

/// Split an auto-discovery answer such as `"PROXY p1:8080; SOCKS s:1080; DIRECT"`
/// into directives, preserving order.
///
/// Malformed entries are dropped and returned alongside the good ones so
/// the caller can report them; a partial list is still usable.
pub fn parse_directives(answer: &str) -> (Vec<ProxyDirective>, Vec<CoreError>) {
    let mut directives = Vec::new();
    let mut skipped = Vec::new();

    for token in answer.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<ProxyDirective>() {
            Ok(directive) => directives.push(directive),
            Err(e) => {
                warn!(error = %e, "skipping proxy directive");
                skipped.push(e);
            }
        }
    }

    (directives, skipped)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keeps_order() {
        let (directives, skipped) = parse_directives("PROXY p1:8080; PROXY p2:8080; DIRECT");
        assert!(skipped.is_empty());
        assert_eq!(
            directives,
            vec![
                ProxyDirective::HttpProxy {
                    host: "p1".into(),
                    port: 8080
                },
                ProxyDirective::HttpProxy {
                    host: "p2".into(),
                    port: 8080
                },
                ProxyDirective::Direct,
            ]
        );
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let (directives, skipped) =
            parse_directives("PROXY ; BOGUS thing:1; SOCKS s1:1080;; DIRECT;");
        assert_eq!(skipped.len(), 2);
        assert_eq!(
            directives,
            vec![
                ProxyDirective::SocksProxy {
                    host: "s1".into(),
                    port: 1080
                },
                ProxyDirective::Direct,
            ]
        );
    }

    #[test]
    fn empty_answer_yields_nothing() {
        let (directives, skipped) = parse_directives("  ;  ");
        assert!(directives.is_empty());
        assert!(skipped.is_empty());
    }
}
