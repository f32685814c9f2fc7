//! Tunnel spec resolution from CLI arguments and the environment
//!
//! Specs come from repeated `--tunnel` arguments and from `TUNNEL_1`,
//! `TUNNEL_2`, ... environment variables, scanned from 1 upward until the
//! first missing index. A malformed entry is logged and skipped; it does
//! not abort loading of the remaining entries.

use portgate_proto::TunnelSpec;
use tracing::error;

/// Resolve the full ordered spec set: CLI entries first, then `TUNNEL_n`
/// environment variables.
pub fn resolve_specs(cli_entries: &[String]) -> Vec<TunnelSpec> {
    resolve_specs_with(cli_entries, |name| std::env::var(name).ok())
}

/// Spec resolution against an injected variable lookup, so tests never
/// touch the process environment.
fn resolve_specs_with(
    cli_entries: &[String],
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<TunnelSpec> {
    let mut entries = cli_entries.to_vec();
    for i in 1.. {
        match lookup(&format!("TUNNEL_{i}")) {
            Some(value) => entries.push(value),
            None => break,
        }
    }

    entries
        .iter()
        .filter_map(|entry| match entry.parse::<TunnelSpec>() {
            Ok(spec) => Some(spec),
            Err(e) => {
                error!("failed to parse tunnel config: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(entries: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            entries
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn collects_consecutive_env_specs() {
        let specs = resolve_specs_with(
            &[],
            lookup(&[
                ("TUNNEL_1", "127.0.0.1:9090>remote:5432"),
                ("TUNNEL_2", ":8080>other:80"),
            ]),
        );
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].local_addr, "127.0.0.1:9090");
        assert_eq!(specs[1].remote_addr, "other:80");
    }

    #[test]
    fn stops_at_the_first_env_gap() {
        let specs = resolve_specs_with(
            &[],
            lookup(&[("TUNNEL_1", "a:1>b:1"), ("TUNNEL_3", "a:3>b:3")]),
        );
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].local_addr, "a:1");
    }

    #[test]
    fn skips_malformed_entries_without_aborting() {
        let specs = resolve_specs_with(
            &[],
            lookup(&[
                ("TUNNEL_1", "a:1>b:1"),
                ("TUNNEL_2", "not-a-spec"),
                ("TUNNEL_3", "a:3>b:3"),
            ]),
        );
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].local_addr, "a:3");
    }

    #[test]
    fn cli_entries_come_before_env_entries() {
        let specs = resolve_specs_with(
            &["127.0.0.1:1>cli:1".to_string()],
            lookup(&[("TUNNEL_1", "127.0.0.1:2>env:2")]),
        );
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].remote_addr, "cli:1");
        assert_eq!(specs[1].remote_addr, "env:2");
    }

    #[test]
    fn empty_sources_resolve_to_no_specs() {
        let specs = resolve_specs_with(&[], lookup(&[]));
        assert!(specs.is_empty());
    }
}
