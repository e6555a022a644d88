//! MX (then A/AAAA fallback) resolution stage.

use hickory_resolver::Resolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use rand::seq::SliceRandom;

use crate::errors::VerifyError;

pub type DnsResolver = Resolver<TokioConnectionProvider>;

#[must_use]
pub fn build_resolver() -> DnsResolver {
    Resolver::tokio(ResolverConfig::default(), ResolverOpts::default())
}

/// Resolve mail exchangers for `domain`, sorted ascending by priority, with
/// a uniform shuffle within equal-priority groups. Falls back to the
/// domain's own A/AAAA records when no MX record exists.
pub async fn resolve_mail_hosts(resolver: &DnsResolver, domain: &str) -> Result<Vec<String>, VerifyError> {
    match resolver.mx_lookup(domain).await {
        Ok(lookup) => {
            let mut records: Vec<(u16, String)> = lookup
                .iter()
                .map(|mx| (mx.preference(), mx.exchange().to_string()))
                .collect();

            if records.is_empty() {
                return resolve_host_fallback(resolver, domain).await;
            }

            shuffle_within_priority_groups(&mut records);
            Ok(records.into_iter().map(|(_, host)| host).collect())
        }
        Err(_) => resolve_host_fallback(resolver, domain).await,
    }
}

async fn resolve_host_fallback(resolver: &DnsResolver, domain: &str) -> Result<Vec<String>, VerifyError> {
    resolver
        .lookup_ip(domain)
        .await
        .map(|_| vec![domain.to_string()])
        .map_err(|_| VerifyError::NoMailExchanger(domain.to_string()))
}

fn shuffle_within_priority_groups(records: &mut [(u16, String)]) {
    records.sort_by_key(|(priority, _)| *priority);
    let mut rng = rand::rng();
    let mut start = 0;
    while start < records.len() {
        let mut end = start + 1;
        while end < records.len() && records[end].0 == records[start].0 {
            end += 1;
        }
        records[start..end].shuffle(&mut rng);
        start = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_preserves_priority_ordering() {
        let mut records = vec![
            (20, "b.example.com".to_string()),
            (10, "a.example.com".to_string()),
            (10, "a2.example.com".to_string()),
        ];
        shuffle_within_priority_groups(&mut records);
        assert_eq!(records[0].0, 10);
        assert_eq!(records[1].0, 10);
        assert_eq!(records[2].0, 20);
    }
}
