//! Email Verifier: normalize -> syntax -> MX/A fallback -> SMTP callout ->
//! catch-all probe, chained into one pipeline per candidate address.

mod dns;
mod normalize;
mod smtp;

pub use dns::{build_resolver, resolve_mail_hosts, DnsResolver};
pub use smtp::CalloutOutcome;

use futures::future::select_ok;

use crate::config::SmtpConfig;
use crate::model::{EmailStatus, EmailVerification, EmailVerificationDetail, EmailVerificationMode};

const MAX_PARALLEL_MX_HOSTS: usize = 2;

const ROLE_PREFIXES: &[&str] = &[
    "admin",
    "administrator",
    "postmaster",
    "webmaster",
    "hostmaster",
    "abuse",
    "noreply",
    "no-reply",
    "support",
    "help",
    "sales",
    "info",
    "billing",
];

const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "10minutemail.com",
    "guerrillamail.com",
    "tempmail.com",
    "yopmail.com",
    "trashmail.com",
];

/// Verify every candidate address for one business. `fallback_on_failure`
/// mirrors the pipeline config flag: when every probed address looks
/// globally blocked (connect refused/timeout on all hosts), the caller asked
/// us to strip the emails rather than report a misleading `risky` status.
pub async fn verify_emails(
    resolver: &DnsResolver,
    smtp_config: &SmtpConfig,
    emails: &[String],
) -> EmailVerification {
    let mut details = Vec::with_capacity(emails.len());
    for email in emails {
        details.push(verify_one(resolver, smtp_config, email).await);
    }

    let all_blocked = !details.is_empty()
        && details
            .iter()
            .all(|d| matches!(d.status, EmailStatus::Error) && is_connect_class_reason(d.reason.as_deref()));

    let mode = if all_blocked {
        EmailVerificationMode::Fallback
    } else {
        EmailVerificationMode::Verified
    };

    EmailVerification { mode, details }
}

fn is_connect_class_reason(reason: Option<&str>) -> bool {
    reason.is_some_and(|r| {
        let lower = r.to_lowercase();
        lower.contains("connect") || lower.contains("refused") || lower.contains("timeout")
    })
}

async fn verify_one(resolver: &DnsResolver, smtp_config: &SmtpConfig, raw: &str) -> EmailVerificationDetail {
    let (local, domain) = match normalize::normalize(raw) {
        Ok(pair) => pair,
        Err(e) => {
            return EmailVerificationDetail {
                email: raw.to_string(),
                status: EmailStatus::Undeliverable,
                catch_all: false,
                reason: Some(e.to_string()),
            }
        }
    };
    let candidate = format!("{local}@{domain}");

    if let Err(e) = normalize::check_syntax(&local, &domain) {
        return EmailVerificationDetail {
            email: candidate,
            status: EmailStatus::Undeliverable,
            catch_all: false,
            reason: Some(e.to_string()),
        };
    }

    let hosts = match dns::resolve_mail_hosts(resolver, &domain).await {
        Ok(hosts) => hosts,
        Err(e) => {
            return EmailVerificationDetail {
                email: candidate,
                status: EmailStatus::Undeliverable,
                catch_all: false,
                reason: Some(e.to_string()),
            }
        }
    };

    let probe_hosts: Vec<&String> = hosts.iter().take(MAX_PARALLEL_MX_HOSTS).collect();
    let callout_result = race_hosts(smtp_config, &probe_hosts, &candidate).await;

    let mut detail = match callout_result {
        Ok((outcome, host)) => match outcome {
            CalloutOutcome::Accepted => {
                let catch_all = smtp_config.catchall_probe
                    && smtp::catch_all_probe(smtp_config, &host, &domain).await.unwrap_or(false);
                EmailVerificationDetail {
                    email: candidate.clone(),
                    status: if catch_all { EmailStatus::Risky } else { EmailStatus::Deliverable },
                    catch_all,
                    reason: if catch_all { Some("catch-all-domain".to_string()) } else { None },
                }
            }
            CalloutOutcome::Transient => EmailVerificationDetail {
                email: candidate.clone(),
                status: EmailStatus::Risky,
                catch_all: false,
                reason: Some("transient SMTP failure".to_string()),
            },
            CalloutOutcome::Rejected => EmailVerificationDetail {
                email: candidate.clone(),
                status: EmailStatus::Undeliverable,
                catch_all: false,
                reason: Some("SMTP rejected recipient".to_string()),
            },
        },
        Err(e) => EmailVerificationDetail {
            email: candidate.clone(),
            status: EmailStatus::Error,
            catch_all: false,
            reason: Some(e.to_string()),
        },
    };

    annotate(&mut detail, &local, &domain);
    detail
}

/// Probe up to two MX hosts concurrently; the first accepted/transient reply
/// wins. Falls through to the last error if every host errors outright.
async fn race_hosts(
    config: &SmtpConfig,
    hosts: &[&String],
    candidate: &str,
) -> Result<(CalloutOutcome, String), crate::errors::VerifyError> {
    if hosts.is_empty() {
        return Err(crate::errors::VerifyError::NoMailExchanger(candidate.to_string()));
    }

    let futures: Vec<_> = hosts
        .iter()
        .map(|host| {
            let host = (*host).clone();
            let candidate = candidate.to_string();
            Box::pin(async move {
                let outcome = smtp::callout(config, &host, &candidate).await?;
                Ok::<_, crate::errors::VerifyError>((outcome, host))
            })
        })
        .collect();

    select_ok(futures).await.map(|(pair, _rest)| pair)
}

fn annotate(detail: &mut EmailVerificationDetail, local: &str, domain: &str) {
    let mut notes = Vec::new();
    if ROLE_PREFIXES.contains(&local.to_lowercase().as_str()) {
        notes.push("role address".to_string());
    }
    if DISPOSABLE_DOMAINS.contains(&domain) {
        notes.push("disposable domain".to_string());
    }
    if notes.is_empty() {
        return;
    }
    detail.reason = Some(match &detail.reason {
        Some(existing) => format!("{existing}; {}", notes.join(", ")),
        None => notes.join(", "),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_prefixes_contain_common_mailbox_names() {
        assert!(ROLE_PREFIXES.contains(&"admin"));
        assert!(ROLE_PREFIXES.contains(&"no-reply"));
    }

    #[test]
    fn annotate_appends_role_note_without_disturbing_status() {
        let mut detail = EmailVerificationDetail {
            email: "admin@acme.com".to_string(),
            status: EmailStatus::Deliverable,
            catch_all: false,
            reason: None,
        };
        annotate(&mut detail, "admin", "acme.com");
        assert_eq!(detail.status, EmailStatus::Deliverable);
        assert_eq!(detail.reason.as_deref(), Some("role address"));
    }

    #[test]
    fn annotate_flags_disposable_domain() {
        let mut detail = EmailVerificationDetail {
            email: "owner@mailinator.com".to_string(),
            status: EmailStatus::Deliverable,
            catch_all: false,
            reason: None,
        };
        annotate(&mut detail, "owner", "mailinator.com");
        assert_eq!(detail.reason.as_deref(), Some("disposable domain"));
    }
}
