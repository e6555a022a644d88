//! Raw-socket SMTP callout: connect, greet, EHLO/HELO, optional STARTTLS,
//! MAIL FROM / RCPT TO, QUIT. No crate does RCPT-TO callout verification, so
//! this speaks the wire protocol directly over `tokio::net::TcpStream`,
//! using the same timeout-wrapped-I/O idiom the rest of this crate uses for
//! any other raw-protocol client.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::debug;

use crate::config::SmtpConfig;
use crate::errors::VerifyError;

/// Outcome of a single RCPT-TO callout against one MX host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutOutcome {
    Accepted,
    Transient,
    Rejected,
}

/// Run the full callout sequence against `host` for `candidate`. Does not
/// interpret the outcome beyond the raw SMTP reply code bucket — mapping to
/// `EmailStatus` happens one layer up.
pub async fn callout(config: &SmtpConfig, host: &str, candidate: &str) -> Result<CalloutOutcome, VerifyError> {
    let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect((host, config.port)))
        .await
        .map_err(|_| VerifyError::Timeout)?
        .map_err(VerifyError::ConnectFailed)?;

    let mut session = SmtpSession::Plain(BufReader::new(stream));

    let greeting = session.read_multiline_reply(config.command_timeout).await?;
    if !greeting.starts_with("220") {
        return Ok(bucket_for_code(&greeting));
    }

    let ehlo_reply = session
        .command(&format!("EHLO {}\r\n", config.helo_host), config.command_timeout)
        .await?;
    let capabilities = if ehlo_reply.starts_with("250") {
        ehlo_reply
    } else {
        session
            .command(&format!("HELO {}\r\n", config.helo_host), config.command_timeout)
            .await?
    };

    if config.try_starttls && capabilities.to_uppercase().contains("STARTTLS") {
        let starttls_reply = session.command("STARTTLS\r\n", config.command_timeout).await?;
        if starttls_reply.starts_with("220") {
            session = session.upgrade_to_tls(host, config.command_timeout).await?;
            session
                .command(&format!("EHLO {}\r\n", config.helo_host), config.command_timeout)
                .await?;
        }
    }

    session
        .command(&format!("MAIL FROM:<{}>\r\n", config.mail_from), config.command_timeout)
        .await?;
    let rcpt_reply = session
        .command(&format!("RCPT TO:<{candidate}>\r\n"), config.command_timeout)
        .await?;
    let _ = session.command("QUIT\r\n", config.command_timeout).await;

    Ok(bucket_for_code(&rcpt_reply))
}

/// Repeat the callout with a random 12-hex-char local part to detect a
/// catch-all domain.
pub async fn catch_all_probe(config: &SmtpConfig, host: &str, domain: &str) -> Result<bool, VerifyError> {
    let random_local: String = {
        let mut rng = rand::rng();
        (0..12).map(|_| std::char::from_digit(rng.random_range(0..16), 16).unwrap()).collect()
    };
    let probe_address = format!("{random_local}@{domain}");
    let outcome = callout(config, host, &probe_address).await?;
    Ok(outcome == CalloutOutcome::Accepted)
}

fn bucket_for_code(reply: &str) -> CalloutOutcome {
    let code = reply.get(0..3).unwrap_or("");
    match code {
        "250" => CalloutOutcome::Accepted,
        "421" | "450" | "451" | "452" => CalloutOutcome::Transient,
        _ => CalloutOutcome::Rejected,
    }
}

enum SmtpSession {
    Plain(BufReader<TcpStream>),
    Tls(BufReader<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl SmtpSession {
    async fn command(&mut self, cmd: &str, timeout: Duration) -> Result<String, VerifyError> {
        self.write_all(cmd.as_bytes(), timeout).await?;
        self.read_multiline_reply(timeout).await
    }

    async fn write_all(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), VerifyError> {
        let result = match self {
            SmtpSession::Plain(s) => tokio::time::timeout(timeout, s.write_all(bytes)).await,
            SmtpSession::Tls(s) => tokio::time::timeout(timeout, s.write_all(bytes)).await,
        };
        result.map_err(|_| VerifyError::Timeout)?.map_err(|e| VerifyError::Protocol(e.to_string()))
    }

    /// Accumulate multi-line `"ddd-"` continuation replies until a final
    /// `"ddd "` line, regardless of how many continuation lines precede it.
    async fn read_multiline_reply(&mut self, timeout: Duration) -> Result<String, VerifyError> {
        let mut full_reply = String::new();
        loop {
            let mut line = String::new();
            let read_result = match self {
                SmtpSession::Plain(s) => tokio::time::timeout(timeout, s.read_line(&mut line)).await,
                SmtpSession::Tls(s) => tokio::time::timeout(timeout, s.read_line(&mut line)).await,
            };
            let n = read_result
                .map_err(|_| VerifyError::Timeout)?
                .map_err(|e| VerifyError::Protocol(e.to_string()))?;
            if n == 0 {
                return Err(VerifyError::Protocol("connection closed mid-reply".to_string()));
            }
            full_reply.push_str(&line);
            let is_final = line.len() >= 4 && line.as_bytes()[3] == b' ';
            if is_final {
                break;
            }
        }
        debug!(reply = %full_reply.trim(), "smtp reply");
        Ok(full_reply)
    }

    async fn upgrade_to_tls(self, host: &str, timeout: Duration) -> Result<Self, VerifyError> {
        let SmtpSession::Plain(reader) = self else {
            return Err(VerifyError::Protocol("already upgraded".to_string()));
        };
        let stream = reader.into_inner();

        let mut config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
            .with_no_client_auth();
        config.enable_sni = true;

        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| VerifyError::Protocol(format!("invalid server name: {host}")))?;

        let tls_stream = tokio::time::timeout(timeout, connector.connect(server_name, stream))
            .await
            .map_err(|_| VerifyError::Timeout)?
            .map_err(|e| VerifyError::Protocol(e.to_string()))?;

        Ok(SmtpSession::Tls(BufReader::new(tls_stream)))
    }
}

/// MX chains routinely present invalid/self-signed certificates; this
/// verifier accepts any certificate because the callout's trust model is
/// "can we complete a TLS handshake", not "is this the expected operator".
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_success_code() {
        assert_eq!(bucket_for_code("250 OK\r\n"), CalloutOutcome::Accepted);
    }

    #[test]
    fn buckets_transient_codes() {
        for code in ["421", "450", "451", "452"] {
            assert_eq!(bucket_for_code(&format!("{code} try later\r\n")), CalloutOutcome::Transient);
        }
    }

    #[test]
    fn buckets_terminal_rejection() {
        assert_eq!(bucket_for_code("550 no such user\r\n"), CalloutOutcome::Rejected);
    }
}
