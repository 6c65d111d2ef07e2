use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{EmailConfig, EmailTransportConfig};

/// A unit of outbound mail handed to the dispatch worker. Jobs are
/// fire-and-forget: no caller ever awaits the delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailJob {
    Welcome {
        email: String,
        username: String,
        verify_url: String,
    },
    PasswordReset {
        email: String,
        reset_url: String,
    },
}

impl EmailJob {
    fn recipient(&self) -> &str {
        match self {
            EmailJob::Welcome { email, .. } => email,
            EmailJob::PasswordReset { email, .. } => email,
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            EmailJob::Welcome { .. } => "Welcome!",
            EmailJob::PasswordReset { .. } => "Reset password",
        }
    }

    fn body(&self) -> String {
        match self {
            EmailJob::Welcome {
                username,
                verify_url,
                ..
            } => format!("Hello {username}.\nWelcome.\nVerify: {verify_url}"),
            EmailJob::PasswordReset { reset_url, .. } => {
                format!("Use this link to reset: {reset_url}")
            }
        }
    }
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> anyhow::Result<Self> {
        let transport = match &config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    warn!("SMTP TLS is disabled");
                }
                let builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                        .context("create SMTP transport")?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                };
                let smtp = builder
                    .port(*port)
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build();
                EmailTransport::Smtp(smtp)
            }
            EmailTransportConfig::File { path } => {
                let dir = Path::new(path);
                if !dir.exists() {
                    std::fs::create_dir_all(dir).context("create emails directory")?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir))
            }
        };

        Ok(Self {
            transport,
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }

    pub async fn send(&self, job: &EmailJob) -> anyhow::Result<()> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .context("parse from address")?;
        let to = job
            .recipient()
            .parse::<Mailbox>()
            .context("parse recipient address")?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(job.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(job.body())
            .context("build message")?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.context("send SMTP email")?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.context("write email to file")?;
            }
        }
        Ok(())
    }

    /// Checks the outbound transport. The file transport is always reachable.
    pub async fn check_transport(&self) -> anyhow::Result<()> {
        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                let ok = smtp.test_connection().await.context("SMTP connection")?;
                anyhow::ensure!(ok, "SMTP relay refused the connection");
                Ok(())
            }
            EmailTransport::File(_) => Ok(()),
        }
    }
}

/// Cloneable handle to the dispatch worker. Held in `AppState`.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<EmailJob>,
    service: Arc<EmailService>,
}

impl Mailer {
    /// Starts the worker task draining the job channel. Delivery failures are
    /// logged and swallowed; nothing is retried at this layer.
    pub fn spawn(service: EmailService) -> Self {
        let service = Arc::new(service);
        let (tx, mut rx) = mpsc::channel::<EmailJob>(256);

        let worker_service = service.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let to = job.recipient().to_string();
                match worker_service.send(&job).await {
                    Ok(()) => info!(%to, "email sent"),
                    Err(e) => error!(%to, error = %e, "email delivery failed"),
                }
            }
            info!("email worker stopped");
        });

        Self { tx, service }
    }

    /// Hands a job to the worker without waiting. A full or closed channel
    /// drops the job with a warning.
    pub fn enqueue(&self, job: EmailJob) {
        if let Err(e) = self.tx.try_send(job) {
            warn!(error = %e, "email job dropped");
        }
    }

    pub async fn check_transport(&self) -> anyhow::Result<()> {
        self.service.check_transport().await
    }

    /// A handle whose worker never runs. Enqueued jobs are dropped. Tests only.
    pub fn disconnected() -> Self {
        let (tx, rx) = mpsc::channel::<EmailJob>(1);
        drop(rx);
        Self {
            tx,
            service: Arc::new(Self::test_service()),
        }
    }

    /// A handle with no worker attached: the paired receiver observes every
    /// enqueued job. Tests only.
    pub fn capture() -> (Self, mpsc::Receiver<EmailJob>) {
        let (tx, rx) = mpsc::channel::<EmailJob>(16);
        let mailer = Self {
            tx,
            service: Arc::new(Self::test_service()),
        };
        (mailer, rx)
    }

    fn test_service() -> EmailService {
        EmailService::new(&crate::config::EmailConfig {
            transport: EmailTransportConfig::File {
                path: std::env::temp_dir()
                    .join("storefront-test-emails")
                    .to_string_lossy()
                    .into_owned(),
            },
            from_email: "no-reply@example.com".into(),
            from_name: "Storefront".into(),
        })
        .expect("file transport")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_body_carries_verification_link() {
        let job = EmailJob::Welcome {
            email: "alice@x.com".into(),
            username: "alice".into(),
            verify_url: "http://localhost:8080/api/auth/verify-email?token=abc".into(),
        };
        assert_eq!(job.subject(), "Welcome!");
        assert!(job.body().contains("Hello alice."));
        assert!(job.body().contains("verify-email?token=abc"));
    }

    #[test]
    fn reset_body_carries_reset_link() {
        let job = EmailJob::PasswordReset {
            email: "alice@x.com".into(),
            reset_url: "http://localhost:8080/api/auth/reset-password/?uid=1&token=t".into(),
        };
        assert_eq!(job.subject(), "Reset password");
        assert!(job.body().contains("reset-password/?uid=1&token=t"));
    }

    #[tokio::test]
    async fn disconnected_mailer_drops_jobs_quietly() {
        let mailer = Mailer::disconnected();
        // Receiver is gone; this must not panic or block.
        mailer.enqueue(EmailJob::PasswordReset {
            email: "a@b.c".into(),
            reset_url: "http://x".into(),
        });
    }

    #[tokio::test]
    async fn capture_exposes_enqueued_jobs() {
        let (mailer, mut rx) = Mailer::capture();
        let job = EmailJob::PasswordReset {
            email: "a@b.c".into(),
            reset_url: "http://x".into(),
        };
        mailer.enqueue(job.clone());
        assert_eq!(rx.try_recv().expect("job observed"), job);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn file_transport_is_always_reachable() {
        let mailer = Mailer::disconnected();
        mailer.check_transport().await.expect("file transport healthy");
    }
}
