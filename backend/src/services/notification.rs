//! Critical stock alert delivery
//!
//! Alerts are sent after the stock mutation that raised them has committed.
//! A delivery failure is logged and swallowed; it never undoes the mutation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use shared::CriticalStockAlert;
use tracing::{error, info, warn};

use crate::config::{AlertsConfig, SmtpConfig};
use crate::error::{AppError, AppResult};

/// Sink for critical stock alerts
#[async_trait]
pub trait StockAlertNotifier: Send + Sync {
    async fn notify(&self, alert: &CriticalStockAlert, recipients: &[String]) -> AppResult<()>;
}

/// Writes alerts to the log only; used when no SMTP relay is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl StockAlertNotifier for LogNotifier {
    async fn notify(&self, alert: &CriticalStockAlert, recipients: &[String]) -> AppResult<()> {
        warn!(
            code = %alert.code,
            stock = %alert.stock,
            critical_stock = %alert.critical_stock,
            recipients = recipients.len(),
            "Critical stock reached"
        );
        Ok(())
    }
}

/// Sends alerts by email through an SMTP relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let transport = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        }
        .map_err(|e| AppError::Configuration(format!("SMTP relay {}: {}", config.host, e)))?
        .port(config.port)
        .credentials(credentials)
        .timeout(Some(Duration::from_secs(30)))
        .build();

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Configuration(format!("alerts.smtp.from: {}", e)))?;

        Ok(Self { transport, from })
    }

    fn build_message(&self, alert: &CriticalStockAlert, to: &str) -> AppResult<Message> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::validation("recipients", format!("{}: {}", to, e)))?;

        let body = format!(
            "El bien {} ({}) alcanzó su stock crítico.\n\nStock actual: {}\nStock crítico: {}\n",
            alert.name, alert.code, alert.stock, alert.critical_stock
        );

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("Stock crítico: {} ({})", alert.name, alert.code))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::Internal(format!("Failed to build alert email: {}", e)))
    }
}

#[async_trait]
impl StockAlertNotifier for SmtpNotifier {
    async fn notify(&self, alert: &CriticalStockAlert, recipients: &[String]) -> AppResult<()> {
        for recipient in recipients {
            let message = self.build_message(alert, recipient)?;
            self.transport
                .send(message)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to send alert email: {}", e)))?;
            info!(code = %alert.code, to = %recipient, "Critical stock alert sent");
        }
        Ok(())
    }
}

/// Notifier plus its recipient list, shared by the services that move stock
#[derive(Clone)]
pub struct StockAlerts {
    notifier: Arc<dyn StockAlertNotifier>,
    recipients: Arc<Vec<String>>,
}

impl StockAlerts {
    pub fn new(notifier: Arc<dyn StockAlertNotifier>, recipients: Vec<String>) -> Self {
        Self {
            notifier,
            recipients: Arc::new(recipients),
        }
    }

    /// SMTP when a relay is configured, log-only otherwise
    pub fn from_config(config: &AlertsConfig) -> AppResult<Self> {
        for recipient in &config.recipients {
            shared::validation::validate_email(recipient)
                .map_err(|e| AppError::Configuration(format!("alerts.recipients {}: {}", recipient, e)))?;
        }

        let notifier: Arc<dyn StockAlertNotifier> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
            None => Arc::new(LogNotifier),
        };
        Ok(Self::new(notifier, config.recipients.clone()))
    }

    /// Deliver every alert; failures are logged and dropped
    pub async fn send_all(&self, alerts: Vec<CriticalStockAlert>) {
        for alert in alerts {
            if let Err(e) = self.notifier.notify(&alert, &self.recipients).await {
                error!(code = %alert.code, "Critical stock alert not delivered: {:?}", e);
            }
        }
    }
}

impl Default for StockAlerts {
    fn default() -> Self {
        Self::new(Arc::new(LogNotifier), Vec::new())
    }
}
