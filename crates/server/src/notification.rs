use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info};
use webfit_core::config::NotificationConfig;
use webfit_core::submission::{NoopNotifier, NotificationError, Notifier, SubmissionRecord};

/// Posts `{"record": ...}` to the configured webhook for every new submission.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    api_key: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into(), api_key })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), NotificationError> {
        let mut request = self.client.post(&self.url).json(&json!({ "record": record }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| NotificationError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected { status: status.as_u16() });
        }

        debug!(
            event_name = "notification.delivered",
            submission_id = %record.id.0,
            status = status.as_u16(),
            "submission notification delivered"
        );
        Ok(())
    }
}

/// The notifier selected by configuration.
pub enum ConfiguredNotifier {
    Webhook(WebhookNotifier),
    Disabled(NoopNotifier),
}

impl ConfiguredNotifier {
    pub fn from_config(config: &NotificationConfig) -> Result<Self, reqwest::Error> {
        match (&config.webhook_url, config.enabled) {
            (Some(url), true) => {
                info!(
                    event_name = "system.notification.webhook_enabled",
                    correlation_id = "bootstrap",
                    timeout_secs = config.timeout_secs,
                    "submission notifications enabled"
                );
                let timeout = Duration::from_secs(config.timeout_secs);
                Ok(Self::Webhook(WebhookNotifier::new(url, config.api_key.clone(), timeout)?))
            }
            _ => Ok(Self::Disabled(NoopNotifier)),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Webhook(_) => "webhook",
            Self::Disabled(_) => "disabled",
        }
    }
}

#[async_trait]
impl Notifier for ConfiguredNotifier {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), NotificationError> {
        match self {
            Self::Webhook(notifier) => notifier.notify(record).await,
            Self::Disabled(notifier) => notifier.notify(record).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use webfit_core::config::NotificationConfig;
    use webfit_core::domain::answers::{AnswerSet, ContactDetails};
    use webfit_core::submission::{
        NotificationError, Notifier, SubmissionPayload, SubmissionRecord,
    };
    use webfit_core::wizard::{SessionId, WizardKind};

    use super::{ConfiguredNotifier, WebhookNotifier};

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn capture(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        captured.requests.lock().expect("capture lock").push((auth, body));
        StatusCode::NO_CONTENT
    }

    async fn reject() -> StatusCode {
        StatusCode::BAD_GATEWAY
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}/hook")
    }

    fn record() -> SubmissionRecord {
        SubmissionRecord::pending(&SubmissionPayload {
            session_id: SessionId("sess-hook".to_owned()),
            kind: WizardKind::PricingSimulator,
            answers: AnswerSet::new(),
            computed_price: 500,
            contact: ContactDetails {
                first_name: "Jeanne".to_owned(),
                last_name: "Martin".to_owned(),
                email: "jeanne@example.fr".to_owned(),
                phone: None,
            },
        })
    }

    #[tokio::test]
    async fn webhook_receives_record_with_bearer_key() {
        let captured = Captured::default();
        let url = serve(Router::new().route("/hook", post(capture)).with_state(captured.clone())).await;
        let notifier =
            WebhookNotifier::new(url, Some("hook-key".to_owned().into()), Duration::from_secs(5))
                .expect("client");

        let record = record();
        notifier.notify(&record).await.expect("notify");

        let requests = captured.requests.lock().expect("capture lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0.as_deref(), Some("Bearer hook-key"));
        assert_eq!(requests[0].1["record"]["id"], Value::String(record.id.0.clone()));
        assert_eq!(requests[0].1["record"]["status"], "pending");
        assert_eq!(requests[0].1["record"]["estimated_price"], 500);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let url = serve(Router::new().route("/hook", post(reject))).await;
        let notifier = WebhookNotifier::new(url, None, Duration::from_secs(5)).expect("client");

        let error = notifier.notify(&record()).await.expect_err("rejected");
        assert_eq!(error, NotificationError::Rejected { status: 502 });
    }

    #[tokio::test]
    async fn unreachable_webhook_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("local addr");
        drop(listener);
        let notifier =
            WebhookNotifier::new(format!("http://{address}/hook"), None, Duration::from_secs(2))
                .expect("client");

        let error = notifier.notify(&record()).await.expect_err("unreachable");
        assert!(matches!(error, NotificationError::Transport(_)));
    }

    #[test]
    fn disabled_config_selects_noop_notifier() {
        let config = NotificationConfig {
            enabled: false,
            webhook_url: Some("https://hooks.example.fr".to_owned()),
            api_key: None,
            timeout_secs: 10,
        };
        let notifier = ConfiguredNotifier::from_config(&config).expect("notifier");
        assert_eq!(notifier.mode(), "disabled");
    }
}
