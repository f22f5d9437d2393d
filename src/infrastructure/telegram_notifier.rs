//! Catalog event delivery through the Telegram Bot API

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::product::ProductListing;
use crate::domain::services::{NotificationError, ProductNotifier};
use crate::infrastructure::config::NotifierConfig;

const NEW_PRODUCT_TITLE: &str = "З'явився новий товар на сайті!";
const RETURNED_PRODUCT_TITLE: &str = "Товар знову у продажі!";
const VIEW_BUTTON_TEXT: &str = "Переглянути";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEvent {
    New,
    Returned,
}

impl CatalogEvent {
    const fn title(self) -> &'static str {
        match self {
            Self::New => NEW_PRODUCT_TITLE,
            Self::Returned => RETURNED_PRODUCT_TITLE,
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    reply_markup: InlineKeyboardMarkup<'a>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'static str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// HTML message body for one event
pub fn format_message(event: CatalogEvent, product: &ProductListing) -> String {
    format!(
        "<b>{}</b>\n\n<b>Назва:</b> {}\n<b>Ціна:</b> {} грн.",
        event.title(),
        escape_html(&product.name),
        product.price
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_base_url: &str, bot_token: &str, chat_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create Telegram HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base_url.trim_end_matches('/'), bot_token),
            chat_id: chat_id.into(),
        })
    }

    async fn send(&self, event: CatalogEvent, product: &ProductListing) -> Result<(), NotificationError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: format_message(event, product),
            parse_mode: "HTML",
            reply_markup: InlineKeyboardMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton {
                    text: VIEW_BUTTON_TEXT,
                    url: &product.detail_url,
                }]],
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().await.ok();

        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => {
                debug!("📨 Sent {:?} notification for product {}", event, product.external_id);
                Ok(())
            }
            other => Err(NotificationError::Rejected {
                status: status.as_u16(),
                description: other
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[async_trait]
impl ProductNotifier for TelegramNotifier {
    async fn notify_new(&self, product: &ProductListing) -> Result<(), NotificationError> {
        self.send(CatalogEvent::New, product).await
    }

    async fn notify_returned(&self, product: &ProductListing) -> Result<(), NotificationError> {
        self.send(CatalogEvent::Returned, product).await
    }
}

/// Notifier used when no bot token is configured
#[derive(Debug, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl ProductNotifier for LogOnlyNotifier {
    async fn notify_new(&self, product: &ProductListing) -> Result<(), NotificationError> {
        info!("🆕 New product {} '{}' for {} UAH: {}", product.external_id, product.name, product.price, product.detail_url);
        Ok(())
    }

    async fn notify_returned(&self, product: &ProductListing) -> Result<(), NotificationError> {
        info!("🔁 Back in stock {} '{}' for {} UAH: {}", product.external_id, product.name, product.price, product.detail_url);
        Ok(())
    }
}

/// Telegram when credentials are configured, log-only otherwise
pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn ProductNotifier>> {
    match (&config.bot_token, &config.chat_id) {
        (Some(token), Some(chat_id)) if !token.trim().is_empty() => {
            info!("📨 Telegram notifications enabled for chat {}", chat_id);
            let notifier = TelegramNotifier::new(
                &config.api_base_url,
                token.trim(),
                chat_id.clone(),
                Duration::from_secs(config.request_timeout_seconds),
            )?;
            Ok(Arc::new(notifier))
        }
        _ => {
            info!("No bot token configured, notifications are logged only");
            Ok(Arc::new(LogOnlyNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::ExternalId;
    use httpmock::prelude::*;
    use serde_json::json;

    fn product() -> ProductListing {
        ProductListing {
            external_id: ExternalId(42),
            name: "Собор <Святої> Софії".to_string(),
            price: 1290,
            detail_url: "https://coins.bank.gov.ua/p-42.html".to_string(),
            image_url: "https://coins.bank.gov.ua/img/42.jpg".to_string(),
            material: None,
            circulation: None,
            year_of_production: Some(2024),
        }
    }

    #[test]
    fn test_message_layout() {
        let text = format_message(CatalogEvent::Returned, &product());
        assert_eq!(
            text,
            "<b>Товар знову у продажі!</b>\n\n<b>Назва:</b> Собор &lt;Святої&gt; Софії\n<b>Ціна:</b> 1290 грн."
        );
        assert!(format_message(CatalogEvent::New, &product()).starts_with("<b>З'явився новий товар на сайті!</b>"));
    }

    #[tokio::test]
    async fn test_send_message_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/botTOKEN/sendMessage")
                    .json_body_partial(
                        r#"{
                            "chat_id": "@coins",
                            "parse_mode": "HTML",
                            "reply_markup": {"inline_keyboard": [[{"text": "Переглянути", "url": "https://coins.bank.gov.ua/p-42.html"}]]}
                        }"#,
                    );
                then.status(200).json_body(json!({"ok": true, "result": {}}));
            })
            .await;

        let notifier = TelegramNotifier::new(&server.base_url(), "TOKEN", "@coins", Duration::from_secs(5)).unwrap();
        notifier.notify_new(&product()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_rejection_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/botTOKEN/sendMessage");
                then.status(400)
                    .json_body(json!({"ok": false, "description": "Bad Request: chat not found"}));
            })
            .await;

        let notifier = TelegramNotifier::new(&server.base_url(), "TOKEN", "@coins", Duration::from_secs(5)).unwrap();
        let err = notifier.notify_returned(&product()).await.unwrap_err();

        match err {
            NotificationError::Rejected { status, description } => {
                assert_eq!(status, 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_log_only_without_token() {
        let config = NotifierConfig::default();
        assert!(build_notifier(&config).is_ok());
    }
}
