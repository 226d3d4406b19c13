//! Post-commit event publishing
//!
//! Events go out only after the unit of work committed, and a publish
//! failure never fails the request: the ledger is the source of truth,
//! events are advisory.

use crate::config::NatsConfig;
use async_nats::Client;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct EventPublisher {
    client: Option<Client>,
    topic_prefix: String,
}

impl EventPublisher {
    pub async fn connect(config: &NatsConfig) -> Self {
        if !config.enabled {
            info!("Event publishing disabled");
            return EventPublisher {
                client: None,
                topic_prefix: config.topic_prefix.clone(),
            };
        }

        match async_nats::connect(&config.url).await {
            Ok(client) => {
                info!("Connected to NATS at {}", config.url);
                EventPublisher {
                    client: Some(client),
                    topic_prefix: config.topic_prefix.clone(),
                }
            }
            Err(e) => {
                // Degrade to a no-op publisher rather than refusing to start
                warn!("NATS connection failed, events disabled: {}", e);
                EventPublisher {
                    client: None,
                    topic_prefix: config.topic_prefix.clone(),
                }
            }
        }
    }

    pub fn disabled() -> Self {
        EventPublisher {
            client: None,
            topic_prefix: "agromarket".to_string(),
        }
    }

    async fn publish<T: Serialize>(&self, topic: &str, payload: &T) {
        let Some(client) = &self.client else { return };

        let subject = format!("{}.{}", self.topic_prefix, topic);
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize event for {}: {}", subject, e);
                return;
            }
        };

        if let Err(e) = client.publish(subject.clone(), bytes.into()).await {
            warn!("Failed to publish event to {}: {}", subject, e);
        }
    }

    pub async fn order_created(&self, order_id: Uuid, buyer_id: Uuid, seller_id: Uuid, total: Decimal) {
        self.publish(
            "orders.created",
            &json!({
                "order_id": order_id,
                "buyer_id": buyer_id,
                "seller_id": seller_id,
                "total": total,
                "occurred_at": Utc::now(),
            }),
        )
        .await;
    }

    pub async fn payment_confirmed(&self, order_id: Uuid, escrow_id: Option<Uuid>, amount: Decimal) {
        self.publish(
            "payments.confirmed",
            &json!({
                "order_id": order_id,
                "escrow_id": escrow_id,
                "amount": amount,
                "occurred_at": Utc::now(),
            }),
        )
        .await;
    }

    pub async fn escrow_status_changed(&self, escrow_id: Uuid, from: &str, to: &str) {
        self.publish(
            "escrow.status_changed",
            &json!({
                "escrow_id": escrow_id,
                "from": from,
                "to": to,
                "occurred_at": Utc::now(),
            }),
        )
        .await;
    }

    /// User-facing notification fan-out; consumed by the notification
    /// service.
    pub async fn notify(&self, user_id: Uuid, kind: &str, message: &str) {
        self.publish(
            "notifications.send",
            &json!({
                "user_id": user_id,
                "kind": kind,
                "message": message,
                "occurred_at": Utc::now(),
            }),
        )
        .await;
    }
}
