//! Outbound trade notifications.
//!
//! The engine only builds [`TradeNotification`] payloads and queues them;
//! transport is the caller's business. [`PayloadSigner`] produces the
//! `X-Webhook-Signature` value a receiving service checks, and
//! [`SessionAggregate`] is the receiving side's running state, owned by
//! whoever hosts it.

use crate::domain::{ExitReason, OrderIntent, OrderKind};
use crate::signal::RulePath;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Session loss cap of the notification service.
pub const DEFAULT_LOSS_CAP: f64 = -250.0;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid signing key: {0}")]
    Key(#[from] hmac::digest::InvalidLength),

    #[error("signature mismatch")]
    BadSignature,

    #[error("symbol {0} not allowed")]
    SymbolNotAllowed(String),

    #[error("session loss cap reached: pnl {pnl:.2} ≤ {cap:.2}")]
    LossCapReached { pnl: f64, cap: f64 },

    #[error("payload encoding: {0}")]
    Json(#[from] serde_json::Error),
}

// ─── Payload ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Open,
    PartialClose,
    Close,
}

impl From<OrderKind> for TradeAction {
    fn from(kind: OrderKind) -> Self {
        match kind {
            OrderKind::Open => TradeAction::Open,
            OrderKind::PartialClose => TradeAction::PartialClose,
            OrderKind::FullClose => TradeAction::Close,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMetadata {
    pub action: TradeAction,
    pub reason: ExitReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RulePath>,
    /// Realized P&L of the leg, for closing actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One executed entry or exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeNotification {
    pub symbol: String,
    /// Order direction: "buy" or "sell".
    pub side: String,
    pub price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub metadata: NotificationMetadata,
}

impl TradeNotification {
    /// Build from a filled intent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_fill(
        symbol: &str,
        intent: &OrderIntent,
        price: f64,
        size: f64,
        stop_loss: f64,
        take_profit: f64,
        rule: Option<RulePath>,
        pnl: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: order_direction(intent).to_string(),
            price,
            size,
            stop_loss,
            take_profit,
            metadata: NotificationMetadata {
                action: intent.kind.into(),
                reason: intent.reason,
                rule,
                pnl,
                timestamp,
            },
        }
    }

    pub fn is_buy(&self) -> bool {
        self.side.eq_ignore_ascii_case("buy")
    }

    pub fn to_json(&self) -> Result<String, NotifyError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn order_direction(intent: &OrderIntent) -> &'static str {
    if intent.is_buy() {
        "buy"
    } else {
        "sell"
    }
}

// ─── Signing ────────────────────────────────────────────────────────

/// HMAC-SHA256 over the exact request body bytes.
#[derive(Clone)]
pub struct PayloadSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSigner").finish_non_exhaustive()
    }
}

impl PayloadSigner {
    pub fn new(secret: &[u8]) -> Result<Self, NotifyError> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Lowercase hex signature of `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex signature against `body`.
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }

    /// Serialize a notification and sign the resulting body.
    /// Returns `(body, signature)`.
    pub fn seal(&self, notification: &TradeNotification) -> Result<(String, String), NotifyError> {
        let body = notification.to_json()?;
        let signature = self.sign(body.as_bytes());
        Ok((body, signature))
    }
}

// ─── Receiving-side session state ───────────────────────────────────

/// Running realized P&L of a notification service session.
///
/// Lives exactly as long as the service process that owns it: created
/// fresh (or restored with [`from_json`](Self::from_json)) at start-up,
/// [`reset`](Self::reset) on restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAggregate {
    pub session_pnl: f64,
    pub loss_cap: f64,
    pub allowed_symbols: Vec<String>,
    pub accepted: u64,
    pub started_at: DateTime<Utc>,
}

impl SessionAggregate {
    pub fn new(allowed_symbols: Vec<String>, loss_cap: f64, started_at: DateTime<Utc>) -> Self {
        Self {
            session_pnl: 0.0,
            loss_cap,
            allowed_symbols,
            accepted: 0,
            started_at,
        }
    }

    /// BTCUSDT, ETHUSDT and LTCUSDT with the default loss cap.
    pub fn with_defaults(started_at: DateTime<Utc>) -> Self {
        Self::new(
            ["BTCUSDT", "ETHUSDT", "LTCUSDT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            DEFAULT_LOSS_CAP,
            started_at,
        )
    }

    pub fn is_allowed(&self, symbol: &str) -> bool {
        self.allowed_symbols.iter().any(|s| s == symbol)
    }

    pub fn cap_reached(&self) -> bool {
        self.session_pnl <= self.loss_cap
    }

    /// Verify and accept one signed request body. Opening actions are
    /// refused once the loss cap is reached; closes are always accepted.
    pub fn accept(
        &mut self,
        signer: &PayloadSigner,
        body: &[u8],
        signature: &str,
    ) -> Result<f64, NotifyError> {
        if !signer.verify(body, signature) {
            warn!("notification signature mismatch");
            return Err(NotifyError::BadSignature);
        }
        let notification: TradeNotification = serde_json::from_slice(body)?;
        self.apply(&notification)
    }

    /// Fold an already-authenticated notification into the session.
    pub fn apply(&mut self, n: &TradeNotification) -> Result<f64, NotifyError> {
        if !self.is_allowed(&n.symbol) {
            return Err(NotifyError::SymbolNotAllowed(n.symbol.clone()));
        }
        if n.metadata.action == TradeAction::Open && self.cap_reached() {
            return Err(NotifyError::LossCapReached {
                pnl: self.session_pnl,
                cap: self.loss_cap,
            });
        }
        self.session_pnl += n.metadata.pnl.unwrap_or(0.0);
        self.accepted += 1;
        info!(
            symbol = %n.symbol,
            side = %n.side,
            price = n.price,
            size = n.size,
            session_pnl = self.session_pnl,
            "notification accepted"
        );
        Ok(self.session_pnl)
    }

    /// Start a new session; the symbol list and cap carry over.
    pub fn reset(&mut self, started_at: DateTime<Utc>) {
        self.session_pnl = 0.0;
        self.accepted = 0;
        self.started_at = started_at;
    }

    pub fn to_json(&self) -> Result<String, NotifyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, NotifyError> {
        Ok(serde_json::from_str(json)?)
    }
}
