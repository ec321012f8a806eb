//! Outbound alerting: bounded in-process queue and webhook delivery.
//!
//! Producers call `Notifier::notify` and never wait. A dedicated tokio task
//! drains the queue into the configured `NotifyAdapter`; a slow or failing
//! sink backs up the queue until notifications are dropped with a warning,
//! and nothing on the request path ever observes it.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_types::notify_adapter::{Notification, NotifyAdapter};

use crate::prelude::*;

// Notifier //
//**********//
/// Handle to the alert queue. Cheap to clone; shared by all components.
#[derive(Clone, Debug)]
pub struct Notifier {
	tx: flume::Sender<Notification>,
}

impl Notifier {
	/// Spawn the drain task for `sink` and return the producer handle.
	pub fn spawn(sink: Arc<dyn NotifyAdapter>, capacity: usize) -> Self {
		let (tx, rx) = flume::bounded::<Notification>(capacity);

		tokio::spawn(async move {
			while let Ok(notification) = rx.recv_async().await {
				if let Err(err) = sink.send_notification(&notification).await {
					warn!("Failed to deliver notification '{}': {}", notification.title, err);
				}
			}
			debug!("Notification queue closed");
		});

		Self { tx }
	}

	/// Handle that logs alerts instead of delivering them (no webhook
	/// configured).
	pub fn log_only(capacity: usize) -> Self {
		Self::spawn(Arc::new(LogSink), capacity)
	}

	/// Enqueue a notification. Never blocks and never fails; when the queue
	/// is full the notification is dropped.
	pub fn notify(&self, notification: Notification) {
		match self.tx.try_send(notification) {
			Ok(()) => {}
			Err(flume::TrySendError::Full(n)) => {
				warn!("Notification queue full, dropping '{}'", n.title);
			}
			Err(flume::TrySendError::Disconnected(n)) => {
				debug!("Notification queue gone, dropping '{}'", n.title);
			}
		}
	}
}

// LogSink //
//*********//
/// Sink that only writes alerts to the log.
#[derive(Debug)]
pub struct LogSink;

#[async_trait]
impl NotifyAdapter for LogSink {
	async fn send_notification(&self, notification: &Notification) -> GhResult<()> {
		info!("[alert] {}: {}", notification.title, notification.description);
		Ok(())
	}
}

// WebhookSink //
//*************//
type HttpsClient =
	Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Sink that POSTs each notification as an embed payload to a webhook URL.
pub struct WebhookSink {
	url: Box<str>,
	client: HttpsClient,
}

impl WebhookSink {
	pub fn new(url: impl Into<Box<str>>) -> GhResult<Self> {
		let url = url.into();
		if !url.starts_with("http://") && !url.starts_with("https://") {
			return Err(Error::ConfigError(format!("invalid webhook url: {}", url)));
		}

		let https = HttpsConnectorBuilder::new()
			.with_native_roots()?
			.https_or_http()
			.enable_http1()
			.enable_http2()
			.build();
		let client = Client::builder(TokioExecutor::new()).build(https);

		Ok(Self { url, client })
	}
}

impl std::fmt::Debug for WebhookSink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WebhookSink").field("url", &self.url).finish()
	}
}

#[async_trait]
impl NotifyAdapter for WebhookSink {
	async fn send_notification(&self, notification: &Notification) -> GhResult<()> {
		let payload = serde_json::json!({
			"embeds": [{
				"title": notification.title,
				"description": notification.description,
				"color": notification.color,
				"fields": notification.fields,
			}]
		});
		let body = serde_json::to_vec(&payload)
			.map_err(|err| Error::Internal(format!("notification payload: {}", err)))?;

		let request = hyper::Request::builder()
			.method(hyper::Method::POST)
			.uri(self.url.as_ref())
			.header(hyper::header::CONTENT_TYPE, "application/json")
			.body(Full::new(Bytes::from(body)))
			.map_err(|err| Error::Internal(format!("notification request: {}", err)))?;

		let response = self
			.client
			.request(request)
			.await
			.map_err(|err| Error::Internal(format!("webhook delivery: {}", err)))?;

		if !response.status().is_success() {
			return Err(Error::Internal(format!(
				"webhook responded with status {}",
				response.status()
			)));
		}

		Ok(())
	}
}


// vim: ts=4
