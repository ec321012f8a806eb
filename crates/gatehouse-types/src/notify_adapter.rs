//! Adapter for the outbound alert channel.
//!
//! Alerts are strictly fire-and-forget: producers enqueue them on the core
//! notifier queue and never observe delivery. Implementations may drop,
//! batch, or retry as they see fit; a failure is logged and nothing else.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;

use crate::prelude::*;

/// Embed colors used by the admission components.
pub mod color {
	/// Policy violations and blocks
	pub const RED: u32 = 0x00ed_4245;
	/// Escalations needing operator attention
	pub const ORANGE: u32 = 0x00e6_7e22;
	/// Informational summaries (sweep results)
	pub const GREEN: u32 = 0x0057_f287;
}

/// One name/value pair rendered inside a notification.
#[derive(Clone, Debug, Serialize)]
pub struct NotificationField {
	pub name: Box<str>,
	pub value: Box<str>,
	pub inline: bool,
}

/// An alert payload: a titled, colored embed with optional fields.
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
	pub title: Box<str>,
	pub description: Box<str>,
	pub color: u32,
	pub fields: Vec<NotificationField>,
}

impl Notification {
	pub fn new(
		title: impl Into<Box<str>>,
		description: impl Into<Box<str>>,
		color: u32,
	) -> Self {
		Self { title: title.into(), description: description.into(), color, fields: Vec::new() }
	}

	pub fn field(mut self, name: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
		self.fields.push(NotificationField {
			name: name.into(),
			value: value.into(),
			inline: true,
		});
		self
	}
}

#[async_trait]
pub trait NotifyAdapter: Debug + Send + Sync {
	/// Deliver one notification. Errors are logged by the caller and never
	/// influence request control flow.
	async fn send_notification(&self, notification: &Notification) -> GhResult<()>;
}

// vim: ts=4
