//! Doublures partagées par les tests du kernel.

use crate::engine::CommandTransport;
use crate::interlock::Command;
use crate::notify::{Notification, NotificationSink};
use aegis_devkit::MockMqttClient;
use parking_lot::Mutex;
use rumqttc::QoS;

pub const COMMAND_TOPIC: &str = "home/command";

/// Transport de commandes adossé au client MQTT simulé
pub struct MockTransport {
    pub client: MockMqttClient,
}

impl MockTransport {
    pub fn new() -> Self {
        Self { client: MockMqttClient::new() }
    }

    pub fn sent(&self) -> Vec<String> {
        self.client.published_texts(COMMAND_TOPIC)
    }
}

impl CommandTransport for MockTransport {
    fn send(&self, command: Command) -> anyhow::Result<()> {
        self.client.try_publish(COMMAND_TOPIC, QoS::AtMostOnce, false, command.as_str())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: &Notification) {
        self.received.lock().push(notification.clone());
    }
}
