/*!
Mock MQTT Client pour développement sans broker

Enregistre tous les messages publiés (commandes vers `home/command`) et
permet de simuler la réception de messages de statut.
*/

use anyhow::Result;
use parking_lot::Mutex;
use rumqttc::QoS;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl MockMessage {
    /// Payload interprété comme texte UTF-8 (les commandes sont du texte brut)
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Mock MQTT Client qui simule rumqttc::AsyncClient
#[derive(Clone)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
    offline: Arc<Mutex<bool>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self {
            published_messages: Arc::new(Mutex::new(Vec::new())),
            message_sender: Arc::new(Mutex::new(None)),
            offline: Arc::new(Mutex::new(false)),
        }
    }

    /// Configuration d'un channel pour recevoir les messages simulés
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock() = Some(sender);
        receiver
    }

    /// Simule une file de requêtes pleine / client déconnecté:
    /// `try_publish` échoue tant que le flag est actif.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    /// Publication non bloquante (compatible avec AsyncClient::try_publish)
    pub fn try_publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        if *self.offline.lock() {
            anyhow::bail!("mock client offline");
        }

        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        log::info!("[MOCK] Published to {}: {} bytes", message.topic, message.payload.len());
        self.published_messages.lock().push(message);
        Ok(())
    }

    /// Simule la réception d'un message (pour tests)
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain: false,
        };

        if let Some(sender) = self.message_sender.lock().as_ref() {
            sender
                .send(message.clone())
                .map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
        }

        log::info!("[MOCK] Simulated incoming: {}", message.topic);
        Ok(())
    }

    /// Payloads texte publiés sur un topic donné, dans l'ordre
    pub fn published_texts(&self, topic: &str) -> Vec<String> {
        self.published_messages
            .lock()
            .iter()
            .filter(|msg| msg.topic == topic)
            .map(MockMessage::payload_text)
            .collect()
    }
}

impl Default for MockMqttClient {
    fn default() -> Self {
        Self::new()
    }
}
