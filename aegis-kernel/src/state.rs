//! État partagé entre la boucle MQTT et les handlers HTTP.
//!
//! Le verrou n'est jamais tenu à travers un `.await`: chaque message MQTT
//! et chaque requête prend le verrou, traite de façon synchrone, relâche.

use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
