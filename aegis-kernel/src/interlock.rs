/**
 * INTERLOCK - Verrouillages de sécurité des commandes opérateur
 *
 * RÔLE :
 * Décide si une commande peut partir sur `home/command` étant donné les
 * flags connus et l'état de connexion. Fonction pure, sans effet de bord.
 *
 * RÈGLES :
 * - Déconnecté => tout est refusé
 * - Une vanne ne s'ouvre pas si son capteur de garde est désactivé
 * - Un capteur ne se désactive pas tant que sa vanne est ouverte
 * - `None` (jamais observé) n'est pas une preuve de désactivation
 */

use crate::models::{DeviceFlags, ToggleField};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vocabulaire fixe des commandes du contrôleur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    ArmPir,
    DisarmPir,
    EnablePir,
    DisablePir,
    OpenWaterValve,
    CloseWaterValve,
    OpenGasValve,
    CloseGasValve,
    EnableWaterSensor,
    DisableWaterSensor,
    EnableFlameSensor,
    DisableFlameSensor,
    EnableGasSensor,
    DisableGasSensor,
    SeenOn,
    SeenOff,
}

impl Command {
    pub const ALL: [Command; 16] = [
        Command::ArmPir,
        Command::DisarmPir,
        Command::EnablePir,
        Command::DisablePir,
        Command::OpenWaterValve,
        Command::CloseWaterValve,
        Command::OpenGasValve,
        Command::CloseGasValve,
        Command::EnableWaterSensor,
        Command::DisableWaterSensor,
        Command::EnableFlameSensor,
        Command::DisableFlameSensor,
        Command::EnableGasSensor,
        Command::DisableGasSensor,
        Command::SeenOn,
        Command::SeenOff,
    ];

    /// Texte publié tel quel sur le topic de commande
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::ArmPir => "ARM_PIR",
            Command::DisarmPir => "DISARM_PIR",
            Command::EnablePir => "ENABLE_PIR",
            Command::DisablePir => "DISABLE_PIR",
            Command::OpenWaterValve => "OPEN_WATER_VALVE",
            Command::CloseWaterValve => "CLOSE_WATER_VALVE",
            Command::OpenGasValve => "OPEN_GAS_VALVE",
            Command::CloseGasValve => "CLOSE_GAS_VALVE",
            Command::EnableWaterSensor => "ENABLE_WATER_SENSOR",
            Command::DisableWaterSensor => "DISABLE_WATER_SENSOR",
            Command::EnableFlameSensor => "ENABLE_FLAME_SENSOR",
            Command::DisableFlameSensor => "DISABLE_FLAME_SENSOR",
            Command::EnableGasSensor => "ENABLE_GAS_SENSOR",
            Command::DisableGasSensor => "DISABLE_GAS_SENSOR",
            Command::SeenOn => "SEEN_ON",
            Command::SeenOff => "SEEN_OFF",
        }
    }

    /// Effet attendu sur un champ rapporté par le contrôleur.
    /// `ENABLE_PIR`/`DISABLE_PIR` n'ont pas de champ de retour.
    pub fn expected_effect(&self) -> Option<(ToggleField, bool)> {
        match self {
            Command::ArmPir => Some((ToggleField::PirArmed, true)),
            Command::DisarmPir => Some((ToggleField::PirArmed, false)),
            Command::EnablePir | Command::DisablePir => None,
            Command::OpenWaterValve => Some((ToggleField::WaterValveClosed, false)),
            Command::CloseWaterValve => Some((ToggleField::WaterValveClosed, true)),
            Command::OpenGasValve => Some((ToggleField::GasValveClosed, false)),
            Command::CloseGasValve => Some((ToggleField::GasValveClosed, true)),
            Command::EnableWaterSensor => Some((ToggleField::WaterSensorEnabled, true)),
            Command::DisableWaterSensor => Some((ToggleField::WaterSensorEnabled, false)),
            Command::EnableFlameSensor => Some((ToggleField::FlameSensorEnabled, true)),
            Command::DisableFlameSensor => Some((ToggleField::FlameSensorEnabled, false)),
            Command::EnableGasSensor => Some((ToggleField::GasSensorEnabled, true)),
            Command::DisableGasSensor => Some((ToggleField::GasSensorEnabled, false)),
            Command::SeenOn => Some((ToggleField::Seen, true)),
            Command::SeenOff => Some((ToggleField::Seen, false)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Motif de refus, avec le message montré à l'opérateur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    #[error("Not connected to AegisCore system.")]
    NotConnected,
    #[error("Cannot OPEN water valve while Water Sensor is DISABLED.")]
    WaterSensorDisabled,
    #[error("Cannot OPEN gas valve while Gas or Flame Sensor is DISABLED.")]
    GasGuardDisabled,
    #[error("Close Water Valve before disabling its sensor.")]
    WaterValveOpen,
    #[error("Close Gas Valve before disabling Flame Sensor.")]
    GasValveOpenForFlame,
    #[error("Close Gas Valve before disabling Gas Sensor.")]
    GasValveOpenForGas,
}

/// Vérifie qu'une commande est autorisée maintenant.
pub fn can_execute(command: Command, flags: &DeviceFlags, connected: bool) -> Result<(), DenialReason> {
    if !connected {
        return Err(DenialReason::NotConnected);
    }

    match command {
        Command::OpenWaterValve if flags.water_sensor_enabled == Some(false) => {
            Err(DenialReason::WaterSensorDisabled)
        }
        Command::OpenGasValve
            if flags.gas_sensor_enabled == Some(false) || flags.flame_sensor_enabled == Some(false) =>
        {
            Err(DenialReason::GasGuardDisabled)
        }
        Command::DisableWaterSensor if flags.water_valve_closed == Some(false) => {
            Err(DenialReason::WaterValveOpen)
        }
        Command::DisableFlameSensor if flags.gas_valve_closed == Some(false) => {
            Err(DenialReason::GasValveOpenForFlame)
        }
        Command::DisableGasSensor if flags.gas_valve_closed == Some(false) => {
            Err(DenialReason::GasValveOpenForGas)
        }
        _ => Ok(()),
    }
}
