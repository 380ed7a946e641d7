//! Horloge locale du kernel.
//!
//! Le décalage local est relu pour chaque instant via le fuseau du système
//! (chrono `Local`), donc les clés de jour et les heures suivent les
//! changements d'heure été / hiver sans redémarrage.

use chrono::{Local, TimeZone};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const DATE_KEY: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");
const TIME_LABEL: &[BorrowedFormatItem<'_>] = format_description!("[hour]:[minute]:[second]");

/// Décalage du fuseau système, en secondes, à l'instant unix `unix`
fn system_offset_at(unix: i64) -> i32 {
    Local
        .timestamp_opt(unix, 0)
        .single()
        .map(|local| local.offset().local_minus_utc())
        .unwrap_or(0)
}

/// Exprime `at` dans le décalage que `offset_at` donne pour cet instant
pub fn localize<F>(at: OffsetDateTime, offset_at: F) -> OffsetDateTime
where
    F: Fn(i64) -> i32,
{
    let offset = UtcOffset::from_whole_seconds(offset_at(at.unix_timestamp())).unwrap_or(UtcOffset::UTC);
    at.to_offset(offset)
}

pub fn local_now() -> OffsetDateTime {
    localize(OffsetDateTime::now_utc(), system_offset_at)
}

/// Clé de jour `YYYY-MM-DD` dans le décalage porté par `at`
pub fn date_key(at: &OffsetDateTime) -> String {
    at.format(DATE_KEY).unwrap_or_default()
}

/// Heure d'affichage `HH:MM:SS`
pub fn time_label(at: &OffsetDateTime) -> String {
    at.format(TIME_LABEL).unwrap_or_default()
}

pub fn today() -> String {
    date_key(&local_now())
}
