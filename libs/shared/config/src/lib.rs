use std::env;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub booking_api_url: String,
    pub jwt_secret: String,
    pub server_port: u16,
    pub policy: BookingPolicy,
}

/// Scheduling constants shared by the slot, timeline and refund rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPolicy {
    pub slot_minutes: i64,
    pub service_buffer_minutes: i64,
    pub consultation_minutes: i64,
    pub default_examination_minutes: i64,
    pub default_day_start: NaiveTime,
    pub default_day_end: NaiveTime,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            slot_minutes: 10,
            service_buffer_minutes: 5,
            consultation_minutes: 10,
            default_examination_minutes: 30,
            default_day_start: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            default_day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl BookingPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let policy = Self {
            slot_minutes: env_or("SLOT_MINUTES", defaults.slot_minutes),
            service_buffer_minutes: env_or("SERVICE_BUFFER_MINUTES", defaults.service_buffer_minutes),
            consultation_minutes: env_or("CONSULTATION_MINUTES", defaults.consultation_minutes),
            default_examination_minutes: env_or(
                "DEFAULT_EXAMINATION_MINUTES",
                defaults.default_examination_minutes,
            ),
            default_day_start: env_time_or("DEFAULT_DAY_START", defaults.default_day_start),
            default_day_end: env_time_or("DEFAULT_DAY_END", defaults.default_day_end),
        };

        if policy.slot_minutes <= 0 || policy.default_day_start >= policy.default_day_end {
            warn!("Invalid booking policy overrides, falling back to defaults");
            return defaults;
        }

        policy
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            booking_api_url: env::var("BOOKING_API_URL")
                .unwrap_or_else(|_| {
                    warn!("BOOKING_API_URL not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            server_port: env_or("SERVER_PORT", 3000),
            policy: BookingPolicy::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.booking_api_url.is_empty() && !self.jwt_secret.is_empty()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an unparsable value, using default", key);
            default
        }),
        Err(_) => default,
    }
}

fn env_time_or(key: &str, default: NaiveTime) -> NaiveTime {
    match env::var(key) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
            .unwrap_or_else(|_| {
                warn!("{} is not a valid HH:MM time, using default", key);
                default
            }),
        Err(_) => default,
    }
}
