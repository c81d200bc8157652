//! Stub PHY channel used by the bundled scenario.
//!
//! Produces [`SignalPayload`]s from a log-distance path loss model with a
//! thermal noise floor. Deterministic: no shadowing or fading.
//!
//! ```text
//! PL(d) = PL(d0) + 10 · n · log10(d / d0)     for d > d0, else PL(d0)
//! N     = -174 dBm/Hz + 10 · log10(B) + NF
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entity::NodeId;
use crate::error::{SimError, SimResult};
use crate::trace::{SignalExtra, SignalPayload};

/// Speed of light in vacuum, m/s.
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Thermal noise density at 290 K, dBm/Hz.
const THERMAL_NOISE_DBM_PER_HZ: f64 = -174.0;

/// Convert dBm to watts.
pub fn dbm_to_watts(dbm: f64) -> f64 {
    10f64.powf((dbm - 30.0) / 10.0)
}

/// Convert watts to dBm.
pub fn watts_to_dbm(watts: f64) -> f64 {
    10.0 * watts.log10() + 30.0
}

/// Channel model parameters.
///
/// Defaults describe a 20 MHz channel at 5 GHz with a path loss exponent
/// of 3 and a 7 dB receiver noise figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChannelParams {
    /// Path loss exponent (n).
    pub path_loss_exponent: f64,
    /// Path loss at the reference distance, dB.
    pub reference_loss_db: f64,
    /// Reference distance d0, meters.
    pub reference_distance_m: f64,
    pub bandwidth_hz: f64,
    pub noise_figure_db: f64,
    pub frequency_mhz: u16,
}

impl Default for ChannelParams {
    fn default() -> Self {
        ChannelParams {
            path_loss_exponent: 3.0,
            reference_loss_db: 46.6777,
            reference_distance_m: 1.0,
            bandwidth_hz: 20e6,
            noise_figure_db: 7.0,
            frequency_mhz: 5180,
        }
    }
}

/// Log-distance channel between fixed positions.
#[derive(Debug, Clone, Default)]
pub struct LogDistanceChannel {
    params: ChannelParams,
}

impl LogDistanceChannel {
    pub fn new(params: ChannelParams) -> Self {
        LogDistanceChannel { params }
    }

    pub fn params(&self) -> &ChannelParams {
        &self.params
    }

    /// Path loss over `distance_m`, dB.
    pub fn path_loss_db(&self, distance_m: f64) -> f64 {
        let p = &self.params;
        if distance_m <= p.reference_distance_m {
            return p.reference_loss_db;
        }
        p.reference_loss_db + 10.0 * p.path_loss_exponent * (distance_m / p.reference_distance_m).log10()
    }

    /// Received power, dBm.
    pub fn rx_power_dbm(&self, tx_power_dbm: f64, distance_m: f64) -> f64 {
        tx_power_dbm - self.path_loss_db(distance_m)
    }

    /// Receiver noise floor, dBm.
    pub fn noise_floor_dbm(&self) -> f64 {
        THERMAL_NOISE_DBM_PER_HZ + 10.0 * self.params.bandwidth_hz.log10() + self.params.noise_figure_db
    }

    /// Time the signal needs to cover `distance_m`.
    ///
    /// Fails with [`SimError::TimeOverflow`] when the delay does not fit
    /// in a `Duration` (or the distance is NaN).
    pub fn propagation_delay(&self, distance_m: f64) -> SimResult<Duration> {
        if distance_m <= 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(distance_m / SPEED_OF_LIGHT).map_err(|_| SimError::TimeOverflow)
    }

    /// The payload a receiver at `distance_m` sees for one frame.
    pub fn receive(
        &self,
        tx_node: NodeId,
        tx_power_dbm: f64,
        distance_m: f64,
        packet_size: u32,
    ) -> SignalPayload {
        let signal = dbm_to_watts(self.rx_power_dbm(tx_power_dbm, distance_m));
        let noise = dbm_to_watts(self.noise_floor_dbm());
        SignalPayload::new(signal, noise).with_extra(SignalExtra {
            tx_node: Some(tx_node),
            tx_power_dbm: Some(tx_power_dbm),
            channel_freq_mhz: Some(self.params.frequency_mhz),
            packet_size: Some(packet_size),
        })
    }
}
