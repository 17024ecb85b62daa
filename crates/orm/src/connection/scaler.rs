//! Smart pool scaler
//!
//! Decides, from a usage sample, whether the advisory pool maximum should grow
//! or shrink. The scaler is pure bookkeeping: applying the new maximum to a
//! real pool is the monitor's job.

use super::pool::PoolError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ScalerConfig {
    /// Floor for the advisory maximum
    pub min_connections: u32,
    /// Starting maximum
    pub initial_max: u32,
    /// Ceiling for the advisory maximum
    pub max_scalable: u32,
    pub scale_up_threshold: u32,
    pub scale_down_threshold: u32,
    pub scale_up_step: u32,
    pub scale_down_step: u32,
    pub scale_up_cooldown: Duration,
    pub scale_down_cooldown: Duration,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            min_connections: 5,
            initial_max: 10,
            max_scalable: 20,
            scale_up_threshold: 80,
            scale_down_threshold: 30,
            scale_up_step: 2,
            scale_down_step: 1,
            scale_up_cooldown: Duration::from_secs(60),
            scale_down_cooldown: Duration::from_secs(300),
        }
    }
}

impl ScalerConfig {
    pub fn validate(&self) -> Result<(), PoolError> {
        let fail = |message: String| -> Result<(), PoolError> {
            Err(PoolError::ConfigurationError { message })
        };

        if self.min_connections == 0 {
            return fail("min_connections must be at least 1".to_string());
        }
        if self.min_connections > self.max_scalable {
            return fail(format!(
                "min_connections ({}) exceeds max_scalable ({})",
                self.min_connections, self.max_scalable
            ));
        }
        if self.initial_max < self.min_connections || self.initial_max > self.max_scalable {
            return fail(format!(
                "initial max ({}) must lie within [{}, {}]",
                self.initial_max, self.min_connections, self.max_scalable
            ));
        }
        if self.scale_up_threshold > 100 || self.scale_down_threshold >= self.scale_up_threshold {
            return fail(format!(
                "thresholds must satisfy down ({}) < up ({}) <= 100",
                self.scale_down_threshold, self.scale_up_threshold
            ));
        }
        if self.scale_up_step == 0 || self.scale_down_step == 0 {
            return fail("scale steps must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Outcome of a single evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ScaleDecision {
    NoChange,
    ScaledUp { from: u32, to: u32 },
    ScaledDown { from: u32, to: u32 },
}

impl ScaleDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleDecision::NoChange => "no_change",
            ScaleDecision::ScaledUp { .. } => "scaled_up",
            ScaleDecision::ScaledDown { .. } => "scaled_down",
        }
    }

    pub fn new_max(&self) -> Option<u32> {
        match self {
            ScaleDecision::NoChange => None,
            ScaleDecision::ScaledUp { to, .. } | ScaleDecision::ScaledDown { to, .. } => Some(*to),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolScaler {
    config: ScalerConfig,
    current_max: u32,
    last_scale_up: DateTime<Utc>,
    last_scale_down: DateTime<Utc>,
}

impl PoolScaler {
    /// Both cooldowns start counting at `started_at`.
    pub fn new(config: ScalerConfig, started_at: DateTime<Utc>) -> Self {
        let current_max = config
            .initial_max
            .clamp(config.min_connections, config.max_scalable.max(config.min_connections));

        Self {
            config,
            current_max,
            last_scale_up: started_at,
            last_scale_down: started_at,
        }
    }

    pub fn config(&self) -> &ScalerConfig {
        &self.config
    }

    pub fn current_max(&self) -> u32 {
        self.current_max
    }

    /// Evaluate one usage sample. Scale-up is checked first; at most one
    /// action applies.
    pub fn evaluate(&mut self, usage_rate: u32, active: u32, now: DateTime<Utc>) -> ScaleDecision {
        let cfg = &self.config;
        let from = self.current_max;

        if usage_rate >= cfg.scale_up_threshold
            && from < cfg.max_scalable
            && cooldown_elapsed(self.last_scale_up, cfg.scale_up_cooldown, now)
        {
            let to = (from + cfg.scale_up_step).min(cfg.max_scalable);
            self.current_max = to;
            self.last_scale_up = now;
            return ScaleDecision::ScaledUp { from, to };
        }

        if usage_rate <= cfg.scale_down_threshold
            && from > cfg.min_connections
            && cooldown_elapsed(self.last_scale_down, cfg.scale_down_cooldown, now)
            && active <= from.saturating_sub(cfg.scale_down_step)
        {
            let to = from.saturating_sub(cfg.scale_down_step).max(cfg.min_connections);
            self.current_max = to;
            self.last_scale_down = now;
            return ScaleDecision::ScaledDown { from, to };
        }

        ScaleDecision::NoChange
    }

    /// Manual override, bounded like any automatic decision
    pub fn set_current_max(&mut self, max: u32) -> Result<u32, PoolError> {
        if max < self.config.min_connections || max > self.config.max_scalable {
            return Err(PoolError::ConfigurationError {
                message: format!(
                    "pool size {} is outside [{}, {}]",
                    max, self.config.min_connections, self.config.max_scalable
                ),
            });
        }
        let previous = self.current_max;
        self.current_max = max;
        Ok(previous)
    }
}

/// Strictly more than `cooldown` must have passed since `last`
fn cooldown_elapsed(last: DateTime<Utc>, cooldown: Duration, now: DateTime<Utc>) -> bool {
    (now - last).num_milliseconds() > cooldown.as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        start() + chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_usage_history_scales_up_exactly_once() {
        let mut scaler = PoolScaler::new(ScalerConfig::default(), start());
        let decisions: Vec<_> = [20, 20, 20, 90, 90]
            .into_iter()
            .enumerate()
            .map(|(i, usage)| scaler.evaluate(usage, 1, at(i as i64 * 60)))
            .collect();

        let ups = decisions.iter().filter(|d| matches!(d, ScaleDecision::ScaledUp { .. })).count();
        let downs = decisions.iter().filter(|d| matches!(d, ScaleDecision::ScaledDown { .. })).count();

        assert_eq!(ups, 1);
        assert_eq!(downs, 0);
        assert_eq!(decisions[3], ScaleDecision::ScaledUp { from: 10, to: 12 });
        assert_eq!(scaler.current_max(), 12);
    }

    #[test]
    fn test_current_max_stays_in_bounds() {
        let config = ScalerConfig::default();
        let mut scaler = PoolScaler::new(config.clone(), start());

        // Alternating bursts with long gaps so every cooldown elapses
        for i in 0..400 {
            let usage = if (i / 20) % 2 == 0 { 100 } else { 0 };
            scaler.evaluate(usage, 0, at(i * 400));
            let max = scaler.current_max();
            assert!(max >= config.min_connections && max <= config.max_scalable, "max {} out of bounds", max);
        }
    }

    #[test]
    fn test_scale_up_respects_cooldown() {
        let mut scaler = PoolScaler::new(ScalerConfig::default(), start());

        assert!(matches!(scaler.evaluate(95, 9, at(61)), ScaleDecision::ScaledUp { .. }));
        // 60s later is still inside the window
        assert_eq!(scaler.evaluate(95, 11, at(121)), ScaleDecision::NoChange);
        assert!(matches!(scaler.evaluate(95, 11, at(122)), ScaleDecision::ScaledUp { .. }));
    }

    #[test]
    fn test_scale_down_respects_cooldown() {
        let mut scaler = PoolScaler::new(ScalerConfig::default(), start());

        assert_eq!(scaler.evaluate(10, 1, at(200)), ScaleDecision::NoChange);
        assert_eq!(scaler.evaluate(10, 1, at(301)), ScaleDecision::ScaledDown { from: 10, to: 9 });
        assert_eq!(scaler.evaluate(10, 1, at(500)), ScaleDecision::NoChange);
        assert_eq!(scaler.evaluate(10, 1, at(602)), ScaleDecision::ScaledDown { from: 9, to: 8 });
    }

    #[test]
    fn test_scale_down_requires_active_to_fit() {
        let mut scaler = PoolScaler::new(ScalerConfig::default(), start());
        // 10 active would not fit under a max of 9
        assert_eq!(scaler.evaluate(25, 10, at(400)), ScaleDecision::NoChange);
        assert!(matches!(scaler.evaluate(25, 9, at(401)), ScaleDecision::ScaledDown { .. }));
    }

    #[test]
    fn test_caps_are_respected() {
        let config = ScalerConfig {
            initial_max: 19,
            ..Default::default()
        };
        let mut scaler = PoolScaler::new(config, start());
        assert_eq!(scaler.evaluate(100, 19, at(61)), ScaleDecision::ScaledUp { from: 19, to: 20 });
        assert_eq!(scaler.evaluate(100, 20, at(200)), ScaleDecision::NoChange);

        let config = ScalerConfig {
            initial_max: 5,
            ..Default::default()
        };
        let mut scaler = PoolScaler::new(config, start());
        assert_eq!(scaler.evaluate(0, 0, at(1000)), ScaleDecision::NoChange);
    }

    #[test]
    fn test_manual_override_is_bounded() {
        let mut scaler = PoolScaler::new(ScalerConfig::default(), start());
        assert_eq!(scaler.set_current_max(15).unwrap(), 10);
        assert!(scaler.set_current_max(4).is_err());
        assert!(scaler.set_current_max(21).is_err());
        assert_eq!(scaler.current_max(), 15);
    }

    #[test]
    fn test_config_validation() {
        assert!(ScalerConfig::default().validate().is_ok());

        let bad = ScalerConfig {
            scale_down_threshold: 90,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = ScalerConfig {
            initial_max: 30,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(ScaleDecision::NoChange.as_str(), "no_change");
        assert_eq!(ScaleDecision::ScaledUp { from: 1, to: 2 }.new_max(), Some(2));
        let json = serde_json::to_value(ScaleDecision::ScaledDown { from: 3, to: 2 }).unwrap();
        assert_eq!(json["decision"], "scaled_down");
    }
}
