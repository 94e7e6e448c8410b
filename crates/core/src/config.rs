use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_i64(profile: &str, key: &str, default: i64) -> i64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_duration(profile: &str, key: &str, default: Duration) -> Duration {
    profiled_env_opt(profile, key)
        .and_then(|v| parse_duration(&v))
        .unwrap_or(default)
}

/// Parse `"2d"`, `"1d12h"`, `"15m"`, `"90s"`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut rest = s;
    let mut total: u64 = 0;
    let mut parsed_any = false;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit())?;
        if digits == 0 {
            return None;
        }
        let n: u64 = rest[..digits].parse().ok()?;
        let unit = rest[digits..].chars().next()?;
        let scale = match unit {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(n.checked_mul(scale)?)?;
        rest = &rest[digits + unit.len_utf8()..];
        parsed_any = true;
    }
    parsed_any.then(|| Duration::from_secs(total))
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RuleThresholds,
    pub escalation: EscalationConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `PROJWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("PROJWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RuleThresholds::from_env_profiled(p),
            escalation: EscalationConfig::from_env_profiled(p),
            engine: EngineConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  rules:       deadline<={}d inactive>={}d review>{}d/{}d behind>{}% (resolve<{}%) rejection>{}%",
            self.rules.deadline_window_days,
            self.rules.inactivity_days,
            self.rules.slow_review_days,
            self.rules.slow_review_critical_days,
            self.rules.behind_schedule_gap,
            self.rules.behind_schedule_resolve_gap,
            self.rules.rejection_rate_percent,
        );
        tracing::info!(
            "  escalation:  supervisory_after={:?}, admin_after={:?}",
            self.escalation.supervisory_after,
            self.escalation.admin_after,
        );
        tracing::info!(
            "  engine:      max_concurrency={}, data_dir={}",
            self.engine.max_concurrency,
            self.engine.data_dir.display(),
        );
    }
}

// ── Rule thresholds ───────────────────────────────────────────

/// Numeric thresholds of the rule catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// `deadline_approaching` fires when 0 < days until end <= this.
    pub deadline_window_days: i64,
    /// ...and self-reported progress is below this.
    pub deadline_progress_floor: f64,
    /// `inactive_entity` fires at this many idle days.
    pub inactivity_days: i64,
    /// `slow_review` fires when the oldest pending review exceeds this.
    pub slow_review_days: i64,
    /// ...and turns critical above this.
    pub slow_review_critical_days: i64,
    /// `behind_schedule` trigger gap in percentage points.
    pub behind_schedule_gap: f64,
    /// ...critical above this gap.
    pub behind_schedule_critical_gap: f64,
    /// ...auto-resolves once the gap drops below this.
    pub behind_schedule_resolve_gap: f64,
    /// `high_rejection_rate` threshold, percent of submitted milestones.
    pub rejection_rate_percent: f64,
    /// `consecutive_rejections` minimum trailing run.
    pub consecutive_rejections: usize,
    /// `milestone_due_soon` window in days.
    pub milestone_due_window_days: i64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            deadline_window_days: 7,
            deadline_progress_floor: 80.0,
            inactivity_days: 14,
            slow_review_days: 3,
            slow_review_critical_days: 7,
            behind_schedule_gap: 15.0,
            behind_schedule_critical_gap: 30.0,
            behind_schedule_resolve_gap: 10.0,
            rejection_rate_percent: 40.0,
            consecutive_rejections: 2,
            milestone_due_window_days: 3,
        }
    }
}

impl RuleThresholds {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            deadline_window_days: profiled_env_i64(p, "RULE_DEADLINE_WINDOW_DAYS", d.deadline_window_days),
            deadline_progress_floor: profiled_env_f64(p, "RULE_DEADLINE_PROGRESS_FLOOR", d.deadline_progress_floor),
            inactivity_days: profiled_env_i64(p, "RULE_INACTIVITY_DAYS", d.inactivity_days),
            slow_review_days: profiled_env_i64(p, "RULE_SLOW_REVIEW_DAYS", d.slow_review_days),
            slow_review_critical_days: profiled_env_i64(
                p,
                "RULE_SLOW_REVIEW_CRITICAL_DAYS",
                d.slow_review_critical_days,
            ),
            behind_schedule_gap: profiled_env_f64(p, "RULE_BEHIND_SCHEDULE_GAP", d.behind_schedule_gap),
            behind_schedule_critical_gap: profiled_env_f64(
                p,
                "RULE_BEHIND_SCHEDULE_CRITICAL_GAP",
                d.behind_schedule_critical_gap,
            ),
            behind_schedule_resolve_gap: profiled_env_f64(
                p,
                "RULE_BEHIND_SCHEDULE_RESOLVE_GAP",
                d.behind_schedule_resolve_gap,
            ),
            rejection_rate_percent: profiled_env_f64(p, "RULE_REJECTION_RATE_PERCENT", d.rejection_rate_percent),
            consecutive_rejections: profiled_env_usize(
                p,
                "RULE_CONSECUTIVE_REJECTIONS",
                d.consecutive_rejections,
            ),
            milestone_due_window_days: profiled_env_i64(
                p,
                "RULE_MILESTONE_DUE_WINDOW_DAYS",
                d.milestone_due_window_days,
            ),
        }
    }
}

// ── Escalation ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Age at which an unaddressed direct alert goes to the state officer.
    pub supervisory_after: Duration,
    /// Age at which a supervisory escalation goes to central admins.
    pub admin_after: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            supervisory_after: Duration::from_secs(2 * 86_400),
            admin_after: Duration::from_secs(5 * 86_400),
        }
    }
}

impl EscalationConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            supervisory_after: profiled_env_duration(p, "ESCALATE_SUPERVISORY_AFTER", d.supervisory_after),
            admin_after: profiled_env_duration(p, "ESCALATE_ADMIN_AFTER", d.admin_after),
        }
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on entities evaluated in parallel.
    pub max_concurrency: usize,
    /// Directory holding the persisted alert store and input snapshots.
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl EngineConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_concurrency: profiled_env_usize(p, "ENGINE_MAX_CONCURRENCY", 8).max(1),
            data_dir: PathBuf::from(profiled_env_or(p, "ENGINE_DATA_DIR", "data")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_days_and_hours() {
        assert_eq!(parse_duration("2d"), Some(Duration::from_secs(2 * 86_400)));
        assert_eq!(parse_duration("1d12h"), Some(Duration::from_secs(86_400 + 12 * 3_600)));
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
    }

    #[test]
    fn parse_duration_bare_number_as_seconds() {
        assert_eq!(parse_duration("120"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn parse_duration_invalid_returns_none() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("30m15"), None);
    }

    #[test]
    fn defaults_match_rule_catalog() {
        let rules = RuleThresholds::default();
        assert_eq!(rules.deadline_window_days, 7);
        assert_eq!(rules.inactivity_days, 14);
        assert_eq!(rules.behind_schedule_gap, 15.0);
        assert_eq!(rules.behind_schedule_resolve_gap, 10.0);

        let esc = EscalationConfig::default();
        assert_eq!(esc.supervisory_after, Duration::from_secs(172_800));
        assert_eq!(esc.admin_after, Duration::from_secs(432_000));
    }

    #[test]
    fn profile_label_defaults() {
        let config = Config::default();
        assert_eq!(config.profile_label(), "default");
    }
}
