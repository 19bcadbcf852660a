//! Configuration Vault – reads/writes `~/.turret/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use turret_runtime::{CooldownProfile, DetectionLoopConfig, TargetingConfig};
use turret_types::CONFIDENCE_THRESHOLD;
use turret_vision::{ScanConfig, StrategyKind, Verifier};

/// Persisted operator configuration stored in `~/.turret/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Search strategy: `escalating` or `center-priority`.
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Scores strictly above this count as a positive region.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    #[serde(default = "default_verification_rounds")]
    pub verification_rounds: u32,

    /// Positive rounds needed to accept a candidate.
    #[serde(default = "default_verification_required")]
    pub verification_required: u32,

    /// Pan steps per aim correction.
    #[serde(default = "default_aim_step")]
    pub aim_step: i32,

    #[serde(default)]
    pub cooldown_profile: CooldownProfile,

    /// Explicit cooldown; overrides `cooldown_profile` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<u64>,

    #[serde(default = "default_inter_cycle_ms")]
    pub inter_cycle_ms: u64,

    #[serde(default = "default_post_aim_ms")]
    pub post_aim_ms: u64,

    #[serde(default = "default_post_fire_ms")]
    pub post_fire_ms: u64,

    #[serde(default = "default_not_ready_ms")]
    pub not_ready_ms: u64,

    /// Upper bound on a single classifier call.
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,

    /// Revert to idle after this many empty cycles.  Unset keeps tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_missed_cycles: Option<u32>,

    /// Where captured frames are written as PGM.
    #[serde(default = "default_frame_path")]
    pub frame_path: PathBuf,
}

fn default_confidence_threshold() -> f32 {
    CONFIDENCE_THRESHOLD
}
fn default_verification_rounds() -> u32 {
    2
}
fn default_verification_required() -> u32 {
    1
}
fn default_aim_step() -> i32 {
    50
}
fn default_inter_cycle_ms() -> u64 {
    250
}
fn default_post_aim_ms() -> u64 {
    500
}
fn default_post_fire_ms() -> u64 {
    1000
}
fn default_not_ready_ms() -> u64 {
    200
}
fn default_inference_timeout_ms() -> u64 {
    2000
}
fn default_frame_path() -> PathBuf {
    std::env::temp_dir().join("turret").join("capture.pgm")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            confidence_threshold: default_confidence_threshold(),
            verification_rounds: default_verification_rounds(),
            verification_required: default_verification_required(),
            aim_step: default_aim_step(),
            cooldown_profile: CooldownProfile::default(),
            cooldown_ms: None,
            inter_cycle_ms: default_inter_cycle_ms(),
            post_aim_ms: default_post_aim_ms(),
            post_fire_ms: default_post_fire_ms(),
            not_ready_ms: default_not_ready_ms(),
            inference_timeout_ms: default_inference_timeout_ms(),
            max_missed_cycles: None,
            frame_path: default_frame_path(),
        }
    }
}

impl Config {
    /// Effective post-fire cooldown.
    pub fn cooldown(&self) -> Duration {
        self.cooldown_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.cooldown_profile.duration())
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn verifier(&self) -> Verifier {
        Verifier {
            rounds: self.verification_rounds,
            required: self.verification_required,
            threshold: self.confidence_threshold,
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            threshold: self.confidence_threshold,
            ..ScanConfig::default()
        }
    }

    /// Reject settings under which no detection could ever pass.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "confidence_threshold must be in [0, 1), got {}",
                self.confidence_threshold
            ));
        }
        if self.verification_rounds == 0 {
            return Err("verification_rounds must be at least 1".to_string());
        }
        if self.verification_required == 0 || self.verification_required > self.verification_rounds {
            return Err(format!(
                "verification_required must be in 1..={}, got {}",
                self.verification_rounds, self.verification_required
            ));
        }
        Ok(())
    }

    /// Library-side configuration for the detection loop.
    pub fn loop_config(&self) -> DetectionLoopConfig {
        DetectionLoopConfig {
            strategy: self.strategy,
            scan: self.scan_config(),
            verifier: self.verifier(),
            targeting: TargetingConfig {
                aim_step: self.aim_step,
                cooldown: self.cooldown(),
                post_aim_settle: Duration::from_millis(self.post_aim_ms),
                not_ready_settle: Duration::from_millis(self.not_ready_ms),
                post_fire_settle: Duration::from_millis(self.post_fire_ms),
                inter_cycle: Duration::from_millis(self.inter_cycle_ms),
                max_missed_cycles: self.max_missed_cycles,
            },
        }
    }
}

/// Return the path to `~/.turret/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".turret").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// The on-disk config, or the defaults when there is none, with environment
/// overrides applied either way.
pub fn effective() -> Result<Config, String> {
    let mut cfg = load()?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    cfg.validate()
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `TURRET_*` environment variable overrides to `cfg`.  Unparseable
/// values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `TURRET_STRATEGY` | `strategy` |
/// | `TURRET_CONFIDENCE_THRESHOLD` | `confidence_threshold` (must be in `[0, 1)`) |
/// | `TURRET_AIM_STEP` | `aim_step` |
/// | `TURRET_COOLDOWN_MS` | `cooldown_ms` |
/// | `TURRET_FRAME_PATH` | `frame_path` |
/// | `TURRET_INFERENCE_TIMEOUT_MS` | `inference_timeout_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TURRET_STRATEGY")
        && let Ok(kind) = v.parse::<StrategyKind>()
    {
        cfg.strategy = kind;
    }
    if let Ok(v) = std::env::var("TURRET_CONFIDENCE_THRESHOLD")
        && let Ok(t) = v.parse::<f32>()
        && (0.0..1.0).contains(&t)
    {
        cfg.confidence_threshold = t;
    }
    if let Ok(v) = std::env::var("TURRET_AIM_STEP")
        && let Ok(step) = v.parse::<i32>()
    {
        cfg.aim_step = step;
    }
    if let Ok(v) = std::env::var("TURRET_COOLDOWN_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.cooldown_ms = Some(ms);
    }
    if let Ok(v) = std::env::var("TURRET_FRAME_PATH")
        && !v.trim().is_empty()
    {
        cfg.frame_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("TURRET_INFERENCE_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.inference_timeout_ms = ms;
    }
}

/// Save the config to disk, creating `~/.turret/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            strategy: StrategyKind::CenterPriority,
            cooldown_profile: CooldownProfile::LoadCycle,
            max_missed_cycles: Some(5),
            verification_rounds: 3,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "strategy = \"center-priority\"\npost_aim_ms = 800\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.strategy, StrategyKind::CenterPriority);
        assert_eq!(loaded.post_aim_ms, 800);
        assert_eq!(loaded.verification_rounds, 2);
        assert_eq!(loaded.not_ready_ms, 200);
        assert_eq!(loaded.max_missed_cycles, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "strategy = \"spiral\"").unwrap();
        assert!(load_from(&path).unwrap_err().contains("parse"));
    }

    #[test]
    fn unusable_verification_settings_are_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        for raw in [
            "verification_rounds = 2\nverification_required = 3\n",
            "verification_rounds = 0\nverification_required = 0\n",
            "verification_required = 0\n",
            "confidence_threshold = 1.5\n",
            "confidence_threshold = -0.1\n",
        ] {
            std::fs::write(&path, raw).unwrap();
            let err = load_from(&path).unwrap_err();
            assert!(err.starts_with("Failed to parse config"), "{raw}: {err}");
        }

        std::fs::write(&path, "verification_rounds = 3\nverification_required = 3\n").unwrap();
        assert!(load_from(&path).expect("valid").is_some());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_turret_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".turret"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn explicit_cooldown_wins_over_profile() {
        let mut cfg = Config {
            cooldown_profile: CooldownProfile::LoadCycle,
            ..Config::default()
        };
        assert_eq!(cfg.cooldown(), Duration::from_secs(6));
        cfg.cooldown_ms = Some(1500);
        assert_eq!(cfg.cooldown(), Duration::from_millis(1500));
        assert_eq!(cfg.loop_config().targeting.cooldown, Duration::from_millis(1500));
    }

    #[test]
    fn loop_config_carries_thresholds() {
        let cfg = Config {
            confidence_threshold: 0.6,
            verification_required: 2,
            ..Config::default()
        };
        let lc = cfg.loop_config();
        assert_eq!(lc.scan.threshold, 0.6);
        assert_eq!(lc.verifier.threshold, 0.6);
        assert_eq!(lc.verifier.required, 2);
        assert_eq!(lc.scan.precheck_samples, 3);
    }

    #[test]
    fn apply_env_overrides_sets_fields() {
        // SAFETY: only this test touches the TURRET_* env-vars.
        unsafe {
            std::env::set_var("TURRET_STRATEGY", "center-priority");
            std::env::set_var("TURRET_AIM_STEP", "75");
            std::env::set_var("TURRET_COOLDOWN_MS", "3000");
            std::env::set_var("TURRET_FRAME_PATH", "/var/lib/turret/frame.pgm");
            std::env::set_var("TURRET_INFERENCE_TIMEOUT_MS", "900");
            std::env::set_var("TURRET_CONFIDENCE_THRESHOLD", "0.8");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        unsafe {
            for var in [
                "TURRET_STRATEGY",
                "TURRET_AIM_STEP",
                "TURRET_COOLDOWN_MS",
                "TURRET_FRAME_PATH",
                "TURRET_INFERENCE_TIMEOUT_MS",
                "TURRET_CONFIDENCE_THRESHOLD",
            ] {
                std::env::remove_var(var);
            }
        }
        assert_eq!(cfg.strategy, StrategyKind::CenterPriority);
        assert_eq!(cfg.aim_step, 75);
        assert_eq!(cfg.cooldown(), Duration::from_millis(3000));
        assert_eq!(cfg.frame_path, PathBuf::from("/var/lib/turret/frame.pgm"));
        assert_eq!(cfg.inference_timeout(), Duration::from_millis(900));
        assert_eq!(cfg.confidence_threshold, 0.8);

        // Out-of-range and unparseable values are ignored.
        unsafe {
            std::env::set_var("TURRET_CONFIDENCE_THRESHOLD", "1.5");
            std::env::set_var("TURRET_AIM_STEP", "fifty");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        unsafe {
            std::env::remove_var("TURRET_CONFIDENCE_THRESHOLD");
            std::env::remove_var("TURRET_AIM_STEP");
        }
        assert_eq!(cfg.confidence_threshold, CONFIDENCE_THRESHOLD);
        assert_eq!(cfg.aim_step, 50);
    }
}
