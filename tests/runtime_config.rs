use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use vision_runtime::config::RuntimeConfig;
use vision_runtime::ImageEncoding;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "VISION_RUNTIME_CONFIG",
        "VISION_CAMERA_FPS",
        "VISION_CAMERA_WIDTH",
        "VISION_CAMERA_HEIGHT",
        "VISION_SYNCHRONOUS",
        "VISION_TICK_MS",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = RuntimeConfig::load().expect("load config");
    assert_eq!(cfg, RuntimeConfig::default());
    assert_eq!((cfg.camera.width, cfg.camera.height), (640, 360));
    assert_eq!(cfg.camera.encoding, ImageEncoding::BayerRggb8);
    assert_eq!(cfg.camera.fps, 15);
    assert!(!cfg.runner.synchronous);
    assert_eq!(cfg.runner.tick, Duration::from_millis(66));
    assert_eq!(cfg.cache.warn_num_caches, 8);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        r#"{
            "camera": { "width": 320, "height": 240, "fps": 30, "encoding": "rgb8" },
            "runner": { "synchronous": true, "tick_ms": 20 },
            "cache": { "warn_num_caches": 4 }
        }"#,
    );
    std::env::set_var("VISION_RUNTIME_CONFIG", file.path());
    std::env::set_var("VISION_CAMERA_FPS", "12");
    std::env::set_var("VISION_SYNCHRONOUS", "false");

    let cfg = RuntimeConfig::load().expect("load config");
    assert_eq!((cfg.camera.width, cfg.camera.height), (320, 240));
    assert_eq!(cfg.camera.encoding, ImageEncoding::Rgb8);
    assert_eq!(cfg.camera.fps, 12);
    assert!(!cfg.runner.synchronous);
    assert_eq!(cfg.runner.tick, Duration::from_millis(20));
    assert_eq!(cfg.cache.warn_num_caches, 4);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("VISION_SYNCHRONOUS", "sometimes");
    assert!(RuntimeConfig::load().is_err());
    clear_env();

    std::env::set_var("VISION_TICK_MS", "0");
    assert!(RuntimeConfig::load().is_err());
    clear_env();

    std::env::set_var("VISION_CAMERA_WIDTH", "641");
    let err = RuntimeConfig::load().unwrap_err();
    assert!(err.to_string().contains("even"));
    clear_env();

    let file = config_file(r#"{ "camera": { "fps": 0 } }"#);
    assert!(RuntimeConfig::load_from(Some(file.path())).is_err());

    let broken = config_file("{ not json");
    assert!(RuntimeConfig::load_from(Some(broken.path())).is_err());
}
