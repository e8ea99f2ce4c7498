#![cfg(target_os = "linux")]

use std::path::{Path, PathBuf};

use uuid::Uuid;

use snipsskills_linux::{bluetooth, systemd};

#[test]
fn all_units_render_into_one_directory() {
    let (dir, _guard) = create_unit_dir();
    let work_dir = Path::new("/home/pi/lights");

    let specs = [
        systemd::skills_server_unit(work_dir).expect("skills unit"),
        systemd::snips_unit(),
        bluetooth::bluetooth_unit("broker.local", 1883).expect("bluetooth unit"),
    ];
    for spec in &specs {
        let path = systemd::write_unit(&dir, spec).expect("write unit");
        assert_eq!(path, dir.join(&spec.name));
    }

    let mut names: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["snips.service", "snipsbluetooth.service", "snipsskills.service"]
    );

    let bt = std::fs::read_to_string(dir.join("snipsbluetooth.service")).unwrap();
    assert!(bt.contains("--mqtt broker.local:1883"));
    let skills = std::fs::read_to_string(dir.join("snipsskills.service")).unwrap();
    assert!(skills.contains("--snipsfile \"/home/pi/lights/Snipsfile\""));
}

fn create_unit_dir() -> (PathBuf, CleanupDir) {
    let dir = std::env::temp_dir().join(format!("snipsskills-units-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create unit dir");
    (dir.clone(), CleanupDir(dir))
}

struct CleanupDir(PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
