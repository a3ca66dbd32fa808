//! Manifest parsing tests: line grammar, guard rejections, blacklist
//! stat checks and default-file creation.

mod helpers;

use std::fs;

use flashset::error::UpdateError;
use flashset::logging::UpdateLog;
use flashset::manifest::{self, is_protected};
use flashset::ui::SilentNotifier;

use helpers::TestEnv;

fn parse_manifest(env: &TestEnv, content: &str) -> flashset::manifest::Manifest {
    fs::write(&env.config.manifest, content).unwrap();
    manifest::parse(
        &env.config.manifest,
        &env.mount_dir,
        &env.source_root,
        &env.config.backup_root,
        &SilentNotifier,
        &UpdateLog::disabled(),
    )
    .expect("manifest should parse")
}

#[test]
fn missing_manifest_is_created_with_defaults() {
    let env = TestEnv::new();
    assert!(!env.config.manifest.exists());

    let manifest = manifest::parse(
        &env.config.manifest,
        &env.mount_dir,
        &env.source_root,
        &env.config.backup_root,
        &SilentNotifier,
        &UpdateLog::disabled(),
    )
    .unwrap();

    let written = fs::read_to_string(&env.config.manifest).unwrap();
    assert!(written.starts_with("#:Log=1\n"));
    assert!(written.contains("#:LogFile="));
    assert!(written.contains("/var/tuxbox/config\n"));

    // The freshly written file parses back to one copy entry.
    assert_eq!(manifest.copy_list, vec!["/var/tuxbox/config".to_string()]);
    assert!(manifest.delete_list.is_empty());
    assert!(manifest.log_enabled);
}

#[test]
fn empty_manifest_is_an_error() {
    let env = TestEnv::new();
    fs::write(&env.config.manifest, "").unwrap();

    let err = manifest::parse(
        &env.config.manifest,
        &env.mount_dir,
        &env.source_root,
        &env.config.backup_root,
        &SilentNotifier,
        &UpdateLog::disabled(),
    )
    .unwrap_err();
    assert!(matches!(err, UpdateError::ManifestEmpty(_)));
}

#[test]
fn line_classification() {
    let env = TestEnv::new();
    env.write_source_file("etc/secret.conf", b"top secret");

    let manifest = parse_manifest(
        &env,
        "# a comment\n\
         #:Log=0\n\
         #:LogFile=/tmp/other.log\n\
         #:Unknown=whatever\n\
         /etc/passwd\n\
         +/etc/group   # explicit add marker\n\
         -/etc/secret.conf\n\
         ~/var/cache/*\n\
         \n",
    );

    assert_eq!(
        manifest.copy_list,
        vec!["/etc/passwd".to_string(), "/etc/group".to_string()]
    );
    assert_eq!(manifest.black_list, vec!["/etc/secret.conf".to_string()]);
    assert_eq!(
        manifest.delete_list,
        vec![env
            .mount_dir
            .join("var/cache/*")
            .to_string_lossy()
            .into_owned()]
    );
    assert!(!manifest.log_enabled);
    assert_eq!(manifest.log_file, "/tmp/other.log");
}

#[test]
fn blacklist_requires_a_regular_file() {
    let env = TestEnv::new();
    // /etc/exists.conf is a real file, /etc/ghost.conf is absent,
    // /etc/subdir is a directory.
    env.write_source_file("etc/exists.conf", b"x");
    fs::create_dir_all(env.source_root.join("etc/subdir")).unwrap();

    let manifest = parse_manifest(
        &env,
        "-/etc/exists.conf\n\
         -/etc/ghost.conf\n\
         -/etc/subdir\n",
    );

    assert_eq!(manifest.black_list, vec!["/etc/exists.conf".to_string()]);
}

#[test]
fn protected_paths_are_skipped() {
    let env = TestEnv::new();

    let manifest = parse_manifest(
        &env,
        "/dev/mtd0\n\
         /proc/mtd\n\
         /sys/class\n\
         ~/tmp/junk\n\
         ~/mnt/usb\n\
         /etc/passwd\n",
    );

    assert_eq!(manifest.copy_list, vec!["/etc/passwd".to_string()]);
    assert!(manifest.delete_list.is_empty());
}

#[test]
fn guard_predicate() {
    for path in ["/", "/*", "/*.*", "/dev", "/dev/mtd0", "/proc/mtd", "/sys", "/mnt/hdd", "/tmp/x"] {
        assert!(is_protected(path), "{} should be protected", path);
    }
    for path in ["/etc", "/var/tuxbox/config", "/etc/tmp"] {
        // "/etc/tmp" is under /etc, not /tmp.
        assert!(!is_protected(path), "{} should be allowed", path);
    }
}

#[test]
fn too_short_entries_are_dropped() {
    let env = TestEnv::new();
    env.write_source_file("x", b"one letter");

    let manifest = parse_manifest(
        &env,
        "x\n\
         -x\n\
         ~x\n\
         ab\n",
    );

    assert_eq!(manifest.copy_list, vec!["ab".to_string()]);
    assert!(manifest.black_list.is_empty());
    assert!(manifest.delete_list.is_empty());
}

#[test]
fn order_is_preserved() {
    let env = TestEnv::new();

    let manifest = parse_manifest(
        &env,
        "/var/tuxbox/config\n\
         /etc/passwd\n\
         /etc/fstab\n",
    );

    assert_eq!(
        manifest.copy_list,
        vec![
            "/var/tuxbox/config".to_string(),
            "/etc/passwd".to_string(),
            "/etc/fstab".to_string(),
        ]
    );
}

#[test]
fn log_directives_with_blank_values_keep_defaults() {
    let env = TestEnv::new();

    let manifest = parse_manifest(&env, "#:Log=\n#:LogFile=\n/etc/passwd\n");

    assert!(manifest.log_enabled);
    assert_eq!(manifest.log_file, "/tmp/update.log");
}
