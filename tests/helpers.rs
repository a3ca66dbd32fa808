//! Shared test utilities for flashset tests.
#![allow(dead_code)] // not every test file uses every helper

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use flashset::config::Config;
use flashset::process::Runner;

/// Kernel release the test module tree is created for.
pub const TEST_RELEASE: &str = "4.9.0-stb";

/// Test environment: a scratch tree standing in for the live system,
/// the mounted image, /dev, /proc and /lib/modules.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Stand-in for the live system root (manifest copy sources).
    pub source_root: PathBuf,
    /// Stand-in for the mounted firmware image.
    pub mount_dir: PathBuf,
    /// Holds the fake mtdblock device nodes.
    pub dev_dir: PathBuf,
    /// Fake /proc/mtd.
    pub proc_mtd: PathBuf,
    /// Fake /proc/modules.
    pub proc_modules: PathBuf,
    pub config: Config,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path().to_path_buf();

        let source_root = base.join("system");
        let mount_dir = base.join("image_mount");
        let dev_dir = base.join("dev");
        let module_dir = base.join("lib/modules");
        let proc_mtd = base.join("proc_mtd");
        let proc_modules = base.join("proc_modules");

        for dir in [&source_root, &mount_dir, &dev_dir] {
            fs::create_dir_all(dir).expect("Failed to create test dir");
        }

        // Driver module present for the configured release.
        let release_dir = module_dir.join(TEST_RELEASE);
        fs::create_dir_all(&release_dir).expect("Failed to create module dir");
        fs::write(release_dir.join("mtdram.ko"), b"\x7fELF fake module").unwrap();

        // Nothing loaded yet.
        fs::write(&proc_modules, "").unwrap();

        let config = Config {
            manifest: base.join("settingsupdate.conf"),
            backup_root: "/var/tuxbox/config".to_string(),
            mount_dir: mount_dir.clone(),
            module_dir,
            proc_mtd: proc_mtd.clone(),
            proc_modules: proc_modules.clone(),
            dev_dir: dev_dir.clone(),
            source_root: source_root.clone(),
            system_partition: "systemFS".to_string(),
            filesystem: "jffs2".to_string(),
            log_file: base.join("update.log").to_string_lossy().into_owned(),
            kernel_release: Some(TEST_RELEASE.to_string()),
        };

        Self {
            _temp_dir: temp_dir,
            source_root,
            mount_dir,
            dev_dir,
            proc_mtd,
            proc_modules,
            config,
        }
    }

    /// Write a fake MTD table with the system partition and, optionally,
    /// the mtdram device row.
    pub fn write_mtd_table(&self, system: (u32, u32), ram: Option<(u32, u32)>) {
        let mut table = String::from("dev:    size   erasesize  name\n");
        table.push_str(&format!(
            "mtd1: {:08x} {:08x} \"systemFS\"\n",
            system.0, system.1
        ));
        if let Some((size, erase)) = ram {
            table.push_str(&format!(
                "mtd2: {:08x} {:08x} \"mtdram test device\"\n",
                size, erase
            ));
        }
        fs::write(&self.proc_mtd, table).unwrap();
    }

    /// Create the fake block device node backing the mtdram device.
    pub fn create_block_device(&self, index: u32, size: u32) {
        let path = self.dev_dir.join(format!("mtdblock{}", index));
        fs::write(path, vec![0u8; size as usize]).unwrap();
    }

    /// Write a file under the fake live system root.
    pub fn write_source_file(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.source_root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write a file inside the fake mounted image.
    pub fn write_mount_file(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.mount_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }
}

/// Runner double for the privileged commands.
///
/// insmod/rmmod edit the fake /proc/modules the way the kernel would;
/// mount and umount are no-ops because the "mounted tree" is just a
/// directory the test pre-populates.
pub struct FakeRunner {
    proc_modules: PathBuf,
    pub fail_mount: bool,
    pub fail_umount: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeRunner {
    pub fn new(env: &TestEnv) -> Self {
        Self {
            proc_modules: env.proc_modules.clone(),
            fail_mount: false,
            fail_umount: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_mount(env: &TestEnv) -> Self {
        let mut runner = Self::new(env);
        runner.fail_mount = true;
        runner
    }

    pub fn failing_umount(env: &TestEnv) -> Self {
        let mut runner = Self::new(env);
        runner.fail_umount = true;
        runner
    }

    pub fn called(&self, program: &str) -> bool {
        self.calls
            .borrow()
            .iter()
            .any(|c| c.split_whitespace().next() == Some(program))
    }
}

impl Runner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> i32 {
        self.calls
            .borrow_mut()
            .push(format!("{} {}", program, args.join(" ")));
        match program {
            "insmod" => {
                fs::write(&self.proc_modules, "mtdram 9248 0 - Live 0x00000000\n").unwrap();
                0
            }
            "rmmod" => {
                fs::write(&self.proc_modules, "").unwrap();
                0
            }
            "mount" => {
                if self.fail_mount {
                    1
                } else {
                    0
                }
            }
            "umount" => {
                if self.fail_umount {
                    1
                } else {
                    0
                }
            }
            _ => 0,
        }
    }
}

/// True if the fake /proc/modules currently lists the driver.
pub fn driver_loaded(env: &TestEnv) -> bool {
    fs::read_to_string(&env.proc_modules)
        .map(|c| c.contains("mtdram"))
        .unwrap_or(false)
}

/// Assert helper: file exists and has the given content.
pub fn assert_file_content(path: &Path, expected: &[u8]) {
    let content = fs::read(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    assert_eq!(content, expected, "content mismatch for {}", path.display());
}
