#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use basecall_watch::config::{
    BasecallerSection, ConfigFile, LoggingSection, RawConfigFile, StateFilesSection,
    WatcherSection,
};
use basecall_watch::engine::Scheduler;
use basecall_watch::fs::mock::MockFileSystem;
use basecall_watch::fs::FileSystem;

use crate::fake_spawner::FakeSpawner;

pub const WATCH_DIR: &str = "/data/runs";
pub const OUTPUT_DIR: &str = "/data/basecalled";
pub const EXECUTABLE: &str = "/opt/basecaller/bin/basecaller";
pub const MODEL_CONFIG: &str = "/opt/basecaller/models/hac.cfg";
pub const ARGUMENTS: &str = "basecaller {config_path} {input_dir} --output-dir {output_dir}";

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                watcher: WatcherSection {
                    watch_directory: PathBuf::from(WATCH_DIR),
                    check_interval: 1,
                    ready_signal_file: None,
                },
                basecaller: BasecallerSection {
                    executable: PathBuf::from(EXECUTABLE),
                    output_base_directory: PathBuf::from(OUTPUT_DIR),
                    config: PathBuf::from(MODEL_CONFIG),
                    arguments: ARGUMENTS.to_string(),
                    max_concurrent_jobs: 1,
                },
                logging: LoggingSection::default(),
                state_files: StateFilesSection::default(),
            },
        }
    }

    pub fn watch_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.watcher.watch_directory = dir.into();
        self
    }

    pub fn output_base(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.basecaller.output_base_directory = dir.into();
        self
    }

    pub fn executable(mut self, exe: impl Into<PathBuf>) -> Self {
        self.config.basecaller.executable = exe.into();
        self
    }

    pub fn arguments(mut self, template: &str) -> Self {
        self.config.basecaller.arguments = template.to_string();
        self
    }

    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.basecaller.max_concurrent_jobs = n;
        self
    }

    pub fn ready_signal(mut self, name: &str) -> Self {
        self.config.watcher.ready_signal_file = Some(name.to_string());
        self
    }

    pub fn markers(mut self, processing: &str, completed: &str, failed: &str) -> Self {
        self.config.state_files = StateFilesSection {
            processing: processing.to_string(),
            completed: completed.to_string(),
            failed: failed.to_string(),
        };
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory tree with the executable, model config, output base and watch
/// directory from `cfg` already in place.
pub fn mock_fs_for(cfg: &ConfigFile) -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(&cfg.basecaller.executable);
    fs.add_file(&cfg.basecaller.config);
    fs.add_dir(&cfg.basecaller.output_base_directory);
    fs.add_dir(&cfg.watcher.watch_directory);
    fs
}

/// Everything a scheduler test needs, with handles kept for assertions.
pub struct Harness {
    pub fs: MockFileSystem,
    pub spawner: FakeSpawner,
    pub scheduler: Scheduler<FakeSpawner>,
    pub watch_dir: PathBuf,
}

impl Harness {
    pub fn new(cfg: &ConfigFile) -> Self {
        let fs = mock_fs_for(cfg);
        let spawner = FakeSpawner::new();
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let scheduler = Scheduler::from_config(cfg, shared, spawner.clone());
        Self {
            fs,
            spawner,
            scheduler,
            watch_dir: cfg.watcher.watch_directory.clone(),
        }
    }

    /// Path of run `name` under the watch directory.
    pub fn run(&self, name: &str) -> PathBuf {
        self.watch_dir.join(name)
    }

    /// Create an empty run directory.
    pub fn add_run(&self, name: &str) -> PathBuf {
        let path = self.run(name);
        self.fs.add_dir(&path);
        path
    }

    /// Create a file inside a run directory (marker, ready signal, ...).
    pub fn add_file_in(&self, run: &Path, name: &str) {
        self.fs.add_file(run.join(name));
    }
}
