// src/exec/launcher.rs

//! Job launcher: turns one pending run into a running basecaller process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::exec::process::{LaunchCommand, ProcessSpawner};
use crate::exec::template::{ArgTemplate, TemplateError, TemplateVars};
use crate::exec::tracker::{ActiveJob, ActiveJobTable};
use crate::fs::{resolve_path, FileSystem};
use crate::state::MarkerStore;
use crate::types::RunState;

/// Static launch parameters taken from the `[basecaller]` config section.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub executable: PathBuf,
    pub output_base: PathBuf,
    /// The basecaller's own configuration file, passed as `{config_path}`.
    pub basecaller_config: PathBuf,
    pub template: ArgTemplate,
}

/// Why a launch did not produce a running process.
///
/// Every variant is scoped to a single run.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("basecaller executable not found: {0:?}")]
    MissingExecutable(PathBuf),

    #[error("failed to create output directory {path:?}: {error:#}")]
    OutputDir { path: PathBuf, error: anyhow::Error },

    #[error("could not resolve {path:?}: {error:#}")]
    Resolve { path: PathBuf, error: anyhow::Error },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("could not mark run as processing: {0:#}")]
    MarkProcessing(anyhow::Error),

    #[error("failed to launch basecaller: {0:#}")]
    Spawn(anyhow::Error),
}

impl LaunchError {
    /// Whether this failure was recorded on disk with the failed marker.
    ///
    /// The other variants leave the run pending so it is retried next tick.
    pub fn marks_run_failed(&self) -> bool {
        matches!(
            self,
            LaunchError::MissingExecutable(_) | LaunchError::Template(_) | LaunchError::Spawn(_)
        )
    }
}

/// A successfully started job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedJob {
    pub pid: Option<u32>,
    pub output_dir: PathBuf,
    pub command: LaunchCommand,
}

/// Builds the command line for a run and starts it through a
/// [`ProcessSpawner`].
pub struct JobLauncher<S: ProcessSpawner> {
    fs: Arc<dyn FileSystem>,
    markers: MarkerStore,
    spawner: S,
    settings: LaunchSettings,
}

impl<S: ProcessSpawner> std::fmt::Debug for JobLauncher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLauncher")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S: ProcessSpawner> JobLauncher<S> {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        markers: MarkerStore,
        spawner: S,
        settings: LaunchSettings,
    ) -> Self {
        Self {
            fs,
            markers,
            spawner,
            settings,
        }
    }

    /// Launch the basecaller for `run` and register it in `table`.
    ///
    /// The run is marked `processing` before the process is started, so a
    /// crash in between leaves a visible in-flight marker instead of a
    /// pending run that would be launched twice. Configuration problems and
    /// spawn failures mark the run `failed`; output-directory and marker
    /// write problems leave it pending for the next tick.
    pub fn launch(
        &mut self,
        run: &Path,
        table: &mut ActiveJobTable,
    ) -> Result<LaunchedJob, LaunchError> {
        let run_name = run_name(run);

        if !self.fs.is_file(&self.settings.executable) {
            let err = LaunchError::MissingExecutable(self.settings.executable.clone());
            error!(run = %run_name, error = %err, "cannot launch basecaller");
            self.mark_failed(run, &run_name);
            return Err(err);
        }

        let output_dir = self.output_dir_for(run);
        if let Err(e) = self.fs.create_dir_all(&output_dir) {
            let err = LaunchError::OutputDir {
                path: output_dir,
                error: e,
            };
            warn!(run = %run_name, error = %err, "launch deferred");
            return Err(err);
        }
        info!(run = %run_name, output_dir = ?output_dir, "ensured output directory exists");

        let command = match self.build_command(run, &output_dir) {
            Ok(command) => command,
            Err(err @ LaunchError::Template(_)) => {
                error!(run = %run_name, error = %err, "cannot build basecaller command");
                self.mark_failed(run, &run_name);
                return Err(err);
            }
            Err(err) => {
                warn!(run = %run_name, error = %err, "launch deferred");
                return Err(err);
            }
        };

        info!(run = %run_name, "attempting to launch basecalling");
        info!(run = %run_name, command = %command, "basecaller command");

        if let Err(e) = self.markers.set_state(run, RunState::Processing) {
            let err = LaunchError::MarkProcessing(e);
            warn!(run = %run_name, error = %err, "launch deferred");
            return Err(err);
        }

        match self.spawner.spawn(&command) {
            Ok(process) => {
                let job = ActiveJob::new(run_name.clone(), process);
                let pid = job.pid;
                table.insert(run.to_path_buf(), job);
                info!(run = %run_name, pid = ?pid, "launched basecaller");
                Ok(LaunchedJob {
                    pid,
                    output_dir,
                    command,
                })
            }
            Err(e) => {
                let err = LaunchError::Spawn(e);
                error!(run = %run_name, error = %err, "basecaller launch failed");
                self.mark_failed(run, &run_name);
                table.remove(run);
                Err(err)
            }
        }
    }

    /// Render the command for `run` without touching the filesystem beyond
    /// path resolution. Used by `--dry-run`.
    pub fn preview(&self, run: &Path) -> Result<LaunchCommand, LaunchError> {
        self.build_command(run, &self.output_dir_for(run))
    }

    /// `output_base/<run directory name>`, joined from the raw OS name so
    /// distinct runs never share an output directory.
    fn output_dir_for(&self, run: &Path) -> PathBuf {
        match run.file_name() {
            Some(name) => self.settings.output_base.join(name),
            None => self.settings.output_base.clone(),
        }
    }

    fn build_command(&self, run: &Path, output_dir: &Path) -> Result<LaunchCommand, LaunchError> {
        let input_dir = self.resolve(run)?;
        let output_dir = self.resolve(output_dir)?;
        let config_path = self.resolve(&self.settings.basecaller_config)?;

        let args = self.settings.template.render(&TemplateVars {
            input_dir: &input_dir,
            output_dir: &output_dir,
            config_path: &config_path,
        })?;

        Ok(LaunchCommand {
            program: self.settings.executable.clone(),
            args,
        })
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, LaunchError> {
        resolve_path(self.fs.as_ref(), path).map_err(|error| LaunchError::Resolve {
            path: path.to_path_buf(),
            error,
        })
    }

    fn mark_failed(&self, run: &Path, run_name: &str) {
        if let Err(e) = self.markers.set_state(run, RunState::Failed) {
            warn!(run = %run_name, error = %e, "could not mark run as failed");
        }
    }
}

/// Display name for log fields only; never used to build paths.
fn run_name(run: &Path) -> String {
    run.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| run.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::process::JobProcess;
    use crate::fs::mock::MockFileSystem;
    use crate::state::MarkerNames;
    use crate::types::JobOutcome;

    #[derive(Debug)]
    struct Sleeping;

    impl JobProcess for Sleeping {
        fn id(&self) -> Option<u32> {
            Some(7)
        }
        fn try_wait(&mut self) -> anyhow::Result<Option<JobOutcome>> {
            Ok(None)
        }
    }

    /// Records commands; fails when `refuse` is set.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<LaunchCommand>,
        refuse: bool,
    }

    impl ProcessSpawner for Recorder {
        fn spawn(&mut self, command: &LaunchCommand) -> anyhow::Result<Box<dyn JobProcess>> {
            self.seen.push(command.clone());
            if self.refuse {
                anyhow::bail!("exec format error");
            }
            Ok(Box::new(Sleeping))
        }
    }

    fn setup(template: &str, refuse: bool) -> (MockFileSystem, MarkerStore, JobLauncher<Recorder>) {
        let fs = MockFileSystem::new();
        fs.add_file("/opt/dorado");
        fs.add_file("/opt/hac.cfg");
        fs.add_dir("/out");
        fs.add_dir("/watch/runA");

        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let markers = MarkerStore::new(Arc::clone(&shared), MarkerNames::default());
        let settings = LaunchSettings {
            executable: PathBuf::from("/opt/dorado"),
            output_base: PathBuf::from("/out"),
            basecaller_config: PathBuf::from("/opt/hac.cfg"),
            template: ArgTemplate::parse(template).unwrap(),
        };
        let spawner = Recorder {
            refuse,
            ..Recorder::default()
        };
        let launcher = JobLauncher::new(shared, markers.clone(), spawner, settings);
        (fs, markers, launcher)
    }

    const TEMPLATE: &str = "basecaller {config_path} {input_dir} -o {output_dir}";

    #[test]
    fn successful_launch_marks_processing_and_registers_job() {
        let (fs, markers, mut launcher) = setup(TEMPLATE, false);
        let mut table = ActiveJobTable::new();
        let run = Path::new("/watch/runA");

        let launched = launcher.launch(run, &mut table).unwrap();

        assert_eq!(launched.pid, Some(7));
        assert_eq!(launched.output_dir, PathBuf::from("/out/runA"));
        assert_eq!(
            launched.command.args,
            vec!["basecaller", "/opt/hac.cfg", "/watch/runA", "-o", "/out/runA"]
        );
        assert!(fs.is_dir(Path::new("/out/runA")));
        assert_eq!(markers.get_state(run), RunState::Processing);
        assert!(table.contains(run));
    }

    #[test]
    fn missing_executable_marks_failed_without_spawning() {
        let (fs, markers, mut launcher) = setup(TEMPLATE, false);
        fs.remove("/opt/dorado");
        let mut table = ActiveJobTable::new();
        let run = Path::new("/watch/runA");

        let err = launcher.launch(run, &mut table).unwrap_err();

        assert!(matches!(err, LaunchError::MissingExecutable(_)));
        assert!(err.marks_run_failed());
        assert_eq!(markers.get_state(run), RunState::Failed);
        assert!(table.is_empty());
        assert!(launcher.spawner.seen.is_empty());
    }

    #[test]
    fn unknown_placeholder_marks_failed_without_spawning() {
        let (_fs, markers, mut launcher) = setup("{input_dir} --model {model}", false);
        let mut table = ActiveJobTable::new();
        let run = Path::new("/watch/runA");

        let err = launcher.launch(run, &mut table).unwrap_err();

        assert!(matches!(err, LaunchError::Template(TemplateError::UnknownPlaceholder(_))));
        assert_eq!(markers.get_state(run), RunState::Failed);
        assert!(launcher.spawner.seen.is_empty());
    }

    #[test]
    fn spawn_failure_marks_failed_and_leaves_table_empty() {
        let (_fs, markers, mut launcher) = setup(TEMPLATE, true);
        let mut table = ActiveJobTable::new();
        let run = Path::new("/watch/runA");

        let err = launcher.launch(run, &mut table).unwrap_err();

        assert!(matches!(err, LaunchError::Spawn(_)));
        assert_eq!(launcher.spawner.seen.len(), 1);
        assert_eq!(markers.get_state(run), RunState::Failed);
        assert_eq!(markers.marker_count(run), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn output_dir_failure_leaves_run_pending() {
        let (fs, markers, mut launcher) = setup(TEMPLATE, false);
        fs.set_read_only("/out");
        let mut table = ActiveJobTable::new();
        let run = Path::new("/watch/runA");

        let err = launcher.launch(run, &mut table).unwrap_err();

        assert!(matches!(err, LaunchError::OutputDir { .. }));
        assert!(!err.marks_run_failed());
        assert_eq!(markers.get_state(run), RunState::Pending);
        assert!(launcher.spawner.seen.is_empty());
    }

    #[test]
    fn unwritable_run_dir_defers_instead_of_spawning_unmarked() {
        let (fs, markers, mut launcher) = setup(TEMPLATE, false);
        fs.set_read_only("/watch/runA");
        let mut table = ActiveJobTable::new();
        let run = Path::new("/watch/runA");

        let err = launcher.launch(run, &mut table).unwrap_err();

        assert!(matches!(err, LaunchError::MarkProcessing(_)));
        assert_eq!(markers.get_state(run), RunState::Pending);
        assert!(launcher.spawner.seen.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn preview_does_not_create_output_dir() {
        let (fs, _markers, launcher) = setup(TEMPLATE, false);

        let cmd = launcher.preview(Path::new("/watch/runA")).unwrap();

        assert_eq!(cmd.program, PathBuf::from("/opt/dorado"));
        assert!(cmd.args.iter().any(|a| a == "/out/runA"));
        assert!(!fs.exists(Path::new("/out/runA")));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_run_names_keep_distinct_paths() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (fs, markers, mut launcher) = setup(TEMPLATE, false);
        let run_ff = Path::new("/watch").join(OsStr::from_bytes(b"run_\xff"));
        let run_fe = Path::new("/watch").join(OsStr::from_bytes(b"run_\xfe"));
        fs.add_dir(&run_ff);
        fs.add_dir(&run_fe);
        let mut table = ActiveJobTable::new();

        let first = launcher.launch(&run_ff, &mut table).unwrap();
        let second = launcher.launch(&run_fe, &mut table).unwrap();

        assert_ne!(first.output_dir, second.output_dir);
        assert_eq!(
            first.output_dir.as_os_str().as_bytes(),
            b"/out/run_\xff".as_slice()
        );
        assert!(fs.is_dir(&first.output_dir));
        assert!(fs.is_dir(&second.output_dir));

        assert_eq!(first.command.args[2].as_os_str(), run_ff.as_os_str());
        assert_eq!(second.command.args[2].as_os_str(), run_fe.as_os_str());
        assert_eq!(first.command.args[4].as_os_str(), first.output_dir.as_os_str());
        assert_eq!(markers.get_state(&run_ff), RunState::Processing);
        assert_eq!(table.len(), 2);
    }
}
