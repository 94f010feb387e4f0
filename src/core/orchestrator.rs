//! Deploy control flow
//!
//! Sequences one deploy run: pick targets (or switch a radio to mass storage
//! and wait for its drive), copy, optionally minify and launch simulators,
//! hand the radio back to serial mode and optionally tail its debug log.
//!
//! Failures of a single target are reported and the run moves on. Only an
//! empty target list or a radio drive that never mounts fails the run.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use super::bridge::{DeviceBridge, SerialAction};
use super::config::{DeployConfig, DeploymentTarget};
use super::minify::{find_minifier, MinifyStats, Minifier};
use super::simulator::SimulatorLauncher;
use super::sync::{CopyResult, Pacing, ProgressCallback, SafeCopyEngine, SyncMode};
use super::tail::{SerialTailer, TailExit, TailRequest};
use super::targets::{select_targets, Selection};
use crate::error::{report, Component};

/// Deploy state machine positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Idle,
    ModeSwitchingToStorage,
    WaitingForMount,
    Copying,
    MinifyingOptional,
    ModeRestoring,
    DebugTailOptional,
    Done,
    Failed,
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// Checkout root overriding `git_src`
    pub source_override: Option<PathBuf>,
    pub mode: SyncMode,
    pub selection: Selection,
    /// Launch simulators after a local deploy
    pub launch: bool,
    /// Deploy to the connected radio
    pub radio: bool,
    /// Tail the radio's serial log afterwards
    pub radio_debug: bool,
    pub minify: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            source_override: None,
            mode: SyncMode::Full,
            selection: Selection::Defaults,
            launch: false,
            radio: false,
            radio_debug: false,
            minify: false,
        }
    }
}

/// Result of deploying to one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub name: String,
    /// `<dest>/<tgt_name>`
    pub output_dir: PathBuf,
    /// Copy counts, or the error that stopped the copy
    pub copy: Result<CopyResult, String>,
}

/// Summary of a deploy run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub targets: Vec<TargetOutcome>,
    pub minify: Option<MinifyStats>,
    pub tail: Option<TailExit>,
    pub final_state: DeployState,
    pub exit_code: i32,
}

impl DeployReport {
    fn failed(targets: Vec<TargetOutcome>) -> Self {
        Self {
            targets,
            minify: None,
            tail: None,
            final_state: DeployState::Failed,
            exit_code: 1,
        }
    }

    /// Targets whose copy failed
    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.targets.iter().filter(|t| t.copy.is_err())
    }
}

/// Builds a progress callback for the named target
pub type ProgressFactory = Box<dyn Fn(&str) -> ProgressCallback + Send + Sync>;

/// Supplies the token that ends a debug tail; called only once the tail begins
pub type CancelSource = Box<dyn Fn() -> CancellationToken + Send + Sync>;

/// Runs deploys against one configuration and device
pub struct DeployOrchestrator<'a> {
    config: &'a DeployConfig,
    bridge: &'a dyn DeviceBridge,
    launcher: &'a dyn SimulatorLauncher,
    tailer: &'a SerialTailer<'a>,
    cancel: CancelSource,
    device_pacing: Pacing,
    local_pacing: Pacing,
    minifier: Option<Minifier>,
    progress: Option<ProgressFactory>,
    state: DeployState,
}

impl<'a> DeployOrchestrator<'a> {
    /// Orchestrator over the given collaborators
    pub fn new(
        config: &'a DeployConfig,
        bridge: &'a dyn DeviceBridge,
        launcher: &'a dyn SimulatorLauncher,
        tailer: &'a SerialTailer<'a>,
        cancel: CancelSource,
    ) -> Self {
        Self {
            config,
            bridge,
            launcher,
            tailer,
            cancel,
            device_pacing: Pacing::removable(),
            local_pacing: Pacing::local(),
            minifier: None,
            progress: None,
            state: DeployState::Idle,
        }
    }

    /// Override pacing for radio and local targets
    #[must_use]
    pub fn with_pacing(mut self, device: Pacing, local: Pacing) -> Self {
        self.device_pacing = device;
        self.local_pacing = local;
        self
    }

    /// Use this minifier instead of locating one
    #[must_use]
    pub fn with_minifier(mut self, minifier: Minifier) -> Self {
        self.minifier = Some(minifier);
        self
    }

    /// Report per-file copy progress
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFactory) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Current state
    pub fn state(&self) -> DeployState {
        self.state
    }

    fn transition(&mut self, next: DeployState) {
        tracing::debug!("Deploy state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run a deploy, choosing targets on stdin/stdout when asked to
    pub fn run(&mut self, options: &DeployOptions) -> DeployReport {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        self.run_with_io(options, &mut input, &mut output)
    }

    /// Run a deploy with explicit chooser streams
    pub fn run_with_io<R: BufRead, W: Write>(
        &mut self,
        options: &DeployOptions,
        input: &mut R,
        output: &mut W,
    ) -> DeployReport {
        self.state = DeployState::Idle;
        if options.radio_debug && !options.radio {
            tracing::warn!("--radio-debug has no effect without --radio");
        }

        let targets = if options.radio {
            self.transition(DeployState::ModeSwitchingToStorage);
            println!("[ETHOS] Disabling serial debug before copy to protect filesystem…");
            let outcome = self.bridge.set_serial_mode(SerialAction::Stop, None);
            if !outcome.success() {
                tracing::warn!(
                    "--serial stop exited with {}, trying to mount anyway",
                    outcome.exit_code
                );
            }

            self.transition(DeployState::WaitingForMount);
            let retries = self.config.mount_attempts.saturating_sub(1);
            match self
                .bridge
                .get_scripts_path(retries, self.config.mount_delay())
            {
                Ok(scripts) => vec![DeploymentTarget::radio(scripts)],
                Err(e) => {
                    report(
                        Component::Ethos,
                        format!("Failed to obtain Ethos SCRIPTS path after disabling serial. {e}"),
                    );
                    self.restore_serial(options);
                    self.transition(DeployState::Failed);
                    return DeployReport::failed(Vec::new());
                }
            }
        } else {
            match select_targets(&self.config.deploy_targets, options.selection, input, output) {
                Ok(targets) => targets,
                Err(e) => {
                    report(Component::Deploy, &e);
                    self.transition(DeployState::Failed);
                    return DeployReport::failed(Vec::new());
                }
            }
        };

        self.transition(DeployState::Copying);
        let outcomes = self.copy_all(&targets, options);

        let minify = if options.minify {
            self.transition(DeployState::MinifyingOptional);
            self.minify_all(&outcomes)
        } else {
            None
        };

        if options.launch && !options.radio {
            self.launch_all(&targets);
        }

        let mut tail = None;
        if options.radio {
            self.restore_serial(options);
            if options.radio_debug {
                self.transition(DeployState::DebugTailOptional);
                let exit = self.tail_debug();
                if exit != TailExit::StoppedByUser {
                    report(Component::Serial, tail_message(&exit));
                }
                tail = Some(exit);
            }
        }

        self.transition(DeployState::Done);
        DeployReport {
            targets: outcomes,
            minify,
            tail,
            final_state: DeployState::Done,
            exit_code: 0,
        }
    }

    fn copy_all(&self, targets: &[DeploymentTarget], options: &DeployOptions) -> Vec<TargetOutcome> {
        let source = self
            .config
            .source_root(options.source_override.as_deref());
        let pacing = if options.radio {
            self.device_pacing
        } else {
            self.local_pacing
        };

        targets
            .iter()
            .map(|target| {
                let output_dir = self.config.output_dir(target);
                println!(
                    "[{}] Copying ({}) {} → {}",
                    target.name,
                    options.mode.label(),
                    source.display(),
                    output_dir.display()
                );

                let mut engine = SafeCopyEngine::new(pacing);
                if let Some(factory) = &self.progress {
                    engine = engine.with_progress(factory(&target.name));
                }

                let copy = engine
                    .run(&options.mode, &source, &output_dir)
                    .map_err(|e| {
                        report(Component::Sync, format!("{}: {e}", target.name));
                        e.to_string()
                    });
                if let Ok(result) = &copy {
                    tracing::info!(
                        "{}: {}/{} files copied, {} skipped, {} removed",
                        target.name,
                        result.copied,
                        result.total,
                        result.skipped,
                        result.removed
                    );
                }
                TargetOutcome {
                    name: target.name.clone(),
                    output_dir,
                    copy,
                }
            })
            .collect()
    }

    fn minify_all(&self, outcomes: &[TargetOutcome]) -> Option<MinifyStats> {
        let located;
        let minifier = match &self.minifier {
            Some(minifier) => minifier,
            None => match find_minifier(self.config.minifier_bin.as_deref()) {
                Ok(tool) => {
                    located = Minifier::new(tool);
                    &located
                }
                Err(e) => {
                    report(Component::Minify, e);
                    return None;
                }
            },
        };

        println!("→ Minifying Lua files…");
        let mut stats = MinifyStats::default();
        for outcome in outcomes.iter().filter(|o| o.copy.is_ok()) {
            stats.absorb(minifier.minify_tree(&outcome.output_dir));
        }
        if stats.failed > 0 {
            report(
                Component::Minify,
                format!("{} of {} files could not be minified", stats.failed, stats.processed),
            );
        }
        println!("✓ Minification complete.");
        Some(stats)
    }

    fn launch_all(&self, targets: &[DeploymentTarget]) {
        for target in targets {
            if target.simulator_command.is_none() {
                tracing::debug!("No simulator configured for {}", target.name);
                continue;
            }
            if let Err(e) = self.launcher.launch(target) {
                report(Component::Sim, e);
            }
        }
    }

    /// Put the radio back into serial mode
    ///
    /// With debug requested a failed start is retried once.
    fn restore_serial(&mut self, options: &DeployOptions) {
        self.transition(DeployState::ModeRestoring);
        let outcome = self.bridge.set_serial_mode(SerialAction::Start, None);
        if outcome.success() {
            return;
        }
        if options.radio_debug {
            println!("[ETHOS] First --serial start failed; retrying once…");
            if self
                .bridge
                .set_serial_mode(SerialAction::Start, None)
                .success()
            {
                return;
            }
        }
        report(Component::Ethos, "Could not re-enable serial mode on the radio");
    }

    fn tail_debug(&self) -> TailExit {
        let request = TailRequest::from_config(self.config);
        let token = (self.cancel)();
        self.tailer.tail(&request, &token, |line| println!("{line}"))
    }
}

/// User-facing text for a tail that did not end by cancellation
pub fn tail_message(exit: &TailExit) -> String {
    match exit {
        TailExit::StoppedByUser => "Stopped by user".to_string(),
        TailExit::NoPortFound => "No matching serial port found".to_string(),
        TailExit::OpenFailed(reason) => format!("Failed to open serial port: {reason}"),
        TailExit::ReadFailed(reason) => format!("Serial read failed: {reason}"),
    }
}
