//! Pipeline orchestration: one run per request, always ending in a render.
//!
//! ```text
//! Classified ─(markup)──────────────────────────────────────────────▶ Loaded
//!     │
//!     └(component script)▶ Extracting ▶ Resolving ▶ Scaffolding ▶ Installing ▶ Bundling ▶ Loaded
//!                                                        any failure │
//!                                                                    ▼
//!                                                              FallbackLoaded
//! ```
//!
//! There are no retries and no re-entry. The only state shared between runs is
//! the per-project lock registry, held across scaffold, install and bundle for
//! persistent projects.

use std::sync::Arc;
use std::time::Instant;

use npm_registry::{HttpRegistry, HttpRegistryConfig, RegistryQuery};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::artifact::{PersistenceMode, ProjectId, SourceArtifact};
use crate::bundler::{build_project, BundleArtifact, Bundler, EsbuildBundler};
use crate::classifier::{classify_with_rule, ArtifactKind};
use crate::config::PipelineConfig;
use crate::diagnostics::{DiagnosticRecord, DiagnosticsSink, JsonlDiagnostics, NullDiagnostics, Severity};
use crate::error::{HostBuddyError, Result};
use crate::imports::{ExtractionReport, IgnoreReason, ImportExtractor};
use crate::installer::{DependencyInstaller, InstallReport, Installer, NpmInstaller};
use crate::lock::ProjectLocks;
use crate::obs;
use crate::resolver::{PackageSafetyResolver, Resolution};
use crate::sandbox::{ExecutionSandbox, ExecutionSession, SurfaceFactory};
use crate::scaffold::{baseline_names, ProjectScaffolder, ScaffoldedProject};

/// Orchestrator states, in the order a run can visit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Classified,
    Extracting,
    Resolving,
    Scaffolding,
    Installing,
    Bundling,
    Loaded,
    FallbackLoaded,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Classified => "classified",
            PipelineState::Extracting => "extracting",
            PipelineState::Resolving => "resolving",
            PipelineState::Scaffolding => "scaffolding",
            PipelineState::Installing => "installing",
            PipelineState::Bundling => "bundling",
            PipelineState::Loaded => "loaded",
            PipelineState::FallbackLoaded => "fallback_loaded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Loaded | PipelineState::FallbackLoaded)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run reports back, whether it rendered the bundle or fell back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub project_id: ProjectId,
    pub mode: PersistenceMode,
    /// SHA-256 of the submitted source.
    pub source_digest: String,
    pub kind: ArtifactKind,
    /// Name of the classification rule that decided `kind`.
    pub classified_by: String,
    pub final_state: PipelineState,
    /// Every state entered, in order, ending with `final_state`.
    pub states: Vec<PipelineState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallReport>,
    pub diagnostics: Vec<DiagnosticRecord>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn fell_back(&self) -> bool {
        self.final_state == PipelineState::FallbackLoaded
    }
}

/// Result of one run: the report plus the live session rendering it.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub session: ExecutionSession,
}

/// Collaborators shared by every run.
#[derive(Clone)]
pub struct PipelineServices {
    pub config: PipelineConfig,
    pub registry: Arc<dyn RegistryQuery>,
    pub installer: Arc<dyn Installer>,
    pub bundler: Arc<dyn Bundler>,
    pub surfaces: Arc<dyn SurfaceFactory>,
    pub diagnostics: Arc<dyn DiagnosticsSink>,
    pub locks: Arc<ProjectLocks>,
}

impl PipelineServices {
    pub fn new(
        config: PipelineConfig,
        registry: Arc<dyn RegistryQuery>,
        installer: Arc<dyn Installer>,
        bundler: Arc<dyn Bundler>,
        surfaces: Arc<dyn SurfaceFactory>,
    ) -> Self {
        Self {
            config,
            registry,
            installer,
            bundler,
            surfaces,
            diagnostics: Arc::new(NullDiagnostics),
            locks: Arc::new(ProjectLocks::new()),
        }
    }

    /// HTTP registry, `npm`, `esbuild` and a JSON-lines diagnostics log under
    /// the configured base directory.
    pub fn production(config: PipelineConfig, surfaces: Arc<dyn SurfaceFactory>) -> Result<Self> {
        config.validate()?;
        let registry = HttpRegistry::new(HttpRegistryConfig::new(&config.registry_url))?;
        let installer = NpmInstaller::new(config.npm_program.clone());
        let bundler = EsbuildBundler::new(config.esbuild_program.clone());
        let diagnostics = JsonlDiagnostics::new(config.diagnostics_path());

        Ok(Self::new(
            config,
            Arc::new(registry),
            Arc::new(installer),
            Arc::new(bundler),
            surfaces,
        )
        .with_diagnostics(Arc::new(diagnostics)))
    }

    pub fn with_registry(mut self, registry: Arc<dyn RegistryQuery>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_locks(mut self, locks: Arc<ProjectLocks>) -> Self {
        self.locks = locks;
        self
    }
}

/// A stage failure that sends the run to the fallback render.
struct StageFailure {
    stage: PipelineState,
    error: HostBuddyError,
}

impl StageFailure {
    fn at(stage: PipelineState) -> impl FnOnce(HostBuddyError) -> Self {
        move |error| Self { stage, error }
    }
}

/// Per-run bookkeeping: visited states and diagnostics.
struct RunContext<'a> {
    run_id: Uuid,
    project_id: &'a ProjectId,
    sink: &'a dyn DiagnosticsSink,
    states: Vec<PipelineState>,
    diagnostics: Vec<DiagnosticRecord>,
}

impl<'a> RunContext<'a> {
    fn enter(&mut self, state: PipelineState) {
        obs::emit_state_entered(&self.run_id.to_string(), state.as_str());
        self.states.push(state);
    }

    fn current(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Classified)
    }

    async fn diagnose(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) {
        let mut record = DiagnosticRecord::new(
            self.run_id,
            self.project_id,
            self.current().as_str(),
            severity,
            message,
        );
        if let Some(detail) = detail {
            record = record.with_detail(detail);
        }

        if let Err(err) = self.sink.record(&record).await {
            obs::emit_diagnostic_dropped(&self.run_id.to_string(), &err);
        }
        self.diagnostics.push(record);
    }
}

/// What the build stages produced on the success path.
struct Built {
    project: ScaffoldedProject,
    artifact: BundleArtifact,
}

/// Sequences the stages for each run request.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    services: Arc<PipelineServices>,
}

impl PipelineOrchestrator {
    pub fn new(services: Arc<PipelineServices>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    /// Run `artifact` through the pipeline. Never fails: every stage failure
    /// ends in the fallback render and is reported in the run report.
    pub async fn run(&self, artifact: SourceArtifact) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span_id = run_id.to_string();
        let project = artifact.project_id().to_string();
        obs::RunSpan::instrument(&span_id, &project, self.run_inner(run_id, artifact)).await
    }

    async fn run_inner(&self, run_id: Uuid, artifact: SourceArtifact) -> RunOutcome {
        let start = Instant::now();
        let digest = artifact.digest();
        obs::emit_run_started(&run_id.to_string(), artifact.mode().as_str(), &digest);

        let services = self.services.as_ref();
        let sandbox =
            ExecutionSandbox::new(services.surfaces.clone()).with_dev_tools(services.config.dev_tools);
        let title = format!("Project {}", artifact.project_id());

        let mut ctx = RunContext {
            run_id,
            project_id: artifact.project_id(),
            sink: services.diagnostics.as_ref(),
            states: Vec::new(),
            diagnostics: Vec::new(),
        };

        let (kind, rule) = classify_with_rule(artifact.text());
        ctx.enter(PipelineState::Classified);

        let mut extraction = None;
        let mut resolution = None;
        let mut install = None;

        let session = match kind {
            ArtifactKind::Markup => {
                let session = sandbox.load_fallback(&title, artifact.text()).await;
                ctx.enter(PipelineState::Loaded);
                if let Some(err) = session.load_error() {
                    ctx.diagnose(Severity::Error, format!("surface failed to load document: {err}"), None)
                        .await;
                }
                session
            }
            ArtifactKind::ComponentScript => {
                let built = self
                    .build(&mut ctx, &artifact, &mut extraction, &mut resolution, &mut install)
                    .await;

                let loaded = match built {
                    Ok(Built { project, artifact: bundle }) => sandbox
                        .load_bundle(&title, project, &bundle)
                        .await
                        .map_err(StageFailure::at(PipelineState::Bundling)),
                    Err(failure) => Err(failure),
                };

                match loaded {
                    Ok(session) => {
                        ctx.enter(PipelineState::Loaded);
                        session
                    }
                    Err(failure) => self.fall_back(&mut ctx, &sandbox, &title, &artifact, failure).await,
                }
            }
        };

        let final_state = ctx.current();
        debug_assert!(final_state.is_terminal(), "run ended in {final_state}");
        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_run_finished(
            &run_id.to_string(),
            final_state.as_str(),
            duration_ms,
            ctx.diagnostics.len(),
        );

        let report = RunReport {
            run_id,
            project_id: artifact.project_id().clone(),
            mode: artifact.mode(),
            source_digest: digest,
            kind,
            classified_by: rule.to_string(),
            final_state,
            states: ctx.states,
            extraction,
            resolution,
            install,
            diagnostics: ctx.diagnostics,
            duration_ms,
        };
        RunOutcome { report, session }
    }

    async fn fall_back(
        &self,
        ctx: &mut RunContext<'_>,
        sandbox: &ExecutionSandbox,
        title: &str,
        artifact: &SourceArtifact,
        failure: StageFailure,
    ) -> ExecutionSession {
        obs::emit_stage_failed(&ctx.run_id.to_string(), failure.stage.as_str(), &failure.error);
        ctx.diagnose(
            Severity::Error,
            failure.error.to_string(),
            Some(json!({ "failed_stage": failure.stage })),
        )
        .await;

        let session = sandbox.load_fallback(title, artifact.text()).await;
        ctx.enter(PipelineState::FallbackLoaded);
        if let Some(err) = session.load_error() {
            ctx.diagnose(
                Severity::Error,
                format!("surface failed to load fallback document: {err}"),
                None,
            )
            .await;
        }
        session
    }

    /// Extracting through Bundling.
    async fn build(
        &self,
        ctx: &mut RunContext<'_>,
        artifact: &SourceArtifact,
        extraction_out: &mut Option<ExtractionReport>,
        resolution_out: &mut Option<Resolution>,
        install_out: &mut Option<InstallReport>,
    ) -> std::result::Result<Built, StageFailure> {
        let config = &self.services.config;

        ctx.enter(PipelineState::Extracting);
        let extraction = ImportExtractor::new(config.limits.max_packages)
            .with_excluded(baseline_names())
            .extract(artifact.text());
        for ignored in &extraction.ignored {
            let severity = match ignored.reason {
                IgnoreReason::Blocked | IgnoreReason::InvalidName | IgnoreReason::OverCap => {
                    Severity::Warning
                }
                _ => Severity::Info,
            };
            ctx.diagnose(
                severity,
                format!("ignored import {:?}", ignored.specifier),
                Some(serde_json::to_value(ignored).unwrap_or_default()),
            )
            .await;
        }
        let candidates = extraction.candidates.clone();
        *extraction_out = Some(extraction);

        ctx.enter(PipelineState::Resolving);
        let resolution = PackageSafetyResolver::new(
            self.services.registry.clone(),
            config.limits,
            config.registry_timeout(),
        )
        .with_concurrency(config.registry_concurrency)
        .resolve(&candidates)
        .await;
        for record in resolution.rejected() {
            ctx.diagnose(
                Severity::Warning,
                format!("package {} rejected", record.name),
                Some(serde_json::to_value(record).unwrap_or_default()),
            )
            .await;
        }
        let accepted = resolution.accepted_versions();
        *resolution_out = Some(resolution);

        ctx.enter(PipelineState::Scaffolding);
        let scaffolder = ProjectScaffolder::new(config.ephemeral_root(), config.persistent_root());
        let _lock = match artifact.mode() {
            PersistenceMode::Persistent => Some(
                self.services
                    .locks
                    .acquire(artifact.project_id(), &scaffolder.persistent_dir(artifact.project_id()))
                    .await
                    .map_err(StageFailure::at(PipelineState::Scaffolding))?,
            ),
            PersistenceMode::Ephemeral => None,
        };
        let project = scaffolder
            .scaffold(artifact.project_id(), artifact.mode(), artifact.text(), &accepted)
            .await
            .map_err(StageFailure::at(PipelineState::Scaffolding))?;

        ctx.enter(PipelineState::Installing);
        let report = DependencyInstaller::new(
            self.services.installer.as_ref(),
            &config.registry_url,
            config.install_timeout_secs,
        )
        .with_cache(config.prefer_offline, config.npm_cache_dir.clone())
        .install(&project)
        .await
        .map_err(StageFailure::at(PipelineState::Installing))?;
        if let InstallReport::ReusedCache { warning } = &report {
            ctx.diagnose(
                Severity::Warning,
                "dependency refresh failed, using existing cache",
                Some(json!({ "reason": warning })),
            )
            .await;
        }
        *install_out = Some(report);

        ctx.enter(PipelineState::Bundling);
        let artifact = build_project(
            self.services.bundler.as_ref(),
            &project,
            config.bundle_timeout_secs,
        )
        .await
        .map_err(StageFailure::at(PipelineState::Bundling))?;

        Ok(Built { project, artifact })
    }
}
