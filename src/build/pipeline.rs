//! Named build tasks and their default composition.
//!
//! Each task is an entry point on its own. [`Pipeline::build`] runs the
//! release build:
//!
//! ```text
//! clean -> create-output
//!       -> parallel(modules, full-bundle, types, series(theme, copy-full-style))
//!       -> parallel(copy-types, copy-files)
//! ```
//!
//! A stage only starts when every task of the previous stage succeeded.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{error, info};

use crate::build::emit::{copy_file, copy_tree, WriteError};
use crate::build::{
    BuildContext, BuildResult, FullBundleBuilder, ModuleBundler, ModuleFormat, TaskError,
    TaskResult, TaskStatus,
};
use crate::compile::ScriptCompiler;
use crate::dts::generate_declarations;
use crate::locale::MergeOutcome;
use crate::release::ReleaseInfo;

/// What a task produced.
#[derive(Debug, Default)]
pub struct TaskOutput {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
    /// Why the task found nothing to do
    pub skipped: Option<String>,
}

impl From<Vec<PathBuf>> for TaskOutput {
    fn from(files: Vec<PathBuf>) -> Self {
        Self { files, ..Self::default() }
    }
}

/// Named tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Clean,
    CreateOutput,
    Modules,
    FullBundle,
    Types,
    Locale,
    Theme,
    CopyFullStyle,
    CopyTypes,
    CopyFiles,
    Stamp,
}

impl Task {
    pub fn name(self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::CreateOutput => "create-output",
            Task::Modules => "modules",
            Task::FullBundle => "full-bundle",
            Task::Types => "types",
            Task::Locale => "locale",
            Task::Theme => "theme",
            Task::CopyFullStyle => "copy-full-style",
            Task::CopyTypes => "copy-types",
            Task::CopyFiles => "copy-files",
            Task::Stamp => "stamp",
        }
    }

    /// Run the task against `ctx`.
    pub fn run(self, ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
        match self {
            Task::Clean => clean(ctx),
            Task::CreateOutput => create_output(ctx),
            Task::Modules => build_modules(ctx),
            Task::FullBundle => build_full_bundle(ctx),
            Task::Types => generate_types(ctx),
            Task::Locale => merge_locales(ctx),
            Task::Theme => build_theme(ctx),
            Task::CopyFullStyle => copy_full_style(ctx),
            Task::CopyTypes => copy_types(ctx),
            Task::CopyFiles => copy_files(ctx),
            Task::Stamp => stamp_release(ctx),
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Tree-preserving ESM and CommonJS outputs.
pub fn build_modules(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let output = ModuleBundler::from_context(ctx, &ScriptCompiler)?.build()?;
    Ok(TaskOutput { files: output.files, warnings: output.warnings, skipped: None })
}

/// Browser bundles and locale mini-bundles.
pub fn build_full_bundle(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let output = FullBundleBuilder::from_context(ctx, &ScriptCompiler)?.build()?;
    Ok(TaskOutput { files: output.files, warnings: output.warnings, skipped: None })
}

/// Checked declaration files.
pub fn generate_types(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    Ok(generate_declarations(ctx)?.into())
}

/// Cross-language catalogs; an existing output is a skip.
pub fn merge_locales(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    match crate::locale::merge_locales(ctx)? {
        MergeOutcome::Merged { files, .. } => Ok(files.into()),
        MergeOutcome::AlreadyGenerated => {
            let output = ctx.resolve_path(&ctx.config().locale.output);
            let reason = format!("{} already exists", output.display());
            Ok(TaskOutput { skipped: Some(reason), ..TaskOutput::default() })
        }
    }
}

pub fn build_theme(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    Ok(crate::theme::build_theme(ctx)?.into())
}

pub fn copy_full_style(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    Ok(vec![crate::theme::copy_full_style(ctx)?].into())
}

/// Copy the declaration tree into both module output trees.
pub fn copy_types(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let types = ctx.types_dir();
    let mut files = Vec::new();
    for format in [ModuleFormat::Esm, ModuleFormat::Cjs] {
        files.extend(copy_tree(&types, &ctx.package_output().join(format.tree_dir()))?);
    }
    Ok(files.into())
}

/// Copy the entry manifest and the configured extra files into the package
/// output root.
pub fn copy_files(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let out = ctx.package_output();
    let mut sources = vec![ctx.entry_manifest()];
    sources.extend(ctx.config().copy.files.iter().map(|f| ctx.resolve_path(f)));

    let mut files = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = out.join(name);
        copy_file(&source, &target)?;
        files.push(target);
    }
    Ok(files.into())
}

/// Stamp `$TAG_VERSION` and `$GIT_HEAD` into the release manifests.
pub fn stamp_release(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let release = ReleaseInfo::from_env()?;
    Ok(crate::release::stamp_release(ctx, &release)?.into())
}

/// Remove the output root.
pub fn clean(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let out = ctx.output_dir();
    if out.exists() {
        fs::remove_dir_all(&out).map_err(|e| WriteError::new(&out, e))?;
        info!("removed {}", out.display());
    }
    Ok(TaskOutput::default())
}

fn create_output(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let out = ctx.package_output();
    fs::create_dir_all(&out).map_err(|e| WriteError::new(&out, e))?;
    Ok(TaskOutput::default())
}

/// Runs tasks and collects their results.
pub struct Pipeline {
    context: BuildContext,
}

impl Pipeline {
    pub fn new(context: BuildContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Run one task, timing it and turning its error into a failed result.
    pub fn run_task(&self, task: Task) -> TaskResult {
        let start = Instant::now();
        info!("starting {}", task);
        let result = task.run(&self.context);
        let duration = start.elapsed();
        match result {
            Ok(TaskOutput { skipped: Some(reason), warnings, .. }) => {
                info!("skipped {}: {}", task, reason);
                TaskResult::new(task, TaskStatus::Skipped { reason }, duration)
                    .with_output(Vec::new(), warnings)
            }
            Ok(output) => {
                info!("finished {} in {:?}", task, duration);
                TaskResult::new(task, TaskStatus::Done, duration)
                    .with_output(output.files, output.warnings)
            }
            Err(e) => {
                error!("{} failed: {}", task, e);
                TaskResult::new(task, TaskStatus::Failed(e.to_string()), duration)
            }
        }
    }

    /// Run tasks one after another, stopping at the first failure.
    pub fn series(&self, tasks: &[Task]) -> Vec<TaskResult> {
        let mut results = Vec::with_capacity(tasks.len());
        for &task in tasks {
            let result = self.run_task(task);
            let failed = !result.is_success();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    /// Run the given tasks in sequence.
    pub fn run(&self, tasks: &[Task]) -> BuildResult {
        let start = Instant::now();
        let mut result = BuildResult::new();
        for task_result in self.series(tasks) {
            result.add(task_result);
        }
        result.with_duration(start.elapsed())
    }

    /// The default release build.
    pub fn build(&self) -> BuildResult {
        let start = Instant::now();
        let mut result = BuildResult::new();
        if record(&mut result, self.series(&[Task::Clean, Task::CreateOutput]))
            && record(&mut result, self.compile_stage())
        {
            record(&mut result, self.copy_stage());
        }
        result.with_duration(start.elapsed())
    }

    fn compile_stage(&self) -> Vec<TaskResult> {
        let ((modules, full), (types, style)) = rayon::join(
            || rayon::join(|| self.run_task(Task::Modules), || self.run_task(Task::FullBundle)),
            || rayon::join(|| self.run_task(Task::Types), || self.series(&[Task::Theme, Task::CopyFullStyle])),
        );
        let mut results = vec![modules, full, types];
        results.extend(style);
        results
    }

    fn copy_stage(&self) -> Vec<TaskResult> {
        let (types, files) =
            rayon::join(|| self.run_task(Task::CopyTypes), || self.run_task(Task::CopyFiles));
        vec![types, files]
    }
}

/// Add a stage's results; true when the build may continue.
fn record(result: &mut BuildResult, stage: Vec<TaskResult>) -> bool {
    for task_result in stage {
        result.add(task_result);
    }
    result.is_success()
}
