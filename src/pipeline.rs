//! The end-to-end pass: discover options types, bind each from its section,
//! wire its validation and hand the result to the registry.

use std::fmt;

use rayon::prelude::*;
use thiserror::Error;

use crate::binder::{BindingErrors, OptionsBinder, SectionBinder};
use crate::catalog::{discover, DiscoveryError, InventoryCatalog, ModuleRef, TypeCatalog};
use crate::config::ConfigTree;
use crate::markers::{simple_type_name, ConfigOptions};
use crate::policy::{BindingContext, ValidationDecision};
use crate::registry::Registry;
use crate::validation::{select_validator, PolicyError};

/// A failure that stopped one module or one options type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("invalid validation setup for {options}: {source}")]
    Policy {
        options: &'static str,
        #[source]
        source: PolicyError,
    },

    #[error("could not bind {options} from section '{section}': {errors}")]
    Binding {
        options: &'static str,
        section: String,
        #[source]
        errors: BindingErrors,
    },
}

/// One options type that was bound and registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundOptions {
    pub options: &'static str,
    pub section: String,
    pub decision: ValidationDecision,
}

/// Outcome of a pipeline run: every type that made it into the registry and
/// every error met along the way.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub bound: Vec<BoundOptions>,
    pub errors: Vec<PipelineError>,
}

impl PipelineReport {
    /// Whether the run finished without errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The report itself when anything failed, `value` otherwise.
    pub fn into_result<V>(self, value: V) -> Result<V, PipelineReport> {
        if self.is_ok() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} options type(s) bound, {} error(s)",
            self.bound.len(),
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PipelineReport {}

/// Inputs shared by every type in one run.
pub(crate) struct BindJob<'a> {
    pub(crate) tree: &'a ConfigTree,
    pub(crate) registry: &'a Registry,
    pub(crate) binder: &'a dyn OptionsBinder,
    pub(crate) global_annotation: bool,
}

/// Binds `T` from its section and installs it, with its validator, in the
/// registry. Nothing is registered when any step fails.
pub(crate) fn apply_options<T: ConfigOptions>(
    job: &BindJob<'_>,
) -> Result<BoundOptions, PipelineError> {
    let type_name = std::any::type_name::<T>();
    let options = simple_type_name(type_name);
    let context = BindingContext::new(T::OPTIONS, T::VALIDATE, job.global_annotation);
    let section = context.section_key(type_name);
    let decision = context.validation_decision();

    let _span = tracing::debug_span!("apply_options", options, section = %section).entered();

    let validator = select_validator::<T>(&decision)
        .map_err(|source| PipelineError::Policy { options, source })?;

    let mut instance = T::default();
    if let Err(errors) = job.binder.bind(job.tree, &section, &mut instance, context.policy()) {
        tracing::debug!(errors = errors.len(), "discarding partially bound instance");
        return Err(PipelineError::Binding {
            options,
            section,
            errors,
        });
    }

    job.registry.install(section.clone(), instance, validator);
    tracing::debug!(?decision, "options registered");
    Ok(BoundOptions {
        options,
        section,
        decision,
    })
}

/// Configures and runs the pipeline.
///
/// ```
/// use dragon_options::{AnnotatedConfiguration, ConfigTree, ModuleRef, Registry};
///
/// let registry = Registry::new();
/// let report = AnnotatedConfiguration::new()
///     .global_annotation(false)
///     .parallel(true)
///     .run(&registry, &ConfigTree::new(), &[ModuleRef::new("my_app::settings")]);
/// assert!(report.is_ok());
/// assert!(report.bound.is_empty());
/// ```
#[derive(Debug)]
#[must_use = "the pipeline does nothing until .run() or .apply() is called"]
pub struct AnnotatedConfiguration {
    catalog: Box<dyn TypeCatalog>,
    binder: Box<dyn OptionsBinder>,
    global_annotation: bool,
    fail_fast: bool,
    parallel: bool,
}

impl Default for AnnotatedConfiguration {
    fn default() -> Self {
        Self {
            catalog: Box::new(InventoryCatalog),
            binder: Box::new(SectionBinder::new()),
            global_annotation: true,
            fail_fast: false,
            parallel: false,
        }
    }
}

impl AnnotatedConfiguration {
    /// A pipeline with the default catalog, binder and settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every type's field constraints even without a validate
    /// marker. On by default.
    pub fn global_annotation(mut self, enabled: bool) -> Self {
        self.global_annotation = enabled;
        self
    }

    /// Binds with `binder` instead of [`SectionBinder`].
    pub fn with_binder(mut self, binder: impl OptionsBinder + 'static) -> Self {
        self.binder = Box::new(binder);
        self
    }

    /// Discovers types through `catalog` instead of [`InventoryCatalog`].
    pub fn with_catalog(mut self, catalog: impl TypeCatalog + 'static) -> Self {
        self.catalog = Box::new(catalog);
        self
    }

    /// Abort on the first module that cannot be scanned.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Bind types on the rayon thread pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Runs the pipeline and reports on every module and type.
    ///
    /// Types that bind successfully are registered even when others fail.
    pub fn run(
        &self,
        registry: &Registry,
        tree: &ConfigTree,
        modules: &[ModuleRef],
    ) -> PipelineReport {
        let mut report = PipelineReport::default();

        let discovery = match discover(self.catalog.as_ref(), modules, self.fail_fast) {
            Ok(discovery) => discovery,
            Err(error) => {
                tracing::warn!(%error, "discovery aborted");
                report.errors.push(error.into());
                return report;
            }
        };
        report
            .errors
            .extend(discovery.errors.into_iter().map(PipelineError::from));

        let job = BindJob {
            tree,
            registry,
            binder: self.binder.as_ref(),
            global_annotation: self.global_annotation,
        };
        let results: Vec<Result<BoundOptions, PipelineError>> = if self.parallel {
            discovery.types.par_iter().map(|d| d.apply(&job)).collect()
        } else {
            discovery.types.iter().map(|d| d.apply(&job)).collect()
        };

        for result in results {
            match result {
                Ok(bound) => report.bound.push(bound),
                Err(error) => {
                    tracing::warn!(%error, "options type skipped");
                    report.errors.push(error);
                }
            }
        }

        tracing::info!(
            modules = modules.len(),
            bound = report.bound.len(),
            errors = report.errors.len(),
            "annotated configuration applied"
        );
        report
    }

    /// Runs the pipeline, returning the registry when nothing failed.
    pub fn apply<'r>(
        &self,
        registry: &'r Registry,
        tree: &ConfigTree,
        modules: &[ModuleRef],
    ) -> Result<&'r Registry, PipelineReport> {
        self.run(registry, tree, modules).into_result(registry)
    }
}

/// Binds every options type registered in `modules` with the default
/// settings: global annotation validation on, [`SectionBinder`],
/// [`InventoryCatalog`].
pub fn apply_annotated_configuration<'r>(
    registry: &'r Registry,
    tree: &ConfigTree,
    modules: &[ModuleRef],
) -> Result<&'r Registry, PipelineReport> {
    AnnotatedConfiguration::new().apply(registry, tree, modules)
}
