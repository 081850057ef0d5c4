use std::io::Write;

use dragon_options::binder::{BindingError, Bindable, MemberSet};
use dragon_options::catalog::StaticCatalog;
use dragon_options::config::{Config, EnvSource, FileSource};
use dragon_options::pipeline::PipelineError;
use dragon_options::policy::ValidationDecision;
use dragon_options::validation::PolicyError;
use dragon_options::{
    apply_annotated_configuration, AnnotatedConfiguration, ConfigTree, ModuleRef, Registry,
    ResolveError,
};
use tempfile::NamedTempFile;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn tree_from_toml(toml_str: &str) -> ConfigTree {
    ConfigTree::from_table(toml::from_str(toml_str).unwrap())
}

mod app {
    use super::*;
    use dragon_options::{register_options, ConfigOptions, OptionsMarker};
    use serde::Serialize;
    use validator::Validate;

    pub const MODULE: ModuleRef = ModuleRef::new(module_path!());

    #[derive(Debug, Default, Serialize, Validate)]
    pub struct AppOptions {
        pub id: i32,
        pub name: String,
        pub version: String,
        pub description: String,
    }

    impl Bindable for AppOptions {
        fn members(members: &mut MemberSet<Self>) {
            members
                .public("id", |o| &mut o.id)
                .public("name", |o| &mut o.name)
                .public("version", |o| &mut o.version)
                .public("description", |o| &mut o.description);
        }
    }

    impl ConfigOptions for AppOptions {
        const OPTIONS: OptionsMarker = OptionsMarker::section("app");
    }

    register_options!(AppOptions);
}

mod dev {
    use super::*;
    use dragon_options::{
        register_options, ConfigOptions, OptionsMarker, ValidateMarker, ValidateOptions,
        ValidateOptionsResult, ValidatorRef,
    };
    use validator::Validate;

    pub const MODULE: ModuleRef = ModuleRef::new(module_path!());

    #[derive(Debug, Default, Validate)]
    pub struct DevOptions {
        pub name: String,
        // Would fail annotation validation for "test", which must never run.
        #[validate(length(max = 2))]
        pub environment: String,
        pub variable_name: String,
    }

    impl Bindable for DevOptions {
        fn members(members: &mut MemberSet<Self>) {
            members
                .public("name", |o| &mut o.name)
                .public("environment", |o| &mut o.environment)
                .public("variable_name", |o| &mut o.variable_name);
        }
    }

    #[derive(Default)]
    pub struct DevOptionsValidator;

    impl ValidateOptions for DevOptionsValidator {
        type Options = DevOptions;

        fn validate(&self, _name: &str, options: &DevOptions) -> ValidateOptionsResult {
            if options.name.trim().is_empty() {
                ValidateOptionsResult::fail("name is null or empty")
            } else {
                ValidateOptionsResult::Success
            }
        }
    }

    impl ConfigOptions for DevOptions {
        const OPTIONS: OptionsMarker = OptionsMarker::section("dev");
        const VALIDATE: Option<ValidateMarker> =
            Some(ValidateMarker::with_validator(ValidatorRef::of::<DevOptionsValidator>()));
    }

    register_options!(DevOptions);
}

mod strict {
    use super::*;
    use dragon_options::{register_options, ConfigOptions, OptionsMarker};
    use validator::Validate;

    pub const MODULE: ModuleRef = ModuleRef::new(module_path!());

    #[derive(Debug, Default, Validate)]
    pub struct StrictOptions {
        pub id: i32,
    }

    impl Bindable for StrictOptions {
        fn members(members: &mut MemberSet<Self>) {
            members.public("id", |o| &mut o.id);
        }
    }

    impl ConfigOptions for StrictOptions {
        const OPTIONS: OptionsMarker = OptionsMarker::section("strict").throw_on_unknown_keys(true);
    }

    register_options!(StrictOptions);
}

mod visibility {
    use super::*;
    use dragon_options::{register_options, ConfigOptions, OptionsMarker};
    use validator::Validate;

    pub const MODULE: ModuleRef = ModuleRef::new(module_path!());

    #[derive(Debug, Default, Validate)]
    pub struct OpenCredentials {
        pub user: String,
        pub token: String,
    }

    impl Bindable for OpenCredentials {
        fn members(members: &mut MemberSet<Self>) {
            members
                .public("user", |o| &mut o.user)
                .non_public("token", |o| &mut o.token);
        }
    }

    impl ConfigOptions for OpenCredentials {
        const OPTIONS: OptionsMarker = OptionsMarker::section("credentials").bind_non_public(true);
    }

    #[derive(Debug, Default, Validate)]
    pub struct SealedCredentials {
        pub user: String,
        pub token: String,
    }

    impl Bindable for SealedCredentials {
        fn members(members: &mut MemberSet<Self>) {
            members
                .public("user", |o| &mut o.user)
                .non_public("token", |o| &mut o.token);
        }
    }

    impl ConfigOptions for SealedCredentials {
        const OPTIONS: OptionsMarker = OptionsMarker::section("credentials");
    }

    register_options!(OpenCredentials, SealedCredentials);
}

mod plain {
    use super::*;
    use dragon_options::{register_options, ConfigOptions, OptionsMarker};
    use validator::Validate;

    pub const MODULE: ModuleRef = ModuleRef::new(module_path!());

    #[derive(Debug, Default, Validate)]
    pub struct ListenerOptions {
        #[validate(range(min = 1, message = "port must be set"))]
        pub port: u16,
        pub hosts: Vec<String>,
    }

    impl Bindable for ListenerOptions {
        fn members(members: &mut MemberSet<Self>) {
            members
                .public("port", |o| &mut o.port)
                .public("hosts", |o| &mut o.hosts);
        }
    }

    // Blank section key: bound from `ListenerOptions`.
    impl ConfigOptions for ListenerOptions {
        const OPTIONS: OptionsMarker = OptionsMarker::new();
    }

    register_options!(ListenerOptions);
}

mod mismatched {
    use super::*;
    use dragon_options::{
        register_options, ConfigOptions, OptionsMarker, ValidateMarker, ValidatorRef,
    };
    use validator::Validate;

    #[derive(Debug, Default, Validate)]
    pub struct MisconfiguredOptions {
        pub name: String,
    }

    impl Bindable for MisconfiguredOptions {
        fn members(members: &mut MemberSet<Self>) {
            members.public("name", |o| &mut o.name);
        }
    }

    impl ConfigOptions for MisconfiguredOptions {
        const OPTIONS: OptionsMarker = OptionsMarker::section("misconfigured");
        const VALIDATE: Option<ValidateMarker> = Some(ValidateMarker::with_validator(
            ValidatorRef::of::<super::dev::DevOptionsValidator>(),
        ));
    }

    register_options!(MisconfiguredOptions);
}

use app::AppOptions;
use dev::DevOptions;
use mismatched::MisconfiguredOptions;
use plain::ListenerOptions;
use strict::StrictOptions;
use visibility::{OpenCredentials, SealedCredentials};

#[test]
fn test_app_section_binds_from_text_values() {
    init_tracing();
    let tree = Config::builder()
        .with_pairs([
            ("app:id", "1"),
            ("app:name", "test app"),
            ("app:version", "1.0.0"),
            ("app:description", "test options bind"),
        ])
        .build()
        .unwrap();

    let registry = Registry::new();
    apply_annotated_configuration(&registry, &tree, &[app::MODULE]).unwrap();

    let app = registry.resolve::<AppOptions>().unwrap();
    assert_eq!(app.id, 1);
    assert_eq!(app.name, "test app");
    assert_eq!(app.version, "1.0.0");
    assert_eq!(app.description, "test options bind");
}

#[test]
fn test_bound_members_serialize_back_to_the_section() {
    let tree = tree_from_toml(
        r#"
        [app]
        id = 1
        name = "test app"
        version = "1.0.0"
        description = "test options bind"
        "#,
    );

    let registry = Registry::new();
    apply_annotated_configuration(&registry, &tree, &[app::MODULE]).unwrap();

    let app = registry.resolve::<AppOptions>().unwrap();
    let serialized = toml::Value::try_from(&*app).unwrap();
    assert_eq!(serialized, toml::Value::Table(tree.subtree("app").into_table()));
}

#[test]
fn test_custom_validator_fails_on_resolve_not_on_bind() {
    init_tracing();
    let tree = tree_from_toml(
        r#"
        [dev]
        name = ""
        environment = "test"
        variableName = "port"
        "#,
    );

    let registry = Registry::new();
    let report = AnnotatedConfiguration::new()
        .global_annotation(true)
        .run(&registry, &tree, &[dev::MODULE]);
    assert!(report.is_ok(), "{report}");
    assert!(matches!(
        report.bound[0].decision,
        ValidationDecision::UseCustomValidator(_)
    ));
    assert_eq!(registry.validator_count::<DevOptions>(), 1);

    let failure = match registry.resolve::<DevOptions>() {
        Err(ResolveError::Validation(failure)) => failure,
        other => panic!("expected a validation failure, got {other:?}"),
    };
    assert_eq!(failure.options, "DevOptions");
    assert_eq!(failure.section, "dev");
    assert_eq!(failure.failures, vec!["name is null or empty".to_string()]);
}

#[test]
fn test_custom_validator_passes_valid_options() {
    let tree = Config::builder()
        .with_pairs([
            ("dev:name", "dev box"),
            ("dev:environment", "test"),
            ("dev:variable_name", "port"),
        ])
        .build()
        .unwrap();

    let registry = Registry::new();
    apply_annotated_configuration(&registry, &tree, &[dev::MODULE]).unwrap();

    let dev = registry.resolve::<DevOptions>().unwrap();
    assert_eq!(dev.name, "dev box");
    assert_eq!(dev.environment, "test");
    assert_eq!(dev.variable_name, "port");
}

#[test]
fn test_strict_options_reject_unknown_key() {
    let tree = Config::builder()
        .with_pairs([("strict:id", "1"), ("strict:extra", "x")])
        .build()
        .unwrap();

    let registry = Registry::new();
    let report = apply_annotated_configuration(&registry, &tree, &[strict::MODULE]).unwrap_err();

    assert!(report.bound.is_empty());
    let [PipelineError::Binding { options, errors, .. }] = report.errors.as_slice() else {
        panic!("expected one binding error, got {report}");
    };
    assert_eq!(*options, "StrictOptions");
    assert!(matches!(
        errors.iter().next(),
        Some(BindingError::UnknownKey { key, .. }) if key == "extra"
    ));
    assert!(!registry.contains::<StrictOptions>());
}

#[test]
fn test_strict_options_accept_known_keys() {
    let tree = Config::builder()
        .with_pairs([("STRICT:ID", "7")])
        .build()
        .unwrap();

    let registry = Registry::new();
    apply_annotated_configuration(&registry, &tree, &[strict::MODULE]).unwrap();
    assert_eq!(registry.resolve::<StrictOptions>().unwrap().id, 7);
}

#[test]
fn test_non_public_members_follow_the_marker() {
    let tree = Config::builder()
        .with_pairs([("credentials:user", "svc"), ("credentials:token", "t0k3n")])
        .build()
        .unwrap();

    let registry = Registry::new();
    apply_annotated_configuration(&registry, &tree, &[visibility::MODULE]).unwrap();

    let open = registry.resolve::<OpenCredentials>().unwrap();
    assert_eq!(open.user, "svc");
    assert_eq!(open.token, "t0k3n");

    let sealed = registry.resolve::<SealedCredentials>().unwrap();
    assert_eq!(sealed.user, "svc");
    assert!(sealed.token.is_empty());
}

#[test]
fn test_no_marker_without_global_annotation_registers_no_validator() {
    let registry = Registry::new();
    let report = AnnotatedConfiguration::new()
        .global_annotation(false)
        .run(&registry, &ConfigTree::new(), &[plain::MODULE]);

    assert!(report.is_ok());
    assert_eq!(report.bound[0].section, "ListenerOptions");
    assert_eq!(report.bound[0].decision, ValidationDecision::NoValidation);
    assert_eq!(registry.validator_count::<ListenerOptions>(), 0);
    assert_eq!(registry.resolve::<ListenerOptions>().unwrap().port, 0);
}

#[test]
fn test_global_annotation_validates_unmarked_types() {
    let registry = Registry::new();
    apply_annotated_configuration(&registry, &ConfigTree::new(), &[plain::MODULE]).unwrap();

    let Err(ResolveError::Validation(failure)) = registry.resolve::<ListenerOptions>() else {
        panic!("expected annotation validation to reject port 0");
    };
    assert_eq!(failure.failures, vec!["port: port must be set".to_string()]);
}

#[test]
fn test_rerun_replaces_entries_without_duplicating_validators() {
    let registry = Registry::new();
    let first = Config::builder()
        .with_pairs([("ListenerOptions:port", "80")])
        .build()
        .unwrap();
    let second = Config::builder()
        .with_pairs([("listeneroptions:port", "8080"), ("listeneroptions:hosts:0", "a")])
        .build()
        .unwrap();

    apply_annotated_configuration(&registry, &first, &[plain::MODULE]).unwrap();
    apply_annotated_configuration(&registry, &first, &[plain::MODULE]).unwrap();
    assert_eq!(registry.validator_count::<ListenerOptions>(), 1);
    assert_eq!(registry.resolve::<ListenerOptions>().unwrap().port, 80);

    apply_annotated_configuration(&registry, &second, &[plain::MODULE]).unwrap();
    let listener = registry.resolve::<ListenerOptions>().unwrap();
    assert_eq!(listener.port, 8080);
    assert_eq!(listener.hosts, vec!["a"]);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_parallel_run_matches_sequential() {
    let tree = Config::builder()
        .with_pairs([
            ("app:id", "1"),
            ("dev:name", "box"),
            ("strict:id", "3"),
            ("credentials:token", "t"),
            ("listeneroptions:port", "9"),
        ])
        .build()
        .unwrap();
    let modules = [
        app::MODULE,
        dev::MODULE,
        strict::MODULE,
        visibility::MODULE,
        plain::MODULE,
    ];

    let sequential = Registry::new();
    let parallel = Registry::new();
    let a = AnnotatedConfiguration::new().run(&sequential, &tree, &modules);
    let b = AnnotatedConfiguration::new()
        .parallel(true)
        .run(&parallel, &tree, &modules);

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(a.bound, b.bound);
    assert_eq!(a.bound.len(), 6);
    assert_eq!(parallel.resolve::<StrictOptions>().unwrap().id, 3);
    assert_eq!(parallel.resolve::<OpenCredentials>().unwrap().token, "t");
    assert_eq!(parallel.resolve::<ListenerOptions>().unwrap().port, 9);
}

#[test]
fn test_validator_for_another_type_is_a_policy_error() {
    let registry = Registry::new();
    let module = ModuleRef::new(concat!(module_path!(), "::mismatched"));
    let report =
        apply_annotated_configuration(&registry, &ConfigTree::new(), &[module]).unwrap_err();

    assert!(matches!(
        report.errors.as_slice(),
        [PipelineError::Policy {
            options: "MisconfiguredOptions",
            source: PolicyError::ValidatorTargetMismatch { .. },
        }]
    ));
    assert!(!registry.contains::<MisconfiguredOptions>());
}

#[test]
fn test_invalid_module_is_reported_and_others_still_bind() {
    let tree = Config::builder().with_pairs([("app:id", "5")]).build().unwrap();
    let registry = Registry::new();
    let modules = [ModuleRef::new("not a module"), app::MODULE];
    let report = apply_annotated_configuration(&registry, &tree, &modules).unwrap_err();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.bound.len(), 1);
    assert_eq!(registry.resolve::<AppOptions>().unwrap().id, 5);
}

#[test]
fn test_static_catalog_with_layered_sources() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[app]\nid = 1\nname = \"from file\"\nversion = \"1.0.0\"\n\n[app.unused]\nkey = 1"
    )
    .unwrap();
    let mut mounted = NamedTempFile::new().unwrap();
    writeln!(mounted, "description = \"mounted\"").unwrap();

    let tree = Config::builder()
        .with_file(file.path(), true)
        .with_source(FileSource::required(mounted.path()).under("app"))
        .with_source(EnvSource::new("DRAGON", "__").with_vars([("DRAGON__APP__NAME", "from env")]))
        .build()
        .unwrap();

    let registry = Registry::new();
    AnnotatedConfiguration::new()
        .with_catalog(StaticCatalog::new().with::<AppOptions>("settings"))
        .apply(&registry, &tree, &[ModuleRef::new("settings")])
        .unwrap();

    let app = registry.resolve::<AppOptions>().unwrap();
    assert_eq!(app.id, 1);
    assert_eq!(app.name, "from env");
    assert_eq!(app.version, "1.0.0");
    assert_eq!(app.description, "mounted");
}
