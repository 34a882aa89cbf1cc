//! End-to-end resolution scenarios against a scripted resolution tool.

use std::sync::Arc;
use std::time::Duration;

use uplift::checker::UpdateChecker;
use uplift::classify::{ClassifierRule, ClassifierRuleSet, ErrorKind, KindTag};
use uplift::ecosystem::{CommandEcosystem, ScriptedInvoker, YamlManifestEditor};
use uplift::model::{
    Credentials, Dependency, ProjectFile, ProjectFileSet, Requirement, UpdatePolicy,
    UpdateStrategy,
};
use uplift::probe::{ManifestProbeBuilder, ProbeBuilder, ProbeRequest};
use uplift::resolver::{ResolutionOutcome, ResolverState, RetryPolicy, VersionResolver};
use uplift::UpliftError;

const MANIFEST: &str = r#"dependencies:
  d: "~> 1.4.0"
  e: ">= 1.0.0"
  f: "3.0.0"
  follower:
    git: https://github.com/acme/follower
    branch: main
"#;
const LOCK: &str = "d: \"1.4.0\"\ne: \"1.0.0\"\nf: \"3.0.0\"\nfollower: 0123456789abcdef0123456789abcdef01234567\n";

fn files() -> ProjectFileSet {
    ProjectFileSet::new(vec![
        ProjectFile::new("deps.yml", MANIFEST),
        ProjectFile::new("deps.lock", LOCK),
    ])
}

fn ecosystem(tool: &ScriptedInvoker, rules: ClassifierRuleSet) -> Arc<CommandEcosystem> {
    Arc::new(CommandEcosystem::new(
        "local",
        YamlManifestEditor::default(),
        tool.clone(),
        rules,
    ))
}

fn checker(tool: &ScriptedInvoker) -> UpdateChecker {
    let rules = ClassifierRuleSet::builtin("bundler").unwrap();
    UpdateChecker::new(ecosystem(tool, rules), files(), Credentials::default())
}

fn d() -> Dependency {
    Dependency::new("d", "local")
        .with_version("1.4.0")
        .with_requirement(Requirement::new("deps.yml", "~> 1.4.0"))
}

#[test]
fn pessimistic_requirement_is_bumped_to_latest() {
    let tool = ScriptedInvoker::new();
    tool.push_success(r#"{"d": "1.13.0"}"#);
    let mut checker = checker(&tool);

    let outcome = checker
        .latest_resolvable_version(&d(), UpdatePolicy::UnlockOwn)
        .unwrap();
    let latest = outcome.resolved().unwrap();
    assert_eq!(latest.to_string(), "1.13.0");

    let requirements = checker
        .updated_requirements(&d(), latest, UpdateStrategy::BumpVersions)
        .unwrap();
    assert_eq!(requirements[0].requirement.as_deref(), Some("~> 1.13.0"));
}

#[test]
fn private_source_authentication_failure_names_host() {
    let tool = ScriptedInvoker::new();
    tool.push_failure(
        "Authentication is required for internal.example.org.\n\
         Please supply credentials for this source.",
    );
    let mut checker = checker(&tool);

    let outcome = checker
        .latest_resolvable_version(&d(), UpdatePolicy::UnlockOwn)
        .unwrap();
    assert_eq!(
        outcome.failure().unwrap().kind,
        ErrorKind::AuthenticationFailure {
            source: "internal.example.org".into()
        }
    );
    assert_eq!(tool.calls(), 1);
}

#[test]
fn force_returns_exactly_the_moved_packages() {
    let tool = ScriptedInvoker::new();
    tool.push_success(r#"{"d": "2.0.0", "e": "1.2.0", "f": "3.0.0"}"#);
    let mut checker = checker(&tool);

    let outcome = checker
        .force(&d(), &"2.0.0".parse().unwrap(), UpdateStrategy::BumpVersions)
        .unwrap();
    let moved: Vec<(&str, Option<&str>)> = outcome
        .resolved()
        .unwrap()
        .iter()
        .map(|dep| (dep.name(), dep.version()))
        .collect();
    assert_eq!(moved, vec![("d", Some("2.0.0")), ("e", Some("1.2.0"))]);
}

#[test]
fn branch_pin_cannot_take_a_replacement_ref() {
    let builder = ManifestProbeBuilder::new(YamlManifestEditor::default());
    let follower = YamlManifestEditor::default()
        .dependency(&files(), "local", "follower")
        .unwrap()
        .unwrap();
    assert!(follower.git_source().unwrap().is_pinned());
    let request =
        ProbeRequest::new(follower, UpdatePolicy::UnlockOwn).with_pin_replacement("v2.0.0");

    let err = builder.build(&files(), &request).unwrap_err();
    assert!(matches!(err, UpliftError::InvalidProbeState { .. }));
}

#[test]
fn repeated_question_runs_the_tool_once() {
    let tool = ScriptedInvoker::new();
    tool.push_success(r#"{"d": "1.13.0"}"#);
    let mut checker = checker(&tool);

    let first = checker
        .latest_resolvable_version(&d(), UpdatePolicy::UnlockOwn)
        .unwrap();
    let second = checker
        .latest_resolvable_version(&d(), UpdatePolicy::UnlockOwn)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(tool.calls(), 1);
}

#[test]
fn retry_budget_bounds_attempts() {
    let tool = ScriptedInvoker::new();
    for _ in 0..5 {
        tool.push_failure("Net::ReadTimeout while fetching from rubygems.example.org");
    }
    let rules = ClassifierRuleSet::new().with_rule(
        ClassifierRule::new(
            "read_timeout",
            r"Net::ReadTimeout while fetching from (?P<source>\S+)",
            KindTag::SourceTimedOut,
        )
        .unwrap()
        .retryable(true),
    );
    let mut resolver = VersionResolver::new(
        ecosystem(&tool, rules),
        files(),
        Arc::new(Credentials::default()),
    )
    .with_retry_policy(RetryPolicy::new(3).with_backoff(Duration::ZERO, Duration::ZERO));

    let outcome = resolver
        .latest_resolvable_version(&d(), UpdatePolicy::UnlockOwn)
        .unwrap();
    assert_eq!(
        outcome.failure().unwrap().kind,
        ErrorKind::SourceTimedOut {
            source: "rubygems.example.org".into()
        }
    );
    assert_eq!(tool.calls(), 4);
    assert_eq!(resolver.state(), ResolverState::Failed);
}

#[test]
fn known_tool_defect_is_no_result() {
    let tool = ScriptedInvoker::new();
    tool.push_failure("undefined method `request' for nil:NilClass");
    let rules = ClassifierRuleSet::new().with_rule(
        ClassifierRule::new("nil_request", r"undefined method `request' for nil", KindTag::KnownToolDefect)
            .unwrap(),
    );
    let mut resolver = VersionResolver::new(
        ecosystem(&tool, rules),
        files(),
        Arc::new(Credentials::default()),
    );

    let outcome = resolver
        .latest_resolvable_version(&d(), UpdatePolicy::UnlockOwn)
        .unwrap();
    assert_eq!(outcome, ResolutionOutcome::Unresolved);
}
