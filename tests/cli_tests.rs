//! # CLI Tests / 命令行测试
//!
//! Tests for argument parsing and for whole runs driven through the command
//! line entry point, observed through the JSON report.
//!
//! 测试参数解析，以及通过命令行入口驱动、经由 JSON 报告观察的完整运行。

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use context_runner::cli::{parse_args, run_from};
use context_runner::core::config::DEFAULT_SETTINGS_FILE;
use context_runner::infra::short_id::short_id_for;
use context_runner::prelude::*;

fn sample_tree() -> Context {
    let mut root = Context::default();
    root.add_child("math", |math| {
        math.add_test("adds", |_| assert_equal(&4, &(2 + 2)));
        math.add_test("divides", |_| assert_equal(&2, &(4 / 2)));
    });
    root.add_child("strings", |strings| {
        strings.add_test("shouts", |_| fail("too quiet"));
    });
    root
}

fn executed_names(report: &Path) -> Vec<String> {
    let report: Value = serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
    report["units"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|unit| unit["name"].as_str().map(str::to_owned))
        .collect()
}

fn run_args(extra: &[&str]) -> anyhow::Result<bool> {
    let mut args = vec!["context-runner", "--no-color"];
    args.extend_from_slice(extra);
    run_from(args, sample_tree(), TypeRegistry::new())
}

#[cfg(test)]
mod parse_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = parse_args(["context-runner"]).unwrap();
        assert_eq!(options.config, PathBuf::from(DEFAULT_SETTINGS_FILE));
        assert!(!options.config_explicit);
        assert_eq!(options.example, None);
        assert!(options.focus.is_empty());
        assert_eq!(options.jobs, None);
        assert!(!options.strict_doubles);
        assert!(!options.no_color);
    }

    #[test]
    fn test_every_flag() {
        let options = parse_args([
            "context-runner",
            "-e",
            "^math",
            "-f",
            "abc123",
            "--focus",
            "def456",
            "-j",
            "4",
            "-c",
            "ci.toml",
            "--lang",
            "zh-CN",
            "--html",
            "out/report.html",
            "--json",
            "out/report.json",
            "--strict-doubles",
            "--no-color",
        ])
        .unwrap();

        assert_eq!(options.example.as_deref(), Some("^math"));
        assert_eq!(options.focus, vec!["abc123", "def456"]);
        assert_eq!(options.jobs, Some(4));
        assert_eq!(options.config, PathBuf::from("ci.toml"));
        assert!(options.config_explicit);
        assert_eq!(options.lang.as_deref(), Some("zh-CN"));
        assert_eq!(options.html, Some(PathBuf::from("out/report.html")));
        assert_eq!(options.json, Some(PathBuf::from("out/report.json")));
        assert!(options.strict_doubles);
        assert!(options.no_color);
    }

    #[test]
    fn test_invalid_jobs_is_a_clap_error() {
        let error = parse_args(["context-runner", "--jobs", "many"]).unwrap_err();
        assert!(error.downcast_ref::<clap::Error>().is_some());
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(parse_args(["context-runner", "--frobnicate"]).is_err());
    }
}

#[cfg(test)]
mod run_tests {
    use super::*;

    #[test]
    fn test_full_run_writes_json_report() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.json");

        let passed = run_args(&["--json", report.to_str().unwrap()]).unwrap();
        assert!(!passed);
        assert_eq!(
            executed_names(&report),
            vec!["math adds", "math divides", "strings shouts"]
        );
    }

    #[test]
    fn test_example_pattern_filters_units() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.json");

        let passed = run_args(&["-e", "^math", "--json", report.to_str().unwrap()]).unwrap();
        assert!(passed);
        assert_eq!(executed_names(&report), vec!["math adds", "math divides"]);
    }

    #[test]
    fn test_focus_selects_by_short_id() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.json");
        let id = short_id_for("math divides");

        let passed = run_args(&["-f", id.as_str(), "--json", report.to_str().unwrap()]).unwrap();
        assert!(passed);
        assert_eq!(executed_names(&report), vec!["math divides"]);
    }

    #[test]
    fn test_concurrent_jobs_run_everything() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.json");

        let passed = run_args(&["-j", "3", "--json", report.to_str().unwrap()]).unwrap();
        assert!(!passed);
        let mut names = executed_names(&report);
        names.sort();
        assert_eq!(names, vec!["math adds", "math divides", "strings shouts"]);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let error = run_args(&["-e", "(unclosed"]).unwrap_err();
        assert!(
            format!("{error:#}").contains("Invalid --example pattern `(unclosed`"),
            "{error:#}"
        );
    }

    #[test]
    fn test_explicit_missing_settings_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");

        let error = run_args(&["-c", missing.to_str().unwrap()]).unwrap_err();
        assert!(format!("{error:#}").contains("failed to read settings file"));
    }

    #[test]
    fn test_settings_file_is_applied() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("from-settings.json");
        let settings = dir.path().join("ContextRunner.toml");
        fs::write(
            &settings,
            format!("json_report = {:?}\njobs = 2\n", report.to_str().unwrap()),
        )
        .unwrap();

        let passed = run_args(&["-c", settings.to_str().unwrap(), "-e", "adds"]).unwrap();
        assert!(passed);
        assert_eq!(executed_names(&report), vec!["math adds"]);
    }

    #[test]
    fn test_strict_doubles_flag_reaches_pipeline() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.json");
        let mut root = Context::default();
        root.add_test("ghost double", |example| {
            example.instance_double("Ghost")?;
            Ok(())
        });

        let passed = run_from(
            [
                "context-runner",
                "--no-color",
                "--strict-doubles",
                "--json",
                report.to_str().unwrap(),
            ],
            root,
            TypeRegistry::new(),
        )
        .unwrap();
        assert!(!passed);
    }
}
