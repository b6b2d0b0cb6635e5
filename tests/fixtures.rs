use std::fs;
use std::path::{Path, PathBuf};

use jrb8::fixture::{self, Expectation};
use jrb8::{compile, ir};
use tempfile::tempdir;

fn fixture_dir() -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Every `.e` file in `dir` paired with its `.j` program.
fn pairs(dir: &Path) -> Vec<(PathBuf, PathBuf)> {
  let mut pairs: Vec<_> = fs::read_dir(dir)
    .unwrap()
    .map(|entry| entry.unwrap().path())
    .filter(|path| path.extension().is_some_and(|ext| ext == "e"))
    .map(|expect| (expect.with_extension("j"), expect))
    .collect();
  pairs.sort();
  pairs
}

fn check_pair(program: &Path, expect: &Path) -> fixture::FixtureReport {
  let source = fs::read_to_string(program).unwrap();
  let expectation = Expectation::parse(&fs::read_to_string(expect).unwrap()).unwrap();
  fixture::check_source(&source, &expectation).unwrap()
}

#[test]
fn bundled_fixtures_pass() {
  let pairs = pairs(&fixture_dir());
  assert!(pairs.len() >= 4);

  for (program, expect) in pairs {
    let report = check_pair(&program, &expect);
    assert!(
      report.passed(),
      "{}: {:?}",
      program.display(),
      report.failures()
    );
  }
}

#[test]
fn compiled_programs_round_trip_through_fixture_files() {
  let dir = tempdir().unwrap();
  let compiled = compile("var n = 3; while (n > 0) { out n * n; n = n - 1; }").unwrap();

  let program = dir.path().join("squares.j");
  let expect = dir.path().join("squares.e");
  fs::write(&program, ir::to_text(&compiled.assembly).join("\n")).unwrap();
  fs::write(&expect, "s: 500\no: 9,4,1\nr: 0:0\n").unwrap();

  let report = check_pair(&program, &expect);
  assert!(report.passed(), "{:?}", report.failures());
}

#[test]
fn failing_fixture_reports_why() {
  let dir = tempdir().unwrap();
  let program = dir.path().join("wrong.j");
  let expect = dir.path().join("wrong.e");
  fs::write(&program, "load rom a 4\nout a\nhalt\n").unwrap();
  fs::write(&expect, "o: 5\n").unwrap();

  let report = check_pair(&program, &expect);
  assert!(!report.passed());
  assert_eq!(report.failures(), ["outputs [4], expected [5]"]);
}
