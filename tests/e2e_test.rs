#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use git_hunks::parse::{parse_file_refs, parse_hunk_refs};
use git_hunks::{ContextMode, GitCli, MemoryStore, Options, StageError, Stager};
use git2::{Repository, Signature};
use similar_asserts::assert_eq;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Test fixture for a git repository
struct Fixture {
    dir: TempDir,
    repo: Repository,
    store: MemoryStore,
}

impl Fixture {
    /// Create a new empty repo with deterministic config
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("Failed to init repo");

        // Deterministic config
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        config.set_bool("core.autocrlf", false).unwrap();

        Self {
            dir,
            repo,
            store: MemoryStore::new(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stager over the real git binary, keeping state in memory
    fn stager(&self, options: Options) -> Stager<GitCli, &MemoryStore> {
        Stager::new(GitCli::new(self.path()), &self.store, options)
    }

    /// Write a file to the repo
    fn write_file(&self, name: &str, content: impl AsRef<[u8]>) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Stage a file
    fn stage_file(&self, name: &str) {
        let mut index = self.repo.index().unwrap();
        index.read(true).unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    /// Create a commit
    fn commit(&self, message: &str) {
        let sig = Signature::new(
            "Test User",
            "test@example.com",
            &git2::Time::new(1234567890, 0),
        )
        .unwrap();
        let tree_id = self.repo.index().unwrap().write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        if self.repo.head().is_ok() {
            let parent = self.repo.head().unwrap().peel_to_commit().unwrap();
            self.repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
                .unwrap();
        } else {
            self.repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[])
                .unwrap();
        }
    }

    /// Commit `content` as `name`
    fn committed(&self, name: &str, content: impl AsRef<[u8]>) {
        self.write_file(name, content);
        self.stage_file(name);
        self.commit("initial");
    }

    fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .arg("-C")
            .arg(self.path())
            .args(args)
            .output()
            .expect("Failed to run git");
        String::from_utf8(output.stdout).unwrap()
    }

    /// Get git diff output (unstaged changes)
    fn git_diff(&self, file: &str) -> String {
        self.git(&["diff", "--no-ext-diff", "-U0", "--no-color", "--", file])
    }

    /// Get git diff --cached output (staged changes)
    fn git_diff_cached(&self, file: &str) -> String {
        self.git(&["diff", "--cached", "--no-ext-diff", "-U0", "--no-color", "--", file])
    }

    /// Content of `file` in the index
    fn index_content(&self, file: &str) -> String {
        self.git(&["show", &format!(":{file}")])
    }
}

fn numbered(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|i| format!("line {i}")).collect()
}

fn text(lines: &[String]) -> String {
    lines.join("\n") + "\n"
}

/// Changed lines of a diff, without headers
fn edits(diff: &str) -> Vec<&str> {
    diff.lines()
        .filter(|l| (l.starts_with('+') || l.starts_with('-')) && !l.starts_with("+++") && !l.starts_with("---"))
        .collect()
}

// =============================================================================
// Hunk ids
// =============================================================================

#[test]
fn ids_survive_staging_other_hunks() {
    let fixture = Fixture::new();
    let mut lines = numbered(1..=20);
    fixture.committed("notes.txt", text(&lines));

    lines[0] = "first".to_string();
    lines[15] = "sixteen".to_string();
    fixture.write_file("notes.txt", text(&lines));

    let stager = fixture.stager(Options::default());
    let before = stager.list_hunks(&[]).unwrap();
    assert_eq!(before.files.len(), 1);
    let hunks = &before.files[0].hunks;
    assert_eq!(hunks.len(), 2);
    assert_eq!(hunks[0].hunk.header(), "@@ -1,4 +1,4 @@");
    assert!(hunks[1].hunk.header().starts_with("@@ -13,7 +13,7 @@"));

    stager
        .stage_hunks(&[parse_hunk_refs("notes.txt:1").unwrap()])
        .unwrap();
    assert_eq!(edits(&fixture.git_diff_cached("notes.txt")), vec!["-line 1", "+first"]);

    let after = stager.list_hunks(&["notes.txt".to_string()]).unwrap();
    let remaining = &after.files[0].hunks;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, hunks[1].id);
    assert_eq!(remaining[0].index(), 1);

    // The old id still resolves even though its position moved
    let refs = parse_hunk_refs(&format!("notes.txt:{}", hunks[1].id)).unwrap();
    stager.stage_hunks(&[refs]).unwrap();
    assert_eq!(fixture.git_diff("notes.txt"), "");
}

#[test]
fn unknown_hunk_reports_listing() {
    let fixture = Fixture::new();
    let mut lines = numbered(1..=5);
    fixture.committed("a.txt", text(&lines));
    lines[2] = "changed".to_string();
    fixture.write_file("a.txt", text(&lines));

    let err = fixture
        .stager(Options::default())
        .stage_hunks(&[parse_hunk_refs("a.txt:7").unwrap()])
        .unwrap_err();
    match err {
        StageError::SelectorNotFound { hunks, .. } => assert_eq!(hunks.len(), 1),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fixture.git_diff_cached("a.txt"), "");
}

#[test]
fn precise_mode_splits_adjacent_edits() {
    let fixture = Fixture::new();
    let mut lines = numbered(1..=6);
    fixture.committed("a.txt", text(&lines));
    lines[1] = "two".to_string();
    lines[3] = "four".to_string();
    fixture.write_file("a.txt", text(&lines));

    let normal = fixture.stager(Options::default());
    assert_eq!(normal.list_hunks(&[]).unwrap().files[0].hunks.len(), 1);

    let precise = fixture.stager(Options {
        context: ContextMode::Precise,
        dry_run: false,
    });
    assert_eq!(precise.list_hunks(&[]).unwrap().files[0].hunks.len(), 2);

    precise
        .stage_hunks(&[parse_hunk_refs("a.txt:2").unwrap()])
        .unwrap();
    assert_eq!(edits(&fixture.git_diff_cached("a.txt")), vec!["-line 4", "+four"]);
    assert_eq!(edits(&fixture.git_diff("a.txt")), vec!["-line 2", "+two"]);
}

// =============================================================================
// Line staging
// =============================================================================

#[test]
fn single_addition() {
    let fixture = Fixture::new();
    let initial = text(&numbered(1..=136));
    fixture.committed("flake.nix", &initial);
    fixture.write_file("flake.nix", initial.clone() + "      debug = true;\n");

    fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("flake.nix:137").unwrap()])
        .unwrap();

    assert_eq!(
        edits(&fixture.git_diff_cached("flake.nix")),
        vec!["+      debug = true;"]
    );
    assert_eq!(fixture.git_diff("flake.nix"), "");
}

#[test]
fn partial_addition_range() {
    let fixture = Fixture::new();
    let initial: Vec<String> = (1..=39).map(|i| format!("        line {i}")).collect();
    let initial = text(&initial);
    fixture.committed("default.nix", &initial);

    let additions = r#"        # Allow Stylix to override terminal font
        "terminal.integrated.fontFamily" = lib.mkDefault "monospace";
        "direnv.restart.automatic" = true;
"#;
    fixture.write_file("default.nix", initial.clone() + additions);

    fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("default.nix:40..41").unwrap()])
        .unwrap();

    assert_eq!(
        edits(&fixture.git_diff_cached("default.nix")),
        vec![
            "+        # Allow Stylix to override terminal font",
            "+        \"terminal.integrated.fontFamily\" = lib.mkDefault \"monospace\";",
        ]
    );
    assert_eq!(
        edits(&fixture.git_diff("default.nix")),
        vec!["+        \"direnv.restart.automatic\" = true;"]
    );
}

#[test]
fn single_deletion() {
    let fixture = Fixture::new();
    let lines = numbered(1..=10);
    fixture.committed("a.txt", text(&lines));

    let mut modified = lines.clone();
    modified.remove(4);
    modified[7] = "changed".to_string();
    fixture.write_file("a.txt", text(&modified));

    fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("a.txt:-5").unwrap()])
        .unwrap();

    assert_eq!(edits(&fixture.git_diff_cached("a.txt")), vec!["-line 5"]);
    assert_eq!(edits(&fixture.git_diff("a.txt")), vec!["-line 9", "+changed"]);
}

#[test]
fn lines_outside_changes_are_rejected() {
    let fixture = Fixture::new();
    let mut lines = numbered(1..=10);
    fixture.committed("a.txt", text(&lines));
    lines[0] = "one".to_string();
    fixture.write_file("a.txt", text(&lines));

    let err = fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("a.txt:9").unwrap()])
        .unwrap_err();
    assert!(matches!(err, StageError::LineOutOfRange { .. }));
}

// =============================================================================
// End of file newline
// =============================================================================

#[test]
fn appending_after_missing_newline_stages_the_fix() {
    let fixture = Fixture::new();
    fixture.committed("a.txt", "a\nb\nc");
    fixture.write_file("a.txt", "a\nb\nc\nd\n");

    fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("a.txt:4").unwrap()])
        .unwrap();

    assert_eq!(fixture.index_content("a.txt"), "a\nb\nc\nd\n");
    assert_eq!(fixture.git_diff("a.txt"), "");
}

#[test]
fn newline_fix_alone_leaves_the_rest() {
    let fixture = Fixture::new();
    fixture.committed("a.txt", "a\nb\nc");
    fixture.write_file("a.txt", "a\nb\nc\nd\n");

    fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("a.txt:3").unwrap()])
        .unwrap();

    assert_eq!(fixture.index_content("a.txt"), "a\nb\nc\n");
    assert_eq!(edits(&fixture.git_diff("a.txt")), vec!["+d"]);
}

#[test]
fn replacing_last_line_without_newline() {
    let fixture = Fixture::new();
    fixture.committed("e.txt", "a\nX");
    fixture.write_file("e.txt", "a\nY");

    fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("e.txt:2").unwrap()])
        .unwrap();

    assert_eq!(fixture.index_content("e.txt"), "a\nY");
    assert_eq!(fixture.git_diff("e.txt"), "");
}

#[test]
fn later_addition_after_missing_newline_keeps_lines_apart() {
    let fixture = Fixture::new();
    fixture.committed("a.txt", "a\nb\nc");
    fixture.write_file("a.txt", "a\nb\nc\nd\ne\n");

    fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("a.txt:5").unwrap()])
        .unwrap();

    assert_eq!(fixture.index_content("a.txt"), "a\nb\nc\ne\n");
}

// =============================================================================
// Line endings and path encoding
// =============================================================================

#[test]
fn crlf_lines_keep_carriage_returns() {
    let fixture = Fixture::new();
    fixture.committed("w.txt", "a\r\nb\r\nc\r\n");
    fixture.write_file("w.txt", "a\r\nB\r\nc\r\nd\r\n");

    fixture
        .stager(Options::default())
        .stage_lines(&[parse_file_refs("w.txt:4").unwrap()])
        .unwrap();
    assert_eq!(fixture.index_content("w.txt"), "a\r\nb\r\nc\r\nd\r\n");

    let precise = Options {
        context: ContextMode::Precise,
        ..Options::default()
    };
    fixture
        .stager(precise)
        .stage_lines(&[parse_file_refs("w.txt:-2,2").unwrap()])
        .unwrap();
    assert_eq!(fixture.index_content("w.txt"), "a\r\nB\r\nc\r\nd\r\n");
    assert_eq!(fixture.git_diff("w.txt"), "");
}

#[test]
fn crlf_append_in_precise_mode() {
    let fixture = Fixture::new();
    fixture.committed("w.txt", "a\r\nb\r\n");
    fixture.write_file("w.txt", "a\r\nb\r\nnew\r\nmore\r\n");

    let precise = Options {
        context: ContextMode::Precise,
        ..Options::default()
    };
    fixture
        .stager(precise)
        .stage_lines(&[parse_file_refs("w.txt:3").unwrap()])
        .unwrap();

    assert_eq!(fixture.index_content("w.txt"), "a\r\nb\r\nnew\r\n");
}

#[test]
fn non_ascii_path() {
    let fixture = Fixture::new();
    fixture.committed("café.txt", "one\ntwo\n");
    fixture.write_file("café.txt", "ONE\ntwo\n");

    let listing = fixture.stager(Options::default()).list_hunks(&[]).unwrap();
    let paths: Vec<&str> = listing.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["café.txt"]);

    fixture
        .stager(Options::default())
        .stage_hunks(&[parse_hunk_refs("café.txt:1").unwrap()])
        .unwrap();
    assert_eq!(fixture.index_content("café.txt"), "ONE\ntwo\n");
}

// =============================================================================
// Untracked and binary files
// =============================================================================

#[test]
fn untracked_file_lines() {
    let fixture = Fixture::new();
    fixture.committed("tracked.txt", "x\n");
    fixture.write_file("new.txt", "one\ntwo\nthree\n");

    let stager = fixture.stager(Options::default());
    let listing = stager.list_hunks(&["new.txt".to_string()]).unwrap();
    assert_eq!(listing.files[0].hunks.len(), 1);
    assert_eq!(listing.files[0].hunks[0].stats.added, 3);
    // Listing alone does not register the file
    assert_eq!(fixture.git(&["ls-files", "--", "new.txt"]), "");

    stager
        .stage_lines(&[parse_file_refs("new.txt:1..2").unwrap()])
        .unwrap();
    assert_eq!(fixture.index_content("new.txt"), "one\ntwo\n");
    assert_eq!(edits(&fixture.git_diff("new.txt")), vec!["+three"]);
}

#[test]
fn binary_file_is_rejected() {
    let fixture = Fixture::new();
    fixture.committed("data.bin", b"\x00\x01\x02binary\n");
    fixture.write_file("data.bin", b"\x00\x01\x03binary\n");

    let stager = fixture.stager(Options::default());
    let err = stager
        .stage_hunks(&[parse_hunk_refs("data.bin:1").unwrap()])
        .unwrap_err();
    assert!(matches!(err, StageError::BinaryFile { .. }));

    let listing = stager.list_hunks(&[]).unwrap();
    assert!(listing.files.is_empty());
    assert_eq!(listing.skipped.len(), 1);
}

// =============================================================================
// Dry run and undo
// =============================================================================

#[test]
fn dry_run_leaves_index_alone() {
    let fixture = Fixture::new();
    let mut lines = numbered(1..=5);
    fixture.committed("a.txt", text(&lines));
    lines[2] = "three".to_string();
    fixture.write_file("a.txt", text(&lines));
    fixture.write_file("new.txt", "fresh\n");

    let stager = fixture.stager(Options {
        dry_run: true,
        ..Options::default()
    });
    let outcome = stager
        .stage_hunks(&[
            parse_hunk_refs("a.txt:1").unwrap(),
            parse_hunk_refs("new.txt:1").unwrap(),
        ])
        .unwrap();

    assert!(!outcome.applied);
    assert!(outcome.patch.contains("+three"));
    assert!(outcome.patch.contains("+fresh"));
    assert_eq!(fixture.git(&["diff", "--cached", "--name-only"]), "");
    assert_eq!(fixture.git(&["ls-files", "--", "new.txt"]), "");
    assert!(fixture.store.document().is_none());
}

#[test]
fn undo_restores_index() {
    let fixture = Fixture::new();
    let mut lines = numbered(1..=20);
    fixture.committed("a.txt", text(&lines));
    lines[0] = "first".to_string();
    lines[15] = "sixteen".to_string();
    fixture.write_file("a.txt", text(&lines));

    let stager = fixture.stager(Options::default());
    stager
        .stage_hunks(&[parse_hunk_refs("a.txt:1").unwrap()])
        .unwrap();
    stager
        .stage_lines(&[parse_file_refs("a.txt:-16,16").unwrap()])
        .unwrap();
    assert_eq!(stager.history().unwrap().len(), 2);

    // Undo the older entry first; the two patches touch separate regions
    stager.undo(1).unwrap();
    assert_eq!(
        edits(&fixture.git_diff_cached("a.txt")),
        vec!["-line 16", "+sixteen"]
    );

    stager.undo(0).unwrap();
    assert_eq!(fixture.git_diff_cached("a.txt"), "");
    assert!(stager.history().unwrap().is_empty());
}

#[test]
fn undo_conflict_keeps_history() {
    let fixture = Fixture::new();
    let mut lines = numbered(1..=5);
    fixture.committed("a.txt", text(&lines));
    lines[0] = "first".to_string();
    fixture.write_file("a.txt", text(&lines));

    let stager = fixture.stager(Options::default());
    stager
        .stage_hunks(&[parse_hunk_refs("a.txt:1").unwrap()])
        .unwrap();

    // Restage the same line with different content behind our back
    lines[0] = "uno".to_string();
    fixture.write_file("a.txt", text(&lines));
    fixture.stage_file("a.txt");

    let err = stager.undo(0).unwrap_err();
    assert!(matches!(err, StageError::UndoFailed { step: 0, .. }));
    assert_eq!(stager.history().unwrap().len(), 1);
}
